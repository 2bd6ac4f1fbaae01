//! Reference snowpack model: energy balance with bulk turbulent transfer.
//!
//! A compact two-layer energy- and mass-balance model. The snowcover is a
//! single cold-content pool split into an active surface layer and a lower
//! layer for reporting; exchange with the atmosphere uses neutral bulk
//! transfer coefficients. Not a research-grade scheme, but it conserves
//! mass and energy and exercises every field the engine accumulates.

use crate::error::{PhysicsError, PhysicsResult};
use crate::forcing::ForcingRecord;
use crate::model::{ModelParams, SnowModel, StepOutcome};
use crate::state::{FluxTerms, SiteProps, SnowState};

use sf_core::consts::FREEZE;

// Physical constants.
const CP_AIR: f64 = 1005.0; // Specific heat of dry air (J/K/kg)
const CP_ICE: f64 = 2100.0; // Specific heat of ice (J/K/kg)
const CP_WATER: f64 = 4180.0; // Specific heat of water (J/K/kg)
const EPS: f64 = 0.622; // Molecular weight ratio, water vapour to dry air
const E0: f64 = 611.213; // Saturation vapour pressure at the melting point (Pa)
const LH_FUSION: f64 = 0.334e6; // Latent heat of fusion (J/kg)
const LH_SUBLIM: f64 = 2.835e6; // Latent heat of sublimation (J/kg)
const RGAS: f64 = 287.0; // Gas constant for dry air (J/K/kg)
const RHO_ICE: f64 = 917.0; // Density of ice (kg/m^3)
const RHO_WATER: f64 = 1000.0; // Density of water (kg/m^3)
const SB: f64 = 5.67e-8; // Stefan-Boltzmann constant (W/m^2/K^4)
const VON_KARMAN: f64 = 0.4;
const SNOW_EMISSIVITY: f64 = 0.98;
const K_SOIL: f64 = 1.65; // Thermal conductivity of moist soil (W/m/K)
const SEA_LEVEL_P: f64 = 101_325.0; // Pa
const SCALE_HEIGHT: f64 = 8434.0; // Pressure scale height (m)

// Below this specific mass the snowcover is treated as gone.
const MIN_SNOW_MASS: f64 = 1e-3;

/// Saturation vapour pressure over ice or water (Pa), Magnus form.
pub fn sat_vapor_pressure(t_k: f64) -> f64 {
    let tc = t_k - FREEZE;
    if t_k < FREEZE {
        E0 * (22.4422 * tc / (272.186 + tc)).exp()
    } else {
        E0 * (17.5043 * tc / (241.3 + tc)).exp()
    }
}

/// Atmospheric pressure at elevation (Pa), isothermal scale-height profile.
pub fn pressure_at(elevation: f64) -> f64 {
    SEA_LEVEL_P * (-elevation / SCALE_HEIGHT).exp()
}

/// Air density (kg/m^3) from the ideal gas law.
pub fn air_density(pressure: f64, t_a: f64) -> f64 {
    pressure / (RGAS * t_a)
}

/// Neutral-stability bulk exchange coefficient for the given measurement
/// heights and roughness length.
pub fn exchange_coeff(z_u: f64, z_t: f64, z_0: f64) -> f64 {
    VON_KARMAN * VON_KARMAN / ((z_u / z_0).ln() * (z_t / z_0).ln())
}

/// Net all-wave radiation at the snow surface (W/m^2).
pub fn net_radiation(s_n: f64, i_lw: f64, t_s_0: f64) -> f64 {
    s_n + SNOW_EMISSIVITY * (i_lw - SB * t_s_0.powi(4))
}

/// Sensible heat flux, positive toward the snow (W/m^2).
pub fn sensible_heat(rho_air: f64, ce: f64, u: f64, t_a: f64, t_s_0: f64) -> f64 {
    rho_air * CP_AIR * ce * u * (t_a - t_s_0)
}

/// Latent heat flux, positive toward the snow (W/m^2).
pub fn latent_heat(rho_air: f64, ce: f64, u: f64, e_a: f64, t_s_0: f64, pressure: f64) -> f64 {
    let e_surf = sat_vapor_pressure(t_s_0);
    rho_air * LH_SUBLIM * ce * u * EPS * (e_a - e_surf) / pressure
}

/// Conductive heat exchange with the soil, positive toward the snow (W/m^2).
pub fn ground_heat(t_g: f64, t_bottom: f64, z_g: f64) -> f64 {
    K_SOIL * (t_g - t_bottom) / z_g
}

/// Heat advected by precipitation relative to the snow surface, averaged
/// over the sub-step (W/m^2).
pub fn advected_heat(m_rain: f64, m_snow: f64, t_pp: f64, t_s_0: f64, dt_s: f64) -> f64 {
    (CP_WATER * m_rain * (t_pp - t_s_0) + CP_ICE * m_snow * (t_pp - t_s_0)) / dt_s
}

/// Cold content of a snow mass at temperature `t_s` (J/m^2, never positive).
pub fn cold_content(m_s: f64, t_s: f64) -> f64 {
    (CP_ICE * m_s * (t_s - FREEZE)).min(0.0)
}

/// Maximum liquid water the pack can hold, from the available pore volume
/// (kg/m^2).
pub fn max_liquid(z_s: f64, rho: f64, max_h2o_vol: f64) -> f64 {
    let pore_frac = (1.0 - rho / RHO_ICE).max(0.0);
    max_h2o_vol * RHO_WATER * z_s * pore_frac
}

/// The reference [`SnowModel`]. Stateless; a single value can drive every
/// simulation unit of a run concurrently.
#[derive(Clone, Copy, Debug, Default)]
pub struct BulkTransferModel;

impl BulkTransferModel {
    fn finalize(
        &self,
        mut m_s: f64,
        mut z_s: f64,
        cc: f64,
        h2o_total: f64,
        params: &ModelParams,
        fluxes: &mut FluxTerms,
    ) -> SnowState {
        if m_s < MIN_SNOW_MASS {
            // Pack is gone: whatever liquid remains leaves as runoff.
            fluxes.ro_pred += h2o_total + m_s.max(0.0);
            return SnowState::bare_ground();
        }
        if z_s <= 0.0 {
            z_s = m_s / RHO_ICE;
        }
        let mut rho = m_s / z_s;
        if rho > RHO_ICE {
            rho = RHO_ICE;
            z_s = m_s / rho;
        }

        let h2o_max = max_liquid(z_s, rho, params.max_h2o_vol);
        let runoff = (h2o_total - h2o_max).max(0.0);
        let h2o = h2o_total - runoff;
        fluxes.ro_pred += runoff;

        let t_s = FREEZE + cc / (CP_ICE * m_s);
        let z_s_0 = z_s.min(params.max_z_s_0);
        let z_s_l = z_s - z_s_0;
        let m_s_0 = rho * z_s_0;
        let m_s_l = rho * z_s_l;
        let layer_count = if z_s_l > 0.0 { 2 } else { 1 };

        SnowState {
            layer_count,
            z_s,
            z_s_0,
            z_s_l,
            rho,
            m_s,
            m_s_0,
            m_s_l,
            h2o,
            h2o_max,
            h2o_vol: h2o / (RHO_WATER * z_s),
            h2o_sat: if h2o_max > 0.0 {
                100.0 * h2o / h2o_max
            } else {
                0.0
            },
            h2o_total,
            t_s,
            t_s_0: t_s,
            t_s_l: if layer_count == 2 { t_s } else { FREEZE },
            cc_s: cc,
            cc_s_0: cc * m_s_0 / m_s,
            cc_s_l: cc * m_s_l / m_s,
        }
    }
}

impl SnowModel for BulkTransferModel {
    fn step(
        &self,
        state: &SnowState,
        site: &SiteProps,
        f_start: &ForcingRecord,
        f_end: &ForcingRecord,
        dt_s: f64,
        _first_step: bool,
        params: &ModelParams,
    ) -> PhysicsResult<StepOutcome> {
        f_start.validate()?;
        f_end.validate()?;

        // Sub-step midpoint for the continuous variables; precipitation is
        // this sub-step's share and is read from the start record.
        let f = f_start.lerp(f_end, 0.5);
        let m_snowfall = f.m_pp * f.percent_snow;
        let m_rain = f.m_pp - m_snowfall;

        // Snow-free ground with no snowfall: rain passes straight through.
        if state.m_s <= 0.0 && m_snowfall <= 0.0 {
            let fluxes = FluxTerms {
                ro_pred: m_rain,
                ..FluxTerms::default()
            };
            return Ok(StepOutcome {
                state: SnowState::bare_ground(),
                fluxes,
            });
        }

        let mut m_s = state.m_s;
        let mut z_s = state.z_s;
        let mut cc = state.cc_s;
        let mut h2o_total = state.h2o;
        let t_s_0 = if m_s > 0.0 { state.t_s_0 } else { FREEZE };

        // New snow joins the pack before the energy balance.
        if m_snowfall > 0.0 {
            m_s += m_snowfall;
            z_s += m_snowfall / f.rho_snow;
            cc += cold_content(m_snowfall, f.t_pp);
        }

        // Surface energy balance.
        let pressure = pressure_at(site.elevation);
        let rho_air = air_density(pressure, f.t_a);
        let ce = exchange_coeff(params.z_u, params.z_t, site.z_0);

        let r_n = net_radiation(f.s_n, f.i_lw, t_s_0);
        let h = sensible_heat(rho_air, ce, f.u, f.t_a, t_s_0);
        let l_v_e = latent_heat(rho_air, ce, f.u, f.e_a, t_s_0, pressure);
        let t_bottom = if state.layer_count == 2 {
            state.t_s_l
        } else {
            t_s_0
        };
        let g = ground_heat(f.t_g, t_bottom, params.z_g);
        let m_adv = advected_heat(m_rain, m_snowfall, f.t_pp, t_s_0, dt_s);

        let delta_q = r_n + h + l_v_e + g + m_adv;
        // With an isothermal cold-content pool the surface layer sees the
        // full soil exchange.
        let g_0 = g;
        let delta_q_0 = r_n + h + l_v_e + g_0 + m_adv;

        // Apply the net energy to the cold content; surplus melts.
        cc += delta_q * dt_s;
        let mut melt = 0.0;
        if cc > 0.0 {
            melt = (cc / LH_FUSION).min(m_s);
            cc = 0.0;
        }

        let rho_before = if z_s > 0.0 { m_s / z_s } else { RHO_ICE };
        m_s -= melt;

        // Sublimation or deposition, capped so the pack cannot go negative.
        let mut e_s = l_v_e / LH_SUBLIM * dt_s;
        if e_s < -m_s {
            e_s = -m_s;
        }
        m_s += e_s;

        // Liquid water budget: rain and melt enter, refreezing returns mass
        // to the ice phase while releasing heat.
        h2o_total += m_rain + melt;
        z_s -= (melt + (-e_s).max(0.0)) / rho_before;
        if cc < 0.0 && h2o_total > 0.0 {
            let freeze = (-cc / LH_FUSION).min(h2o_total);
            m_s += freeze;
            cc += freeze * LH_FUSION;
            h2o_total -= freeze;
        }
        z_s = z_s.max(0.0);

        let mut fluxes = FluxTerms {
            r_n,
            h,
            l_v_e,
            g,
            g_0,
            m: m_adv,
            delta_q,
            delta_q_0,
            e_s,
            melt,
            ro_pred: 0.0,
        };

        if m_s < 0.0 {
            return Err(PhysicsError::NonPhysical {
                what: "negative snowcover mass",
            });
        }
        let next = self.finalize(m_s, z_s, cc, h2o_total, params, &mut fluxes);

        for (what, value) in [
            ("specific mass", next.m_s),
            ("thickness", next.z_s),
            ("temperature", next.t_s),
            ("liquid water", next.h2o),
            ("runoff", fluxes.ro_pred),
        ] {
            if !value.is_finite() {
                return Err(PhysicsError::NonFinite { what, value });
            }
        }

        Ok(StepOutcome {
            state: next,
            fluxes,
        })
    }
}
