//! Per-unit state storage and flux accumulation.

use serde::{Deserialize, Serialize};

use sf_core::consts::k_to_c;
use sf_physics::{FluxTerms, SiteProps, SnowState};

/// Duration-weighted running sums of the flux terms since the last output
/// emission. Energy terms are stored as J/m^2 so that dividing by
/// `time_since_out` recovers the true time-averaged rate no matter how the
/// interval was subdivided; mass terms are plain sums in kg/m^2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxAccumulator {
    pub r_n_sum: f64,
    pub h_sum: f64,
    pub l_v_e_sum: f64,
    pub g_sum: f64,
    pub g_0_sum: f64,
    pub m_sum: f64,
    pub delta_q_sum: f64,
    pub delta_q_0_sum: f64,
    pub e_s_sum: f64,
    pub melt_sum: f64,
    pub ro_pred_sum: f64,
    /// Seconds elapsed since the last reset; the averaging denominator.
    pub time_since_out: f64,
}

impl FluxAccumulator {
    /// Fold one accepted sub-step's fluxes in, weighted by its duration.
    pub fn record(&mut self, fluxes: &FluxTerms, dt_s: f64) {
        self.r_n_sum += fluxes.r_n * dt_s;
        self.h_sum += fluxes.h * dt_s;
        self.l_v_e_sum += fluxes.l_v_e * dt_s;
        self.g_sum += fluxes.g * dt_s;
        self.g_0_sum += fluxes.g_0 * dt_s;
        self.m_sum += fluxes.m * dt_s;
        self.delta_q_sum += fluxes.delta_q * dt_s;
        self.delta_q_0_sum += fluxes.delta_q_0 * dt_s;
        self.e_s_sum += fluxes.e_s;
        self.melt_sum += fluxes.melt;
        self.ro_pred_sum += fluxes.ro_pred;
        self.time_since_out += dt_s;
    }

    /// Advance time without any fluxes (skipped snow-free unit).
    pub fn advance_idle(&mut self, dt_s: f64) {
        self.time_since_out += dt_s;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.time_since_out > 0.0 {
            sum / self.time_since_out
        } else {
            0.0
        }
    }

    pub fn r_n_bar(&self) -> f64 {
        self.mean(self.r_n_sum)
    }

    pub fn h_bar(&self) -> f64 {
        self.mean(self.h_sum)
    }

    pub fn l_v_e_bar(&self) -> f64 {
        self.mean(self.l_v_e_sum)
    }

    pub fn g_bar(&self) -> f64 {
        self.mean(self.g_sum)
    }

    pub fn g_0_bar(&self) -> f64 {
        self.mean(self.g_0_sum)
    }

    pub fn m_bar(&self) -> f64 {
        self.mean(self.m_sum)
    }

    pub fn delta_q_bar(&self) -> f64 {
        self.mean(self.delta_q_sum)
    }

    pub fn delta_q_0_bar(&self) -> f64 {
        self.mean(self.delta_q_0_sum)
    }
}

/// One simulation unit: a grid pixel, or the single unit of a point run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PixelUnit {
    pub site: SiteProps,
    pub snow: SnowState,
    pub accum: FluxAccumulator,
    /// Seconds of simulated time since the start of the run.
    pub current_time: f64,
    /// Set when subdivision bottomed out at the floor level with the mass
    /// change still over threshold. Soft non-convergence, never fatal.
    pub ran_at_floor: bool,
}

impl PixelUnit {
    pub fn new(site: SiteProps, snow: SnowState) -> Self {
        Self {
            site,
            snow,
            accum: FluxAccumulator::default(),
            current_time: 0.0,
            ran_at_floor: false,
        }
    }
}

/// Energy-balance outputs of one unit at an emission: time-averaged rates
/// in W/m^2, mass sums in kg/m^2, cold contents in J/m^2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBalance {
    pub r_n_bar: f64,
    pub h_bar: f64,
    pub l_v_e_bar: f64,
    pub g_bar: f64,
    pub g_0_bar: f64,
    pub m_bar: f64,
    pub delta_q_bar: f64,
    pub delta_q_0_bar: f64,
    pub e_s_sum: f64,
    pub melt_sum: f64,
    pub ro_pred_sum: f64,
    pub cc_s_0: f64,
    pub cc_s_l: f64,
    pub cc_s: f64,
}

/// Snow-property outputs of one unit at an emission. Temperatures carry
/// the unit the run was configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowProps {
    pub z_s: f64,
    pub z_s_0: f64,
    pub z_s_l: f64,
    pub rho: f64,
    pub m_s: f64,
    pub m_s_0: f64,
    pub m_s_l: f64,
    pub h2o: f64,
    pub t_s_0: f64,
    pub t_s_l: f64,
    pub t_s: f64,
    pub h2o_sat: f64,
}

/// Everything the output sink sees for one unit at one emission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelSnapshot {
    pub em: EnergyBalance,
    pub snow: SnowProps,
    /// Seconds of simulated time since the start of the run.
    pub current_time: f64,
}

impl PixelSnapshot {
    /// Capture a unit's state and accumulated fluxes. `temps_in_c`
    /// converts the reported temperatures from Kelvin to Celsius.
    pub fn capture(unit: &PixelUnit, temps_in_c: bool) -> Self {
        let t = |k: f64| if temps_in_c { k_to_c(k) } else { k };
        let a = &unit.accum;
        let s = &unit.snow;
        Self {
            em: EnergyBalance {
                r_n_bar: a.r_n_bar(),
                h_bar: a.h_bar(),
                l_v_e_bar: a.l_v_e_bar(),
                g_bar: a.g_bar(),
                g_0_bar: a.g_0_bar(),
                m_bar: a.m_bar(),
                delta_q_bar: a.delta_q_bar(),
                delta_q_0_bar: a.delta_q_0_bar(),
                e_s_sum: a.e_s_sum,
                melt_sum: a.melt_sum,
                ro_pred_sum: a.ro_pred_sum,
                cc_s_0: s.cc_s_0,
                cc_s_l: s.cc_s_l,
                cc_s: s.cc_s,
            },
            snow: SnowProps {
                z_s: s.z_s,
                z_s_0: s.z_s_0,
                z_s_l: s.z_s_l,
                rho: s.rho,
                m_s: s.m_s,
                m_s_0: s.m_s_0,
                m_s_l: s.m_s_l,
                h2o: s.h2o,
                t_s_0: t(s.t_s_0),
                t_s_l: t(s.t_s_l),
                t_s: t(s.t_s),
                h2o_sat: s.h2o_sat,
            },
            current_time: unit.current_time,
        }
    }
}

/// All units of a run. Units are independent; the driver may advance
/// disjoint slices of them on different threads without locking.
#[derive(Clone, Debug, Default)]
pub struct StateStore {
    pub units: Vec<PixelUnit>,
}

impl StateStore {
    pub fn new(units: Vec<PixelUnit>) -> Self {
        Self { units }
    }

    /// A point run has exactly one unit.
    pub fn is_point(&self) -> bool {
        self.units.len() == 1
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn snapshots(&self, temps_in_c: bool) -> Vec<PixelSnapshot> {
        self.units
            .iter()
            .map(|u| PixelSnapshot::capture(u, temps_in_c))
            .collect()
    }

    /// Zero every accumulator. Called immediately after each emission.
    pub fn reset_accumulators(&mut self) {
        for unit in &mut self.units {
            unit.accum.reset();
        }
    }

    /// Units that bottomed out at the floor level at least once.
    pub fn floor_units(&self) -> usize {
        self.units.iter().filter(|u| u.ran_at_floor).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::consts::FREEZE;

    fn flux(r_n: f64) -> FluxTerms {
        FluxTerms {
            r_n,
            melt: 0.5,
            ..FluxTerms::default()
        }
    }

    #[test]
    fn averages_are_duration_weighted() {
        let mut a = FluxAccumulator::default();
        a.record(&flux(100.0), 900.0);
        a.record(&flux(200.0), 2700.0);
        // (100*900 + 200*2700) / 3600 = 175
        assert!((a.r_n_bar() - 175.0).abs() < 1e-12);
        assert_eq!(a.time_since_out, 3600.0);
        assert_eq!(a.melt_sum, 1.0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut a = FluxAccumulator::default();
        a.record(&flux(50.0), 60.0);
        a.reset();
        assert_eq!(a, FluxAccumulator::default());
        assert_eq!(a.r_n_bar(), 0.0);
    }

    #[test]
    fn idle_advance_only_moves_time() {
        let mut a = FluxAccumulator::default();
        a.advance_idle(3600.0);
        assert_eq!(a.time_since_out, 3600.0);
        assert_eq!(a.r_n_bar(), 0.0);
        assert_eq!(a.ro_pred_sum, 0.0);
    }

    #[test]
    fn snapshot_converts_temperatures() {
        let site = SiteProps::new(2000.0, 0.005);
        let snow = SnowState::from_initial(1.0, 300.0, -4.0, -2.0, 0.0);
        let unit = PixelUnit::new(site, snow);
        let c = PixelSnapshot::capture(&unit, true);
        let k = PixelSnapshot::capture(&unit, false);
        assert!((c.snow.t_s_0 - (-4.0)).abs() < 1e-9);
        assert!((k.snow.t_s_0 - (FREEZE - 4.0)).abs() < 1e-9);
    }
}
