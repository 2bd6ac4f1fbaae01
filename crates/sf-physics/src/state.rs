//! Snowpack state and per-sub-step flux terms.

use serde::{Deserialize, Serialize};

use sf_core::consts::FREEZE;

/// Site-fixed properties of one simulation unit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SiteProps {
    /// Elevation (m).
    pub elevation: f64,
    /// Roughness length (m).
    pub z_0: f64,
    /// Active-pixel mask: masked-out units (false) keep their storage slot
    /// but are never passed to the state-transition function.
    pub mask: bool,
}

impl SiteProps {
    pub fn new(elevation: f64, z_0: f64) -> Self {
        Self {
            elevation,
            z_0,
            mask: true,
        }
    }
}

/// The two-layer snowpack state of one simulation unit.
///
/// Mutated only by the state-transition function, once per elementary
/// sub-step. Temperatures in Kelvin, masses in kg/m^2, thicknesses in m,
/// cold contents in J/m^2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowState {
    /// Number of active layers: 0, 1 or 2.
    pub layer_count: u32,
    /// Total snowcover thickness (m).
    pub z_s: f64,
    /// Surface (active) layer thickness (m).
    pub z_s_0: f64,
    /// Lower layer thickness (m).
    pub z_s_l: f64,
    /// Average snowcover density (kg/m^3).
    pub rho: f64,
    /// Specific mass of the snowcover (kg/m^2).
    pub m_s: f64,
    /// Surface layer specific mass (kg/m^2).
    pub m_s_0: f64,
    /// Lower layer specific mass (kg/m^2).
    pub m_s_l: f64,
    /// Liquid water held in the snowcover (kg/m^2).
    pub h2o: f64,
    /// Maximum liquid water the snowcover can hold (kg/m^2).
    pub h2o_max: f64,
    /// Liquid water as a volume ratio.
    pub h2o_vol: f64,
    /// Percent of liquid-water saturation.
    pub h2o_sat: f64,
    /// Total liquid water, held plus transient (kg/m^2).
    pub h2o_total: f64,
    /// Average snowcover temperature (K).
    pub t_s: f64,
    /// Surface layer temperature (K).
    pub t_s_0: f64,
    /// Lower layer temperature (K).
    pub t_s_l: f64,
    /// Snowcover cold content (J/m^2, <= 0).
    pub cc_s: f64,
    /// Surface layer cold content (J/m^2).
    pub cc_s_0: f64,
    /// Lower layer cold content (J/m^2).
    pub cc_s_l: f64,
}

impl SnowState {
    /// Build an initial state from measured snow properties, temperatures
    /// given in Celsius as the legacy initial-conditions files carry them.
    pub fn from_initial(z_s: f64, rho: f64, t_s_0_c: f64, t_s_c: f64, h2o_sat: f64) -> Self {
        let m_s = z_s * rho;
        let mut state = Self {
            z_s,
            z_s_0: z_s,
            rho,
            m_s,
            m_s_0: m_s,
            h2o_sat,
            t_s: t_s_c + FREEZE,
            t_s_0: t_s_0_c + FREEZE,
            t_s_l: t_s_c + FREEZE,
            ..Self::default()
        };
        state.layer_count = if m_s > 0.0 { 1 } else { 0 };
        if state.layer_count == 0 {
            state.t_s = FREEZE;
            state.t_s_0 = FREEZE;
            state.t_s_l = FREEZE;
        }
        state
    }

    /// A snow-free state at the melting point.
    pub fn bare_ground() -> Self {
        Self {
            t_s: FREEZE,
            t_s_0: FREEZE,
            t_s_l: FREEZE,
            ..Self::default()
        }
    }
}

/// Energy and mass exchanged during one elementary sub-step.
///
/// Energy terms are instantaneous rates (W/m^2); mass terms are totals for
/// the sub-step (kg/m^2).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxTerms {
    /// Net all-wave radiation (W/m^2).
    pub r_n: f64,
    /// Sensible heat transfer (W/m^2).
    pub h: f64,
    /// Latent heat exchange (W/m^2).
    pub l_v_e: f64,
    /// Snow/soil heat exchange (W/m^2).
    pub g: f64,
    /// Soil heat exchange into the surface layer (W/m^2).
    pub g_0: f64,
    /// Advected heat from precipitation (W/m^2).
    pub m: f64,
    /// Net energy balance of the snowcover (W/m^2).
    pub delta_q: f64,
    /// Net energy balance of the surface layer (W/m^2).
    pub delta_q_0: f64,
    /// Evaporation/sublimation mass, negative for loss (kg/m^2).
    pub e_s: f64,
    /// Snowmelt mass (kg/m^2).
    pub melt: f64,
    /// Predicted runoff / snow-water input, SWI (kg/m^2).
    pub ro_pred: f64,
}
