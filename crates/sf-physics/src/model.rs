//! The state-transition seam between the engine and the physics.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsResult;
use crate::forcing::ForcingRecord;
use crate::state::{FluxTerms, SiteProps, SnowState};

/// Run-wide tuning knobs handed to the model on every call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum liquid water content as a volume ratio.
    pub max_h2o_vol: f64,
    /// Maximum active (surface) layer thickness (m).
    pub max_z_s_0: f64,
    /// Measurement heights are relative to the snow surface when true,
    /// absolute above ground when false.
    pub relative_heights: bool,
    /// Wind measurement height (m).
    pub z_u: f64,
    /// Air temperature and vapor pressure measurement height (m).
    pub z_t: f64,
    /// Soil temperature measurement depth (m).
    pub z_g: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            max_h2o_vol: 0.01,
            max_z_s_0: 0.25,
            relative_heights: true,
            z_u: 5.0,
            z_t: 5.0,
            z_g: 0.5,
        }
    }
}

/// What one elementary sub-step produced: the state after the step and the
/// fluxes exchanged during it.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOutcome {
    pub state: SnowState,
    pub fluxes: FluxTerms,
}

/// A snowpack state-transition function.
///
/// `step` must be deterministic and free of interior mutability: the same
/// inputs always produce the same outcome, and a single model value may be
/// shared across threads advancing different simulation units.
///
/// `f_start` and `f_end` bracket the sub-step. The continuous variables of
/// both records have already been interpolated to the sub-step's endpoints;
/// the precipitation fields of both carry this sub-step's duration share of
/// the interval total (identical on both records, read from `f_start`).
///
/// `first_step` is true only for the very first sub-step of the run, when
/// a model may need to finish initializing quantities that depend on the
/// first forcing record.
pub trait SnowModel: Send + Sync {
    fn step(
        &self,
        state: &SnowState,
        site: &SiteProps,
        f_start: &ForcingRecord,
        f_end: &ForcingRecord,
        dt_s: f64,
        first_step: bool,
        params: &ModelParams,
    ) -> PhysicsResult<StepOutcome>;
}
