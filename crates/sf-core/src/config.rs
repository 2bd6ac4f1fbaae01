//! Immutable run configuration.
//!
//! `RunConfig` is constructed once (deserialized from YAML by the CLI, or
//! built in code) and passed by reference to the run driver and step
//! controller. It is never mutated after construction.

use serde::Deserialize;

use crate::error::{ConfigError, CoreResult};
use crate::tstep::{MassThresholds, OutputMode, TstepHierarchy};

/// Step durations for the four ladder levels, in minutes.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TimeSteps {
    pub data_min: u32,
    pub normal_min: u32,
    pub medium_min: u32,
    pub small_min: u32,
}

impl Default for TimeSteps {
    fn default() -> Self {
        Self {
            data_min: 60,
            normal_min: 60,
            medium_min: 15,
            small_min: 1,
        }
    }
}

/// Options for a simulation run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Step durations (minutes).
    pub time_steps: TimeSteps,
    /// Mass-change thresholds forcing subdivision (kg/m^2).
    pub thresholds: MassThresholds,
    /// How often output records are written.
    pub output_mode: OutputMode,
    /// Output every N data timesteps (grid runs; point runs emit every step).
    pub output_frequency: u32,
    /// Snowcover's maximum liquid-water content as a volume ratio.
    pub max_h2o_vol: f64,
    /// Maximum thickness of the active (surface) layer (m).
    pub max_z_s_0: f64,
    /// Skip the physics call for snow-free pixels with no incoming mass.
    pub stop_no_snow: bool,
    /// Emit temperatures in Celsius (stored state is always Kelvin).
    pub temps_in_c: bool,
    /// Measurement heights are relative to the snow surface.
    pub relative_heights: bool,
    /// Wind measurement height (m).
    pub z_u: f64,
    /// Temperature/humidity measurement height (m).
    pub z_t: f64,
    /// Soil temperature measurement depth (m).
    pub z_g: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            time_steps: TimeSteps::default(),
            thresholds: MassThresholds::default(),
            output_mode: OutputMode::default(),
            output_frequency: 1,
            max_h2o_vol: 0.01,
            max_z_s_0: 0.25,
            stop_no_snow: true,
            temps_in_c: true,
            relative_heights: true,
            z_u: 5.0,
            z_t: 5.0,
            z_g: 0.5,
        }
    }
}

impl RunConfig {
    /// Validate the scalar options that the hierarchy build does not cover.
    pub fn validate(&self) -> CoreResult<()> {
        if self.output_frequency == 0 {
            return Err(ConfigError::BadOutputFrequency);
        }
        if !(self.max_h2o_vol.is_finite() && (0.0..=1.0).contains(&self.max_h2o_vol)) {
            return Err(ConfigError::BadFraction {
                what: "max_h2o_vol",
                value: self.max_h2o_vol,
            });
        }
        if !(self.max_z_s_0.is_finite() && self.max_z_s_0 > 0.0) {
            return Err(ConfigError::OutOfRange {
                what: "max_z_s_0",
                value: self.max_z_s_0,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    /// Validate everything and build the timestep ladder.
    pub fn build_hierarchy(&self) -> CoreResult<TstepHierarchy> {
        self.validate()?;
        TstepHierarchy::build(&self.time_steps, self.output_mode, &self.thresholds)
    }
}
