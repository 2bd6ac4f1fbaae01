//! sf-core: stable foundation for snowflow.
//!
//! Contains:
//! - consts (physical constants + unit conversions)
//! - tstep (the four-level adaptive timestep hierarchy)
//! - config (immutable run configuration)
//! - error (shared error types)

pub mod config;
pub mod consts;
pub mod error;
pub mod tstep;

// Re-exports: nice ergonomics for downstream crates
pub use config::{RunConfig, TimeSteps};
pub use consts::*;
pub use error::{ConfigError, CoreResult};
pub use tstep::{
    LevelInfo, MassThresholds, OutputFlags, OutputMode, TimestepLevel, TstepHierarchy,
};
