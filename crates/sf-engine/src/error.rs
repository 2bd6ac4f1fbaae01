//! Error types for the run engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use sf_core::ConfigError;
use sf_physics::PhysicsError;

/// Errors that abort a run. Subdivision inside the step controller is the
/// sole retry mechanism; anything that escapes it is fatal.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No forcing available for {timestamp}")]
    ForcingUnavailable { timestamp: DateTime<Utc> },

    #[error("Forcing frame at {timestamp} covers {found} units, run has {expected}")]
    FrameMismatch {
        timestamp: DateTime<Utc>,
        expected: usize,
        found: usize,
    },

    #[error("Forcing source exhausted before {timestamp}")]
    SourceExhausted { timestamp: DateTime<Utc> },

    #[error("Step failed at {timestamp} for unit {unit}: {source}")]
    StepFailed {
        timestamp: DateTime<Utc>,
        unit: usize,
        source: PhysicsError,
    },

    #[error("Output sink error: {message}")]
    Sink { message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
