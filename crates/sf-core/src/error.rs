use thiserror::Error;

pub type CoreResult<T> = Result<T, ConfigError>;

/// Errors raised while validating the timestep hierarchy or run
/// configuration. All of these are fatal at startup and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{what} ({value}) out of range: {min} to {max}")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("data timestep > 60 min must be a multiple of 60 min (whole hours), got {minutes}")]
    NotWholeHours { minutes: u32 },

    #[error("{parent} timestep ({parent_min} min) is not an integer multiple of the {child} timestep ({child_min} min)")]
    NonIntegralSubdivision {
        parent: &'static str,
        parent_min: u32,
        child: &'static str,
        child_min: u32,
    },

    #[error("timestep duration must be positive: {what}")]
    ZeroDuration { what: &'static str },

    #[error("output frequency must be at least 1 data timestep")]
    BadOutputFrequency,

    #[error("mass threshold for {level} must be positive and finite, got {value}")]
    BadThreshold { level: &'static str, value: f64 },

    #[error("{what} must be a finite fraction in [0, 1], got {value}")]
    BadFraction { what: &'static str, value: f64 },
}
