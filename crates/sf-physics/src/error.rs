//! Error types for the state-transition function.

use thiserror::Error;

/// Fatal numerical failure reported by a snow model. The engine's
/// subdivision logic has already run by the time one of these escapes, so
/// they are never retried: the run aborts for the failing pixel.
#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
