//! sf-results: output writers and run storage.
//!
//! Two sinks for the engine's snapshots: a flat CSV writer for point runs
//! and a directory-backed store for grid runs (a manifest plus an
//! append-only timeseries), with a load-back API for downstream analysis.

pub mod grid;
pub mod point;
pub mod types;

pub use grid::GridStore;
pub use point::PointWriter;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },
}

impl From<ResultsError> for sf_engine::EngineError {
    fn from(e: ResultsError) -> Self {
        sf_engine::EngineError::Sink {
            message: e.to_string(),
        }
    }
}
