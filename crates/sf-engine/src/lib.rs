//! sf-engine: the adaptive multi-resolution run engine.
//!
//! Advances independent snowpack units through a forcing sequence one data
//! interval at a time. Each interval is covered by the [`StepController`],
//! which subdivides down the timestep ladder whenever a trial step moves
//! more mass than the level tolerates, and accumulates duration-weighted
//! fluxes so output averages are exact regardless of subdivision. The
//! [`RunDriver`] owns the per-unit state for the lifetime of a run, pulls
//! records from a [`ForcingSource`] (in-memory archive or blocking
//! real-time channels), and flushes snapshots to an [`OutputSink`].

pub mod controller;
pub mod driver;
pub mod error;
pub mod forcing;
pub mod store;

pub use controller::StepController;
pub use driver::{DriverState, MemorySink, NullSink, OutputSink, RunDriver, RunSummary};
pub use error::{EngineError, EngineResult};
pub use forcing::{
    ArchiveSource, ForcingSource, ForcingVariable, RealtimeHandles, RealtimeSource, VariableFrame,
};
pub use store::{EnergyBalance, FluxAccumulator, PixelSnapshot, PixelUnit, SnowProps, StateStore};
