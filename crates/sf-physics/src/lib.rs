//! sf-physics: the state-transition contract of the snowflow engine.
//!
//! The engine advances a snowpack through elementary sub-steps by calling a
//! [`SnowModel`] — the single point of contact with the physics. This crate
//! defines the data carried across that seam (forcing records, snowpack
//! state, flux terms, model parameters) and ships a compact reference
//! implementation, [`BulkTransferModel`], so the engine is runnable and
//! testable end to end.

pub mod bulk;
pub mod error;
pub mod forcing;
pub mod model;
pub mod state;

pub use bulk::BulkTransferModel;
pub use error::{PhysicsError, PhysicsResult};
pub use forcing::ForcingRecord;
pub use model::{ModelParams, SnowModel, StepOutcome};
pub use state::{FluxTerms, SiteProps, SnowState};
