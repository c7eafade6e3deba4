//! Talos Ports
//!
//! Port definitions (traits) for the Talos capital-deployment engine.
//! These define the boundaries between pipeline logic and the outside
//! world: position snapshots, prices, gas costs, event logging, and the
//! live execution venue.

mod clock;
mod error;
mod logger;
mod providers;
mod venue;

pub use clock::Clock;
pub use error::{PipelineError, PipelineResult};
pub use logger::EventLogger;
pub use providers::{CostProvider, InstrumentKind, PriceProvider, SnapshotProvider};
pub use venue::ExecutionVenue;
