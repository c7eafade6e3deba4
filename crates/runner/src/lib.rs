//! Talos Runner - Engine Loop & Simulated Collaborators
//!
//! Orchestrates the full capital-deployment pipeline:
//!
//! - **Engine**: steps the pipeline at a configured simulated interval
//! - **Sim**: in-process collaborators behind the ports (position book,
//!   deterministic prices, flat gas, recording logger, venues)
//! - **Report**: aggregated run outcome with degradation diagnostics
//!
//! ## Architecture
//!
//! ```text
//!              ┌───────────────────────────────────────────┐
//!              │                  ENGINE                   │
//!              │                                           │
//!              │  snapshot → exposure → equity → risk →    │
//!              │  P&L → strategy → execute → feedback →    │
//!              │  step record                              │
//!              └───┬─────────┬─────────┬─────────┬─────────┘
//!                  │         │         │         │
//!                  ▼         ▼         ▼         ▼
//!            ┌─────────┐ ┌───────┐ ┌───────┐ ┌─────────┐
//!            │Position │ │ Price │ │  Gas  │ │  Event  │
//!            │  Book   │ │ Marks │ │ Costs │ │ Logger  │
//!            └─────────┘ └───────┘ └───────┘ └─────────┘
//! ```
//!
//! Each engine instance drives exactly one run; independent runs share no
//! mutable state.

pub mod engine;
pub mod report;
pub mod sim;

// Re-export main types
pub use engine::{Engine, EnginePorts, RunConfig, VenueProfile};
pub use report::RunReport;
pub use sim::{
    FlatGasProvider, PositionSink, RecordingLogger, SimPositionBook, SimPriceProvider,
    SimVenue, SteppedClock, SystemClock, TokenProfile,
};
