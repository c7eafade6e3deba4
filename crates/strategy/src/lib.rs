//! Talos Strategy
//!
//! Pure decision function: `(exposure, equity, risk, market data, mode)`
//! maps to an ordered set of instructions. Mode-specific policies are
//! tagged variants dispatched by pattern match - adding a mode cannot
//! silently break another through shared mutable base state.
//!
//! Two invariants every mode shares:
//! - Rebalancing is emitted only when a computed drift exceeds its
//!   threshold, never on every tick
//! - An incidental token balance strictly greater than the configured
//!   value triggers an unwrap-and-liquidate instruction (a balance exactly
//!   at the threshold does not)

mod manager;
mod market;
mod mode;

pub use manager::{StrategyConfig, StrategyManager};
pub use market::{IncidentalBalance, MarketData};
pub use mode::StrategyMode;
