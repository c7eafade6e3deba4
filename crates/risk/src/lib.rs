//! Talos Risk
//!
//! Evaluates venue-specific risk formulas over an exposure snapshot:
//! - Collateral risk: lending-protocol LTV and health factor
//! - Margin risk: per-derivatives-venue margin ratio, worst venue governs
//! - Delta-drift risk: net delta relative to total deployed value
//!
//! The combined level is the maximum severity across the three dimensions.
//! Construction is fail-fast: every threshold key must be present before
//! any capital-affecting decision is made.

mod config;
mod liquidation;
mod monitor;

pub use config::{MarginThresholds, RiskMonitorConfig, RiskThresholds};
pub use liquidation::liquidation_distance;
pub use monitor::RiskMonitor;
