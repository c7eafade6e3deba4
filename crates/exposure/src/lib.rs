//! Talos Exposure
//!
//! Converts raw venue positions into a currency-normalized exposure view
//! and reduces that view into an equity (NAV) breakdown:
//! - `ExposureCalculator`: per-position exposure in the share-class
//!   currency plus a net-delta figure, with explicit exclusion of
//!   unpriceable or unclassifiable positions
//! - `EquityCalculator`: strictly assets minus debts, derivatives
//!   excluded by construction, fail-soft on internal errors

mod equity;
mod exposure;

pub use equity::EquityCalculator;
pub use exposure::ExposureCalculator;
