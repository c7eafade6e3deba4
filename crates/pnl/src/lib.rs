//! Talos P&L
//!
//! Computes profit/loss two independent ways each step and reconciles them:
//! - Balance-based: current equity against the immutable first-seen value
//! - Attribution: six causal components (supply yield, staking yield, spot
//!   price change, borrow cost, funding, delta P&L) modeled from the
//!   previous and current exposure snapshots' stored marks
//!
//! A reconciliation mismatch is a diagnostic signal, never a halt.

mod calculator;

pub use calculator::{PnlCalculator, PnlConfig};
