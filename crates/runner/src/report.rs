//! Run report
//!
//! Aggregated outcome of one engine run. Reconciliation mismatches and
//! data-unavailable events are collected here as diagnostics; only a
//! fatal pipeline error makes the run unsuccessful.

use rust_decimal::Decimal;
use talos_core::Timestamp;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub correlation_id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    /// Steps that produced a logged record
    pub steps_completed: u64,
    /// Equity at the last completed step, share-class currency
    pub final_equity: Decimal,
    /// Balance-based cumulative P&L at the last completed step
    pub cumulative_pnl: Decimal,
    /// Step orders whose dual-method P&L reconciliation failed
    pub reconciliation_failures: Vec<u64>,
    /// Collaborator data gaps encountered, one message each
    pub data_unavailable: Vec<String>,
    /// Run was cancelled between steps
    pub cancelled: bool,
    /// Fatal error that aborted the run, if any
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn new(correlation_id: Uuid, started_at: Timestamp) -> Self {
        Self {
            correlation_id,
            started_at,
            finished_at: None,
            steps_completed: 0,
            final_equity: Decimal::ZERO,
            cumulative_pnl: Decimal::ZERO,
            reconciliation_failures: Vec::new(),
            data_unavailable: Vec::new(),
            cancelled: false,
            fatal: None,
        }
    }

    /// A run succeeds unless a fatal error aborted it; diagnostics do
    /// not change the verdict.
    pub fn succeeded(&self) -> bool {
        self.fatal.is_none()
    }

    /// Completed, but with diagnostics a reviewer should look at
    pub fn degraded(&self) -> bool {
        !self.reconciliation_failures.is_empty() || !self.data_unavailable.is_empty()
    }
}
