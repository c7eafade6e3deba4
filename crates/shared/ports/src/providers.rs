use async_trait::async_trait;
use rust_decimal::Decimal;
use talos_core::{Marks, Position, Rate, Timestamp, Token, Venue};

use crate::error::PipelineResult;

/// Instrument classification as reported by the external registry
///
/// A closed enum: `Unknown` is its own case requiring explicit handling
/// (log and exclude), never implicitly treated as an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Asset,
    Debt,
    Derivative,
    Unknown,
}

/// Supplies current holdings per venue/instrument at a timestamp
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Capture all positions as of `timestamp`. The returned set is
    /// immutable for that timestamp and superseded by the next call.
    async fn snapshot(&self, timestamp: Timestamp) -> PipelineResult<Vec<Position>>;
}

/// Currency conversion and instrument classification
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Conversion rate from `token` into `target` at `timestamp`.
    ///
    /// A lookup miss must come back as `DataUnavailable`, never as a zero
    /// rate - callers distinguish "missing price" from "legitimately zero".
    async fn rate(&self, token: &Token, target: &Token, timestamp: Timestamp)
    -> PipelineResult<Rate>;

    /// Index and price marks for a token's underlying at `timestamp`:
    /// spot price in `share_class`, supply/borrow indexes, staking ratio,
    /// funding rate. Attribution P&L reads these stored fields from
    /// consecutive snapshots instead of re-deriving them from balances.
    async fn marks(
        &self,
        token: &Token,
        share_class: &Token,
        timestamp: Timestamp,
    ) -> PipelineResult<Marks>;

    /// Registry lookup for a position key's classification
    fn instrument_type(&self, venue: &Venue, token: &Token) -> InstrumentKind;
}

/// Gas/transaction cost estimation
#[async_trait]
pub trait CostProvider: Send + Sync {
    /// Cost of one venue operation in the chain's native token
    async fn gas_cost(&self, operation: &str, timestamp: Timestamp) -> PipelineResult<Decimal>;
}
