//! Exposure Calculator
//!
//! Pure function of a position set plus the price/registry ports: no side
//! effects, nothing cached between steps. Positions that cannot be priced
//! or classified are excluded from the totals and flagged - never silently
//! included and never treated as zero.

use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use talos_core::{
    ExcludedPosition, ExclusionReason, ExposureEntry, ExposureSnapshot, InstrumentClass, Marks,
    Position, Timestamp, Token,
};
use talos_ports::{InstrumentKind, PipelineError, PipelineResult, PriceProvider};

/// Stable tokens within this band of one share-class unit are treated as
/// cash-like and skipped in the net-delta aggregation
const CASH_BAND: Decimal = dec!(0.01);

/// Converts positions to share-class exposures and a net-delta figure
pub struct ExposureCalculator {
    prices: Arc<dyn PriceProvider>,
}

impl ExposureCalculator {
    pub fn new(prices: Arc<dyn PriceProvider>) -> Self {
        Self { prices }
    }

    /// Compute the exposure view of `positions` at `timestamp`.
    ///
    /// A missing price excludes the position and flags it `MissingPrice`;
    /// an unclassifiable token is flagged `UnknownClass`. Any other
    /// provider error propagates.
    pub async fn compute(
        &self,
        positions: &[Position],
        share_class: &Token,
        timestamp: Timestamp,
    ) -> PipelineResult<ExposureSnapshot> {
        let mut entries: Vec<ExposureEntry> = Vec::new();
        let mut excluded: Vec<ExcludedPosition> = Vec::new();

        for pos in positions.iter().filter(|p| !p.is_zero()) {
            match self.prices.instrument_type(&pos.venue, &pos.token) {
                InstrumentKind::Unknown => {
                    warn!(
                        "[EXPOSURE] Unknown classification for {}/{} - excluded from totals",
                        pos.venue, pos.token
                    );
                    excluded.push(ExcludedPosition {
                        venue: pos.venue.clone(),
                        token: pos.token.clone(),
                        reason: ExclusionReason::UnknownClass,
                    });
                    continue;
                }
                InstrumentKind::Asset | InstrumentKind::Debt | InstrumentKind::Derivative => {}
            }

            let marks = match self.prices.marks(&pos.token, share_class, timestamp).await {
                Ok(marks) => marks,
                Err(PipelineError::DataUnavailable(msg)) => {
                    warn!(
                        "[EXPOSURE] Missing price for {}/{}: {} - excluded and flagged",
                        pos.venue, pos.token, msg
                    );
                    excluded.push(ExcludedPosition {
                        venue: pos.venue.clone(),
                        token: pos.token.clone(),
                        reason: ExclusionReason::MissingPrice,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let exposure_base = pos.amount * underlying_factor(pos.class, &marks);
            let conversion_rate = marks.spot_price;
            entries.push(ExposureEntry {
                venue: pos.venue.clone(),
                token: pos.token.clone(),
                class: pos.class,
                native_amount: pos.amount,
                exposure_base,
                exposure_share_class: exposure_base * conversion_rate,
                conversion_rate,
                marks,
            });
        }

        let net_delta = entries
            .iter()
            .filter(|e| !is_cash_like(&e.token, share_class, &e.marks))
            .map(delta_contribution)
            .sum();
        let total_value = entries
            .iter()
            .map(|e| e.exposure_share_class.abs())
            .sum();

        Ok(ExposureSnapshot {
            timestamp,
            share_class: share_class.clone(),
            entries,
            excluded,
            net_delta,
            total_value,
        })
    }
}

/// Native amount -> underlying base units, per instrument class
fn underlying_factor(class: InstrumentClass, marks: &Marks) -> Decimal {
    match class {
        InstrumentClass::BaseToken | InstrumentClass::Derivative => Decimal::ONE,
        InstrumentClass::YieldToken => marks.supply_index * marks.staking_ratio,
        InstrumentClass::DebtToken => marks.borrow_index,
    }
}

/// Signed share-class contribution of an entry to the net delta
fn delta_contribution(entry: &ExposureEntry) -> Decimal {
    match entry.class {
        InstrumentClass::BaseToken | InstrumentClass::YieldToken => entry.exposure_share_class,
        // Debt is owed underlying: a short, whatever sign the venue reports
        InstrumentClass::DebtToken => -entry.exposure_share_class.abs(),
        // Derivative exposure is already signed by the position amount
        InstrumentClass::Derivative => entry.exposure_share_class,
    }
}

/// Share-class itself, or a token pegged within `CASH_BAND` of one unit
fn is_cash_like(token: &Token, share_class: &Token, marks: &Marks) -> bool {
    token == share_class || (marks.spot_price - Decimal::ONE).abs() <= CASH_BAND
}
