use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::entities::position::InstrumentClass;
use crate::values::{Timestamp, Token, Venue};

/// Relative tolerance for the share-class/base-unit consistency check
const CONSISTENCY_EPS: Decimal = dec!(0.000001);

/// Index and price fields captured per token at snapshot time
///
/// P&L attribution reads these stored fields from consecutive snapshots
/// rather than re-deriving them from raw balances, so precision errors
/// cannot compound silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marks {
    /// Spot price in the share-class currency
    pub spot_price: Decimal,
    /// Lending-supply index (monotone, starts at 1)
    pub supply_index: Decimal,
    /// Borrow index (monotone, starts at 1)
    pub borrow_index: Decimal,
    /// Staking exchange ratio (underlying per staked unit)
    pub staking_ratio: Decimal,
    /// Current funding rate for derivative instruments
    pub funding_rate: Decimal,
}

impl Marks {
    /// Marks for a token with no accruing indexes
    pub fn flat(spot_price: Decimal) -> Self {
        Self {
            spot_price,
            supply_index: Decimal::ONE,
            borrow_index: Decimal::ONE,
            staking_ratio: Decimal::ONE,
            funding_rate: Decimal::ZERO,
        }
    }
}

/// Why a position was left out of the exposure totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// No conversion rate was available - distinct from a zero value
    MissingPrice,
    /// Instrument registry could not classify the token
    UnknownClass,
}

/// A position excluded from the current step's totals, with its reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedPosition {
    pub venue: Venue,
    pub token: Token,
    pub reason: ExclusionReason,
}

/// Per-position exposure in base units and share-class currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureEntry {
    pub venue: Venue,
    pub token: Token,
    pub class: InstrumentClass,

    /// Native token amount (signed)
    pub native_amount: Decimal,

    /// Exposure in base units of the underlying asset
    pub exposure_base: Decimal,

    /// Exposure converted to the share-class currency
    pub exposure_share_class: Decimal,

    /// Conversion rate used for the share-class figure
    pub conversion_rate: Decimal,

    /// Index/price fields at snapshot time
    pub marks: Marks,
}

impl ExposureEntry {
    /// Check `exposure_share_class == exposure_base * conversion_rate`
    /// within relative tolerance.
    pub fn is_consistent(&self) -> bool {
        let expected = self.exposure_base * self.conversion_rate;
        let diff = (self.exposure_share_class - expected).abs();
        let scale = expected.abs().max(Decimal::ONE);
        diff / scale <= CONSISTENCY_EPS
    }
}

/// Exposure view of a position snapshot, derived fresh each step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    /// Snapshot timestamp
    pub timestamp: Timestamp,

    /// Share-class currency all figures are reported in
    pub share_class: Token,

    /// Per-position exposures
    pub entries: Vec<ExposureEntry>,

    /// Positions excluded this step, flagged with a reason
    pub excluded: Vec<ExcludedPosition>,

    /// Net exposure to non-cash underlying assets, in share-class currency:
    /// assets plus signed derivatives minus debts (cash-like tokens ignored)
    pub net_delta: Decimal,

    /// Total absolute value in share-class currency (assets + |debts|)
    pub total_value: Decimal,
}

impl ExposureSnapshot {
    /// Entry lookup by position key
    pub fn entry(&self, venue: &Venue, token: &Token) -> Option<&ExposureEntry> {
        self.entries
            .iter()
            .find(|e| &e.venue == venue && &e.token == token)
    }

    /// All derivative entries
    pub fn derivatives(&self) -> impl Iterator<Item = &ExposureEntry> {
        self.entries.iter().filter(|e| e.class.is_derivative())
    }

    /// Venues that carry at least one derivative entry
    pub fn derivative_venues(&self) -> Vec<Venue> {
        let mut venues: Vec<Venue> = Vec::new();
        for e in self.derivatives() {
            if !venues.contains(&e.venue) {
                venues.push(e.venue.clone());
            }
        }
        venues
    }

    /// Share-class equity parked at a venue (assets minus debts, derivatives
    /// excluded) - the margin backing that venue's derivative book.
    pub fn equity_at_venue(&self, venue: &Venue) -> Decimal {
        self.entries
            .iter()
            .filter(|e| &e.venue == venue)
            .map(|e| match e.class {
                InstrumentClass::BaseToken | InstrumentClass::YieldToken => e.exposure_share_class,
                InstrumentClass::DebtToken => -e.exposure_share_class.abs(),
                InstrumentClass::Derivative => Decimal::ZERO,
            })
            .sum()
    }

    /// Gross derivative notional at a venue in share-class currency
    pub fn notional_at_venue(&self, venue: &Venue) -> Decimal {
        self.entries
            .iter()
            .filter(|e| &e.venue == venue && e.class.is_derivative())
            .map(|e| e.exposure_share_class.abs())
            .sum()
    }
}
