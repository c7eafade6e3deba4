use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Token, Venue};

/// Classification of a held instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentClass {
    /// Plain token held in a wallet (e.g., ETH, USDC)
    BaseToken,
    /// Yield-bearing token whose value accrues through an index
    /// (e.g., an interest-bearing supply token or a staked derivative)
    YieldToken,
    /// Debt token representing a borrow against collateral
    DebtToken,
    /// Perpetual or dated derivative position
    Derivative,
}

impl InstrumentClass {
    /// Does this class contribute to equity as an asset?
    pub fn is_asset(&self) -> bool {
        matches!(self, InstrumentClass::BaseToken | InstrumentClass::YieldToken)
    }

    /// Does this class contribute to equity as a debt?
    pub fn is_debt(&self) -> bool {
        matches!(self, InstrumentClass::DebtToken)
    }

    /// Is this class excluded from equity entirely?
    pub fn is_derivative(&self) -> bool {
        matches!(self, InstrumentClass::Derivative)
    }
}

/// Key identifying a position within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub venue: Venue,
    pub token: Token,
}

/// A holding at one venue, captured at a snapshot timestamp
///
/// Immutable once captured: the next snapshot supersedes it rather than
/// mutating it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Venue holding the position
    pub venue: Venue,

    /// Instrument classification
    pub class: InstrumentClass,

    /// Token or instrument identifier
    pub token: Token,

    /// Signed amount in native units (negative = short derivative)
    pub amount: Decimal,

    /// Entry price, where the venue tracks one (derivatives)
    pub entry_price: Option<Decimal>,

    /// Supply/borrow index at open, where the venue tracks one
    pub index_at_open: Option<Decimal>,
}

impl Position {
    /// Create a spot/yield/debt position with no entry state
    pub fn new(venue: Venue, class: InstrumentClass, token: Token, amount: Decimal) -> Self {
        Self {
            venue,
            class,
            token,
            amount,
            entry_price: None,
            index_at_open: None,
        }
    }

    /// Create a derivative position with its entry price
    pub fn derivative(venue: Venue, token: Token, amount: Decimal, entry_price: Decimal) -> Self {
        Self {
            venue,
            class: InstrumentClass::Derivative,
            token,
            amount,
            entry_price: Some(entry_price),
            index_at_open: None,
        }
    }

    /// Key for this position within its snapshot
    pub fn key(&self) -> PositionKey {
        PositionKey {
            venue: self.venue.clone(),
            token: self.token.clone(),
        }
    }

    /// Zero-amount positions are skipped by every pipeline stage
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}
