use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Timestamp, Token, Venue};

/// A position with its share-class valuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedPosition {
    pub venue: Venue,
    pub token: Token,
    /// Native amount
    pub amount: Decimal,
    /// Absolute value in share-class currency
    pub value: Decimal,
}

/// Net asset value decomposition at a timestamp
///
/// Invariant: `total_equity == total_assets - total_debts`. Derivatives are
/// tracked separately and never netted into equity - only capital actually
/// at risk as collateral or debt counts toward NAV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityBreakdown {
    /// Valuation timestamp
    pub timestamp: Timestamp,
    /// Assets minus debts in share-class currency
    pub total_equity: Decimal,
    /// Sum of asset position values
    pub total_assets: Decimal,
    /// Sum of debt position values (positive magnitude)
    pub total_debts: Decimal,
    /// Itemized asset positions
    pub asset_positions: Vec<ValuedPosition>,
    /// Itemized debt positions
    pub debt_positions: Vec<ValuedPosition>,
    /// Derivative positions excluded from equity by construction
    pub excluded_derivatives: Vec<ValuedPosition>,
}

impl EquityBreakdown {
    /// Zero-valued breakdown, used by the fail-soft path
    pub fn zeroed(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            total_equity: Decimal::ZERO,
            total_assets: Decimal::ZERO,
            total_debts: Decimal::ZERO,
            asset_positions: Vec::new(),
            debt_positions: Vec::new(),
            excluded_derivatives: Vec::new(),
        }
    }

    /// Does the assets-minus-debts invariant hold exactly?
    pub fn invariant_holds(&self) -> bool {
        self.total_equity == self.total_assets - self.total_debts
    }
}
