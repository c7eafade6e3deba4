use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use talos_core::Token;

/// An out-of-band token balance (reward, airdrop) with its valuation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentalBalance {
    pub token: Token,
    pub amount: Decimal,
    /// Value in the share-class currency
    pub value: Decimal,
}

/// Market inputs the decision function consumes beyond the pipeline's own
/// exposure and risk views
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    /// Incidental token balances observed this step
    pub incidental_balances: Vec<IncidentalBalance>,
    /// Expected perp funding rate (per settlement), for basis trading
    pub expected_funding_rate: Decimal,
    /// Directional signal in [-1, 1], when a model supplies one
    pub signal: Option<Decimal>,
}
