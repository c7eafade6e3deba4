use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a leverage-loop execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    Entry,
    Exit,
}

/// Value object describing one atomic or sequential loop execution
///
/// Feeds back into the position book as realized deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageLoopResult {
    /// Operation label, e.g. "atomic_loop" or "sequential_loop"
    pub operation: String,
    pub mode: LoopMode,
    /// Flash-borrowed amount (zero for sequential loops)
    pub flash_amount: Decimal,
    /// Collateral supplied across the loop
    pub collateral_supplied: Decimal,
    /// Debt created (entry) in base units
    pub debt_created: Decimal,
    /// Debt repaid (exit) in base units
    pub debt_repaid: Decimal,
    /// Collateral / equity actually achieved
    pub leverage_achieved: Decimal,
    /// Total gas in the chain's native token
    pub gas_cost_native: Decimal,
    /// Total gas converted to the share-class currency
    pub gas_cost_share_class: Decimal,
}

impl LeverageLoopResult {
    /// Net collateral added after gas, in share-class terms
    pub fn net_collateral_change(&self) -> Decimal {
        match self.mode {
            LoopMode::Entry => self.collateral_supplied - self.gas_cost_share_class,
            LoopMode::Exit => -self.collateral_supplied - self.gas_cost_share_class,
        }
    }
}
