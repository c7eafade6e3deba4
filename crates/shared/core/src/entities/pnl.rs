use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance-based P&L: current portfolio value against the immutable
/// first-seen value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePnl {
    /// Portfolio value at the first step of the run; never overwritten
    pub initial_value: Decimal,
    pub current_value: Decimal,
    pub pnl_cumulative: Decimal,
    /// Cumulative P&L as a fraction of initial value
    pub pnl_pct: Decimal,
}

/// The six causal P&L components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributionComponents {
    /// Lending supply-index growth
    pub supply_pnl: Decimal,
    /// Staking-ratio growth
    pub staking_pnl: Decimal,
    /// Spot price change on net exposure
    pub price_change_pnl: Decimal,
    /// Borrow-index growth (reported as a positive cost)
    pub borrow_cost: Decimal,
    /// Perp funding settlements
    pub funding_pnl: Decimal,
    /// P&L from net-exposure drift
    pub delta_pnl: Decimal,
}

impl AttributionComponents {
    /// Net P&L across all components (borrow cost subtracts)
    pub fn total(&self) -> Decimal {
        self.supply_pnl + self.staking_pnl + self.price_change_pnl - self.borrow_cost
            + self.funding_pnl
            + self.delta_pnl
    }

    /// Accumulate another interval's components into this one
    pub fn accumulate(&mut self, other: &AttributionComponents) {
        self.supply_pnl += other.supply_pnl;
        self.staking_pnl += other.staking_pnl;
        self.price_change_pnl += other.price_change_pnl;
        self.borrow_cost += other.borrow_cost;
        self.funding_pnl += other.funding_pnl;
        self.delta_pnl += other.delta_pnl;
    }
}

/// Component-attribution P&L for the step and the run so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionPnl {
    /// This step's components
    pub step: AttributionComponents,
    /// This step's net attribution P&L
    pub pnl_step: Decimal,
    /// Monotonically accumulated components since run start
    pub cumulative: AttributionComponents,
    /// Net cumulative attribution P&L
    pub pnl_cumulative: Decimal,
}

/// Cross-check of the two independently derived P&L figures
///
/// A failed reconciliation is a diagnostic signal recorded for
/// investigation, never a halt condition - discrepancies typically stem
/// from intra-step compounding granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub balance_pnl: Decimal,
    pub attribution_pnl: Decimal,
    /// balance_pnl - attribution_pnl
    pub difference: Decimal,
    /// Absolute share-class amount the difference is allowed to reach
    pub tolerance: Decimal,
    pub passed: bool,
    /// |difference| as a fraction of initial capital, for consumers who
    /// think in percentage terms
    pub diff_pct_of_capital: Decimal,
}

/// Dual-method P&L result for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlResult {
    pub balance: BalancePnl,
    pub attribution: AttributionPnl,
    pub reconciliation: Reconciliation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_components_total_subtracts_borrow_cost() {
        let c = AttributionComponents {
            supply_pnl: dec!(10),
            staking_pnl: dec!(5),
            price_change_pnl: dec!(-3),
            borrow_cost: dec!(4),
            funding_pnl: dec!(1),
            delta_pnl: dec!(0.5),
        };
        assert_eq!(c.total(), dec!(9.5));
    }

    #[test]
    fn test_components_accumulate() {
        let mut total = AttributionComponents::default();
        let step = AttributionComponents {
            supply_pnl: dec!(1),
            borrow_cost: dec!(0.25),
            ..Default::default()
        };
        total.accumulate(&step);
        total.accumulate(&step);
        assert_eq!(total.supply_pnl, dec!(2));
        assert_eq!(total.borrow_cost, dec!(0.5));
        assert_eq!(total.total(), dec!(1.5));
    }
}
