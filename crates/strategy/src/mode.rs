use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strategy mode, each variant carrying its own decision parameters
///
/// Dispatch is by pattern match in the manager; variants share no state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyMode {
    /// Supply collateral and borrow against it, no staking leg
    PureLending {
        /// LTV the position is steered toward
        target_ltv: Decimal,
        /// Rebalance only when |ltv - target| exceeds this
        ltv_drift_threshold: Decimal,
    },
    /// Stake idle base-token balances, never borrow
    StakingOnly {
        /// Ignore idle balances worth less than this (gas would dominate)
        min_idle_value: Decimal,
    },
    /// Leverage-looped staking: stake, supply, borrow, restake
    LeveragedStaking {
        target_ltv: Decimal,
        ltv_drift_threshold: Decimal,
    },
    /// Delta-neutral basis: long staked spot, short perp, collect funding
    BasisTrading {
        /// Re-hedge only when the drift ratio exceeds this
        delta_drift_threshold: Decimal,
        /// Enter only when expected funding clears this rate
        min_funding_rate: Decimal,
        /// Fraction of equity held back as perp margin instead of staked
        margin_reserve: Decimal,
    },
    /// Signal-directed positioning from an external model
    MlDirectional {
        /// Absolute signal value required to act
        entry_threshold: Decimal,
    },
}

impl StrategyMode {
    /// Modes that can carry debt and therefore need an emergency unwind
    pub fn is_leveraged(&self) -> bool {
        matches!(
            self,
            StrategyMode::PureLending { .. }
                | StrategyMode::LeveragedStaking { .. }
                | StrategyMode::BasisTrading { .. }
        )
    }

    /// Short label for logging
    pub fn name(&self) -> &'static str {
        match self {
            StrategyMode::PureLending { .. } => "pure_lending",
            StrategyMode::StakingOnly { .. } => "staking_only",
            StrategyMode::LeveragedStaking { .. } => "leveraged_staking",
            StrategyMode::BasisTrading { .. } => "basis_trading",
            StrategyMode::MlDirectional { .. } => "ml_directional",
        }
    }
}
