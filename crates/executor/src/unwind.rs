//! Position unwind paths
//!
//! Fast unwinds market-swap the position out immediately and pay for the
//! privilege (DEX fee plus slippage). Slow unwinds go through the
//! protocol's native withdrawal queue: no trading costs, but the proceeds
//! arrive after a configured delay. The caller picks the mode; nothing
//! here decides urgency.

use log::info;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use talos_core::Timestamp;
use talos_ports::{CostProvider, PipelineError, PipelineResult};

/// Which exit path to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindMode {
    /// Market swap out now, paying DEX fee and slippage
    Fast,
    /// Protocol-native withdrawal, free but queued
    Slow,
}

impl UnwindMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnwindMode::Fast => "fast",
            UnwindMode::Slow => "slow",
        }
    }
}

/// Cost parameters for the two unwind paths
#[derive(Debug, Clone)]
pub struct UnwindConfig {
    /// DEX fee as a fraction of amount (fast path)
    pub dex_fee_rate: Decimal,
    /// Slippage as a fraction of amount (fast path)
    pub slippage_rate: Decimal,
    /// Withdrawal queue delay in days (slow path)
    pub queue_delay_days: Decimal,
}

impl Default for UnwindConfig {
    fn default() -> Self {
        Self {
            dex_fee_rate: dec!(0.003),
            slippage_rate: dec!(0.001),
            queue_delay_days: dec!(7),
        }
    }
}

/// Simulated outcome of an unwind
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindResult {
    pub mode: UnwindMode,
    /// Position size handed in
    pub amount: Decimal,
    /// DEX fee charged, zero on the slow path
    pub fee_paid: Decimal,
    /// Slippage incurred, zero on the slow path
    pub slippage_cost: Decimal,
    /// What comes back after fee and slippage
    pub proceeds: Decimal,
    /// Days until proceeds land, zero on the fast path
    pub queue_delay_days: Decimal,
    /// Gas paid, native units
    pub gas_cost_native: Decimal,
}

/// Simulates unwinding a position via either exit path
pub struct UnwindSimulator {
    costs: Arc<dyn CostProvider>,
    config: UnwindConfig,
}

impl UnwindSimulator {
    pub fn new(costs: Arc<dyn CostProvider>, config: UnwindConfig) -> Self {
        Self { costs, config }
    }

    pub async fn unwind(
        &self,
        amount: Decimal,
        mode: UnwindMode,
        timestamp: Timestamp,
    ) -> PipelineResult<UnwindResult> {
        if amount <= Decimal::ZERO {
            return Err(PipelineError::Configuration(format!(
                "unwind amount must be positive, got {amount}"
            )));
        }

        let result = match mode {
            UnwindMode::Fast => {
                let fee_paid = amount * self.config.dex_fee_rate;
                let slippage_cost = amount * self.config.slippage_rate;
                let gas_cost_native = self.costs.gas_cost("swap", timestamp).await?;
                UnwindResult {
                    mode,
                    amount,
                    fee_paid,
                    slippage_cost,
                    proceeds: amount - fee_paid - slippage_cost,
                    queue_delay_days: Decimal::ZERO,
                    gas_cost_native,
                }
            }
            UnwindMode::Slow => {
                let gas_cost_native = self.costs.gas_cost("withdraw", timestamp).await?;
                UnwindResult {
                    mode,
                    amount,
                    fee_paid: Decimal::ZERO,
                    slippage_cost: Decimal::ZERO,
                    proceeds: amount,
                    queue_delay_days: self.config.queue_delay_days,
                    gas_cost_native,
                }
            }
        };

        info!(
            "[UNWIND] {} unwind of {}: proceeds {} after {} fee / {} slippage, {}d queue",
            result.mode.as_str(),
            result.amount,
            result.proceeds,
            result.fee_paid,
            result.slippage_cost,
            result.queue_delay_days
        );
        Ok(result)
    }
}
