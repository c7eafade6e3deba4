//! Leverage-loop simulation
//!
//! Entry and exit are modeled two ways:
//! - Atomic: one flash-borrow bundle, computed in closed form from target
//!   LTV and equity. All steps settle in a single transaction.
//! - Sequential: N stake/supply/borrow iterations. The series does not
//!   converge to a closed form once per-iteration gas is charged, so every
//!   iteration's amounts, gas and realized LTV are recorded individually.

use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;
use talos_core::{LeverageLoopResult, LoopMode, Timestamp, Token};
use talos_ports::{CostProvider, PipelineError, PipelineResult, PriceProvider};

use crate::series::{last_term, series_sum};

/// Tokens the loop operates in
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Chain-native token gas is paid in
    pub native_token: Token,
    /// Share-class currency results are reported in
    pub share_class: Token,
}

/// One iteration of a sequential loop, recorded for audit
#[derive(Debug, Clone, PartialEq)]
pub struct LoopIteration {
    /// 1-based iteration counter
    pub iteration: u32,
    /// Amount staked and supplied as collateral this iteration
    pub supplied: Decimal,
    /// Amount borrowed this iteration (seeds the next)
    pub borrowed: Decimal,
    /// Gas paid this iteration, native units
    pub gas_native: Decimal,
    /// Debt over collateral after this iteration settles
    pub ltv_after: Decimal,
}

/// Outcome of a sequential loop: realized aggregates plus the gas-free
/// closed-form projection for comparison
#[derive(Debug, Clone)]
pub struct SequentialLoopReport {
    pub result: LeverageLoopResult,
    pub iterations: Vec<LoopIteration>,
    /// Geometric series sum the loop would reach with zero gas
    pub projected_sum: Decimal,
    /// Final tranche under the zero-gas closed form
    pub projected_last_term: Decimal,
}

/// Simulates leverage-loop entry and exit with gas accounting
pub struct LoopSimulator {
    costs: Arc<dyn CostProvider>,
    prices: Arc<dyn PriceProvider>,
    config: LoopConfig,
}

impl LoopSimulator {
    pub fn new(
        costs: Arc<dyn CostProvider>,
        prices: Arc<dyn PriceProvider>,
        config: LoopConfig,
    ) -> Self {
        Self {
            costs,
            prices,
            config,
        }
    }

    /// Atomic entry: flash-borrow, stake, supply everything as collateral,
    /// borrow against it, repay the flash - one indivisible bundle.
    ///
    /// Closed form for target LTV `t` and equity `E`:
    /// `flash = E*t/(1-t)`, `collateral = E/(1-t)`, `debt = flash`,
    /// leverage `1/(1-t)`.
    pub async fn atomic_entry(
        &self,
        equity: Decimal,
        target_ltv: Decimal,
        timestamp: Timestamp,
    ) -> PipelineResult<LeverageLoopResult> {
        validate_ltv(target_ltv)?;
        if equity <= Decimal::ZERO {
            return Err(PipelineError::Configuration(
                "atomic entry requires positive equity".to_string(),
            ));
        }

        let one_minus = Decimal::ONE - target_ltv;
        let flash_amount = equity * target_ltv / one_minus;
        let collateral_supplied = equity / one_minus;
        let leverage_achieved = collateral_supplied / equity;

        let gas_cost_native = self
            .bundle_gas(
                &["flash_borrow", "stake", "supply", "borrow", "flash_repay"],
                timestamp,
            )
            .await?;
        let gas_cost_share_class = self.gas_in_share_class(gas_cost_native, timestamp).await?;

        info!(
            "[LOOP] Atomic entry: {equity} equity at LTV {target_ltv} -> {collateral_supplied} collateral, {leverage_achieved}x"
        );
        Ok(LeverageLoopResult {
            operation: "atomic_loop".to_string(),
            mode: LoopMode::Entry,
            flash_amount,
            collateral_supplied,
            debt_created: flash_amount,
            debt_repaid: Decimal::ZERO,
            leverage_achieved,
            gas_cost_native,
            gas_cost_share_class,
        })
    }

    /// Atomic exit: flash-repay the debt, withdraw collateral, unstake,
    /// settle the flash from the proceeds.
    pub async fn atomic_exit(
        &self,
        collateral: Decimal,
        debt: Decimal,
        timestamp: Timestamp,
    ) -> PipelineResult<LeverageLoopResult> {
        if collateral <= Decimal::ZERO || debt < Decimal::ZERO {
            return Err(PipelineError::Configuration(
                "atomic exit requires positive collateral and non-negative debt".to_string(),
            ));
        }

        let gas_cost_native = self
            .bundle_gas(
                &["flash_borrow", "repay", "withdraw", "unstake", "flash_repay"],
                timestamp,
            )
            .await?;
        let gas_cost_share_class = self.gas_in_share_class(gas_cost_native, timestamp).await?;

        Ok(LeverageLoopResult {
            operation: "atomic_loop".to_string(),
            mode: LoopMode::Exit,
            flash_amount: debt,
            collateral_supplied: collateral,
            debt_created: Decimal::ZERO,
            debt_repaid: debt,
            leverage_achieved: Decimal::ONE,
            gas_cost_native,
            gas_cost_share_class,
        })
    }

    /// Sequential entry: iterate stake -> supply -> borrow -> restake up
    /// to `max_iterations` times. Each tranche is the previous borrow less
    /// that iteration's gas, so the series undershoots the gas-free closed
    /// form - the report carries the closed-form projection (series sum
    /// and last term) next to the realized figures so callers can see the
    /// remaining withdrawal capacity before liquidation risk.
    pub async fn sequential_entry(
        &self,
        equity: Decimal,
        target_ltv: Decimal,
        max_iterations: u32,
        timestamp: Timestamp,
    ) -> PipelineResult<SequentialLoopReport> {
        validate_ltv(target_ltv)?;
        if equity <= Decimal::ZERO || max_iterations == 0 {
            return Err(PipelineError::Configuration(
                "sequential entry requires positive equity and at least one iteration".to_string(),
            ));
        }

        let gas_rate = self
            .prices
            .rate(&self.config.native_token, &self.config.share_class, timestamp)
            .await?;

        let mut iterations: Vec<LoopIteration> = Vec::with_capacity(max_iterations as usize);
        let mut tranche = equity;
        let mut collateral = Decimal::ZERO;
        let mut debt = Decimal::ZERO;
        let mut gas_total = Decimal::ZERO;

        for i in 1..=max_iterations {
            if tranche <= Decimal::ZERO {
                // Gas ate the whole tranche; looping further only burns money
                break;
            }
            let gas = self
                .bundle_gas(&["stake", "supply", "borrow"], timestamp)
                .await?;
            let borrowed = tranche * target_ltv;
            collateral += tranche;
            debt += borrowed;
            gas_total += gas;

            iterations.push(LoopIteration {
                iteration: i,
                supplied: tranche,
                borrowed,
                gas_native: gas,
                ltv_after: debt / collateral,
            });
            tranche = borrowed - gas * gas_rate;
        }

        let result = LeverageLoopResult {
            operation: "sequential_loop".to_string(),
            mode: LoopMode::Entry,
            flash_amount: Decimal::ZERO,
            collateral_supplied: collateral,
            debt_created: debt,
            debt_repaid: Decimal::ZERO,
            leverage_achieved: collateral / equity,
            gas_cost_native: gas_total,
            gas_cost_share_class: gas_total * gas_rate,
        };
        Ok(SequentialLoopReport {
            result,
            iterations,
            projected_sum: series_sum(equity, target_ltv, max_iterations),
            projected_last_term: last_term(equity, target_ltv, max_iterations),
        })
    }

    async fn bundle_gas(&self, operations: &[&str], timestamp: Timestamp) -> PipelineResult<Decimal> {
        let mut total = Decimal::ZERO;
        for op in operations {
            total += self.costs.gas_cost(op, timestamp).await?;
        }
        Ok(total)
    }

    async fn gas_in_share_class(
        &self,
        gas_native: Decimal,
        timestamp: Timestamp,
    ) -> PipelineResult<Decimal> {
        let rate = self
            .prices
            .rate(&self.config.native_token, &self.config.share_class, timestamp)
            .await?;
        Ok(gas_native * rate)
    }
}

fn validate_ltv(target_ltv: Decimal) -> PipelineResult<()> {
    if target_ltv <= Decimal::ZERO || target_ltv >= Decimal::ONE {
        return Err(PipelineError::Configuration(format!(
            "target_ltv must be in (0, 1), got {target_ltv}"
        )));
    }
    Ok(())
}
