//! Strategy Manager
//!
//! Stateless: every decision is a function of this step's inputs. The
//! manager never remembers what it emitted - instructions are consumed
//! once by the execution layer and discarded.

use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use talos_core::{
    Action, EquityBreakdown, ExposureSnapshot, Instruction, InstructionKind, InstrumentClass,
    RiskAssessment, RiskLevel,
};

use crate::market::MarketData;
use crate::mode::StrategyMode;

/// Instruction priorities, highest first
const PRIORITY_UNWIND: u8 = 10;
const PRIORITY_SWEEP: u8 = 8;
const PRIORITY_ENTER: u8 = 6;
const PRIORITY_REBALANCE: u8 = 5;

/// Cross-mode configuration
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Incidental balances strictly above this share-class value are swept
    pub incidental_threshold: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            incidental_threshold: dec!(100),
        }
    }
}

/// Maps one step's pipeline outputs to an ordered instruction set
pub struct StrategyManager {
    config: StrategyConfig,
}

impl StrategyManager {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Decide this step's instructions, ordered by priority (highest first).
    /// An empty vector is the no-op outcome.
    pub fn evaluate(
        &self,
        exposure: &ExposureSnapshot,
        equity: &EquityBreakdown,
        risk: &RiskAssessment,
        market: &MarketData,
        mode: &StrategyMode,
    ) -> Vec<Instruction> {
        let mut instructions: Vec<Instruction> = Vec::new();

        // Emergency unwind outranks everything in leveraged modes
        if risk.level == RiskLevel::Critical && mode.is_leveraged() {
            info!("[STRATEGY] Critical risk in {} - unwinding", mode.name());
            instructions.push(
                Instruction::new(
                    PRIORITY_UNWIND,
                    InstructionKind::Unwind,
                    vec![Action::new("unwind", "lender", json!({"mode": "fast"}))],
                )
                .with_metadata(json!({"reason": "critical risk"})),
            );
        } else if let Some(instr) = self.mode_decision(exposure, equity, risk, market, mode) {
            instructions.push(instr);
        }

        // Generic cross-mode rule: sweep out-of-band incidental balances
        if let Some(instr) = self.sweep_incidentals(market) {
            instructions.push(instr);
        }

        instructions.sort_by(|a, b| b.priority.cmp(&a.priority));
        instructions
    }

    /// Strictly-greater-than comparison: a balance exactly at the
    /// threshold does not trigger.
    fn sweep_incidentals(&self, market: &MarketData) -> Option<Instruction> {
        let actions: Vec<Action> = market
            .incidental_balances
            .iter()
            .filter(|b| b.value > self.config.incidental_threshold)
            .map(|b| {
                Action::new(
                    "unwrap_and_liquidate",
                    "dex",
                    json!({"token": b.token.as_str(), "amount": b.amount.to_string()}),
                )
            })
            .collect();

        if actions.is_empty() {
            return None;
        }
        Some(Instruction::new(
            PRIORITY_SWEEP,
            InstructionKind::UnwrapAndLiquidate,
            actions,
        ))
    }

    fn mode_decision(
        &self,
        exposure: &ExposureSnapshot,
        equity: &EquityBreakdown,
        risk: &RiskAssessment,
        market: &MarketData,
        mode: &StrategyMode,
    ) -> Option<Instruction> {
        match mode {
            StrategyMode::PureLending {
                target_ltv,
                ltv_drift_threshold,
            } => self.rebalance_ltv(equity, risk, *target_ltv, *ltv_drift_threshold, false),

            StrategyMode::StakingOnly { min_idle_value } => {
                stake_idle(exposure, *min_idle_value)
            }

            StrategyMode::LeveragedStaking {
                target_ltv,
                ltv_drift_threshold,
            } => {
                // Flat book with capital: enter the loop atomically
                if risk.collateral.ltv.is_zero() && equity.total_equity > Decimal::ZERO {
                    return Some(
                        Instruction::new(
                            PRIORITY_ENTER,
                            InstructionKind::EnterLeverage,
                            vec![Action::new(
                                "atomic_loop",
                                "lender",
                                json!({
                                    "target_ltv": target_ltv.to_string(),
                                    "equity": equity.total_equity.to_string(),
                                }),
                            )],
                        )
                        .with_metadata(json!({"mode": mode.name()})),
                    );
                }
                self.rebalance_ltv(equity, risk, *target_ltv, *ltv_drift_threshold, true)
            }

            StrategyMode::BasisTrading {
                delta_drift_threshold,
                min_funding_rate,
                margin_reserve,
            } => {
                let has_perp = exposure.derivatives().next().is_some();
                if !has_perp {
                    // Enter only when funding pays for the structure.
                    // Part of the equity stays unstaked as perp margin;
                    // the short is sized to the staked leg.
                    if market.expected_funding_rate >= *min_funding_rate
                        && equity.total_equity > Decimal::ZERO
                    {
                        let margin = (equity.total_equity * *margin_reserve).normalize();
                        let hedge = (equity.total_equity - margin).normalize();
                        return Some(
                            Instruction::new(
                                PRIORITY_ENTER,
                                InstructionKind::EnterLeverage,
                                vec![
                                    Action::new(
                                        "stake",
                                        "staker",
                                        json!({"amount": hedge.to_string()}),
                                    ),
                                    Action::new(
                                        "open_short",
                                        "perp",
                                        json!({
                                            "notional": hedge.to_string(),
                                            "margin": margin.to_string(),
                                        }),
                                    ),
                                ],
                            )
                            .with_metadata(json!({"mode": mode.name()})),
                        );
                    }
                    return None;
                }
                // Re-hedge only past the drift threshold
                if risk.delta.drift_ratio > *delta_drift_threshold {
                    debug!(
                        "[STRATEGY] Basis drift {} > {} - rehedging",
                        risk.delta.drift_ratio, delta_drift_threshold
                    );
                    return Some(Instruction::new(
                        PRIORITY_REBALANCE,
                        InstructionKind::Rebalance,
                        vec![Action::new(
                            "adjust_hedge",
                            "perp",
                            json!({"delta": exposure.net_delta.to_string()}),
                        )],
                    ));
                }
                None
            }

            StrategyMode::MlDirectional { entry_threshold } => {
                let signal = market.signal?;
                if signal.abs() < *entry_threshold {
                    return None;
                }
                let side = if signal > Decimal::ZERO { "long" } else { "short" };
                Some(
                    Instruction::new(
                        PRIORITY_REBALANCE,
                        InstructionKind::Rebalance,
                        vec![Action::new(
                            "set_exposure",
                            "perp",
                            json!({"side": side, "signal": signal.to_string()}),
                        )],
                    )
                    .with_metadata(json!({"mode": mode.name()})),
                )
            }
        }
    }

    /// Shared LTV-band steering for the lending-backed modes. Emits only
    /// when the deviation strictly exceeds the drift threshold.
    fn rebalance_ltv(
        &self,
        equity: &EquityBreakdown,
        risk: &RiskAssessment,
        target_ltv: Decimal,
        drift_threshold: Decimal,
        restake: bool,
    ) -> Option<Instruction> {
        let ltv = risk.collateral.ltv;
        let deviation = (ltv - target_ltv).abs();
        if deviation <= drift_threshold {
            return None;
        }

        let adjustment = (target_ltv - ltv) * equity.total_assets;
        let mut actions = Vec::new();
        if adjustment > Decimal::ZERO {
            actions.push(Action::new(
                "borrow",
                "lender",
                json!({"amount": adjustment.to_string()}),
            ));
            if restake {
                actions.push(Action::new(
                    "stake",
                    "staker",
                    json!({"amount": adjustment.to_string()}),
                ));
            }
        } else {
            if restake {
                actions.push(Action::new(
                    "unstake",
                    "staker",
                    json!({"amount": adjustment.abs().to_string()}),
                ));
            }
            actions.push(Action::new(
                "repay",
                "lender",
                json!({"amount": adjustment.abs().to_string()}),
            ));
        }

        debug!(
            "[STRATEGY] LTV {ltv} deviates {deviation} from target {target_ltv} - rebalancing"
        );
        Some(
            Instruction::new(PRIORITY_REBALANCE, InstructionKind::Rebalance, actions)
                .with_metadata(json!({"ltv": ltv.to_string(), "target": target_ltv.to_string()})),
        )
    }
}

/// Stake idle non-cash base-token balances worth moving
fn stake_idle(exposure: &ExposureSnapshot, min_idle_value: Decimal) -> Option<Instruction> {
    let actions: Vec<Action> = exposure
        .entries
        .iter()
        .filter(|e| {
            e.class == InstrumentClass::BaseToken
                && e.token != exposure.share_class
                && e.exposure_share_class > min_idle_value
        })
        .map(|e| {
            Action::new(
                "stake",
                "staker",
                json!({"token": e.token.as_str(), "amount": e.native_amount.to_string()}),
            )
        })
        .collect();

    if actions.is_empty() {
        return None;
    }
    Some(Instruction::new(
        PRIORITY_REBALANCE,
        InstructionKind::Rebalance,
        actions,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::IncidentalBalance;
    use chrono::Utc;
    use talos_core::{
        CollateralRisk, DeltaRisk, MarginRisk, Token,
    };

    fn empty_exposure() -> ExposureSnapshot {
        ExposureSnapshot {
            timestamp: Utc::now(),
            share_class: Token::new("USDC"),
            entries: Vec::new(),
            excluded: Vec::new(),
            net_delta: Decimal::ZERO,
            total_value: Decimal::ZERO,
        }
    }

    fn equity_of(assets: Decimal, debts: Decimal) -> EquityBreakdown {
        let mut b = EquityBreakdown::zeroed(Utc::now());
        b.total_assets = assets;
        b.total_debts = debts;
        b.total_equity = assets - debts;
        b
    }

    fn risk_with(ltv: Decimal, level: RiskLevel) -> RiskAssessment {
        RiskAssessment {
            timestamp: Utc::now(),
            level,
            collateral: CollateralRisk {
                ltv,
                health_factor: Decimal::MAX,
                level,
            },
            margin: MarginRisk {
                per_venue: Vec::new(),
                worst_venue: None,
                worst_ratio: None,
                level: RiskLevel::Safe,
            },
            delta: DeltaRisk {
                net_delta: Decimal::ZERO,
                drift_ratio: Decimal::ZERO,
                level: RiskLevel::Safe,
            },
            alerts: Vec::new(),
        }
    }

    fn lending_mode() -> StrategyMode {
        StrategyMode::PureLending {
            target_ltv: dec!(0.6),
            ltv_drift_threshold: dec!(0.05),
        }
    }

    fn manager() -> StrategyManager {
        StrategyManager::new(StrategyConfig {
            incidental_threshold: dec!(100),
        })
    }

    fn incidental(value: Decimal) -> MarketData {
        MarketData {
            incidental_balances: vec![IncidentalBalance {
                token: Token::new("ARB"),
                amount: dec!(500),
                value,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_incidental_threshold_is_exclusive() {
        let m = manager();
        let exposure = empty_exposure();
        let equity = equity_of(dec!(10000), dec!(6000));
        let risk = risk_with(dec!(0.6), RiskLevel::Safe);

        // Exactly at the threshold: no instruction
        let out = m.evaluate(&exposure, &equity, &risk, &incidental(dec!(100)), &lending_mode());
        assert!(out.is_empty());

        // A hair above: swept
        let out = m.evaluate(
            &exposure,
            &equity,
            &risk,
            &incidental(dec!(100.000001)),
            &lending_mode(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InstructionKind::UnwrapAndLiquidate);
        assert_eq!(out[0].actions[0].name, "unwrap_and_liquidate");
    }

    #[test]
    fn test_no_rebalance_within_drift_band() {
        let m = manager();
        let exposure = empty_exposure();
        let equity = equity_of(dec!(10000), dec!(6500));

        // Deviation 0.05 == threshold: stay put (strictly-greater rule)
        let risk = risk_with(dec!(0.65), RiskLevel::Safe);
        let out = m.evaluate(&exposure, &equity, &risk, &MarketData::default(), &lending_mode());
        assert!(out.is_empty());
    }

    #[test]
    fn test_rebalance_past_drift_band_repays() {
        let m = manager();
        let exposure = empty_exposure();
        let equity = equity_of(dec!(10000), dec!(7000));
        let risk = risk_with(dec!(0.7), RiskLevel::Warning);

        let out = m.evaluate(&exposure, &equity, &risk, &MarketData::default(), &lending_mode());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InstructionKind::Rebalance);
        // Over target: repay (0.7 - 0.6) * 10000 = 1000
        assert_eq!(out[0].actions[0].name, "repay");
        assert_eq!(out[0].actions[0].params["amount"], "1000.0");
    }

    #[test]
    fn test_leveraged_staking_enters_when_flat() {
        let m = manager();
        let mode = StrategyMode::LeveragedStaking {
            target_ltv: dec!(0.7),
            ltv_drift_threshold: dec!(0.03),
        };
        let equity = equity_of(dec!(5000), Decimal::ZERO);
        let risk = risk_with(Decimal::ZERO, RiskLevel::Safe);

        let out = m.evaluate(&empty_exposure(), &equity, &risk, &MarketData::default(), &mode);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InstructionKind::EnterLeverage);
        assert_eq!(out[0].actions[0].name, "atomic_loop");
        assert_eq!(out[0].actions[0].params["target_ltv"], "0.7");
    }

    #[test]
    fn test_critical_risk_unwinds_first() {
        let m = manager();
        let mode = StrategyMode::LeveragedStaking {
            target_ltv: dec!(0.7),
            ltv_drift_threshold: dec!(0.03),
        };
        let equity = equity_of(dec!(10000), dec!(8800));
        let risk = risk_with(dec!(0.88), RiskLevel::Critical);

        // Critical risk and a sweepable balance in the same step: the
        // unwind comes out first by priority
        let out = m.evaluate(&empty_exposure(), &equity, &risk, &incidental(dec!(200)), &mode);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, InstructionKind::Unwind);
        assert_eq!(out[0].priority, PRIORITY_UNWIND);
        assert_eq!(out[1].kind, InstructionKind::UnwrapAndLiquidate);
    }

    #[test]
    fn test_critical_risk_ignored_by_unleveraged_mode() {
        let m = manager();
        let mode = StrategyMode::StakingOnly {
            min_idle_value: dec!(50),
        };
        let risk = risk_with(Decimal::ZERO, RiskLevel::Critical);

        let out = m.evaluate(
            &empty_exposure(),
            &equity_of(dec!(1000), Decimal::ZERO),
            &risk,
            &MarketData::default(),
            &mode,
        );
        assert!(out.iter().all(|i| i.kind != InstructionKind::Unwind));
    }

    #[test]
    fn test_basis_enters_only_when_funding_clears() {
        let m = manager();
        let mode = StrategyMode::BasisTrading {
            delta_drift_threshold: dec!(0.02),
            min_funding_rate: dec!(0.0001),
            margin_reserve: dec!(0.2),
        };
        let equity = equity_of(dec!(5000), Decimal::ZERO);
        let risk = risk_with(Decimal::ZERO, RiskLevel::Safe);

        let thin = MarketData {
            expected_funding_rate: dec!(0.00005),
            ..Default::default()
        };
        assert!(m.evaluate(&empty_exposure(), &equity, &risk, &thin, &mode).is_empty());

        let rich = MarketData {
            expected_funding_rate: dec!(0.0002),
            ..Default::default()
        };
        let out = m.evaluate(&empty_exposure(), &equity, &risk, &rich, &mode);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InstructionKind::EnterLeverage);
        assert_eq!(out[0].actions.len(), 2);
        // 20% of equity reserved as margin, short sized to the staked leg
        assert_eq!(out[0].actions[0].params["amount"], "4000");
        assert_eq!(out[0].actions[1].name, "open_short");
        assert_eq!(out[0].actions[1].params["notional"], "4000");
        assert_eq!(out[0].actions[1].params["margin"], "1000");
    }

    #[test]
    fn test_ml_mode_needs_signal_and_conviction() {
        let m = manager();
        let mode = StrategyMode::MlDirectional {
            entry_threshold: dec!(0.5),
        };
        let equity = equity_of(dec!(5000), Decimal::ZERO);
        let risk = risk_with(Decimal::ZERO, RiskLevel::Safe);

        // No signal, no action
        let out = m.evaluate(&empty_exposure(), &equity, &risk, &MarketData::default(), &mode);
        assert!(out.is_empty());

        // Weak signal, no action
        let weak = MarketData {
            signal: Some(dec!(0.3)),
            ..Default::default()
        };
        assert!(m.evaluate(&empty_exposure(), &equity, &risk, &weak, &mode).is_empty());

        // Strong short signal
        let strong = MarketData {
            signal: Some(dec!(-0.8)),
            ..Default::default()
        };
        let out = m.evaluate(&empty_exposure(), &equity, &risk, &strong, &mode);
        assert_eq!(out[0].actions[0].params["side"], "short");
    }
}
