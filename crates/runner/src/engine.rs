//! Engine loop
//!
//! Drives the full pipeline once per simulated step:
//! snapshot -> exposure -> equity -> risk -> P&L -> strategy -> execute ->
//! feed realized deltas back -> log the step record.
//!
//! Single-threaded and deterministic per run: the loop suspends only at
//! port calls, checks for cancellation between steps, and independent runs
//! share no mutable state. A fatal error aborts the run; everything else
//! is recorded in the report and the loop continues.

use log::{info, warn};
use priority_queue::PriorityQueue;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

use talos_core::{
    Action, ActionOutcome, ActionStatus, ExposureSnapshot, Instruction, InstructionKind,
    InstructionResult, InstrumentClass, StepRecord, Timestamp, Token, Venue,
};
use talos_executor::{
    InstructionExecutor, LoopConfig, LoopSimulator, UnwindConfig, UnwindMode, UnwindSimulator,
};
use talos_exposure::{EquityCalculator, ExposureCalculator};
use talos_pnl::{PnlCalculator, PnlConfig};
use talos_ports::{
    Clock, CostProvider, EventLogger, ExecutionVenue, PipelineError, PipelineResult,
    PriceProvider, SnapshotProvider,
};
use talos_risk::{RiskMonitor, RiskMonitorConfig};
use talos_strategy::{IncidentalBalance, MarketData, StrategyConfig, StrategyManager, StrategyMode};

use crate::report::RunReport;
use crate::sim::PositionSink;

/// Where leverage-loop results land in the simulated book
#[derive(Debug, Clone)]
pub struct VenueProfile {
    /// Lending venue holding collateral and debt
    pub lender: Venue,
    /// Venue holding idle share-class balance
    pub wallet: Venue,
    /// Yield token supplied as collateral
    pub collateral_token: Token,
    /// Token the loop borrows
    pub debt_token: Token,
    /// Derivatives venue carrying the hedge leg, when the mode has one
    pub perp_venue: Option<Venue>,
    /// Instrument shorted at the derivatives venue
    pub perp_token: Option<Token>,
}

/// One run's parameters
#[derive(Clone)]
pub struct RunConfig {
    pub correlation_id: Uuid,
    pub share_class: Token,
    /// Chain-native token gas is quoted in
    pub native_token: Token,
    pub mode: StrategyMode,
    /// Number of pipeline steps to execute
    pub steps: u64,
    /// Budget for any single collaborator call
    pub port_timeout: Duration,
    /// Market expectations the strategy sees every step. Incidental
    /// balances are not taken from here: the engine reads them off each
    /// step's snapshot, so a swept balance never reappears.
    pub market: MarketData,
    pub profile: VenueProfile,
    pub risk: RiskMonitorConfig,
    pub pnl: PnlConfig,
    pub strategy: StrategyConfig,
    pub unwind: UnwindConfig,
}

/// Ports the engine drives
#[derive(Clone)]
pub struct EnginePorts {
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub prices: Arc<dyn PriceProvider>,
    pub costs: Arc<dyn CostProvider>,
    pub logger: Arc<dyn EventLogger>,
    pub clock: Arc<dyn Clock>,
    /// Write side of the simulated position book
    pub sink: Arc<dyn PositionSink>,
}

/// The pipeline orchestrator. Owns one run's state; build a new engine
/// per run.
pub struct Engine {
    config: RunConfig,
    snapshots: Arc<dyn SnapshotProvider>,
    prices: Arc<dyn PriceProvider>,
    logger: Arc<dyn EventLogger>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn PositionSink>,
    exposure: ExposureCalculator,
    equity: EquityCalculator,
    risk: RiskMonitor,
    pnl: PnlCalculator,
    strategy: StrategyManager,
    loops: LoopSimulator,
    unwinds: UnwindSimulator,
    executor: InstructionExecutor,
    cancel: watch::Receiver<bool>,
}

impl Engine {
    /// Fail-fast construction: an invalid risk configuration is rejected
    /// here, before any step runs.
    pub fn new(
        ports: EnginePorts,
        venues: HashMap<String, Arc<dyn ExecutionVenue>>,
        config: RunConfig,
        cancel: watch::Receiver<bool>,
    ) -> PipelineResult<Self> {
        let risk = RiskMonitor::new(config.risk.clone())?;

        let mut executor = InstructionExecutor::new();
        for (name, venue) in venues {
            executor.register(&name, venue);
        }

        let loops = LoopSimulator::new(
            ports.costs.clone(),
            ports.prices.clone(),
            LoopConfig {
                native_token: config.native_token.clone(),
                share_class: config.share_class.clone(),
            },
        );
        let unwinds = UnwindSimulator::new(ports.costs.clone(), config.unwind.clone());

        Ok(Self {
            exposure: ExposureCalculator::new(ports.prices.clone()),
            equity: EquityCalculator::new(ports.prices.clone()),
            risk,
            pnl: PnlCalculator::new(config.pnl.clone()),
            strategy: StrategyManager::new(config.strategy.clone()),
            loops,
            unwinds,
            executor,
            snapshots: ports.snapshots,
            prices: ports.prices,
            logger: ports.logger,
            clock: ports.clock,
            sink: ports.sink,
            config,
            cancel,
        })
    }

    /// Execute the configured number of steps and report.
    pub async fn run(mut self) -> RunReport {
        let started = self.clock.now();
        let mut report = RunReport::new(self.config.correlation_id, started);
        let mut previous: Option<ExposureSnapshot> = None;

        info!(
            "[ENGINE] Run {} starting: {} step(s) in mode {:?}",
            self.config.correlation_id, self.config.steps, self.config.mode
        );

        for step in 0..self.config.steps {
            if *self.cancel.borrow() {
                info!("[ENGINE] Run {} cancelled at step {step}", report.correlation_id);
                report.cancelled = true;
                break;
            }

            let timestamp = self.clock.now();
            match self.run_step(step, timestamp, previous.take(), &mut report).await {
                Ok(exposure) => {
                    previous = Some(exposure);
                    report.steps_completed += 1;
                }
                Err(PipelineError::Fatal { stage, reason }) => {
                    report.fatal = Some(format!("{stage}: {reason}"));
                    break;
                }
                Err(e) => {
                    // Degraded step: record it and move on; the
                    // attribution baseline resets to the next good step
                    warn!("[ENGINE] Step {step} failed: {e}");
                    if let PipelineError::DataUnavailable(msg) = e {
                        report.data_unavailable.push(msg);
                    }
                }
            }
            self.clock.tick();
        }

        report.finished_at = Some(self.clock.now());
        info!(
            "[ENGINE] Run {} finished: {}/{} steps, equity {}, pnl {}",
            report.correlation_id,
            report.steps_completed,
            self.config.steps,
            report.final_equity,
            report.cumulative_pnl
        );
        report
    }

    async fn run_step(
        &mut self,
        step: u64,
        timestamp: Timestamp,
        previous: Option<ExposureSnapshot>,
        report: &mut RunReport,
    ) -> PipelineResult<ExposureSnapshot> {
        let positions = self
            .with_timeout(self.snapshots.snapshot(timestamp), "snapshot")
            .await?;

        let share_class = self.config.share_class.clone();
        let exposure = self
            .with_timeout(
                self.exposure.compute(&positions, &share_class, timestamp),
                "exposure",
            )
            .await?;
        let equity = self
            .equity
            .calculate_equity(&positions, &share_class, timestamp)
            .await;
        let risk = self.risk.assess(&exposure, &equity)?;
        let pnl = self.pnl.step(previous.as_ref(), &exposure, &equity);
        if !pnl.reconciliation.passed {
            warn!(
                "[ENGINE] Step {step}: reconciliation off by {} (tolerance {})",
                pnl.reconciliation.difference, pnl.reconciliation.tolerance
            );
            report.reconciliation_failures.push(step);
        }

        let market = self.market_view(&exposure);
        let instructions =
            self.strategy
                .evaluate(&exposure, &equity, &risk, &market, &self.config.mode);

        // Highest priority first, whatever order the strategy emitted
        let mut queue: PriorityQueue<usize, u8> = PriorityQueue::new();
        for (idx, instr) in instructions.iter().enumerate() {
            queue.push(idx, instr.priority);
        }
        let mut executions = Vec::with_capacity(instructions.len());
        while let Some((idx, _)) = queue.pop() {
            let result = self
                .dispatch(&instructions[idx], &exposure, timestamp, report)
                .await?;
            executions.push(result);
        }

        report.final_equity = equity.total_equity;
        report.cumulative_pnl = pnl.balance.pnl_cumulative;

        self.logger.append(StepRecord {
            correlation_id: self.config.correlation_id,
            step_order: step,
            timestamp,
            exposure: exposure.clone(),
            equity,
            risk,
            pnl,
            instructions,
            executions,
        });
        Ok(exposure)
    }

    /// Route one instruction. Leverage entry and unwind run through the
    /// simulators and feed deltas back to the book; everything else fans
    /// out to the registered venues. Only fatal errors propagate.
    async fn dispatch(
        &self,
        instruction: &Instruction,
        exposure: &ExposureSnapshot,
        timestamp: Timestamp,
        report: &mut RunReport,
    ) -> PipelineResult<InstructionResult> {
        let attempted = match instruction.kind {
            InstructionKind::EnterLeverage if is_atomic_loop(instruction) => {
                self.enter_leverage(instruction, timestamp).await
            }
            InstructionKind::Unwind | InstructionKind::ExitLeverage => {
                self.exit_leverage(instruction, exposure, timestamp).await
            }
            _ => {
                let result = self.executor.execute_instruction(instruction).await;
                self.apply_fanout_feedback(instruction, &result, exposure, timestamp)
                    .await
                    .map(|_| result)
            }
        };

        match attempted {
            Ok(result) => Ok(result),
            Err(e @ PipelineError::Fatal { .. }) => Err(e),
            Err(e) => {
                warn!(
                    "[ENGINE] Instruction {} ({:?}) failed: {e}",
                    instruction.id, instruction.kind
                );
                if let PipelineError::DataUnavailable(msg) = &e {
                    report.data_unavailable.push(msg.clone());
                }
                Ok(failed_result(instruction, &e))
            }
        }
    }

    /// Atomic loop entry: simulate, then move the spent equity into
    /// collateral and debt on the book.
    async fn enter_leverage(
        &self,
        instruction: &Instruction,
        timestamp: Timestamp,
    ) -> PipelineResult<InstructionResult> {
        let action = instruction.actions.first().ok_or_else(|| {
            PipelineError::Configuration("leverage instruction has no actions".to_string())
        })?;
        let target_ltv = decimal_param(&action.params, "target_ltv")?;
        let equity = decimal_param(&action.params, "equity")?;

        let result = self.loops.atomic_entry(equity, target_ltv, timestamp).await?;

        let profile = &self.config.profile;
        let collateral_rate = self
            .prices
            .rate(&profile.collateral_token, &self.config.share_class, timestamp)
            .await?;
        let debt_rate = self
            .prices
            .rate(&profile.debt_token, &self.config.share_class, timestamp)
            .await?;

        self.sink.apply(
            &profile.wallet,
            InstrumentClass::BaseToken,
            &self.config.share_class,
            -equity,
        );
        self.sink.apply(
            &profile.lender,
            InstrumentClass::YieldToken,
            &profile.collateral_token,
            result.collateral_supplied / collateral_rate,
        );
        self.sink.apply(
            &profile.lender,
            InstrumentClass::DebtToken,
            &profile.debt_token,
            result.debt_created / debt_rate,
        );

        Ok(single_outcome(
            instruction,
            action,
            format!(
                "entered: collateral {}, debt {}, {}x",
                result.collateral_supplied, result.debt_created, result.leverage_achieved
            ),
        ))
    }

    /// Close the leveraged structure: flash-exit the lending position,
    /// unwind the freed collateral, credit proceeds back to the wallet.
    async fn exit_leverage(
        &self,
        instruction: &Instruction,
        exposure: &ExposureSnapshot,
        timestamp: Timestamp,
    ) -> PipelineResult<InstructionResult> {
        let profile = &self.config.profile;
        let mut collateral_value = Decimal::ZERO;
        let mut debt_value = Decimal::ZERO;
        for entry in exposure
            .entries
            .iter()
            .filter(|e| e.venue == profile.lender)
        {
            match entry.class {
                InstrumentClass::YieldToken | InstrumentClass::BaseToken => {
                    collateral_value += entry.exposure_share_class
                }
                InstrumentClass::DebtToken => debt_value += entry.exposure_share_class.abs(),
                InstrumentClass::Derivative => {}
            }
        }
        if collateral_value <= Decimal::ZERO {
            return Err(PipelineError::Execution {
                executor: "lender".to_string(),
                action: "unwind".to_string(),
                reason: "no collateral to unwind".to_string(),
            });
        }

        let exit = self
            .loops
            .atomic_exit(collateral_value, debt_value, timestamp)
            .await?;
        let mode = unwind_mode(instruction);
        let unwind = self
            .unwinds
            .unwind(collateral_value - debt_value, mode, timestamp)
            .await?;

        for entry in exposure
            .entries
            .iter()
            .filter(|e| e.venue == profile.lender && e.class != InstrumentClass::Derivative)
        {
            self.sink
                .apply(&entry.venue, entry.class, &entry.token, -entry.native_amount);
        }
        self.sink.apply(
            &profile.wallet,
            InstrumentClass::BaseToken,
            &self.config.share_class,
            unwind.proceeds,
        );

        let action = instruction
            .actions
            .first()
            .cloned()
            .unwrap_or_else(|| Action::new("unwind", "lender", serde_json::Value::Null));
        Ok(single_outcome(
            instruction,
            &action,
            format!(
                "unwound {} ({}): repaid {}, proceeds {}",
                collateral_value,
                mode.as_str(),
                exit.debt_repaid,
                unwind.proceeds
            ),
        ))
    }

    /// Book-level effects of successfully executed fan-out actions
    async fn apply_fanout_feedback(
        &self,
        instruction: &Instruction,
        result: &InstructionResult,
        exposure: &ExposureSnapshot,
        timestamp: Timestamp,
    ) -> PipelineResult<()> {
        let profile = &self.config.profile;
        let share = &self.config.share_class;
        for (action, outcome) in instruction.actions.iter().zip(&result.outcomes) {
            if outcome.status != ActionStatus::Ok {
                continue;
            }
            match action.name.as_str() {
                "borrow" | "repay" => {
                    let amount = decimal_param(&action.params, "amount")?;
                    let debt_rate = self
                        .prices
                        .rate(&profile.debt_token, share, timestamp)
                        .await?;
                    let sign = if action.name == "borrow" {
                        Decimal::ONE
                    } else {
                        -Decimal::ONE
                    };
                    self.sink.apply(
                        &profile.lender,
                        InstrumentClass::DebtToken,
                        &profile.debt_token,
                        sign * amount / debt_rate,
                    );
                    self.sink.apply(
                        &profile.wallet,
                        InstrumentClass::BaseToken,
                        share,
                        sign * amount,
                    );
                }
                "stake" | "unstake" => {
                    let amount = decimal_param(&action.params, "amount")?;
                    let collateral_rate = self
                        .prices
                        .rate(&profile.collateral_token, share, timestamp)
                        .await?;
                    let sign = if action.name == "stake" {
                        Decimal::ONE
                    } else {
                        -Decimal::ONE
                    };
                    match action.params.get("token").and_then(|v| v.as_str()) {
                        // A named token stakes in its own native units:
                        // that balance leaves the wallet and arrives as
                        // collateral at the staked token's rate
                        Some(name) => {
                            let token = Token::new(name);
                            let token_rate = self.prices.rate(&token, share, timestamp).await?;
                            self.sink.apply(
                                &profile.wallet,
                                InstrumentClass::BaseToken,
                                &token,
                                -sign * amount,
                            );
                            self.sink.apply(
                                &profile.lender,
                                InstrumentClass::YieldToken,
                                &profile.collateral_token,
                                sign * amount * token_rate / collateral_rate,
                            );
                        }
                        // No token named: the amount is share-class value
                        // moving between the wallet and the collateral leg
                        None => {
                            self.sink.apply(
                                &profile.wallet,
                                InstrumentClass::BaseToken,
                                share,
                                -sign * amount,
                            );
                            self.sink.apply(
                                &profile.lender,
                                InstrumentClass::YieldToken,
                                &profile.collateral_token,
                                sign * amount / collateral_rate,
                            );
                        }
                    }
                }
                "open_short" => {
                    let notional = decimal_param(&action.params, "notional")?;
                    let margin = decimal_param(&action.params, "margin")?;
                    let (venue, token) = perp_leg(profile)?;
                    let perp_rate = self.prices.rate(token, share, timestamp).await?;
                    self.sink.apply(
                        &profile.wallet,
                        InstrumentClass::BaseToken,
                        share,
                        -margin,
                    );
                    self.sink
                        .apply(venue, InstrumentClass::BaseToken, share, margin);
                    self.sink.apply(
                        venue,
                        InstrumentClass::Derivative,
                        token,
                        -(notional / perp_rate),
                    );
                }
                "adjust_hedge" => {
                    let delta = decimal_param(&action.params, "delta")?;
                    let (venue, token) = perp_leg(profile)?;
                    let perp_rate = self.prices.rate(token, share, timestamp).await?;
                    self.sink.apply(
                        venue,
                        InstrumentClass::Derivative,
                        token,
                        -(delta / perp_rate),
                    );
                }
                "unwrap_and_liquidate" => {
                    let requested = decimal_param(&action.params, "amount")?;
                    let token = Token::new(
                        action
                            .params
                            .get("token")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default(),
                    );
                    // Never liquidate more than the book holds
                    let held = exposure
                        .entry(&profile.wallet, &token)
                        .map(|e| e.native_amount)
                        .unwrap_or(Decimal::ZERO);
                    let amount = requested.min(held);
                    if amount <= Decimal::ZERO {
                        continue;
                    }
                    let rate = self.prices.rate(&token, share, timestamp).await?;
                    self.sink
                        .apply(&profile.wallet, InstrumentClass::BaseToken, &token, -amount);
                    self.sink.apply(
                        &profile.wallet,
                        InstrumentClass::BaseToken,
                        share,
                        amount * rate,
                    );
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Per-step market view: configured expectations plus incidental
    /// balances read off the current snapshot. A token the run manages
    /// (share class, gas token, collateral, debt) is never incidental.
    fn market_view(&self, exposure: &ExposureSnapshot) -> MarketData {
        let profile = &self.config.profile;
        let managed = [
            &self.config.share_class,
            &self.config.native_token,
            &profile.collateral_token,
            &profile.debt_token,
        ];
        let incidental_balances = exposure
            .entries
            .iter()
            .filter(|e| {
                e.venue == profile.wallet
                    && e.class == InstrumentClass::BaseToken
                    && !managed.contains(&&e.token)
            })
            .map(|e| IncidentalBalance {
                token: e.token.clone(),
                amount: e.native_amount,
                value: e.exposure_share_class,
            })
            .collect();
        MarketData {
            incidental_balances,
            ..self.config.market.clone()
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = PipelineResult<T>>,
        what: &str,
    ) -> PipelineResult<T> {
        match timeout(self.config.port_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::DataUnavailable(format!(
                "{what} timed out after {:?}",
                self.config.port_timeout
            ))),
        }
    }
}

fn perp_leg(profile: &VenueProfile) -> PipelineResult<(&Venue, &Token)> {
    match (&profile.perp_venue, &profile.perp_token) {
        (Some(venue), Some(token)) => Ok((venue, token)),
        _ => Err(PipelineError::Configuration(
            "derivative action without a configured perp venue".to_string(),
        )),
    }
}

fn is_atomic_loop(instruction: &Instruction) -> bool {
    instruction
        .actions
        .first()
        .is_some_and(|a| a.name == "atomic_loop")
}

fn unwind_mode(instruction: &Instruction) -> UnwindMode {
    let param = instruction
        .actions
        .first()
        .and_then(|a| a.params.get("mode"))
        .and_then(|v| v.as_str());
    match param {
        Some("slow") => UnwindMode::Slow,
        Some("fast") => UnwindMode::Fast,
        // Emergency unwinds default to immediate exit
        None => match instruction.kind {
            InstructionKind::Unwind => UnwindMode::Fast,
            _ => UnwindMode::Slow,
        },
        Some(_) => UnwindMode::Fast,
    }
}

fn decimal_param(params: &serde_json::Value, key: &str) -> PipelineResult<Decimal> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| {
            PipelineError::Configuration(format!("missing or invalid '{key}' parameter"))
        })
}

/// Result for an instruction the engine fulfilled as one simulated unit
fn single_outcome(instruction: &Instruction, action: &Action, detail: String) -> InstructionResult {
    InstructionResult {
        instruction_id: instruction.id,
        kind: instruction.kind,
        success: true,
        outcomes: vec![ActionOutcome {
            action: action.name.clone(),
            executor: action.executor.clone(),
            status: ActionStatus::Ok,
            detail: Some(detail),
        }],
    }
}

/// Failure result preserving the complete action list: the first action
/// carries the error, the rest are skipped.
fn failed_result(instruction: &Instruction, error: &PipelineError) -> InstructionResult {
    let outcomes = instruction
        .actions
        .iter()
        .enumerate()
        .map(|(i, action)| ActionOutcome {
            action: action.name.clone(),
            executor: action.executor.clone(),
            status: if i == 0 {
                ActionStatus::Failed
            } else {
                ActionStatus::Skipped
            },
            detail: (i == 0).then(|| error.to_string()),
        })
        .collect();
    InstructionResult {
        instruction_id: instruction.id,
        kind: instruction.kind,
        success: false,
        outcomes,
    }
}
