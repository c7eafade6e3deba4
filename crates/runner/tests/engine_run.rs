//! Full engine-loop integration tests
//!
//! Runs simulated books through several pipeline steps over the simulated
//! collaborators and checks the end-to-end contract per mode: the flat
//! book enters its structure once, realized deltas land in the position
//! book, every step is logged, and dual-method P&L reconciles throughout.

use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use chrono::{TimeZone, Utc};
use talos_core::{
    InstructionKind, InstrumentClass, Position, RiskLevel, Timestamp, Token, Venue,
};
use talos_executor::UnwindConfig;
use talos_pnl::PnlConfig;
use talos_ports::InstrumentKind;
use talos_risk::{MarginThresholds, RiskMonitorConfig};
use talos_runner::{
    Engine, EnginePorts, FlatGasProvider, RecordingLogger, RunConfig, SimPositionBook,
    SimPriceProvider, SimVenue, SteppedClock, TokenProfile, VenueProfile,
};
use talos_strategy::{MarketData, StrategyConfig, StrategyMode};

fn genesis() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

struct Harness {
    book: Arc<SimPositionBook>,
    logger: Arc<RecordingLogger>,
    config: RunConfig,
    ports: EnginePorts,
}

/// A small token universe shared by every scenario: USDC share class,
/// ETH and its staked/borrowed forms at 2000, an ARB reward token at 2,
/// and an ETH perp. Hourly steps from a fixed genesis.
fn scenario(steps: u64, mode: StrategyMode, positions: Vec<Position>) -> Harness {
    let share = Token::new("USDC");
    let wallet = Venue::new("wallet");
    let lender = Venue::new("aave");
    let perp = Venue::new("hyperliquid");

    let book = Arc::new(SimPositionBook::with_positions(positions));

    let mut profiles = HashMap::new();
    profiles.insert(Token::new("ETH"), TokenProfile::flat(dec!(2000)));
    profiles.insert(Token::new("WETH"), TokenProfile::flat(dec!(2000)));
    profiles.insert(Token::new("ARB"), TokenProfile::flat(dec!(2)));
    profiles.insert(Token::new("ETH-PERP"), TokenProfile::flat(dec!(2000)));
    profiles.insert(
        Token::new("stWETH"),
        TokenProfile {
            staking_apr: dec!(0.0365),
            ..TokenProfile::flat(dec!(2000))
        },
    );

    let mut registry = HashMap::new();
    registry.insert((wallet.clone(), share.clone()), InstrumentKind::Asset);
    registry.insert((wallet.clone(), Token::new("ETH")), InstrumentKind::Asset);
    registry.insert((wallet.clone(), Token::new("ARB")), InstrumentKind::Asset);
    registry.insert(
        (lender.clone(), Token::new("stWETH")),
        InstrumentKind::Asset,
    );
    registry.insert((lender.clone(), Token::new("WETH")), InstrumentKind::Debt);
    registry.insert((perp.clone(), share.clone()), InstrumentKind::Asset);
    registry.insert(
        (perp.clone(), Token::new("ETH-PERP")),
        InstrumentKind::Derivative,
    );

    let prices = Arc::new(SimPriceProvider::new(
        genesis(),
        share.clone(),
        profiles,
        registry,
    ));
    let logger = Arc::new(RecordingLogger::new());

    let mut venue_margins = HashMap::new();
    venue_margins.insert(
        perp.clone(),
        MarginThresholds {
            warning: dec!(0.15),
            critical: dec!(0.08),
        },
    );

    let config = RunConfig {
        correlation_id: Uuid::new_v4(),
        share_class: share,
        native_token: Token::new("ETH"),
        mode,
        steps,
        port_timeout: Duration::from_secs(1),
        market: MarketData {
            expected_funding_rate: dec!(0.01),
            ..MarketData::default()
        },
        profile: VenueProfile {
            lender,
            wallet,
            collateral_token: Token::new("stWETH"),
            debt_token: Token::new("WETH"),
            perp_venue: Some(perp),
            perp_token: Some(Token::new("ETH-PERP")),
        },
        risk: RiskMonitorConfig {
            ltv_warning: Some(dec!(0.8)),
            ltv_critical: Some(dec!(0.9)),
            liquidation_threshold: Some(dec!(0.95)),
            venue_margins,
            drift_warning: Some(dec!(0.5)),
            drift_critical: Some(dec!(0.75)),
        },
        pnl: PnlConfig::default(),
        strategy: StrategyConfig::default(),
        unwind: UnwindConfig::default(),
    };

    let ports = EnginePorts {
        snapshots: book.clone(),
        prices,
        costs: Arc::new(FlatGasProvider(dec!(0.0001))),
        logger: logger.clone(),
        clock: Arc::new(SteppedClock::new(genesis(), chrono::Duration::hours(1))),
        sink: book.clone(),
    };

    Harness {
        book,
        logger,
        config,
        ports,
    }
}

fn harness(steps: u64) -> Harness {
    scenario(
        steps,
        StrategyMode::LeveragedStaking {
            target_ltv: dec!(0.5),
            ltv_drift_threshold: dec!(0.05),
        },
        vec![Position::new(
            Venue::new("wallet"),
            InstrumentClass::BaseToken,
            Token::new("USDC"),
            dec!(10000),
        )],
    )
}

fn engine(h: &Harness, cancel: watch::Receiver<bool>) -> Engine {
    let mut venues: HashMap<String, Arc<dyn talos_ports::ExecutionVenue>> = HashMap::new();
    venues.insert("lender".to_string(), Arc::new(SimVenue::new("lender")));
    venues.insert("staker".to_string(), Arc::new(SimVenue::new("staker")));
    venues.insert("dex".to_string(), Arc::new(SimVenue::new("dex")));
    venues.insert("perp".to_string(), Arc::new(SimVenue::new("perp")));
    Engine::new(h.ports.clone(), venues, h.config.clone(), cancel).unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_leveraged_staking_run_end_to_end() {
    init_logging();
    let h = harness(5);
    let run_id = h.config.correlation_id;
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let report = engine(&h, cancel_rx).run().await;

    assert!(report.succeeded());
    assert!(!report.cancelled);
    assert_eq!(report.steps_completed, 5);
    assert!(report.reconciliation_failures.is_empty());
    assert!(report.data_unavailable.is_empty());

    // Every step logged, keyed by (run, step_order)
    let records = h.logger.run_records(run_id);
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.step_order, i as u64);
        assert_eq!(record.correlation_id, run_id);
    }

    // The flat book enters the loop exactly once, on the first step
    let first = &records[0];
    assert_eq!(first.instructions.len(), 1);
    assert_eq!(first.instructions[0].kind, InstructionKind::EnterLeverage);
    assert_eq!(first.executions.len(), 1);
    assert!(first.executions[0].success);
    for record in &records[1..] {
        assert!(record.instructions.is_empty(), "steady state must not churn");
    }

    // Realized loop deltas landed in the book: at target LTV 0.5 the
    // 10000 USDC of equity becomes 20000 collateral and 10000 debt,
    // at 2000 per token
    let lender = Venue::new("aave");
    let wallet = Venue::new("wallet");
    assert_eq!(h.book.amount(&lender, &Token::new("stWETH")), dec!(10));
    assert_eq!(h.book.amount(&lender, &Token::new("WETH")), dec!(5));
    assert_eq!(h.book.amount(&wallet, &Token::new("USDC")), dec!(0));

    // Staking accrual shows up as positive P&L, small over four hours
    assert!(report.final_equity > dec!(10000));
    assert!(report.cumulative_pnl > dec!(0));
    assert!(report.cumulative_pnl < dec!(1));

    // Later steps attribute the gain to staking, and it reconciles
    let last = records.last().unwrap();
    assert!(last.pnl.attribution.cumulative.staking_pnl > dec!(0));
    assert!(last.pnl.reconciliation.passed);
}

#[tokio::test]
async fn test_idle_token_staked_once_in_native_units() {
    init_logging();
    let wallet = Venue::new("wallet");
    let h = scenario(
        3,
        StrategyMode::StakingOnly {
            min_idle_value: dec!(100),
        },
        vec![
            Position::new(
                wallet.clone(),
                InstrumentClass::BaseToken,
                Token::new("USDC"),
                dec!(1000),
            ),
            Position::new(
                wallet.clone(),
                InstrumentClass::BaseToken,
                Token::new("ETH"),
                dec!(3),
            ),
        ],
    );
    let run_id = h.config.correlation_id;
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let report = engine(&h, cancel_rx).run().await;

    assert!(report.succeeded());
    assert_eq!(report.steps_completed, 3);
    assert!(report.reconciliation_failures.is_empty());

    let records = h.logger.run_records(run_id);
    let first = &records[0];
    assert_eq!(first.instructions.len(), 1);
    assert_eq!(first.instructions[0].kind, InstructionKind::Rebalance);
    assert_eq!(first.instructions[0].actions[0].name, "stake");
    assert!(first.executions[0].success);
    for record in &records[1..] {
        assert!(
            record.instructions.is_empty(),
            "a staked balance must not be staked again"
        );
    }

    // The 3 idle ETH (6000 USDC) left the wallet in native units and
    // arrived as 3 stWETH; the share-class cash was not touched
    let lender = Venue::new("aave");
    assert_eq!(h.book.amount(&wallet, &Token::new("ETH")), dec!(0));
    assert_eq!(h.book.amount(&wallet, &Token::new("USDC")), dec!(1000));
    assert_eq!(h.book.amount(&lender, &Token::new("stWETH")), dec!(3));
}

#[tokio::test]
async fn test_incidental_balance_swept_once_and_capped_at_holdings() {
    init_logging();
    let wallet = Venue::new("wallet");
    let h = scenario(
        3,
        // Idle threshold high enough that nothing stakes; the ARB reward
        // balance is above the sweep threshold
        StrategyMode::StakingOnly {
            min_idle_value: dec!(1000000),
        },
        vec![
            Position::new(
                wallet.clone(),
                InstrumentClass::BaseToken,
                Token::new("USDC"),
                dec!(2000),
            ),
            Position::new(
                wallet.clone(),
                InstrumentClass::BaseToken,
                Token::new("ARB"),
                dec!(500),
            ),
        ],
    );
    let run_id = h.config.correlation_id;
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let report = engine(&h, cancel_rx).run().await;

    assert!(report.succeeded());
    assert_eq!(report.steps_completed, 3);
    assert!(report.reconciliation_failures.is_empty());

    let records = h.logger.run_records(run_id);
    let first = &records[0];
    assert_eq!(first.instructions.len(), 1);
    assert_eq!(
        first.instructions[0].kind,
        InstructionKind::UnwrapAndLiquidate
    );
    assert!(first.executions[0].success);
    for record in &records[1..] {
        assert!(
            record.instructions.is_empty(),
            "a swept balance must not be swept again"
        );
    }

    // 500 ARB liquidated into 1000 USDC exactly once; the balance ends
    // at zero, never negative
    assert_eq!(h.book.amount(&wallet, &Token::new("ARB")), dec!(0));
    assert_eq!(h.book.amount(&wallet, &Token::new("USDC")), dec!(3000));
    assert_eq!(report.final_equity, dec!(3000));
}

#[tokio::test]
async fn test_basis_mode_enters_once_and_holds_the_hedge() {
    init_logging();
    let wallet = Venue::new("wallet");
    let h = scenario(
        4,
        StrategyMode::BasisTrading {
            delta_drift_threshold: dec!(0.05),
            min_funding_rate: dec!(0.005),
            margin_reserve: dec!(0.2),
        },
        vec![Position::new(
            wallet.clone(),
            InstrumentClass::BaseToken,
            Token::new("USDC"),
            dec!(10000),
        )],
    );
    let run_id = h.config.correlation_id;
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let report = engine(&h, cancel_rx).run().await;

    assert!(report.succeeded());
    assert_eq!(report.steps_completed, 4);
    assert!(report.reconciliation_failures.is_empty());
    assert!(report.data_unavailable.is_empty());

    let records = h.logger.run_records(run_id);
    let first = &records[0];
    assert_eq!(first.instructions.len(), 1);
    assert_eq!(first.instructions[0].kind, InstructionKind::EnterLeverage);
    assert_eq!(first.instructions[0].actions.len(), 2);
    assert!(first.executions[0].success);
    for record in &records[1..] {
        assert!(
            record.instructions.is_empty(),
            "an open hedge must not re-enter"
        );
    }

    // 8000 staked, 2000 posted as margin, 4 ETH-PERP short
    let lender = Venue::new("aave");
    let perp = Venue::new("hyperliquid");
    assert_eq!(h.book.amount(&wallet, &Token::new("USDC")), dec!(0));
    assert_eq!(h.book.amount(&lender, &Token::new("stWETH")), dec!(4));
    assert_eq!(h.book.amount(&perp, &Token::new("USDC")), dec!(2000));
    assert_eq!(h.book.amount(&perp, &Token::new("ETH-PERP")), dec!(-4));

    // The short is visible to risk: margin backed at 2000/8000 and safe
    let later = &records[2];
    assert_eq!(later.exposure.derivatives().count(), 1);
    assert_eq!(later.risk.margin.level, RiskLevel::Safe);
    assert_eq!(later.risk.margin.worst_ratio, Some(dec!(0.25)));

    // Staking carry accrues on the spot leg and the methods agree
    let last = records.last().unwrap();
    assert!(last.pnl.attribution.cumulative.staking_pnl > dec!(0));
    assert!(last.pnl.reconciliation.passed);
}

#[tokio::test]
async fn test_cancellation_between_steps() {
    let h = harness(100);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let report = engine(&h, cancel_rx).run().await;

    assert!(report.cancelled);
    assert!(report.succeeded());
    assert_eq!(report.steps_completed, 0);
    assert!(h.logger.is_empty());
}

#[tokio::test]
async fn test_engine_rejects_incomplete_risk_config() {
    let mut h = harness(1);
    h.config.risk.drift_critical = None;
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let venues = HashMap::new();
    let Err(err) = Engine::new(h.ports, venues, h.config, cancel_rx) else {
        panic!("incomplete risk config must be rejected");
    };
    assert!(matches!(
        err,
        talos_ports::PipelineError::Configuration(_)
    ));
}
