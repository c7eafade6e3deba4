//! Simulated collaborators
//!
//! Everything the engine talks to through a port, rendered as an
//! in-process fake:
//! - `SimPositionBook`: mutable position store behind `SnapshotProvider`,
//!   with a `PositionSink` side for feeding execution deltas back
//! - `SimPriceProvider`: deterministic prices and marks as a pure function
//!   of the timestamp, so two runs over the same config agree exactly
//! - `FlatGasProvider`: constant per-operation gas
//! - `RecordingLogger`: append-only dashmap of step records
//! - `SimVenue`: execution venue that acknowledges every action
//! - `SteppedClock` / `SystemClock`: clock port implementations

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::RwLock;
use talos_core::{
    InstrumentClass, Marks, Position, Rate, StepRecord, Timestamp, Token, Venue,
};
use talos_ports::{
    Clock, CostProvider, EventLogger, ExecutionVenue, InstrumentKind, PipelineError,
    PipelineResult, PriceProvider, SnapshotProvider,
};
use uuid::Uuid;

/// Write side of the simulated position book. The engine feeds realized
/// execution deltas back through this so the next snapshot reflects them.
pub trait PositionSink: Send + Sync {
    /// Add `delta` (signed, native units) to the position at
    /// `(venue, token)`, creating it with `class` if absent.
    fn apply(&self, venue: &Venue, class: InstrumentClass, token: &Token, delta: Decimal);
}

/// In-memory position store keyed by `(venue, token)`
#[derive(Default)]
pub struct SimPositionBook {
    positions: RwLock<HashMap<(Venue, Token), Position>>,
}

impl SimPositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions(positions: Vec<Position>) -> Self {
        let book = Self::new();
        for pos in &positions {
            book.apply(&pos.venue, pos.class, &pos.token, pos.amount);
        }
        book
    }

    pub fn amount(&self, venue: &Venue, token: &Token) -> Decimal {
        self.positions
            .read()
            .expect("position book lock poisoned")
            .get(&(venue.clone(), token.clone()))
            .map(|p| p.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

impl PositionSink for SimPositionBook {
    fn apply(&self, venue: &Venue, class: InstrumentClass, token: &Token, delta: Decimal) {
        let mut positions = self.positions.write().expect("position book lock poisoned");
        positions
            .entry((venue.clone(), token.clone()))
            .and_modify(|p| p.amount += delta)
            .or_insert_with(|| Position::new(venue.clone(), class, token.clone(), delta));
    }
}

#[async_trait]
impl SnapshotProvider for SimPositionBook {
    async fn snapshot(&self, _timestamp: Timestamp) -> PipelineResult<Vec<Position>> {
        let positions = self.positions.read().expect("position book lock poisoned");
        Ok(positions.values().cloned().collect())
    }
}

/// Price/accrual profile of one token, all figures relative to genesis
#[derive(Debug, Clone)]
pub struct TokenProfile {
    /// Underlying spot price in the share class at genesis
    pub spot: Decimal,
    /// Relative spot drift per day
    pub drift_per_day: Decimal,
    /// Annualized supply-index accrual
    pub supply_apr: Decimal,
    /// Annualized borrow-index accrual
    pub borrow_apr: Decimal,
    /// Annualized staking-ratio accrual
    pub staking_apr: Decimal,
    /// Constant funding rate (derivatives)
    pub funding_rate: Decimal,
}

impl TokenProfile {
    /// A token that neither drifts nor accrues
    pub fn flat(spot: Decimal) -> Self {
        Self {
            spot,
            drift_per_day: Decimal::ZERO,
            supply_apr: Decimal::ZERO,
            borrow_apr: Decimal::ZERO,
            staking_apr: Decimal::ZERO,
            funding_rate: Decimal::ZERO,
        }
    }
}

/// Deterministic price provider: marks are a pure function of the
/// timestamp, linear in time since genesis.
///
/// Conversion rates and marks agree by construction: a token's rate into
/// the share class equals its spot times every accrual index, which is
/// exactly what the exposure calculator computes from the marks. Balance
/// and attribution P&L therefore reconcile when attribution is complete.
pub struct SimPriceProvider {
    genesis: Timestamp,
    share_class: Token,
    profiles: HashMap<Token, TokenProfile>,
    registry: HashMap<(Venue, Token), InstrumentKind>,
}

const DAYS_PER_YEAR: Decimal = dec!(365);
const SECONDS_PER_DAY: Decimal = dec!(86400);

impl SimPriceProvider {
    pub fn new(
        genesis: Timestamp,
        share_class: Token,
        profiles: HashMap<Token, TokenProfile>,
        registry: HashMap<(Venue, Token), InstrumentKind>,
    ) -> Self {
        Self {
            genesis,
            share_class,
            profiles,
            registry,
        }
    }

    fn days_since_genesis(&self, timestamp: Timestamp) -> Decimal {
        let seconds = (timestamp - self.genesis).num_seconds();
        Decimal::from(seconds) / SECONDS_PER_DAY
    }

    fn marks_at(&self, token: &Token, timestamp: Timestamp) -> PipelineResult<Marks> {
        if *token == self.share_class {
            return Ok(Marks::flat(Decimal::ONE));
        }
        let profile = self.profiles.get(token).ok_or_else(|| {
            PipelineError::DataUnavailable(format!("no price profile for {token}"))
        })?;
        let days = self.days_since_genesis(timestamp);
        let years = days / DAYS_PER_YEAR;
        Ok(Marks {
            spot_price: profile.spot * (Decimal::ONE + profile.drift_per_day * days),
            supply_index: Decimal::ONE + profile.supply_apr * years,
            borrow_index: Decimal::ONE + profile.borrow_apr * years,
            staking_ratio: Decimal::ONE + profile.staking_apr * years,
            funding_rate: profile.funding_rate,
        })
    }

    /// Full share-class value of one token unit: spot times every index
    fn unit_value(&self, token: &Token, timestamp: Timestamp) -> PipelineResult<Decimal> {
        let m = self.marks_at(token, timestamp)?;
        Ok(m.spot_price * m.supply_index * m.borrow_index * m.staking_ratio)
    }
}

#[async_trait]
impl PriceProvider for SimPriceProvider {
    async fn rate(
        &self,
        token: &Token,
        target: &Token,
        timestamp: Timestamp,
    ) -> PipelineResult<Rate> {
        if token == target {
            return Ok(Decimal::ONE);
        }
        Ok(self.unit_value(token, timestamp)? / self.unit_value(target, timestamp)?)
    }

    async fn marks(
        &self,
        token: &Token,
        _share_class: &Token,
        timestamp: Timestamp,
    ) -> PipelineResult<Marks> {
        self.marks_at(token, timestamp)
    }

    fn instrument_type(&self, venue: &Venue, token: &Token) -> InstrumentKind {
        self.registry
            .get(&(venue.clone(), token.clone()))
            .copied()
            .unwrap_or(InstrumentKind::Unknown)
    }
}

/// Constant gas per operation, native units
pub struct FlatGasProvider(pub Decimal);

#[async_trait]
impl CostProvider for FlatGasProvider {
    async fn gas_cost(&self, _operation: &str, _timestamp: Timestamp) -> PipelineResult<Decimal> {
        Ok(self.0)
    }
}

/// Append-only step-record store keyed by `(correlation_id, step_order)`
#[derive(Default)]
pub struct RecordingLogger {
    records: DashMap<(Uuid, u64), StepRecord>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, correlation_id: Uuid, step_order: u64) -> Option<StepRecord> {
        self.records
            .get(&(correlation_id, step_order))
            .map(|r| r.clone())
    }

    /// All records of one run, ordered by step
    pub fn run_records(&self, correlation_id: Uuid) -> Vec<StepRecord> {
        let mut records: Vec<StepRecord> = self
            .records
            .iter()
            .filter(|e| e.key().0 == correlation_id)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by_key(|r| r.step_order);
        records
    }
}

impl EventLogger for RecordingLogger {
    fn append(&self, record: StepRecord) {
        self.records
            .insert((record.correlation_id, record.step_order), record);
    }
}

/// Venue that acknowledges every submitted action
pub struct SimVenue {
    name: String,
}

impl SimVenue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ExecutionVenue for SimVenue {
    async fn submit(&self, action: &talos_core::Action) -> PipelineResult<String> {
        Ok(format!("{}: {} simulated", self.name, action.name))
    }
}

/// Simulated clock: starts at genesis and advances one fixed interval
/// per tick. Prices and accrual read off it are a pure function of how
/// many steps have run.
pub struct SteppedClock {
    current: RwLock<Timestamp>,
    interval: chrono::Duration,
}

impl SteppedClock {
    pub fn new(genesis: Timestamp, interval: chrono::Duration) -> Self {
        Self {
            current: RwLock::new(genesis),
            interval,
        }
    }
}

impl Clock for SteppedClock {
    fn now(&self) -> Timestamp {
        *self.current.read().expect("clock lock poisoned")
    }

    fn tick(&self) {
        let mut current = self.current.write().expect("clock lock poisoned");
        *current += self.interval;
    }
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
