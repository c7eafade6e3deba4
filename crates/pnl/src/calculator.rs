use chrono::{Duration, Timelike};
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use talos_core::{
    AttributionComponents, AttributionPnl, BalancePnl, EquityBreakdown, ExposureEntry,
    ExposureSnapshot, InstrumentClass, PnlResult, Reconciliation, Timestamp,
};

/// P&L calculator configuration
#[derive(Debug, Clone)]
pub struct PnlConfig {
    /// Reconciliation tolerance as an absolute share-class amount.
    /// The percent-of-capital view is always reported alongside.
    pub tolerance: Decimal,
    /// UTC hours at which perp funding settles
    pub funding_hours: Vec<u32>,
}

impl Default for PnlConfig {
    fn default() -> Self {
        Self {
            tolerance: dec!(1),
            funding_hours: vec![0, 8, 16],
        }
    }
}

/// Run-scoped P&L state: owned by exactly one run instance and threaded
/// through each step call, so independent runs never share an accumulator.
///
/// `initial_value` is set on the first step and immutable thereafter; the
/// cumulative attribution components only ever accumulate.
pub struct PnlCalculator {
    config: PnlConfig,
    initial_value: Option<Decimal>,
    cumulative: AttributionComponents,
}

impl PnlCalculator {
    pub fn new(config: PnlConfig) -> Self {
        Self {
            config,
            initial_value: None,
            cumulative: AttributionComponents::default(),
        }
    }

    /// First-seen portfolio value, once a step has run
    pub fn initial_value(&self) -> Option<Decimal> {
        self.initial_value
    }

    /// Compute both P&L methods for the interval between `previous` and
    /// `current`, and reconcile them. `previous` is `None` on the first
    /// step, which contributes zero attribution.
    pub fn step(
        &mut self,
        previous: Option<&ExposureSnapshot>,
        current: &ExposureSnapshot,
        equity: &EquityBreakdown,
    ) -> PnlResult {
        let current_value = equity.total_equity;
        // Set exactly once; later steps must not overwrite it
        let initial_value = *self.initial_value.get_or_insert(current_value);

        let pnl_cumulative = current_value - initial_value;
        let balance = BalancePnl {
            initial_value,
            current_value,
            pnl_cumulative,
            pnl_pct: pct_of(pnl_cumulative, initial_value),
        };

        let step = match previous {
            Some(prev) => self.attribute_interval(prev, current),
            None => AttributionComponents::default(),
        };
        self.cumulative.accumulate(&step);
        let attribution = AttributionPnl {
            step,
            pnl_step: step.total(),
            cumulative: self.cumulative,
            pnl_cumulative: self.cumulative.total(),
        };

        let difference = balance.pnl_cumulative - attribution.pnl_cumulative;
        let passed = difference.abs() <= self.config.tolerance;
        if !passed {
            warn!(
                "[PNL] Reconciliation mismatch: balance {} vs attribution {} (diff {})",
                balance.pnl_cumulative, attribution.pnl_cumulative, difference
            );
        }
        let reconciliation = Reconciliation {
            balance_pnl: balance.pnl_cumulative,
            attribution_pnl: attribution.pnl_cumulative,
            difference,
            tolerance: self.config.tolerance,
            passed,
            diff_pct_of_capital: pct_of(difference.abs(), initial_value),
        };

        PnlResult {
            balance,
            attribution,
            reconciliation,
        }
    }

    /// Attribution for one interval, read entirely from the two snapshots'
    /// stored marks - never re-derived from raw balances.
    fn attribute_interval(
        &self,
        prev: &ExposureSnapshot,
        current: &ExposureSnapshot,
    ) -> AttributionComponents {
        let mut c = AttributionComponents::default();
        let funding_due = self.crosses_settlement(prev.timestamp, current.timestamp);

        for p in &prev.entries {
            let Some(cur) = current.entry(&p.venue, &p.token) else {
                // Position closed mid-interval; the realized part shows up
                // in the balance method and in the reconciliation diff
                debug!("[PNL] {}/{} closed during interval", p.venue, p.token);
                continue;
            };
            let spot_change = cur.marks.spot_price - p.marks.spot_price;

            match p.class {
                InstrumentClass::BaseToken => {
                    c.price_change_pnl += p.exposure_base * spot_change;
                }
                InstrumentClass::YieldToken => {
                    c.supply_pnl += supply_growth(p, cur);
                    c.staking_pnl += staking_growth(p, cur);
                    c.price_change_pnl += p.exposure_base * spot_change;
                }
                InstrumentClass::DebtToken => {
                    c.borrow_cost += p.native_amount.abs()
                        * (cur.marks.borrow_index - p.marks.borrow_index)
                        * cur.marks.spot_price;
                    // A dearer borrowed token is a larger liability
                    c.price_change_pnl -= p.exposure_base.abs() * spot_change;
                }
                InstrumentClass::Derivative => {
                    c.delta_pnl += p.exposure_base * spot_change;
                    if funding_due {
                        // Longs pay positive funding, shorts receive it
                        c.funding_pnl -= p.exposure_base
                            * cur.marks.funding_rate
                            * cur.marks.spot_price;
                    }
                }
            }
        }

        c
    }

    /// Does `(prev, current]` cross a configured funding-settlement hour?
    fn crosses_settlement(&self, prev: Timestamp, current: Timestamp) -> bool {
        if current <= prev {
            return false;
        }
        // Settlement instants are exact UTC hours; a span of a day or more
        // always crosses one (assuming at least one hour is configured)
        if current - prev >= Duration::days(1) {
            return !self.config.funding_hours.is_empty();
        }
        let mut t = prev
            .date_naive()
            .and_hms_opt(prev.hour(), 0, 0)
            .map(|n| n.and_utc())
            .unwrap_or(prev);
        while t <= current {
            if t > prev && self.config.funding_hours.contains(&t.hour()) {
                return true;
            }
            t += Duration::hours(1);
        }
        false
    }
}

/// Supply-index growth of a yield entry, valued at the current spot
fn supply_growth(prev: &ExposureEntry, cur: &ExposureEntry) -> Decimal {
    prev.native_amount
        * prev.marks.staking_ratio
        * (cur.marks.supply_index - prev.marks.supply_index)
        * cur.marks.spot_price
}

/// Staking-ratio growth of a yield entry, valued at the current spot
fn staking_growth(prev: &ExposureEntry, cur: &ExposureEntry) -> Decimal {
    prev.native_amount
        * cur.marks.supply_index
        * (cur.marks.staking_ratio - prev.marks.staking_ratio)
        * cur.marks.spot_price
}

fn pct_of(amount: Decimal, capital: Decimal) -> Decimal {
    if capital.is_zero() {
        Decimal::ZERO
    } else {
        amount / capital
    }
}
