//! Equity Calculator
//!
//! Stateless reduction of positions into assets minus debts. Derivatives
//! are tracked separately and never netted into equity - only capital
//! actually at risk as collateral or debt counts toward NAV.
//!
//! This is the one deliberate fail-soft stage in the pipeline: equity is
//! read on a hot path where a crash would halt the whole run, so any
//! internal error yields a zero-valued breakdown and an error log instead
//! of propagating. Do not copy this policy into other stages.

use log::{error, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use talos_core::{EquityBreakdown, Position, Timestamp, Token, ValuedPosition};
use talos_ports::{InstrumentKind, PipelineResult, PriceProvider};

/// Reduces a position set into an `EquityBreakdown`
pub struct EquityCalculator {
    prices: Arc<dyn PriceProvider>,
}

impl EquityCalculator {
    pub fn new(prices: Arc<dyn PriceProvider>) -> Self {
        Self { prices }
    }

    /// Walk every nonzero position once and total assets minus debts.
    ///
    /// Fail-soft: never returns an error - see the module docs.
    pub async fn calculate_equity(
        &self,
        positions: &[Position],
        share_class: &Token,
        timestamp: Timestamp,
    ) -> EquityBreakdown {
        match self.try_calculate(positions, share_class, timestamp).await {
            Ok(breakdown) => breakdown,
            Err(e) => {
                error!("[EQUITY] Calculation failed, returning zero breakdown: {e}");
                EquityBreakdown::zeroed(timestamp)
            }
        }
    }

    async fn try_calculate(
        &self,
        positions: &[Position],
        share_class: &Token,
        timestamp: Timestamp,
    ) -> PipelineResult<EquityBreakdown> {
        let mut assets: Vec<ValuedPosition> = Vec::new();
        let mut debts: Vec<ValuedPosition> = Vec::new();
        let mut derivatives: Vec<ValuedPosition> = Vec::new();

        for pos in positions.iter().filter(|p| !p.is_zero()) {
            let kind = self.prices.instrument_type(&pos.venue, &pos.token);
            if kind == InstrumentKind::Unknown {
                warn!(
                    "[EQUITY] Unknown classification for {}/{} - skipped",
                    pos.venue, pos.token
                );
                continue;
            }

            let rate = self
                .prices
                .rate(&pos.token, share_class, timestamp)
                .await?;
            let value = (pos.amount * rate).abs();
            let valued = ValuedPosition {
                venue: pos.venue.clone(),
                token: pos.token.clone(),
                amount: pos.amount,
                value,
            };

            match kind {
                InstrumentKind::Asset => assets.push(valued),
                InstrumentKind::Debt => debts.push(valued),
                InstrumentKind::Derivative => derivatives.push(valued),
                InstrumentKind::Unknown => unreachable!("filtered above"),
            }
        }

        let total_assets: Decimal = assets.iter().map(|p| p.value).sum();
        let total_debts: Decimal = debts.iter().map(|p| p.value).sum();

        Ok(EquityBreakdown {
            timestamp,
            total_equity: total_assets - total_debts,
            total_assets,
            total_debts,
            asset_positions: assets,
            debt_positions: debts,
            excluded_derivatives: derivatives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use talos_core::{InstrumentClass, Marks, Rate, Venue};
    use talos_ports::PipelineError;

    struct FakePrices {
        rates: HashMap<String, Decimal>,
        kinds: HashMap<String, InstrumentKind>,
        fail_hard: bool,
    }

    impl FakePrices {
        fn new() -> Self {
            Self {
                rates: HashMap::new(),
                kinds: HashMap::new(),
                fail_hard: false,
            }
        }

        fn with(mut self, token: &str, kind: InstrumentKind, rate: Decimal) -> Self {
            self.rates.insert(token.to_string(), rate);
            self.kinds.insert(token.to_string(), kind);
            self
        }
    }

    #[async_trait]
    impl PriceProvider for FakePrices {
        async fn rate(
            &self,
            token: &Token,
            _target: &Token,
            _timestamp: Timestamp,
        ) -> PipelineResult<Rate> {
            if self.fail_hard {
                return Err(PipelineError::Fatal {
                    stage: "prices".to_string(),
                    reason: "provider down".to_string(),
                });
            }
            self.rates
                .get(token.as_str())
                .copied()
                .ok_or_else(|| PipelineError::DataUnavailable(token.to_string()))
        }

        async fn marks(
            &self,
            token: &Token,
            _share_class: &Token,
            _timestamp: Timestamp,
        ) -> PipelineResult<Marks> {
            self.rates
                .get(token.as_str())
                .map(|r| Marks::flat(*r))
                .ok_or_else(|| PipelineError::DataUnavailable(token.to_string()))
        }

        fn instrument_type(&self, _venue: &Venue, token: &Token) -> InstrumentKind {
            self.kinds
                .get(token.as_str())
                .copied()
                .unwrap_or(InstrumentKind::Unknown)
        }
    }

    fn positions() -> Vec<Position> {
        vec![
            Position::new(
                Venue::new("aave"),
                InstrumentClass::YieldToken,
                Token::new("aWETH"),
                dec!(10),
            ),
            Position::new(
                Venue::new("aave"),
                InstrumentClass::DebtToken,
                Token::new("debtUSDC"),
                dec!(8000),
            ),
            Position::derivative(
                Venue::new("perp-dex"),
                Token::new("ETH-PERP"),
                dec!(-5),
                dec!(2000),
            ),
        ]
    }

    fn provider() -> FakePrices {
        FakePrices::new()
            .with("aWETH", InstrumentKind::Asset, dec!(2000))
            .with("debtUSDC", InstrumentKind::Debt, dec!(1))
            .with("ETH-PERP", InstrumentKind::Derivative, dec!(2000))
    }

    #[tokio::test]
    async fn test_equity_is_assets_minus_debts() {
        let calc = EquityCalculator::new(Arc::new(provider()));
        let b = calc
            .calculate_equity(&positions(), &Token::new("USDC"), Utc::now())
            .await;

        assert_eq!(b.total_assets, dec!(20000));
        assert_eq!(b.total_debts, dec!(8000));
        assert_eq!(b.total_equity, dec!(12000));
        assert!(b.invariant_holds());
    }

    #[tokio::test]
    async fn test_derivatives_excluded_not_netted() {
        let calc = EquityCalculator::new(Arc::new(provider()));
        let b = calc
            .calculate_equity(&positions(), &Token::new("USDC"), Utc::now())
            .await;

        // The short perp is worth 10000 notional but contributes nothing
        assert_eq!(b.excluded_derivatives.len(), 1);
        assert_eq!(b.excluded_derivatives[0].value, dec!(10000));
        assert_eq!(b.total_equity, dec!(12000));
    }

    #[tokio::test]
    async fn test_fail_soft_returns_zero_breakdown() {
        let mut prices = provider();
        prices.fail_hard = true;
        let calc = EquityCalculator::new(Arc::new(prices));
        let b = calc
            .calculate_equity(&positions(), &Token::new("USDC"), Utc::now())
            .await;

        assert_eq!(b.total_equity, Decimal::ZERO);
        assert!(b.asset_positions.is_empty());
        assert!(b.invariant_holds());
    }

    #[tokio::test]
    async fn test_zero_positions_skipped() {
        let calc = EquityCalculator::new(Arc::new(provider()));
        let mut pos = positions();
        pos.push(Position::new(
            Venue::new("wallet"),
            InstrumentClass::BaseToken,
            Token::new("aWETH"),
            Decimal::ZERO,
        ));
        let b = calc
            .calculate_equity(&pos, &Token::new("USDC"), Utc::now())
            .await;

        // Same totals as without the zero position
        assert_eq!(b.total_equity, dec!(12000));
        assert_eq!(b.asset_positions.len(), 1);
    }
}
