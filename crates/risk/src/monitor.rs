//! Risk Monitor
//!
//! Each dimension is computed independently, then combined by maximum
//! severity. Alerts accumulate within the step; the whole assessment is
//! replaced next step, never mutated.

use log::warn;
use rust_decimal::Decimal;
use talos_core::{
    CollateralRisk, DeltaRisk, EquityBreakdown, ExposureSnapshot, MarginRisk, RiskAlert,
    RiskAssessment, RiskDimension, RiskLevel, VenueMargin,
};
use talos_ports::PipelineResult;

use crate::config::{RiskMonitorConfig, RiskThresholds};

/// Evaluates collateral, margin and delta risk over an exposure snapshot
pub struct RiskMonitor {
    thresholds: RiskThresholds,
}

impl RiskMonitor {
    /// Fail-fast construction: a missing threshold key errors here, before
    /// any capital-affecting decision can consult the monitor.
    pub fn new(config: RiskMonitorConfig) -> PipelineResult<Self> {
        Ok(Self {
            thresholds: config.validate()?,
        })
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Assess one step's exposure and equity view
    pub fn assess(
        &self,
        exposure: &ExposureSnapshot,
        equity: &EquityBreakdown,
    ) -> PipelineResult<RiskAssessment> {
        let mut alerts: Vec<RiskAlert> = Vec::new();

        let collateral = self.collateral_risk(equity, &mut alerts);
        let margin = self.margin_risk(exposure, &mut alerts)?;
        let delta = self.delta_risk(exposure, &mut alerts);

        let level = collateral.level.max(margin.level).max(delta.level);
        if level >= RiskLevel::Warning {
            warn!(
                "[RISK] Level {:?} (collateral {:?}, margin {:?}, delta {:?})",
                level, collateral.level, margin.level, delta.level
            );
        }

        Ok(RiskAssessment {
            timestamp: exposure.timestamp,
            level,
            collateral,
            margin,
            delta,
            alerts,
        })
    }

    fn collateral_risk(
        &self,
        equity: &EquityBreakdown,
        alerts: &mut Vec<RiskAlert>,
    ) -> CollateralRisk {
        let debt = equity.total_debts;
        let collateral = equity.total_assets;

        let (ltv, health_factor) = if debt.is_zero() {
            // No debt: nothing to liquidate
            (Decimal::ZERO, Decimal::MAX)
        } else if collateral.is_zero() {
            // Debt with no collateral: already past any threshold
            (Decimal::MAX, Decimal::ZERO)
        } else {
            (
                debt / collateral,
                collateral * self.thresholds.liquidation_threshold / debt,
            )
        };

        let level = if ltv >= self.thresholds.ltv_critical {
            RiskLevel::Critical
        } else if ltv >= self.thresholds.ltv_warning {
            RiskLevel::Warning
        } else {
            RiskLevel::Safe
        };

        if level > RiskLevel::Safe {
            alerts.push(RiskAlert {
                dimension: RiskDimension::Collateral,
                level,
                message: format!("LTV {ltv:.4} (health factor {health_factor:.4})"),
            });
        }

        CollateralRisk {
            ltv,
            health_factor,
            level,
        }
    }

    fn margin_risk(
        &self,
        exposure: &ExposureSnapshot,
        alerts: &mut Vec<RiskAlert>,
    ) -> PipelineResult<MarginRisk> {
        let mut per_venue: Vec<VenueMargin> = Vec::new();

        for venue in exposure.derivative_venues() {
            let notional = exposure.notional_at_venue(&venue);
            if notional.is_zero() {
                continue;
            }
            let margin_ratio = exposure.equity_at_venue(&venue) / notional;
            let limits = self.thresholds.margin_for(&venue)?;

            let level = if margin_ratio <= limits.critical {
                RiskLevel::Critical
            } else if margin_ratio <= limits.warning {
                RiskLevel::Warning
            } else {
                RiskLevel::Safe
            };

            if level > RiskLevel::Safe {
                alerts.push(RiskAlert {
                    dimension: RiskDimension::Margin,
                    level,
                    message: format!("{venue} margin ratio {margin_ratio:.4}"),
                });
            }

            per_venue.push(VenueMargin {
                venue,
                margin_ratio,
                notional,
                level,
            });
        }

        // Overall margin risk is the worst (lowest-ratio) venue
        let worst = per_venue
            .iter()
            .min_by(|a, b| a.margin_ratio.cmp(&b.margin_ratio));
        let (worst_venue, worst_ratio) =
            worst.map_or((None, None), |v| (Some(v.venue.clone()), Some(v.margin_ratio)));
        let level = per_venue
            .iter()
            .map(|v| v.level)
            .max()
            .unwrap_or(RiskLevel::Safe);

        Ok(MarginRisk {
            per_venue,
            worst_venue,
            worst_ratio,
            level,
        })
    }

    fn delta_risk(&self, exposure: &ExposureSnapshot, alerts: &mut Vec<RiskAlert>) -> DeltaRisk {
        let drift_ratio = if exposure.total_value.is_zero() {
            Decimal::ZERO
        } else {
            exposure.net_delta.abs() / exposure.total_value
        };

        let level = if drift_ratio >= self.thresholds.drift_critical {
            RiskLevel::Critical
        } else if drift_ratio >= self.thresholds.drift_warning {
            RiskLevel::Warning
        } else {
            RiskLevel::Safe
        };

        if level > RiskLevel::Safe {
            alerts.push(RiskAlert {
                dimension: RiskDimension::Delta,
                level,
                message: format!("delta drift {drift_ratio:.4}"),
            });
        }

        DeltaRisk {
            net_delta: exposure.net_delta,
            drift_ratio,
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarginThresholds;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use talos_core::{ExposureEntry, InstrumentClass, Marks, Token, Venue};

    fn monitor() -> RiskMonitor {
        let mut venue_margins = HashMap::new();
        venue_margins.insert(
            Venue::new("perp-dex"),
            MarginThresholds {
                warning: dec!(0.15),
                critical: dec!(0.08),
            },
        );
        RiskMonitor::new(RiskMonitorConfig {
            ltv_warning: Some(dec!(0.75)),
            ltv_critical: Some(dec!(0.85)),
            liquidation_threshold: Some(dec!(0.95)),
            venue_margins,
            drift_warning: Some(dec!(0.02)),
            drift_critical: Some(dec!(0.05)),
        })
        .unwrap()
    }

    fn entry(venue: &str, token: &str, class: InstrumentClass, share: Decimal) -> ExposureEntry {
        ExposureEntry {
            venue: Venue::new(venue),
            token: Token::new(token),
            class,
            native_amount: share,
            exposure_base: share,
            exposure_share_class: share,
            conversion_rate: Decimal::ONE,
            marks: Marks::flat(Decimal::ONE),
        }
    }

    fn snapshot(entries: Vec<ExposureEntry>, net_delta: Decimal) -> ExposureSnapshot {
        let total_value = entries.iter().map(|e| e.exposure_share_class.abs()).sum();
        ExposureSnapshot {
            timestamp: Utc::now(),
            share_class: Token::new("USDC"),
            entries,
            excluded: Vec::new(),
            net_delta,
            total_value,
        }
    }

    fn equity(assets: Decimal, debts: Decimal) -> EquityBreakdown {
        let mut b = EquityBreakdown::zeroed(Utc::now());
        b.total_assets = assets;
        b.total_debts = debts;
        b.total_equity = assets - debts;
        b
    }

    #[test]
    fn test_missing_threshold_fails_at_construction() {
        let Err(err) = RiskMonitor::new(RiskMonitorConfig::default()) else {
            panic!("empty config must be rejected");
        };
        assert!(matches!(err, talos_ports::PipelineError::Configuration(_)));
    }

    #[test]
    fn test_safe_all_dimensions() {
        let m = monitor();
        let snap = snapshot(
            vec![entry("aave", "aWETH", InstrumentClass::YieldToken, dec!(10000))],
            dec!(50),
        );
        let assessment = m.assess(&snap, &equity(dec!(10000), dec!(5000))).unwrap();

        assert_eq!(assessment.level, RiskLevel::Safe);
        assert!(assessment.alerts.is_empty());
        assert_eq!(assessment.collateral.ltv, dec!(0.5));
    }

    #[test]
    fn test_collateral_health_factor() {
        let m = monitor();
        let snap = snapshot(vec![], Decimal::ZERO);
        let assessment = m.assess(&snap, &equity(dec!(10000), dec!(8000))).unwrap();

        // ltv 0.8 -> warning; hf = 10000 * 0.95 / 8000 = 1.1875
        assert_eq!(assessment.collateral.level, RiskLevel::Warning);
        assert_eq!(assessment.collateral.health_factor, dec!(1.1875));
        assert_eq!(assessment.alerts.len(), 1);
    }

    #[test]
    fn test_combined_level_is_max_of_dimensions() {
        let m = monitor();
        // Safe collateral, critical margin: 500 equity vs 10000 notional
        let snap = snapshot(
            vec![
                entry("perp-dex", "USDC", InstrumentClass::BaseToken, dec!(500)),
                entry("perp-dex", "ETH-PERP", InstrumentClass::Derivative, dec!(-10000)),
            ],
            Decimal::ZERO,
        );
        let assessment = m.assess(&snap, &equity(dec!(10000), dec!(1000))).unwrap();

        assert_eq!(assessment.collateral.level, RiskLevel::Safe);
        assert_eq!(assessment.margin.level, RiskLevel::Critical);
        assert_eq!(assessment.level, RiskLevel::Critical);
        // Sub-assessments individually retrievable
        assert_eq!(assessment.margin.worst_venue, Some(Venue::new("perp-dex")));
        assert_eq!(assessment.margin.worst_ratio, Some(dec!(0.05)));
    }

    #[test]
    fn test_delta_drift_levels() {
        let m = monitor();
        let snap = snapshot(
            vec![entry("wallet", "ETH", InstrumentClass::BaseToken, dec!(10000))],
            dec!(300),
        );
        let assessment = m.assess(&snap, &equity(dec!(10000), Decimal::ZERO)).unwrap();

        // 300/10000 = 3% -> warning band
        assert_eq!(assessment.delta.level, RiskLevel::Warning);
        assert_eq!(assessment.delta.drift_ratio, dec!(0.03));
    }

    #[test]
    fn test_unconfigured_derivative_venue_errors() {
        let m = monitor();
        let snap = snapshot(
            vec![
                entry("mystery-dex", "USDC", InstrumentClass::BaseToken, dec!(500)),
                entry("mystery-dex", "ETH-PERP", InstrumentClass::Derivative, dec!(1000)),
            ],
            Decimal::ZERO,
        );
        let err = m.assess(&snap, &equity(dec!(500), Decimal::ZERO)).unwrap_err();
        assert!(matches!(err, talos_ports::PipelineError::Configuration(_)));
    }

    #[test]
    fn test_alerts_accumulate_across_dimensions() {
        let m = monitor();
        let snap = snapshot(
            vec![
                entry("perp-dex", "USDC", InstrumentClass::BaseToken, dec!(1000)),
                entry("perp-dex", "ETH-PERP", InstrumentClass::Derivative, dec!(-10000)),
            ],
            dec!(700),
        );
        let assessment = m.assess(&snap, &equity(dec!(10000), dec!(9000))).unwrap();

        // Collateral critical (ltv 0.9), margin warning (0.1), delta critical
        assert_eq!(assessment.alerts.len(), 3);
        assert_eq!(assessment.level, RiskLevel::Critical);
    }
}
