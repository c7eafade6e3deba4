//! Risk monitor configuration
//!
//! The raw config carries `Option` fields so callers can assemble it from
//! external sources; `validate` turns it into the required thresholds and
//! fails fast naming the first missing key. Thresholds are never defaulted:
//! a misconfigured monitor must be caught at construction, not at first use.

use rust_decimal::Decimal;
use std::collections::HashMap;
use talos_core::Venue;
use talos_ports::{PipelineError, PipelineResult};

/// Margin-ratio thresholds for one derivatives venue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginThresholds {
    /// Warn when the margin ratio falls to or below this
    pub warning: Decimal,
    /// Critical when the margin ratio falls to or below this
    pub critical: Decimal,
}

/// Unvalidated monitor configuration; every field is required
#[derive(Debug, Clone, Default)]
pub struct RiskMonitorConfig {
    /// LTV at which collateral risk becomes a warning
    pub ltv_warning: Option<Decimal>,
    /// LTV at which collateral risk becomes critical
    pub ltv_critical: Option<Decimal>,
    /// Lending-protocol liquidation threshold (for the health factor)
    pub liquidation_threshold: Option<Decimal>,
    /// Margin thresholds per derivatives venue
    pub venue_margins: HashMap<Venue, MarginThresholds>,
    /// Drift ratio at which delta risk becomes a warning
    pub drift_warning: Option<Decimal>,
    /// Drift ratio at which delta risk becomes critical
    pub drift_critical: Option<Decimal>,
}

/// Validated thresholds the monitor actually runs with
#[derive(Debug, Clone)]
pub struct RiskThresholds {
    pub ltv_warning: Decimal,
    pub ltv_critical: Decimal,
    pub liquidation_threshold: Decimal,
    pub venue_margins: HashMap<Venue, MarginThresholds>,
    pub drift_warning: Decimal,
    pub drift_critical: Decimal,
}

impl RiskMonitorConfig {
    /// Fail-fast validation: the first absent key aborts construction
    pub fn validate(self) -> PipelineResult<RiskThresholds> {
        Ok(RiskThresholds {
            ltv_warning: required(self.ltv_warning, "ltv_warning")?,
            ltv_critical: required(self.ltv_critical, "ltv_critical")?,
            liquidation_threshold: required(self.liquidation_threshold, "liquidation_threshold")?,
            venue_margins: self.venue_margins,
            drift_warning: required(self.drift_warning, "drift_warning")?,
            drift_critical: required(self.drift_critical, "drift_critical")?,
        })
    }
}

impl RiskThresholds {
    /// Margin thresholds for a venue; a derivatives venue without
    /// configured thresholds is a configuration error, not a default.
    pub fn margin_for(&self, venue: &Venue) -> PipelineResult<MarginThresholds> {
        self.venue_margins.get(venue).copied().ok_or_else(|| {
            PipelineError::Configuration(format!("venue_margins.{venue}"))
        })
    }
}

fn required(value: Option<Decimal>, key: &str) -> PipelineResult<Decimal> {
    value.ok_or_else(|| PipelineError::Configuration(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_config() -> RiskMonitorConfig {
        let mut venue_margins = HashMap::new();
        venue_margins.insert(
            Venue::new("perp-dex"),
            MarginThresholds {
                warning: dec!(0.15),
                critical: dec!(0.08),
            },
        );
        RiskMonitorConfig {
            ltv_warning: Some(dec!(0.75)),
            ltv_critical: Some(dec!(0.85)),
            liquidation_threshold: Some(dec!(0.95)),
            venue_margins,
            drift_warning: Some(dec!(0.02)),
            drift_critical: Some(dec!(0.05)),
        }
    }

    #[test]
    fn test_full_config_validates() {
        let t = full_config().validate().unwrap();
        assert_eq!(t.ltv_warning, dec!(0.75));
        assert_eq!(t.venue_margins.len(), 1);
    }

    #[test]
    fn test_missing_key_fails_fast_with_name() {
        let mut cfg = full_config();
        cfg.ltv_critical = None;
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err,
            PipelineError::Configuration("ltv_critical".to_string())
        );
    }

    #[test]
    fn test_unconfigured_venue_is_config_error() {
        let t = full_config().validate().unwrap();
        let err = t.margin_for(&Venue::new("unknown-dex")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
