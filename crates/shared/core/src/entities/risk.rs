use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Timestamp, Venue};

/// Tiered risk severity, ordered so `max` picks the worst
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum RiskLevel {
    #[default]
    Safe,
    Warning,
    Critical,
}

/// Which independently computed dimension an alert came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskDimension {
    Collateral,
    Margin,
    Delta,
}

/// One threshold crossing, appended within the step that observed it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub dimension: RiskDimension,
    pub level: RiskLevel,
    pub message: String,
}

/// Lending-protocol collateral risk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralRisk {
    /// debt value / collateral value
    pub ltv: Decimal,
    /// collateral * liquidation_threshold / debt; falls below 1 at liquidation
    pub health_factor: Decimal,
    pub level: RiskLevel,
}

/// Margin ratio at one derivatives venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueMargin {
    pub venue: Venue,
    /// equity at venue / gross derivative notional
    pub margin_ratio: Decimal,
    pub notional: Decimal,
    pub level: RiskLevel,
}

/// Margin risk across derivatives venues; overall level comes from the
/// worst (lowest-ratio) venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRisk {
    pub per_venue: Vec<VenueMargin>,
    pub worst_venue: Option<Venue>,
    pub worst_ratio: Option<Decimal>,
    pub level: RiskLevel,
}

/// Net-delta drift relative to total deployed value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaRisk {
    pub net_delta: Decimal,
    /// |net_delta| / total_value
    pub drift_ratio: Decimal,
    pub level: RiskLevel,
}

/// Combined risk view for one step; replaced, never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub timestamp: Timestamp,
    /// Maximum severity across the three dimensions
    pub level: RiskLevel,
    pub collateral: CollateralRisk,
    pub margin: MarginRisk,
    pub delta: DeltaRisk,
    pub alerts: Vec<RiskAlert>,
}
