//! Liquidation-distance formula
//!
//! Exposed as a pure function because pre-trade sizing needs it without a
//! constructed monitor.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Open upper bound for the clamped result: the distance lives in [0, 1)
const MAX_DISTANCE: Decimal = dec!(0.999999999);

/// Fractional adverse price move that triggers liquidation, given the
/// current loop LTV and the protocol's liquidation threshold.
///
/// `move = 1 - ltv_recursive / liquidation_threshold`, clamped to `[0, 1)`.
/// At or past the threshold the distance is zero - liquidation is already
/// due. A non-positive threshold also yields zero.
pub fn liquidation_distance(ltv_recursive: Decimal, liquidation_threshold: Decimal) -> Decimal {
    if liquidation_threshold <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let distance = Decimal::ONE - ltv_recursive / liquidation_threshold;
    distance.clamp(Decimal::ZERO, MAX_DISTANCE)
}
