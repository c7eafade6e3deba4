mod equity;
mod exposure;
mod instruction;
mod leverage;
mod pnl;
mod position;
mod risk;
mod step;

pub use equity::{EquityBreakdown, ValuedPosition};
pub use exposure::{ExcludedPosition, ExclusionReason, ExposureEntry, ExposureSnapshot, Marks};
pub use instruction::{
    Action, ActionOutcome, ActionStatus, Instruction, InstructionKind, InstructionResult,
};
pub use leverage::{LeverageLoopResult, LoopMode};
pub use pnl::{AttributionComponents, AttributionPnl, BalancePnl, PnlResult, Reconciliation};
pub use position::{InstrumentClass, Position, PositionKey};
pub use risk::{
    CollateralRisk, DeltaRisk, MarginRisk, RiskAlert, RiskAssessment, RiskDimension, RiskLevel,
    VenueMargin,
};
pub use step::StepRecord;
