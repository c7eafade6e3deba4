//! Talos Core Domain
//!
//! Pure domain types for the Talos capital-deployment engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Instructions & execution
    Action,
    ActionOutcome,
    ActionStatus,
    AttributionComponents,
    AttributionPnl,
    // P&L
    BalancePnl,
    CollateralRisk,
    DeltaRisk,
    // Equity
    EquityBreakdown,
    ExcludedPosition,
    ExclusionReason,
    // Exposure
    ExposureEntry,
    ExposureSnapshot,
    Instruction,
    InstructionKind,
    InstructionResult,
    // Positions
    InstrumentClass,
    // Leverage loops
    LeverageLoopResult,
    LoopMode,
    MarginRisk,
    Marks,
    PnlResult,
    Position,
    PositionKey,
    Reconciliation,
    RiskAlert,
    RiskAssessment,
    RiskDimension,
    // Risk
    RiskLevel,
    // Step records
    StepRecord,
    ValuedPosition,
    VenueMargin,
};
pub use values::{Amount, Rate, Timestamp, Token, Venue};
