use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    EquityBreakdown, ExposureSnapshot, Instruction, InstructionResult, PnlResult, RiskAssessment,
};
use crate::values::Timestamp;

/// Structured record of one pipeline step, handed to the event logger
///
/// Keyed by `(correlation_id, step_order)`. Append-only: the engine never
/// rewrites a record once logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Run this step belongs to
    pub correlation_id: Uuid,
    /// Monotone step counter within the run
    pub step_order: u64,
    pub timestamp: Timestamp,
    pub exposure: ExposureSnapshot,
    pub equity: EquityBreakdown,
    pub risk: RiskAssessment,
    pub pnl: PnlResult,
    /// Instructions the strategy emitted this step, in execution order
    pub instructions: Vec<Instruction>,
    /// Per-instruction execution results, aligned with `instructions`
    pub executions: Vec<InstructionResult>,
}
