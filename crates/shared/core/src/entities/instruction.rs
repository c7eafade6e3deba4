use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a generated instruction sets out to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Bring LTV or delta back inside its band
    Rebalance,
    /// Enter a leveraged position via a leverage loop
    EnterLeverage,
    /// Reduce or close a leveraged position
    ExitLeverage,
    /// Emergency unwind of the whole structure
    Unwind,
    /// Convert an out-of-band incidental token balance to the share class
    UnwrapAndLiquidate,
}

/// One venue operation within an instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Operation name (e.g., "supply", "borrow", "stake", "swap")
    pub name: String,
    /// Named executor target that carries out the action
    pub executor: String,
    /// Operation parameters
    pub params: serde_json::Value,
}

impl Action {
    pub fn new(name: &str, executor: &str, params: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            executor: executor.to_string(),
            params,
        }
    }
}

/// An ordered set of actions produced by the strategy manager
///
/// Consumed exactly once by the execution layer and discarded; nothing
/// persists an instruction beyond the step that generated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: Uuid,
    /// Higher priority executes first when several are emitted in one step
    pub priority: u8,
    pub kind: InstructionKind,
    pub actions: Vec<Action>,
    pub metadata: serde_json::Value,
}

impl Instruction {
    pub fn new(priority: u8, kind: InstructionKind, actions: Vec<Action>) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            kind,
            actions,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outcome of one dispatched (or skipped) action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Action executed successfully
    Ok,
    /// Action was dispatched and failed
    Failed,
    /// Action was never dispatched because an earlier one failed
    Skipped,
}

/// Per-action audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: String,
    pub executor: String,
    pub status: ActionStatus,
    /// Failure or venue detail, when there is one
    pub detail: Option<String>,
}

/// Result of fanning an instruction's actions out to executor targets
///
/// Every action of the instruction appears exactly once, including those
/// skipped after a failure - the audit trail is always complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionResult {
    pub instruction_id: Uuid,
    pub kind: InstructionKind,
    /// True only if every action succeeded
    pub success: bool,
    pub outcomes: Vec<ActionOutcome>,
}
