//! Instruction fan-out
//!
//! Dispatches an instruction's actions in order to named executor
//! targets. A failure stops further dispatch, but every action still
//! gets an outcome record - failed, or skipped - so the audit trail is
//! complete no matter where the instruction broke.

use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use talos_core::{ActionOutcome, ActionStatus, Instruction, InstructionResult};
use talos_ports::ExecutionVenue;

/// Routes actions to registered executor targets by name
pub struct InstructionExecutor {
    targets: HashMap<String, Arc<dyn ExecutionVenue>>,
}

impl InstructionExecutor {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Register a venue under an executor name actions can address
    pub fn register(&mut self, name: &str, venue: Arc<dyn ExecutionVenue>) {
        self.targets.insert(name.to_string(), venue);
    }

    /// Dispatch the instruction's actions in order. The first failure
    /// halts dispatch; later actions are recorded as skipped.
    pub async fn execute_instruction(&self, instruction: &Instruction) -> InstructionResult {
        info!(
            "[EXEC] Instruction {} ({:?}): {} action(s)",
            instruction.id,
            instruction.kind,
            instruction.actions.len()
        );

        let mut outcomes = Vec::with_capacity(instruction.actions.len());
        let mut halted = false;

        for action in &instruction.actions {
            if halted {
                outcomes.push(ActionOutcome {
                    action: action.name.clone(),
                    executor: action.executor.clone(),
                    status: ActionStatus::Skipped,
                    detail: None,
                });
                continue;
            }

            let outcome = match self.targets.get(&action.executor) {
                None => {
                    error!(
                        "[EXEC] No executor target '{}' for action '{}'",
                        action.executor, action.name
                    );
                    ActionOutcome {
                        action: action.name.clone(),
                        executor: action.executor.clone(),
                        status: ActionStatus::Failed,
                        detail: Some(format!("unknown executor target '{}'", action.executor)),
                    }
                }
                Some(venue) => match venue.submit(action).await {
                    Ok(detail) => ActionOutcome {
                        action: action.name.clone(),
                        executor: action.executor.clone(),
                        status: ActionStatus::Ok,
                        detail: Some(detail),
                    },
                    Err(e) => {
                        warn!(
                            "[EXEC] Action '{}' on '{}' failed: {}",
                            action.name, action.executor, e
                        );
                        ActionOutcome {
                            action: action.name.clone(),
                            executor: action.executor.clone(),
                            status: ActionStatus::Failed,
                            detail: Some(e.to_string()),
                        }
                    }
                },
            };

            if outcome.status == ActionStatus::Failed {
                halted = true;
            }
            outcomes.push(outcome);
        }

        let success = outcomes.iter().all(|o| o.status == ActionStatus::Ok);
        InstructionResult {
            instruction_id: instruction.id,
            kind: instruction.kind,
            success,
            outcomes,
        }
    }
}

impl Default for InstructionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use talos_core::{Action, InstructionKind};
    use talos_ports::{PipelineError, PipelineResult};

    struct AlwaysOk;

    #[async_trait]
    impl ExecutionVenue for AlwaysOk {
        async fn submit(&self, action: &Action) -> PipelineResult<String> {
            Ok(format!("{} done", action.name))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ExecutionVenue for AlwaysFails {
        async fn submit(&self, action: &Action) -> PipelineResult<String> {
            Err(PipelineError::Execution {
                executor: action.executor.clone(),
                action: action.name.clone(),
                reason: "venue rejected".to_string(),
            })
        }
    }

    fn instruction(actions: Vec<Action>) -> Instruction {
        Instruction::new(5, InstructionKind::Rebalance, actions)
    }

    #[tokio::test]
    async fn test_all_actions_succeed() {
        let mut exec = InstructionExecutor::new();
        exec.register("lender", Arc::new(AlwaysOk));

        let instr = instruction(vec![
            Action::new("supply", "lender", json!({})),
            Action::new("borrow", "lender", json!({})),
        ]);
        let result = exec.execute_instruction(&instr).await;

        assert!(result.success);
        assert_eq!(result.outcomes.len(), 2);
        assert!(result.outcomes.iter().all(|o| o.status == ActionStatus::Ok));
        assert_eq!(result.outcomes[0].detail.as_deref(), Some("supply done"));
    }

    #[tokio::test]
    async fn test_failure_halts_but_audit_trail_is_complete() {
        let mut exec = InstructionExecutor::new();
        exec.register("lender", Arc::new(AlwaysOk));
        exec.register("dex", Arc::new(AlwaysFails));

        let instr = instruction(vec![
            Action::new("withdraw", "lender", json!({})),
            Action::new("swap", "dex", json!({})),
            Action::new("repay", "lender", json!({})),
        ]);
        let result = exec.execute_instruction(&instr).await;

        assert!(!result.success);
        // Every action appears exactly once even though dispatch halted
        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.outcomes[0].status, ActionStatus::Ok);
        assert_eq!(result.outcomes[1].status, ActionStatus::Failed);
        assert_eq!(result.outcomes[2].status, ActionStatus::Skipped);
        assert!(result.outcomes[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("venue rejected"));
    }

    #[tokio::test]
    async fn test_unknown_target_is_a_failure() {
        let exec = InstructionExecutor::new();
        let instr = instruction(vec![Action::new("stake", "staker", json!({}))]);
        let result = exec.execute_instruction(&instr).await;

        assert!(!result.success);
        assert_eq!(result.outcomes[0].status, ActionStatus::Failed);
        assert!(result.outcomes[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("unknown executor target"));
    }
}
