//! Talos Executor
//!
//! Expands instructions into deterministic sequences of venue operations
//! with cost accounting:
//! - Atomic leverage loop: closed-form flash-borrow bundle, settled in one
//!   transaction
//! - Sequential leverage loop: iterative stake/supply/borrow with
//!   per-iteration gas and LTV auditability
//! - Unwind: caller-selectable fast (DEX swap, fee + slippage) or slow
//!   (protocol-native withdrawal, queue delay) paths
//! - Instruction fan-out to named executor targets with a complete
//!   per-action audit trail

mod instruction;
mod loops;
mod series;
mod unwind;

pub use instruction::InstructionExecutor;
pub use loops::{LoopConfig, LoopIteration, LoopSimulator, SequentialLoopReport};
pub use series::{last_term, series_sum};
pub use unwind::{UnwindConfig, UnwindMode, UnwindResult, UnwindSimulator};
