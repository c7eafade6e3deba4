use thiserror::Error;

/// Pipeline-wide error taxonomy
///
/// Propagation policy: `Configuration` surfaces immediately at construction
/// and is never defaulted over; `DataUnavailable` degrades the current
/// step's accuracy (the affected position is excluded and flagged) without
/// halting the run; `Execution` is recorded per action; `Fatal` aborts the
/// run. Reconciliation mismatches are diagnostics carried in `PnlResult`,
/// deliberately not an error variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Configuration error: missing or invalid parameter '{0}'")]
    Configuration(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Execution failure at {executor}/{action}: {reason}")]
    Execution {
        executor: String,
        action: String,
        reason: String,
    },

    #[error("Fatal pipeline error in stage '{stage}': {reason}")]
    Fatal { stage: String, reason: String },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
