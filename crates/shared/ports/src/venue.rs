use async_trait::async_trait;
use talos_core::Action;

use crate::error::PipelineResult;

/// Synchronous-request/response interface to an execution venue
///
/// Live mode only; simulated runs fulfil actions internally. The core
/// treats each action as one request/response exchange - order placement,
/// signing and RPC plumbing are the implementor's concern.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Carry out one action, returning a venue detail string on success.
    /// Failures surface as `PipelineError::Execution`.
    async fn submit(&self, action: &Action) -> PipelineResult<String>;
}
