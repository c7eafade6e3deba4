use talos_core::StepRecord;

/// Append-only sink for structured step records
///
/// Records are keyed by `(correlation_id, step_order)`; the engine never
/// mutates a record after appending it. Persistence, archival and result
/// stores all live behind this port.
pub trait EventLogger: Send + Sync {
    fn append(&self, record: StepRecord);
}
