//! Services - orchestration of the ports into the queue inspection operations.

mod abort;
mod queue_view;
mod snapshot;


pub use abort::AbortOutcome;
pub use queue_view::{JobListFilter, QueueView, StatusCaching, ViewOptions};
pub use snapshot::JobSnapshotBuilder;

/// Wall clock in epoch milliseconds, the unit scores are stored in.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
