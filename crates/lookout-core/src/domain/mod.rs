//! Domain entities and the pure parts of job-state reconstruction.

mod job;
mod keys;
mod stats;
mod status;

pub use job::{
    JobDefinition, JobInfo, JobOutcome, JobRecord, JobStatus, PLACEHOLDER_ENQUEUE_MS,
    PLACEHOLDER_SCORE, PlaceholderReason, sort_by_enqueue_time,
};
pub use keys::{KeyKind, KeyLayout, classify};
pub use stats::{QueueStats, StatsOutcome, StatusCounts, aggregate};
pub use stats::Coordinates;
pub use status::{StatusMap, build_status_map, resolve};
