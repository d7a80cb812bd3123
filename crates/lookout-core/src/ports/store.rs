use async_trait::async_trait;

use crate::domain::KeyKind;
use crate::error::StoreError;

/// Every key of the namespace together with every member of the queue's
/// sorted set, read in one atomic round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyspaceSnapshot {
    pub keys: Vec<String>,
    /// `(job_id, score)` pairs; scores in epoch milliseconds.
    pub scores: Vec<(String, i64)>,
}

/// Presence of each key kind for one job, plus its score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobEvidence {
    pub result: bool,
    pub in_progress: bool,
    pub definition: bool,
    pub score: Option<i64>,
}

impl JobEvidence {
    /// The highest-priority kind present, if any.
    pub fn kind(&self) -> Option<KeyKind> {
        if self.result {
            Some(KeyKind::Result)
        } else if self.in_progress {
            Some(KeyKind::InProgress)
        } else if self.definition {
            Some(KeyKind::Definition)
        } else {
            None
        }
    }
}

/// Undecoded payloads of one job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawJob {
    pub result: Option<Vec<u8>>,
    pub definition: Option<Vec<u8>>,
    pub score: Option<i64>,
}

/// One poll of a job's result while waiting for an abort to land.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPoll {
    pub result: Option<Vec<u8>>,
    pub score: Option<i64>,
}

/// Read access to one queue of the job store, plus the abort signal.
///
/// Implementations must be safe for concurrent use: many fetches run at once
/// against the same store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Keyspace and sorted-set scores, atomically.
    async fn snapshot(&self) -> Result<KeyspaceSnapshot, StoreError>;

    /// Key presence and score of one job, atomically.
    async fn job_evidence(&self, job_id: &str) -> Result<JobEvidence, StoreError>;

    /// Result and definition payloads of one job.
    async fn fetch_job(&self, job_id: &str) -> Result<RawJob, StoreError>;

    /// Result payload and score of one job, atomically.
    async fn poll_result(&self, job_id: &str) -> Result<ResultPoll, StoreError>;

    /// Signal the workers to abort a job. A deferred job is made due immediately
    /// so that a worker picks it up and observes the signal.
    async fn request_abort(&self, job_id: &str, now_ms: i64) -> Result<(), StoreError>;
}
