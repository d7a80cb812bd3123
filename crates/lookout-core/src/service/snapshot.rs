//! Hydration of a single job id into a full [`JobRecord`].

use std::sync::Arc;

use crate::domain::{JobInfo, JobRecord, JobStatus, PlaceholderReason, resolve};
use crate::error::StoreError;
use crate::ports::{JobDeserializer, JobStore, RawJob};

use super::now_ms;

/// Fetches and decodes job metadata, degrading to placeholder records.
///
/// Only store failures surface as errors. Missing or undecodable payloads
/// become placeholders carrying the job's real status.
#[derive(Clone)]
pub struct JobSnapshotBuilder {
    queue: String,
    store: Arc<dyn JobStore>,
    deserializer: Arc<dyn JobDeserializer>,
}

impl JobSnapshotBuilder {
    pub fn new(
        queue: impl Into<String>,
        store: Arc<dyn JobStore>,
        deserializer: Arc<dyn JobDeserializer>,
    ) -> Self {
        Self {
            queue: queue.into(),
            store,
            deserializer,
        }
    }

    /// Build the record for `job_id`. A `known_status` (from a status map) skips
    /// the per-job evidence lookup.
    pub async fn build(
        &self,
        job_id: &str,
        known_status: Option<JobStatus>,
    ) -> Result<JobRecord, StoreError> {
        let raw = self.store.fetch_job(job_id).await?;
        let status = match known_status {
            Some(status) => status,
            None => self.resolve_status(job_id).await?,
        };
        Ok(self.hydrate(job_id, raw, status))
    }

    /// Status of one job from its own evidence, independent of any payload.
    pub async fn resolve_status(&self, job_id: &str) -> Result<JobStatus, StoreError> {
        let evidence = self.store.job_evidence(job_id).await?;
        Ok(resolve(evidence.kind(), evidence.score, now_ms()))
    }

    fn hydrate(&self, job_id: &str, raw: RawJob, status: JobStatus) -> JobRecord {
        // A result supersedes the definition; an unreadable result does not fall back.
        let decoded = match (&raw.result, &raw.definition) {
            (Some(payload), _) => Some(self.deserializer.deserialize_result(payload)),
            (None, Some(payload)) => Some(
                self.deserializer
                    .deserialize_definition(payload)
                    .map(|definition| JobInfo {
                        definition,
                        outcome: None,
                    }),
            ),
            (None, None) => None,
        };

        match decoded {
            Some(Ok(mut info)) => {
                info.definition.score = raw.score;
                JobRecord::from_info(job_id, info, status)
            }
            Some(Err(e)) => {
                tracing::warn!(
                    queue = %self.queue,
                    job_id = %job_id,
                    error = %e,
                    "Failed to deserialize job payload"
                );
                JobRecord::placeholder(job_id, PlaceholderReason::Undecodable, status)
            }
            None => JobRecord::placeholder(job_id, PlaceholderReason::Missing, status),
        }
    }
}
