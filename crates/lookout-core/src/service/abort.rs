//! Best-effort job cancellation.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::domain::JobOutcome;
use crate::error::StoreError;
use crate::ports::{JobDeserializer, JobStore};

use super::now_ms;

/// What is known about an abort request once the wait is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortOutcome {
    /// The worker recorded the job as cancelled.
    Aborted,
    /// The job finished some other way, or no longer exists.
    NotAborted,
    /// No confirmation arrived in time; the job may still have been aborted.
    Unknown,
}

impl AbortOutcome {
    /// `Some(true)`/`Some(false)` for confirmed outcomes, `None` when unknown.
    pub fn confirmed(&self) -> Option<bool> {
        match self {
            AbortOutcome::Aborted => Some(true),
            AbortOutcome::NotAborted => Some(false),
            AbortOutcome::Unknown => None,
        }
    }
}

impl fmt::Display for AbortOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbortOutcome::Aborted => "aborted",
            AbortOutcome::NotAborted => "not aborted",
            AbortOutcome::Unknown => "unknown",
        })
    }
}

/// Read an abort answer from the job's result.
///
/// Only a success or a failure naming another exception proves the job was not
/// aborted. A failure that names nothing (a worker that could not encode the
/// exception writes a plain message) may well be the cancellation.
fn verdict(outcome: Option<&JobOutcome>) -> AbortOutcome {
    match outcome {
        Some(o) if o.success => AbortOutcome::NotAborted,
        Some(o) if o.is_cancelled() => AbortOutcome::Aborted,
        Some(o) if o.exception_name().is_some() => AbortOutcome::NotAborted,
        _ => AbortOutcome::Unknown,
    }
}

/// Signal an abort and wait, up to `timeout`, for the job's result.
pub(crate) async fn abort_job(
    store: &dyn JobStore,
    deserializer: &dyn JobDeserializer,
    job_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<AbortOutcome, StoreError> {
    let wait = signal_and_wait(store, deserializer, job_id, poll_interval);

    match tokio::time::timeout(timeout, wait).await {
        Ok(Err(StoreError::Timeout)) | Err(_) => {
            tracing::warn!(
                job_id = %job_id,
                timeout_ms = timeout.as_millis() as u64,
                "Abort not confirmed in time"
            );
            Ok(AbortOutcome::Unknown)
        }
        Ok(outcome) => outcome,
    }
}

async fn signal_and_wait(
    store: &dyn JobStore,
    deserializer: &dyn JobDeserializer,
    job_id: &str,
    poll_interval: Duration,
) -> Result<AbortOutcome, StoreError> {
    store.request_abort(job_id, now_ms()).await?;
    tracing::info!(job_id = %job_id, "Abort requested");

    loop {
        let poll = store.poll_result(job_id).await?;
        match poll.result {
            Some(payload) => {
                return Ok(match deserializer.deserialize_result(&payload) {
                    Ok(info) => {
                        let outcome = verdict(info.outcome.as_ref());
                        if outcome == AbortOutcome::Unknown {
                            tracing::warn!(job_id = %job_id, "Abort result does not name its failure");
                        }
                        outcome
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Abort result unreadable");
                        AbortOutcome::Unknown
                    }
                });
            }
            // Gone from the queue without a result: nothing left to abort.
            None if poll.score.is_none() => return Ok(AbortOutcome::NotAborted),
            None => tokio::time::sleep(poll_interval).await,
        }
    }
}
