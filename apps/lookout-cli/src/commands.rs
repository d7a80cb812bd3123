//! Command handlers.

use anyhow::{Context, Result};
use clap::ValueEnum;

use lookout_core::domain::sort_by_enqueue_time;
use lookout_core::{JobListFilter, JobStatus};
use lookout_infra::QueueRegistry;

use crate::output::{self, OutputFormat};

/// Values accepted by `jobs --status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    All,
    Queued,
    Deferred,
    InProgress,
    Complete,
    NotFound,
    /// Complete jobs that succeeded
    Successful,
    /// Complete jobs that failed
    Failed,
}

impl From<StatusArg> for JobListFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => JobListFilter::All,
            StatusArg::Queued => JobListFilter::Status(JobStatus::Queued),
            StatusArg::Deferred => JobListFilter::Status(JobStatus::Deferred),
            StatusArg::InProgress => JobListFilter::Status(JobStatus::InProgress),
            StatusArg::Complete => JobListFilter::Status(JobStatus::Complete),
            StatusArg::NotFound => JobListFilter::Status(JobStatus::NotFound),
            StatusArg::Successful => JobListFilter::Successful,
            StatusArg::Failed => JobListFilter::Failed,
        }
    }
}

pub async fn queues(registry: &QueueRegistry, format: OutputFormat) -> Result<()> {
    let stats = registry.all_stats().await;
    output::print(format, &stats[..], output::stats_table)
}

pub async fn jobs(
    registry: &QueueRegistry,
    queue: &str,
    status: StatusArg,
    format: OutputFormat,
) -> Result<()> {
    let view = registry.open(queue).await?;
    let mut jobs = view
        .list_filtered(status.into())
        .await
        .with_context(|| format!("Failed to list jobs of {queue}"))?;
    sort_by_enqueue_time(&mut jobs);
    tracing::debug!(queue, count = jobs.len(), "Listed jobs");

    output::print(format, &jobs[..], output::jobs_table)
}

pub async fn job(
    registry: &QueueRegistry,
    queue: &str,
    job_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let view = registry.open(queue).await?;
    let job = view
        .get_job(job_id)
        .await
        .with_context(|| format!("Failed to read job {job_id} of {queue}"))?;

    output::print(format, &job, output::job_details)
}

pub async fn abort(
    registry: &QueueRegistry,
    queue: &str,
    job_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let view = registry.open(queue).await?;
    let outcome = view
        .abort_job(job_id)
        .await
        .with_context(|| format!("Failed to abort job {job_id} of {queue}"))?;

    let report = serde_json::json!({ "job_id": job_id, "outcome": outcome });
    output::print(format, &report, |_| format!("{job_id}: {outcome}\n"))
}
