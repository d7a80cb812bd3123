//! Per-queue statistics.

use serde::{Deserialize, Serialize};

use super::job::JobStatus;
use super::status::StatusMap;

/// Where a queue lives. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub host: String,
    pub port: u16,
    pub database: i64,
}

/// Number of jobs per status in one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub in_progress: usize,
    pub deferred: usize,
    pub complete: usize,
    pub not_found: usize,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Deferred => self.deferred,
            JobStatus::InProgress => self.in_progress,
            JobStatus::Complete => self.complete,
            JobStatus::NotFound => self.not_found,
        }
    }

    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Queued => &mut self.queued,
            JobStatus::Deferred => &mut self.deferred,
            JobStatus::InProgress => &mut self.in_progress,
            JobStatus::Complete => &mut self.complete,
            JobStatus::NotFound => &mut self.not_found,
        }
    }

    pub fn total(&self) -> usize {
        JobStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Counts, or the reason they could not be computed. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsOutcome {
    Counts(StatusCounts),
    Error(String),
}

/// Statistics of one queue at observation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub outcome: StatsOutcome,
}

impl QueueStats {
    pub fn counted(name: impl Into<String>, coordinates: Coordinates, counts: StatusCounts) -> Self {
        Self {
            name: name.into(),
            coordinates,
            outcome: StatsOutcome::Counts(counts),
        }
    }

    pub fn failed(name: impl Into<String>, coordinates: Coordinates, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinates,
            outcome: StatsOutcome::Error(error.into()),
        }
    }

    pub fn counts(&self) -> Option<&StatusCounts> {
        match &self.outcome {
            StatsOutcome::Counts(counts) => Some(counts),
            StatsOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StatsOutcome::Counts(_) => None,
            StatsOutcome::Error(e) => Some(e),
        }
    }
}

/// Count jobs per status.
pub fn aggregate(map: &StatusMap) -> StatusCounts {
    map.values().fold(StatusCounts::default(), |mut counts, status| {
        *counts.slot(*status) += 1;
        counts
    })
}
