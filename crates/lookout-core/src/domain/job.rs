use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enqueue time given to placeholder records: 2077-01-01T00:00:00Z.
///
/// Marks "age unknown"; it is never a real enqueue time.
pub const PLACEHOLDER_ENQUEUE_MS: i64 = 3_376_684_800_000;

/// Score given to placeholder records.
pub const PLACEHOLDER_SCORE: i64 = 420;

/// Lifecycle state of a job, derived from keyspace evidence at observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Deferred,
    InProgress,
    Complete,
    NotFound,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Deferred,
        JobStatus::InProgress,
        JobStatus::Complete,
        JobStatus::NotFound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Deferred => "deferred",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "queued" => Ok(JobStatus::Queued),
            "deferred" => Ok(JobStatus::Deferred),
            "in_progress" | "running" => Ok(JobStatus::InProgress),
            "complete" => Ok(JobStatus::Complete),
            "not_found" => Ok(JobStatus::NotFound),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// What a job was asked to do. Shared by queued definitions and finished results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    /// Attempt number; -1 when unknown.
    pub job_try: i64,
    pub enqueue_time: DateTime<Utc>,
    pub score: Option<i64>,
}

/// How an executed job ended. Present only once a result was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub result: Value,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub queue_name: Option<String>,
}

impl JobOutcome {
    const CANCELLED: &'static str = "CancelledError";

    /// Exception type a failed result names, e.g. `ValueError` for `"ValueError('boom')"`.
    ///
    /// `None` for successes and for failures that do not identify an exception, such
    /// as the `"unable to serialize result"` text a worker writes when it cannot
    /// encode the exception it caught.
    pub fn exception_name(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        match &self.result {
            Value::String(s) => exception_in_repr(s),
            Value::Object(obj) => ["type", "exc_type"]
                .iter()
                .find_map(|field| obj.get(*field).and_then(Value::as_str)),
            _ => None,
        }
    }

    /// Whether the worker recorded this job as cancelled (aborted).
    pub fn is_cancelled(&self) -> bool {
        self.exception_name().is_some_and(|name| {
            name == Self::CANCELLED || name.ends_with(&format!(".{}", Self::CANCELLED))
        })
    }
}

/// `Name(...)`, or a bare dotted name ending in `Error`/`Exception`.
fn exception_in_repr(repr: &str) -> Option<&str> {
    let repr = repr.trim();
    let name = match repr.split_once('(') {
        Some((name, _)) if repr.ends_with(')') => name,
        Some(_) => return None,
        None if repr.ends_with("Error") || repr.ends_with("Exception") => repr,
        None => return None,
    };
    let identifier = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    identifier.then_some(name)
}

/// A decoded payload: the definition plus, for results, the execution outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub definition: JobDefinition,
    pub outcome: Option<JobOutcome>,
}

/// Why a record had to be synthesized instead of decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    /// No definition or result payload exists.
    Missing,
    /// A payload exists but could not be decoded.
    Undecodable,
}

impl PlaceholderReason {
    pub fn function_label(&self) -> &'static str {
        match self {
            PlaceholderReason::Missing => "Can't find job",
            PlaceholderReason::Undecodable => "Unknown, can't deserialize",
        }
    }
}

/// Everything known about one job at observation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    #[serde(flatten)]
    pub definition: JobDefinition,
    pub outcome: Option<JobOutcome>,
    pub status: JobStatus,
}

impl JobRecord {
    pub fn from_info(job_id: impl Into<String>, info: JobInfo, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            definition: info.definition,
            outcome: info.outcome,
            status,
        }
    }

    /// Build the stand-in record used when metadata is missing or unreadable.
    ///
    /// The status is still the real one: it comes from key presence, not payloads.
    pub fn placeholder(
        job_id: impl Into<String>,
        reason: PlaceholderReason,
        status: JobStatus,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            definition: JobDefinition {
                function: reason.function_label().to_string(),
                args: Vec::new(),
                kwargs: Map::new(),
                job_try: -1,
                enqueue_time: DateTime::from_timestamp_millis(PLACEHOLDER_ENQUEUE_MS)
                    .unwrap_or_default(),
                score: Some(PLACEHOLDER_SCORE),
            },
            outcome: None,
            status,
        }
    }

    pub fn function(&self) -> &str {
        &self.definition.function
    }

    pub fn enqueue_time(&self) -> DateTime<Utc> {
        self.definition.enqueue_time
    }

    /// `Some(success)` for executed jobs, `None` before execution.
    pub fn success(&self) -> Option<bool> {
        self.outcome.as_ref().map(|o| o.success)
    }
}

/// Sort records oldest first, the order listings are displayed in.
pub fn sort_by_enqueue_time(jobs: &mut [JobRecord]) {
    jobs.sort_by(|a, b| {
        a.enqueue_time()
            .cmp(&b.enqueue_time())
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(success: bool, result: Value) -> JobOutcome {
        let now = Utc::now();
        JobOutcome {
            success,
            result,
            start_time: now,
            finish_time: now,
            queue_name: None,
        }
    }

    #[test]
    fn placeholder_for_missing_job() {
        let record = JobRecord::placeholder("ghost", PlaceholderReason::Missing, JobStatus::NotFound);

        assert_eq!(record.function(), "Can't find job");
        assert_eq!(record.definition.job_try, -1);
        assert!(record.definition.args.is_empty());
        assert!(record.definition.kwargs.is_empty());
        assert_eq!(record.definition.score, Some(PLACEHOLDER_SCORE));
        assert_eq!(record.enqueue_time().timestamp_millis(), PLACEHOLDER_ENQUEUE_MS);
        assert_eq!(record.enqueue_time().to_rfc3339(), "2077-01-01T00:00:00+00:00");
        assert_eq!(record.status, JobStatus::NotFound);
    }

    #[test]
    fn placeholder_keeps_given_status() {
        let record =
            JobRecord::placeholder("x", PlaceholderReason::Undecodable, JobStatus::Complete);

        assert_eq!(record.function(), "Unknown, can't deserialize");
        assert_eq!(record.status, JobStatus::Complete);
    }

    #[yare::parameterized(
        cancelled_string   = { false, json!("CancelledError()"),                     true },
        cancelled_dotted   = { false, json!("asyncio.exceptions.CancelledError()"),  true },
        cancelled_object   = { false, json!({"type": "CancelledError"}),             true },
        cancelled_exc_type = { false, json!({"exc_type": "CancelledError"}),         true },
        other_failure      = { false, json!("ValueError('boom')"),                   false },
        other_object       = { false, json!({"type": "RuntimeError"}),               false },
        unserializable     = { false, json!("unable to serialize result"),           false },
        null_failure       = { false, Value::Null,                                   false },
        success_mentioning = { true,  json!("CancelledError"),                       false },
    )]
    fn cancelled_outcomes(success: bool, result: Value, expected: bool) {
        assert_eq!(outcome(success, result).is_cancelled(), expected);
    }

    #[yare::parameterized(
        call_repr       = { json!("ValueError('boom')"),            Some("ValueError") },
        empty_args      = { json!("Exception()"),                   Some("Exception") },
        bare_name       = { json!("TimeoutError"),                  Some("TimeoutError") },
        dotted          = { json!("arq.jobs.SerializationError()"), Some("arq.jobs.SerializationError") },
        object_type     = { json!({"exc_type": "KeyError"}),        Some("KeyError") },
        serialize_note  = { json!("unable to serialize result"),    None },
        plain_word      = { json!("failed"),                        None },
        sentence_parens = { json!("job failed (see logs)"),         None },
        number          = { json!(3),                               None },
    )]
    fn exception_names(result: Value, expected: Option<&str>) {
        assert_eq!(outcome(false, result).exception_name(), expected);
    }

    #[test]
    fn successful_outcome_names_no_exception() {
        assert_eq!(outcome(true, json!("ValueError()")).exception_name(), None);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in-progress".parse::<JobStatus>(), Ok(JobStatus::InProgress));
        assert_eq!("running".parse::<JobStatus>(), Ok(JobStatus::InProgress));
        assert_eq!("NOT_FOUND".parse::<JobStatus>(), Ok(JobStatus::NotFound));
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn status_display_matches_serde() {
        for status in JobStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn sort_orders_by_enqueue_time_then_id() {
        let mut later = JobRecord::placeholder("b", PlaceholderReason::Missing, JobStatus::Queued);
        later.definition.enqueue_time = DateTime::from_timestamp_millis(2_000).unwrap();
        let mut earlier = later.clone();
        earlier.job_id = "z".into();
        earlier.definition.enqueue_time = DateTime::from_timestamp_millis(1_000).unwrap();
        let mut tie = later.clone();
        tie.job_id = "a".into();

        let mut jobs = vec![later, earlier, tie];
        sort_by_enqueue_time(&mut jobs);

        let ids: Vec<_> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "b"]);
    }

    #[test]
    fn success_only_for_executed_jobs() {
        let mut record = JobRecord::placeholder("r", PlaceholderReason::Missing, JobStatus::Complete);
        assert_eq!(record.success(), None);

        record.outcome = Some(outcome(true, json!(1)));
        assert_eq!(record.success(), Some(true));
    }
}
