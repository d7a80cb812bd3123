//! Rendering of command results as text tables or JSON.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use lookout_core::{JobRecord, JobStatus, QueueStats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as pretty JSON, or as the text `render` produces.
pub fn print<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    render: impl Fn(&T) -> String,
) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render(value)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(header.to_vec());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
    out
}

pub fn stats_table(stats: &[QueueStats]) -> String {
    let mut header = vec!["QUEUE", "REDIS"];
    header.extend(JobStatus::ALL.iter().map(|s| s.as_str()));

    let rows: Vec<Vec<String>> = stats
        .iter()
        .map(|queue| {
            let c = &queue.coordinates;
            let mut row = vec![
                queue.name.clone(),
                format!("{}:{}/{}", c.host, c.port, c.database),
            ];
            match (queue.counts(), queue.error()) {
                (Some(counts), _) => {
                    row.extend(JobStatus::ALL.iter().map(|s| counts.get(*s).to_string()));
                }
                (None, error) => row.push(format!("error: {}", error.unwrap_or("unknown"))),
            }
            row
        })
        .collect();

    table(&header, &rows)
}

fn success_label(job: &JobRecord) -> &'static str {
    match job.success() {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

pub fn jobs_table(jobs: &[JobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs\n".to_string();
    }
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            vec![
                job.job_id.clone(),
                job.function().to_string(),
                job.status.to_string(),
                job.enqueue_time().format("%Y-%m-%d %H:%M:%S").to_string(),
                job.definition.job_try.to_string(),
                success_label(job).to_string(),
            ]
        })
        .collect();

    table(&["ID", "FUNCTION", "STATUS", "ENQUEUED", "TRY", "SUCCESS"], &rows)
}

pub fn job_details(job: &JobRecord) -> String {
    let def = &job.definition;
    let mut out = String::new();
    let _ = writeln!(out, "id:        {}", job.job_id);
    let _ = writeln!(out, "function:  {}", def.function);
    let _ = writeln!(out, "status:    {}", job.status);
    let _ = writeln!(out, "try:       {}", def.job_try);
    let _ = writeln!(out, "enqueued:  {}", def.enqueue_time.to_rfc3339());
    if let Some(score) = def.score {
        let _ = writeln!(out, "score:     {score}");
    }
    let _ = writeln!(out, "args:      {}", serde_json::Value::from(def.args.clone()));
    let _ = writeln!(out, "kwargs:    {}", serde_json::Value::from(def.kwargs.clone()));

    if let Some(outcome) = &job.outcome {
        let _ = writeln!(out, "success:   {}", success_label(job));
        let _ = writeln!(out, "result:    {}", outcome.result);
        let _ = writeln!(out, "started:   {}", outcome.start_time.to_rfc3339());
        let _ = writeln!(out, "finished:  {}", outcome.finish_time.to_rfc3339());
        if let Some(queue) = &outcome.queue_name {
            let _ = writeln!(out, "queue:     {queue}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use lookout_core::domain::{
        Coordinates, JobDefinition, JobOutcome, PlaceholderReason, StatusCounts,
    };
    use serde_json::{Map, json};

    fn coordinates() -> Coordinates {
        Coordinates {
            host: "localhost".to_string(),
            port: 6379,
            database: 2,
        }
    }

    fn finished(job_id: &str, success: bool) -> JobRecord {
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        JobRecord {
            job_id: job_id.to_string(),
            definition: JobDefinition {
                function: "send_email".to_string(),
                args: vec![json!("a@b.c")],
                kwargs: Map::new(),
                job_try: 1,
                enqueue_time: at,
                score: None,
            },
            outcome: Some(JobOutcome {
                success,
                result: json!(null),
                start_time: at,
                finish_time: at,
                queue_name: Some("arq:queue".to_string()),
            }),
            status: JobStatus::Complete,
        }
    }

    #[test]
    fn stats_table_shows_counts_and_errors() {
        let counts = StatusCounts {
            queued: 3,
            in_progress: 1,
            ..StatusCounts::default()
        };
        let stats = [
            QueueStats::counted("arq:queue", coordinates(), counts),
            QueueStats::failed("reports", coordinates(), "Connection failed: refused"),
        ];

        let text = stats_table(&stats);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("QUEUE"));
        assert!(lines[1].contains("localhost:6379/2"));
        assert!(lines[1].contains('3'));
        assert!(lines[2].ends_with("error: Connection failed: refused"));
    }

    #[test]
    fn jobs_table_aligns_columns() {
        let jobs = [finished("a", true), finished("longer-id", false)];

        let text = jobs_table(&jobs);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        let function_col = lines[0].find("FUNCTION").unwrap();
        assert_eq!(lines[1].find("send_email"), Some(function_col));
        assert_eq!(lines[2].find("send_email"), Some(function_col));
        assert!(lines[1].ends_with("yes"));
        assert!(lines[2].ends_with("no"));
    }

    #[test]
    fn empty_listing() {
        assert_eq!(jobs_table(&[]), "No jobs\n");
    }

    #[test]
    fn details_of_placeholder_job() {
        let job = JobRecord::placeholder("gone", PlaceholderReason::Missing, JobStatus::NotFound);

        let text = job_details(&job);

        assert!(text.contains("function:  Can't find job"));
        assert!(text.contains("status:    not_found"));
        assert!(text.contains("try:       -1"));
        assert!(!text.contains("success:"));
    }

    #[test]
    fn details_include_outcome() {
        let text = job_details(&finished("a", false));

        assert!(text.contains("success:   no"));
        assert!(text.contains("queue:     arq:queue"));
    }
}
