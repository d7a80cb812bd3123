//! Status derivation from keyspace evidence.

use std::collections::HashMap;

use super::job::JobStatus;
use super::keys::KeyKind;

/// Job id to derived status, built from one keyspace snapshot.
pub type StatusMap = HashMap<String, JobStatus>;

/// Derive a job's status from its winning key kind and its sorted-set score.
///
/// `score` and `now_ms` are epoch milliseconds. A zero score counts as absent.
/// The comparison is strict: a score equal to `now_ms` is due, hence `Queued`.
pub fn resolve(kind: Option<KeyKind>, score: Option<i64>, now_ms: i64) -> JobStatus {
    let score = score.filter(|s| *s != 0);
    match (kind, score) {
        (Some(KeyKind::Result), _) => JobStatus::Complete,
        (Some(KeyKind::InProgress), Some(_)) => JobStatus::InProgress,
        (_, Some(score)) if score > now_ms => JobStatus::Deferred,
        (_, Some(_)) => JobStatus::Queued,
        (_, None) => JobStatus::NotFound,
    }
}

/// Resolve every id seen either as a key or as a sorted-set member.
pub fn build_status_map<S>(kinds: HashMap<String, KeyKind>, scores: S, now_ms: i64) -> StatusMap
where
    S: IntoIterator<Item = (String, i64)>,
{
    let mut evidence: HashMap<String, (Option<KeyKind>, Option<i64>)> = kinds
        .into_iter()
        .map(|(id, kind)| (id, (Some(kind), None)))
        .collect();
    for (id, score) in scores {
        evidence.entry(id).or_insert((None, None)).1 = Some(score);
    }

    evidence
        .into_iter()
        .map(|(id, (kind, score))| (id, resolve(kind, score, now_ms)))
        .collect()
}
