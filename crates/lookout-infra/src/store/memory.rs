//! In-memory job store.
//!
//! Holds the same keyspace a Redis-backed queue would: plain keys holding
//! payloads plus sorted sets. Used by tests and by builds without Redis.
//! Note: Data is lost on process restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use lookout_core::StoreError;
use lookout_core::domain::{KeyKind, KeyLayout};
use lookout_core::ports::{JobEvidence, JobStore, KeyspaceSnapshot, RawJob, ResultPoll};

#[derive(Default)]
struct Keyspace {
    values: HashMap<String, Vec<u8>>,
    sorted_sets: HashMap<String, HashMap<String, f64>>,
}

impl Keyspace {
    fn score(&self, set: &str, member: &str) -> Option<i64> {
        self.sorted_sets
            .get(set)
            .and_then(|members| members.get(member))
            .map(|score| *score as i64)
    }
}

/// In-memory store for one queue. Clones share the same keyspace.
#[derive(Clone)]
pub struct InMemoryJobStore {
    queue: String,
    layout: KeyLayout,
    keyspace: Arc<RwLock<Keyspace>>,
    available: Arc<AtomicBool>,
}

impl InMemoryJobStore {
    pub fn new(queue: impl Into<String>) -> Self {
        Self::with_layout(queue, KeyLayout::default())
    }

    pub fn with_layout(queue: impl Into<String>, layout: KeyLayout) -> Self {
        Self {
            queue: queue.into(),
            layout,
            keyspace: Arc::new(RwLock::new(Keyspace::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate losing (or regaining) the connection.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("in-memory queue {} is offline", self.queue)))
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.keyspace.write().await.values.insert(key.into(), value.into());
    }

    pub async fn delete(&self, key: &str) {
        self.keyspace.write().await.values.remove(key);
    }

    pub async fn zadd(&self, set: impl Into<String>, member: impl Into<String>, score: f64) {
        self.keyspace
            .write()
            .await
            .sorted_sets
            .entry(set.into())
            .or_default()
            .insert(member.into(), score);
    }

    pub async fn zscore(&self, set: &str, member: &str) -> Option<i64> {
        self.keyspace.read().await.score(set, member)
    }

    /// Enqueue a job the way a producer does: definition key plus queue score.
    pub async fn enqueue(&self, job_id: &str, definition: impl Into<Vec<u8>>, score_ms: i64) {
        let mut keyspace = self.keyspace.write().await;
        keyspace
            .values
            .insert(self.layout.key(KeyKind::Definition, job_id), definition.into());
        keyspace
            .sorted_sets
            .entry(self.queue.clone())
            .or_default()
            .insert(job_id.to_string(), score_ms as f64);
    }

    /// Mark a job as picked up by a worker.
    pub async fn start(&self, job_id: &str) {
        self.set(self.layout.key(KeyKind::InProgress, job_id), b"1".to_vec())
            .await;
    }

    /// Finish a job the way a worker does: drop the definition, the marker and
    /// the queue entry, and write the result.
    pub async fn finish(&self, job_id: &str, result: impl Into<Vec<u8>>) {
        let mut keyspace = self.keyspace.write().await;
        keyspace
            .values
            .remove(&self.layout.key(KeyKind::Definition, job_id));
        keyspace
            .values
            .remove(&self.layout.key(KeyKind::InProgress, job_id));
        if let Some(members) = keyspace.sorted_sets.get_mut(&self.queue) {
            members.remove(job_id);
        }
        keyspace
            .values
            .insert(self.layout.key(KeyKind::Result, job_id), result.into());
    }

    /// Job ids with a pending abort request.
    pub async fn abort_requests(&self) -> Vec<String> {
        let keyspace = self.keyspace.read().await;
        let mut ids: Vec<String> = keyspace
            .sorted_sets
            .get(&self.layout.abort_set())
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn snapshot(&self) -> Result<KeyspaceSnapshot, StoreError> {
        self.check_available()?;
        let keyspace = self.keyspace.read().await;
        let prefix = format!("{}:", self.layout.namespace());

        let mut keys: Vec<String> = keyspace
            .values
            .keys()
            .chain(keyspace.sorted_sets.keys())
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        keys.sort();

        let scores = keyspace
            .sorted_sets
            .get(&self.queue)
            .map(|members| {
                members
                    .iter()
                    .map(|(id, score)| (id.clone(), *score as i64))
                    .collect()
            })
            .unwrap_or_default();

        Ok(KeyspaceSnapshot { keys, scores })
    }

    async fn job_evidence(&self, job_id: &str) -> Result<JobEvidence, StoreError> {
        self.check_available()?;
        let keyspace = self.keyspace.read().await;
        let exists = |kind: KeyKind| keyspace.values.contains_key(&self.layout.key(kind, job_id));

        Ok(JobEvidence {
            result: exists(KeyKind::Result),
            in_progress: exists(KeyKind::InProgress),
            definition: exists(KeyKind::Definition),
            score: keyspace.score(&self.queue, job_id),
        })
    }

    async fn fetch_job(&self, job_id: &str) -> Result<RawJob, StoreError> {
        self.check_available()?;
        let keyspace = self.keyspace.read().await;
        let get = |kind: KeyKind| keyspace.values.get(&self.layout.key(kind, job_id)).cloned();

        Ok(RawJob {
            result: get(KeyKind::Result),
            definition: get(KeyKind::Definition),
            score: keyspace.score(&self.queue, job_id),
        })
    }

    async fn poll_result(&self, job_id: &str) -> Result<ResultPoll, StoreError> {
        self.check_available()?;
        let keyspace = self.keyspace.read().await;

        Ok(ResultPoll {
            result: keyspace
                .values
                .get(&self.layout.key(KeyKind::Result, job_id))
                .cloned(),
            score: keyspace.score(&self.queue, job_id),
        })
    }

    async fn request_abort(&self, job_id: &str, now_ms: i64) -> Result<(), StoreError> {
        self.check_available()?;
        let mut keyspace = self.keyspace.write().await;

        if let Some(members) = keyspace.sorted_sets.get_mut(&self.queue) {
            if let Some(score) = members.get_mut(job_id) {
                if *score as i64 > now_ms {
                    *score = 1.0;
                }
            }
        }
        keyspace
            .sorted_sets
            .entry(self.layout.abort_set())
            .or_default()
            .insert(job_id.to_string(), now_ms as f64);

        tracing::debug!(queue = %self.queue, job_id = %job_id, "Abort signal stored");
        Ok(())
    }
}
