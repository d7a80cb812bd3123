//! Redis job store over an arq-style keyspace.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use lookout_core::StoreError;
use lookout_core::domain::{KeyKind, KeyLayout};
use lookout_core::ports::{JobEvidence, JobStore, KeyspaceSnapshot, RawJob, ResultPoll};

use crate::config::QueueConfig;

fn store_error(e: RedisError) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

fn score_ms(score: Option<f64>) -> Option<i64> {
    score.map(|s| s as i64)
}

/// Redis-backed store for one queue.
///
/// Uses a connection manager: one multiplexed connection, safe to share between
/// concurrent fetches and closed when the store is dropped.
pub struct RedisJobStore {
    conn: ConnectionManager,
    queue: String,
    layout: KeyLayout,
}

impl RedisJobStore {
    pub async fn connect(config: &QueueConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis.url().as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(
            host = %config.redis.host,
            port = config.redis.port,
            database = config.redis.database,
            queue = %config.name,
            "Connected to Redis job store"
        );

        Ok(Self {
            conn,
            queue: config.name.clone(),
            layout: config.layout.clone(),
        })
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn snapshot(&self) -> Result<KeyspaceSnapshot, StoreError> {
        let mut conn = self.conn.clone();
        let (keys, scores): (Vec<String>, Vec<(String, f64)>) = redis::pipe()
            .atomic()
            .keys(self.layout.scan_pattern())
            .zrange_withscores(&self.queue, 0, -1)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        tracing::debug!(queue = %self.queue, keys = keys.len(), scored = scores.len(), "Keyspace snapshot");

        Ok(KeyspaceSnapshot {
            keys,
            scores: scores
                .into_iter()
                .map(|(id, score)| (id, score as i64))
                .collect(),
        })
    }

    async fn job_evidence(&self, job_id: &str) -> Result<JobEvidence, StoreError> {
        let mut conn = self.conn.clone();
        let (result, in_progress, definition, score): (bool, bool, bool, Option<f64>) =
            redis::pipe()
                .atomic()
                .exists(self.layout.key(KeyKind::Result, job_id))
                .exists(self.layout.key(KeyKind::InProgress, job_id))
                .exists(self.layout.key(KeyKind::Definition, job_id))
                .zscore(&self.queue, job_id)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;

        Ok(JobEvidence {
            result,
            in_progress,
            definition,
            score: score_ms(score),
        })
    }

    async fn fetch_job(&self, job_id: &str) -> Result<RawJob, StoreError> {
        let mut conn = self.conn.clone();
        let (result, definition, score): (Option<Vec<u8>>, Option<Vec<u8>>, Option<f64>) =
            redis::pipe()
                .atomic()
                .get(self.layout.key(KeyKind::Result, job_id))
                .get(self.layout.key(KeyKind::Definition, job_id))
                .zscore(&self.queue, job_id)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;

        Ok(RawJob {
            result,
            definition,
            score: score_ms(score),
        })
    }

    async fn poll_result(&self, job_id: &str) -> Result<ResultPoll, StoreError> {
        let mut conn = self.conn.clone();
        let (result, score): (Option<Vec<u8>>, Option<f64>) = redis::pipe()
            .atomic()
            .get(self.layout.key(KeyKind::Result, job_id))
            .zscore(&self.queue, job_id)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(ResultPoll {
            result,
            score: score_ms(score),
        })
    }

    async fn request_abort(&self, job_id: &str, now_ms: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();

        let score: Option<f64> = conn
            .zscore(&self.queue, job_id)
            .await
            .map_err(store_error)?;
        if score_ms(score).is_some_and(|s| s > now_ms) {
            // Deferred: make it due now so a worker sees the abort.
            let _: () = redis::pipe()
                .atomic()
                .zrem(&self.queue, job_id)
                .ignore()
                .zadd(&self.queue, job_id, 1)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
        }

        conn.zadd::<_, _, _, ()>(self.layout.abort_set(), job_id, now_ms)
            .await
            .map_err(store_error)?;

        tracing::debug!(queue = %self.queue, job_id = %job_id, "Abort signal stored");
        Ok(())
    }
}
