//! The queue façade: one scoped view over one queue's store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, Semaphore};

use crate::domain::{
    Coordinates, JobRecord, JobStatus, KeyLayout, QueueStats, StatusMap, aggregate,
    build_status_map, classify,
};
use crate::error::StoreError;
use crate::ports::{JobDeserializer, JobStore};

use super::abort::{AbortOutcome, abort_job};
use super::snapshot::JobSnapshotBuilder;

/// How long a derived status map is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusCaching {
    /// Built once, on first need, and reused until the view is dropped.
    #[default]
    PerView,
    /// Rebuilt by every listing or stats call.
    PerCall,
}

/// Tunables of a [`QueueView`].
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub caching: StatusCaching,
    /// Cap on concurrent per-job store operations.
    pub max_concurrency: usize,
    pub abort_timeout: Duration,
    pub abort_poll_interval: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            caching: StatusCaching::PerView,
            max_concurrency: 100,
            abort_timeout: Duration::from_secs(5),
            abort_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Which jobs a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobListFilter {
    #[default]
    All,
    Status(JobStatus),
    /// Complete jobs whose outcome succeeded.
    Successful,
    /// Complete jobs whose outcome failed.
    Failed,
}

/// A bounded-lifetime handle over one queue: its store plus the memoized status map.
///
/// The store (and with it the connection) is released when the view is dropped.
/// The status map is private to the view; a fresh snapshot needs a fresh view
/// unless [`StatusCaching::PerCall`] is configured.
pub struct QueueView {
    name: String,
    coordinates: Coordinates,
    layout: KeyLayout,
    store: Arc<dyn JobStore>,
    deserializer: Arc<dyn JobDeserializer>,
    builder: JobSnapshotBuilder,
    options: ViewOptions,
    gate: Semaphore,
    status_map: OnceCell<Arc<StatusMap>>,
}

impl QueueView {
    pub fn new(
        name: impl Into<String>,
        coordinates: Coordinates,
        store: Arc<dyn JobStore>,
        deserializer: Arc<dyn JobDeserializer>,
    ) -> Self {
        let name = name.into();
        let options = ViewOptions::default();
        Self {
            builder: JobSnapshotBuilder::new(name.clone(), store.clone(), deserializer.clone()),
            gate: Semaphore::new(options.max_concurrency.max(1)),
            name,
            coordinates,
            layout: KeyLayout::default(),
            store,
            deserializer,
            options,
            status_map: OnceCell::new(),
        }
    }

    pub fn with_layout(mut self, layout: KeyLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.gate = Semaphore::new(options.max_concurrency.max(1));
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    /// Id to status for every job observed in one atomic snapshot.
    ///
    /// arq keeps every queue's job keys in one namespace, so the map also holds
    /// jobs of other queues sharing it: their results show up as `complete` and
    /// their definitions or in-progress markers (no score in this queue) as
    /// `not_found`. Listings and [`get_stats`](Self::get_stats) inherit this.
    pub async fn status_map(&self) -> Result<Arc<StatusMap>, StoreError> {
        match self.options.caching {
            StatusCaching::PerView => self
                .status_map
                .get_or_try_init(|| self.load_status_map())
                .await
                .cloned(),
            StatusCaching::PerCall => self.load_status_map().await,
        }
    }

    async fn load_status_map(&self) -> Result<Arc<StatusMap>, StoreError> {
        let snapshot = self.store.snapshot().await?;
        let kinds = classify(&self.layout, &snapshot.keys);
        let map = build_status_map(kinds, snapshot.scores, super::now_ms());

        tracing::debug!(
            queue = %self.name,
            keys = snapshot.keys.len(),
            jobs = map.len(),
            "Built job status map"
        );

        Ok(Arc::new(map))
    }

    /// All jobs, or only those whose status equals `status`. Unordered.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>, StoreError> {
        let map = self.status_map().await?;
        let selected: Vec<(String, JobStatus)> = map
            .iter()
            .filter(|(_, job_status)| status.is_none_or(|wanted| **job_status == wanted))
            .map(|(id, job_status)| (id.clone(), *job_status))
            .collect();

        self.hydrate_all(selected).await
    }

    /// Like [`list_jobs`](Self::list_jobs), with the success/failure split of complete jobs.
    ///
    /// The split drops results recorded for another queue. Results without a
    /// queue name are kept.
    pub async fn list_filtered(&self, filter: JobListFilter) -> Result<Vec<JobRecord>, StoreError> {
        match filter {
            JobListFilter::All => self.list_jobs(None).await,
            JobListFilter::Status(status) => self.list_jobs(Some(status)).await,
            JobListFilter::Successful | JobListFilter::Failed => {
                let wanted = filter == JobListFilter::Successful;
                let mut jobs = self.list_jobs(Some(JobStatus::Complete)).await?;
                jobs.retain(|job| job.success() == Some(wanted) && self.owns_result(job));
                Ok(jobs)
            }
        }
    }

    fn owns_result(&self, job: &JobRecord) -> bool {
        job.outcome
            .as_ref()
            .and_then(|o| o.queue_name.as_deref())
            .is_none_or(|queue| queue == self.name)
    }

    async fn hydrate_all(
        &self,
        selected: Vec<(String, JobStatus)>,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let fetches = selected.into_iter().map(|(job_id, status)| async move {
            let _permit = self.acquire().await?;
            self.builder.build(&job_id, Some(status)).await
        });
        futures::future::try_join_all(fetches).await
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, StoreError> {
        self.gate
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("concurrency gate closed".to_string()))
    }

    /// Hydrate one job, whether or not the status map has seen it.
    pub async fn get_job(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        let cached = self
            .status_map
            .get()
            .and_then(|map| map.get(job_id).copied());
        let _permit = self.acquire().await?;
        self.builder.build(job_id, cached).await
    }

    /// Per-status counts over [`status_map`](Self::status_map), including jobs of other
    /// queues sharing the namespace. Store failures are reported in the stats, never raised.
    pub async fn get_stats(&self) -> QueueStats {
        match self.status_map().await {
            Ok(map) => {
                let counts = aggregate(&map);
                tracing::debug!(
                    queue = %self.name,
                    queued = counts.queued,
                    in_progress = counts.in_progress,
                    deferred = counts.deferred,
                    complete = counts.complete,
                    "Computed queue stats"
                );
                QueueStats::counted(&self.name, self.coordinates.clone(), counts)
            }
            Err(e) => {
                tracing::warn!(queue = %self.name, error = %e, "Failed to compute queue stats");
                QueueStats::failed(&self.name, self.coordinates.clone(), e.to_string())
            }
        }
    }

    /// Ask workers to abort `job_id` and wait up to the configured timeout.
    pub async fn abort_job(&self, job_id: &str) -> Result<AbortOutcome, StoreError> {
        let outcome = abort_job(
            self.store.as_ref(),
            self.deserializer.as_ref(),
            job_id,
            self.options.abort_timeout,
            self.options.abort_poll_interval,
        )
        .await?;

        tracing::info!(queue = %self.name, job_id = %job_id, outcome = %outcome, "Abort finished");
        Ok(outcome)
    }
}
