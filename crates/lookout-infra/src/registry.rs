//! Entry point for opening scoped queue views.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use lookout_core::ports::JobStore;
use lookout_core::{QueueStats, QueueView, StoreError};

use crate::config::{AdminConfig, QueueConfig};
use crate::error::AdminError;
use crate::store::InMemoryJobStore;

/// Opens a store for one configured queue.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, queue: &QueueConfig) -> Result<Arc<dyn JobStore>, StoreError>;
}

/// Connects each view to Redis with its own connection.
#[cfg(feature = "redis")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[cfg(feature = "redis")]
#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, queue: &QueueConfig) -> Result<Arc<dyn JobStore>, StoreError> {
        let store = crate::store::RedisJobStore::connect(queue).await?;
        Ok(Arc::new(store))
    }
}

/// Hands out in-memory stores registered per queue name.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    stores: HashMap<String, InMemoryJobStore>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, queue: impl Into<String>, store: InMemoryJobStore) -> Self {
        self.stores.insert(queue.into(), store);
        self
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(&self, queue: &QueueConfig) -> Result<Arc<dyn JobStore>, StoreError> {
        match self.stores.get(&queue.name) {
            Some(store) => Ok(Arc::new(store.clone())),
            None => Err(StoreError::Connection(format!(
                "no in-memory store for queue {}",
                queue.name
            ))),
        }
    }
}

/// The configured queues and the means to open them.
pub struct QueueRegistry {
    config: AdminConfig,
    connector: Arc<dyn StoreConnector>,
}

impl QueueRegistry {
    pub fn new(config: AdminConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self { config, connector }
    }

    /// Registry connecting every queue to Redis.
    #[cfg(feature = "redis")]
    pub fn redis(config: AdminConfig) -> Self {
        Self::new(config, Arc::new(RedisConnector))
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Queue names in configuration order.
    pub fn queue_names(&self) -> impl Iterator<Item = &str> {
        self.config.queues().iter().map(|q| q.name.as_str())
    }

    /// Open a scoped view over `name`. The connection lives as long as the view.
    pub async fn open(&self, name: &str) -> Result<QueueView, AdminError> {
        let queue = self
            .config
            .queue(name)
            .ok_or_else(|| AdminError::UnknownQueue(name.to_string()))?;
        self.open_queue(queue).await
    }

    async fn open_queue(&self, queue: &QueueConfig) -> Result<QueueView, AdminError> {
        let store = self.connector.connect(queue).await?;
        tracing::debug!(queue = %queue.name, "Opened queue view");

        Ok(QueueView::new(
            &queue.name,
            queue.redis.coordinates(),
            store,
            self.config.deserializer_for(&queue.name),
        )
        .with_layout(queue.layout.clone())
        .with_options(self.config.view.clone()))
    }

    /// Stats of every configured queue, gathered concurrently, in configuration order.
    ///
    /// A queue that cannot be opened reports its connection error in the stats.
    pub async fn all_stats(&self) -> Vec<QueueStats> {
        let gathers = self.config.queues().iter().map(|queue| async move {
            match self.open_queue(queue).await {
                Ok(view) => view.get_stats().await,
                Err(e) => {
                    tracing::warn!(queue = %queue.name, error = %e, "Failed to open queue");
                    QueueStats::failed(&queue.name, queue.redis.coordinates(), e.to_string())
                }
            }
        });
        futures::future::join_all(gathers).await
    }
}
