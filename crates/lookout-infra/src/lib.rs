//! # Lookout Infrastructure
//!
//! Concrete implementations of the ports defined in `lookout-core`, plus the
//! configuration and registry that open scoped queue views.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - Redis-backed job store
//! - `minimal` - No external dependencies, in-memory store only

pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod store;

pub use codec::ArqJsonCodec;
pub use config::{AdminConfig, ConfigError, QueueConfig, RedisConfig};
pub use error::AdminError;
pub use registry::{InMemoryConnector, QueueRegistry, StoreConnector};
pub use store::InMemoryJobStore;

#[cfg(feature = "redis")]
pub use registry::RedisConnector;
#[cfg(feature = "redis")]
pub use store::RedisJobStore;
