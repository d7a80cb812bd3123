//! # Lookout Core
//!
//! The inspection layer over an arq-style Redis job queue.
//! This crate reconstructs job state from raw keyspace evidence, aggregates
//! per-queue statistics and drives best-effort aborts. It holds no store client:
//! everything it reads goes through the ports in [`ports`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{JobRecord, JobStatus, QueueStats};
pub use error::{DeserializeError, StoreError};
pub use service::{AbortOutcome, JobListFilter, QueueView, StatusCaching, ViewOptions};
