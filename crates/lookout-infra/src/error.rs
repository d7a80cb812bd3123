//! Errors raised while opening queues.

use lookout_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
