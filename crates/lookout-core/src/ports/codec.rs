use crate::domain::{JobDefinition, JobInfo};
use crate::error::DeserializeError;

/// Decodes the payloads workers write for definitions and results.
///
/// The encoding is chosen by whoever enqueues the jobs, so it can differ per queue.
pub trait JobDeserializer: Send + Sync {
    fn deserialize_definition(&self, payload: &[u8]) -> Result<JobDefinition, DeserializeError>;

    /// A result payload repeats the definition and adds the outcome.
    fn deserialize_result(&self, payload: &[u8]) -> Result<JobInfo, DeserializeError>;
}
