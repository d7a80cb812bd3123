//! Ports - trait definitions for the job store and payload decoding.
//! Infrastructure implements these; the services only see the traits.

mod codec;
mod store;

pub use codec::JobDeserializer;
pub use store::{JobEvidence, JobStore, KeyspaceSnapshot, RawJob, ResultPoll};
