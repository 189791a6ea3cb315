//! Broker client abstraction.

use std::sync::Arc;

use super::types::{Job, JobId, JobResult, QueueName};

/// Client for a job broker with atomic fetch/ack semantics.
///
/// The broker guarantees each job is handed to exactly one `fetch` call. The
/// dispatcher calls `complete` and then `acknowledge` exactly once per fetched
/// job.
pub trait JobQueue: Send + Sync {
    /// Block until a job is available on `queue`.
    fn fetch(&self, queue: &QueueName) -> Result<Job, QueueError>;

    /// Store `result` against `job_id` for downstream consumers.
    fn complete(&self, job_id: &JobId, result: &JobResult) -> Result<(), QueueError>;

    /// Mark `job_id` as durably processed so it is never redelivered.
    fn acknowledge(&self, job_id: &JobId) -> Result<(), QueueError>;
}

impl<Q> JobQueue for Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    fn fetch(&self, queue: &QueueName) -> Result<Job, QueueError> {
        (**self).fetch(queue)
    }

    fn complete(&self, job_id: &JobId, result: &JobResult) -> Result<(), QueueError> {
        (**self).complete(job_id, result)
    }

    fn acknowledge(&self, job_id: &JobId) -> Result<(), QueueError> {
        (**self).acknowledge(job_id)
    }
}

/// Queue client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    /// The client was shut down; blocked fetches return this.
    #[error("queue closed")]
    Closed,

    #[error("queue state poisoned")]
    Poisoned,
}
