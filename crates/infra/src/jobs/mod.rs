//! Job queue plumbing: the broker client contract and its implementations.
//!
//! ## Components
//!
//! - `JobQueue`: fetch / complete / acknowledge against a broker
//! - `InMemoryJobQueue`: blocking FIFO queues for tests/dev
//! - `DisqueJobQueue`: Disque broker client (feature `disque`)
//! - `JobResult` / `ErrorReport`: what gets written back per job

pub mod in_memory;
pub mod queue;
pub mod types;

#[cfg(feature = "disque")]
pub mod disque;

#[cfg(feature = "disque")]
pub use disque::DisqueJobQueue;
pub use in_memory::InMemoryJobQueue;
pub use queue::{JobQueue, QueueError};
pub use types::{ErrorReport, Job, JobId, JobResult, QueueName};
