//! Infrastructure layer: broker clients, runner routing, queue workers, config.

pub mod config;
pub mod jobs;
pub mod runners;
pub mod workers;

pub use config::{ConfigError, WorkerConfig};
pub use jobs::{ErrorReport, InMemoryJobQueue, Job, JobId, JobQueue, JobResult, QueueError, QueueName};
pub use runners::{RegistryError, Runner, RunnerRegistry, SuggestRequest, SuggestRunner};
pub use workers::{DispatcherError, DispatcherHandle, QueueDispatcher, WorkerEvent, WorkerExit};
