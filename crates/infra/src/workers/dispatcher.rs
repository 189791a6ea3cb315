//! Multi-queue dispatcher: one worker thread per registered queue.
//!
//! Each worker loops fetch -> run -> complete -> acknowledge. Whatever the
//! runner does, its job gets a stored result and an acknowledgement. When the
//! runner fails, the worker then stops for good (fail-stop per queue); nothing
//! restarts it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::jobs::{Job, JobId, JobQueue, JobResult, QueueError, QueueName};
use crate::runners::{Runner, RunnerRegistry};

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue client was closed (orderly shutdown).
    QueueClosed,
    /// The runner failed on `job_id`; its error report was stored and the job
    /// acknowledged before the worker stopped.
    HandlerFailed { job_id: JobId, error: String },
    /// The broker failed on fetch, complete or acknowledge.
    Broker(String),
    /// The worker thread itself panicked outside the runner.
    Crashed(String),
}

impl WorkerExit {
    pub fn is_failure(&self) -> bool {
        !matches!(self, WorkerExit::QueueClosed)
    }
}

/// Status updates published by workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Started { queue: QueueName },
    JobCompleted { queue: QueueName, job_id: JobId },
    JobFailed { queue: QueueName, job_id: JobId, error: String },
    Stopped { queue: QueueName, exit: WorkerExit },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("no runners registered")]
    NoQueues,

    #[error("failed to spawn worker for queue {queue}: {source}")]
    Spawn {
        queue: QueueName,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to one running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    queue: QueueName,
    join: Option<thread::JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Wait for the worker to stop.
    pub fn join(mut self) -> WorkerExit {
        match self.join.take().map(thread::JoinHandle::join) {
            Some(Ok(exit)) => exit,
            Some(Err(panic)) => WorkerExit::Crashed(panic_message(panic.as_ref())),
            None => WorkerExit::Crashed("worker already joined".to_string()),
        }
    }
}

/// Handle to every worker plus their status channel.
#[derive(Debug)]
pub struct DispatcherHandle {
    workers: Vec<WorkerHandle>,
    events: mpsc::Receiver<WorkerEvent>,
}

impl DispatcherHandle {
    /// Queues being served, one worker each.
    pub fn queues(&self) -> Vec<&QueueName> {
        self.workers.iter().map(WorkerHandle::queue).collect()
    }

    /// Status channel. Disconnects once every worker has stopped.
    pub fn events(&self) -> &mpsc::Receiver<WorkerEvent> {
        &self.events
    }

    /// Block until some worker reports that it stopped.
    ///
    /// Other events received meanwhile are discarded. Returns `None` if the
    /// channel disconnected first.
    pub fn wait_any(&self) -> Option<(QueueName, WorkerExit)> {
        loop {
            match self.events.recv() {
                Ok(WorkerEvent::Stopped { queue, exit }) => return Some((queue, exit)),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for every worker to stop and report how each one ended.
    pub fn join(self) -> Vec<(QueueName, WorkerExit)> {
        self.workers
            .into_iter()
            .map(|w| {
                let queue = w.queue.clone();
                (queue, w.join())
            })
            .collect()
    }
}

/// Runs one worker per registered queue against a shared queue client.
pub struct QueueDispatcher<Q> {
    client: Arc<Q>,
    registry: RunnerRegistry,
}

impl<Q> QueueDispatcher<Q>
where
    Q: JobQueue + 'static,
{
    pub fn new(client: Arc<Q>, registry: RunnerRegistry) -> Self {
        Self { client, registry }
    }

    /// Start one worker thread per registered queue.
    pub fn spawn(self) -> Result<DispatcherHandle, DispatcherError> {
        if self.registry.is_empty() {
            return Err(DispatcherError::NoQueues);
        }

        let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();
        let mut workers = Vec::with_capacity(self.registry.len());

        for (queue, runner) in self.registry {
            let client = self.client.clone();
            let events = events_tx.clone();
            let name = queue.clone();

            let join = thread::Builder::new()
                .name(format!("linkage:{queue}"))
                .spawn(move || {
                    let _ = events.send(WorkerEvent::Started { queue: name.clone() });
                    let exit = worker_loop(&name, &runner, client.as_ref(), &events);
                    let _ = events.send(WorkerEvent::Stopped {
                        queue: name,
                        exit: exit.clone(),
                    });
                    exit
                })
                .map_err(|source| DispatcherError::Spawn {
                    queue: queue.clone(),
                    source,
                })?;

            workers.push(WorkerHandle {
                queue,
                join: Some(join),
            });
        }

        info!(workers = workers.len(), "queue dispatcher started");

        Ok(DispatcherHandle {
            workers,
            events: events_rx,
        })
    }
}

fn worker_loop<Q>(
    queue: &QueueName,
    runner: &Runner,
    client: &Q,
    events: &mpsc::Sender<WorkerEvent>,
) -> WorkerExit
where
    Q: JobQueue + ?Sized,
{
    info!(queue = %queue, "listening");

    loop {
        let job = match client.fetch(queue) {
            Ok(job) => job,
            Err(QueueError::Closed) => {
                info!(queue = %queue, "queue closed; worker stopping");
                return WorkerExit::QueueClosed;
            }
            Err(e) => {
                warn!(queue = %queue, error = %e, "fetch failed; worker stopping");
                return WorkerExit::Broker(e.to_string());
            }
        };

        debug!(queue = %queue, job_id = %job.id, "fetched job");

        let (result, failure) = match invoke(runner, &job.payload) {
            Ok(output) => (JobResult::Success(output), None),
            Err(err) => (JobResult::failed(&job, &err), Some(err)),
        };

        // Step 1: the job always gets a result and an acknowledgement.
        if let Err(exit) = finalize(client, &job, &result) {
            return exit;
        }

        // Step 2: a runner failure stops this queue.
        match failure {
            None => {
                debug!(queue = %queue, job_id = %job.id, "job completed");
                let _ = events.send(WorkerEvent::JobCompleted {
                    queue: queue.clone(),
                    job_id: job.id,
                });
            }
            Some(err) => {
                let error = format!("{err:#}");
                error!(queue = %queue, job_id = %job.id, error = %error, "runner failed; worker stopping");
                let _ = events.send(WorkerEvent::JobFailed {
                    queue: queue.clone(),
                    job_id: job.id.clone(),
                    error: error.clone(),
                });
                return WorkerExit::HandlerFailed {
                    job_id: job.id,
                    error,
                };
            }
        }
    }
}

/// Store the result, then acknowledge. An unstored result is never
/// acknowledged, so the broker may still redeliver that job.
fn finalize<Q>(client: &Q, job: &Job, result: &JobResult) -> Result<(), WorkerExit>
where
    Q: JobQueue + ?Sized,
{
    client.complete(&job.id, result).map_err(|e| {
        warn!(queue = %job.queue, job_id = %job.id, error = %e, "complete failed; job left unacknowledged");
        WorkerExit::Broker(e.to_string())
    })?;

    client.acknowledge(&job.id).map_err(|e| {
        warn!(queue = %job.queue, job_id = %job.id, error = %e, "acknowledge failed");
        WorkerExit::Broker(e.to_string())
    })
}

/// Run the runner; a panic counts as a failure like any returned error.
fn invoke(runner: &Runner, payload: &JsonValue) -> anyhow::Result<JsonValue> {
    match panic::catch_unwind(AssertUnwindSafe(|| runner(payload))) {
        Ok(outcome) => outcome,
        Err(panic) => Err(anyhow::anyhow!("runner panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobQueue;
    use serde_json::json;
    use std::sync::Mutex;

    /// Queue client whose `complete` always fails.
    struct RejectingComplete(InMemoryJobQueue);

    impl JobQueue for RejectingComplete {
        fn fetch(&self, queue: &QueueName) -> Result<Job, QueueError> {
            self.0.fetch(queue)
        }

        fn complete(&self, _: &JobId, _: &JobResult) -> Result<(), QueueError> {
            Err(QueueError::Command("ADDJOB failed: READONLY".to_string()))
        }

        fn acknowledge(&self, job_id: &JobId) -> Result<(), QueueError> {
            self.0.acknowledge(job_id)
        }
    }

    #[test]
    fn empty_registry_is_rejected() {
        let dispatcher = QueueDispatcher::new(InMemoryJobQueue::arc(), RunnerRegistry::new());
        assert!(matches!(dispatcher.spawn(), Err(DispatcherError::NoQueues)));
    }

    #[test]
    fn close_stops_every_worker_cleanly() {
        let client = InMemoryJobQueue::arc();
        let mut registry = RunnerRegistry::new();
        registry.register("phone", |_| Ok(json!(null))).unwrap();
        registry.register("twitter", |_| Ok(json!(null))).unwrap();

        let handle = QueueDispatcher::new(client.clone(), registry).spawn().unwrap();
        assert_eq!(handle.queues().len(), 2);

        client.close();

        let exits = handle.join();
        assert_eq!(
            exits,
            vec![
                (QueueName::from("phone"), WorkerExit::QueueClosed),
                (QueueName::from("twitter"), WorkerExit::QueueClosed),
            ]
        );
    }

    #[test]
    fn failed_complete_stops_without_acknowledging() {
        let client = Arc::new(RejectingComplete(InMemoryJobQueue::new()));
        client.0.enqueue("phone", json!({})).unwrap();

        let mut registry = RunnerRegistry::new();
        registry.register("phone", |_| Ok(json!("ok"))).unwrap();

        let handle = QueueDispatcher::new(client.clone(), registry).spawn().unwrap();
        let (queue, exit) = handle.wait_any().unwrap();

        assert_eq!(queue, QueueName::from("phone"));
        assert!(matches!(exit, WorkerExit::Broker(msg) if msg.contains("READONLY")));
        assert!(client.0.acknowledged().is_empty());
    }

    #[test]
    fn panicking_runner_is_reported_like_an_error() {
        let client = InMemoryJobQueue::arc();
        let job_id = client.enqueue("phone", json!({})).unwrap();

        let mut registry = RunnerRegistry::new();
        registry
            .register("phone", |_| -> anyhow::Result<JsonValue> { panic!("index corrupted") })
            .unwrap();

        let handle = QueueDispatcher::new(client.clone(), registry).spawn().unwrap();
        let (_, exit) = handle.wait_any().unwrap();

        match exit {
            WorkerExit::HandlerFailed { job_id: failed, error } => {
                assert_eq!(failed, job_id);
                assert_eq!(error, "runner panicked: index corrupted");
            }
            other => panic!("expected HandlerFailed, got {other:?}"),
        }

        let report = client.result(&job_id).unwrap();
        assert_eq!(
            report.error_report().map(|r| r.message.as_str()),
            Some("runner panicked: index corrupted")
        );
        assert_eq!(client.acknowledged(), vec![job_id]);
    }

    #[test]
    fn status_channel_reports_lifecycle_in_order() {
        let client = InMemoryJobQueue::arc();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_runner = seen.clone();

        let mut registry = RunnerRegistry::new();
        registry
            .register("phone", move |payload| {
                seen_by_runner.lock().unwrap().push(payload.clone());
                Ok(json!("done"))
            })
            .unwrap();

        let handle = QueueDispatcher::new(client.clone(), registry).spawn().unwrap();
        let job_id = client.enqueue("phone", json!({"id": "0"})).unwrap();

        let phone = QueueName::from("phone");
        assert_eq!(
            handle.events().recv().unwrap(),
            WorkerEvent::Started { queue: phone.clone() }
        );
        assert_eq!(
            handle.events().recv().unwrap(),
            WorkerEvent::JobCompleted {
                queue: phone.clone(),
                job_id: job_id.clone(),
            }
        );

        client.close();
        assert_eq!(
            handle.events().recv().unwrap(),
            WorkerEvent::Stopped {
                queue: phone,
                exit: WorkerExit::QueueClosed,
            }
        );
        assert!(handle.events().recv().is_err());

        assert_eq!(*seen.lock().unwrap(), vec![json!({"id": "0"})]);
        assert_eq!(client.result(&job_id), Some(JobResult::Success(json!("done"))));
    }
}
