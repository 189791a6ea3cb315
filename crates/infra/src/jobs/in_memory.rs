//! In-memory job queue for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use serde_json::Value as JsonValue;

use super::queue::{JobQueue, QueueError};
use super::types::{Job, JobId, JobResult, QueueName};

#[derive(Debug, Default)]
struct State {
    queues: HashMap<QueueName, VecDeque<Job>>,
    in_flight: HashMap<JobId, QueueName>,
    results: Vec<(JobId, JobResult)>,
    acknowledged: Vec<JobId>,
    closed: bool,
}

/// Blocking FIFO queues keyed by name.
///
/// - `fetch` blocks until a job arrives or the queue is closed
/// - every `complete`/`acknowledge` call is recorded for inspection
/// - acknowledged jobs are never redelivered
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<State>,
    ready: Condvar,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Push a job onto `queue` and wake a waiting fetch.
    pub fn enqueue(
        &self,
        queue: impl Into<QueueName>,
        payload: JsonValue,
    ) -> Result<JobId, QueueError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(QueueError::Closed);
        }

        let queue = queue.into();
        let id = JobId::generate();
        state
            .queues
            .entry(queue.clone())
            .or_default()
            .push_back(Job::new(queue, id.clone(), payload));

        self.ready.notify_all();
        Ok(id)
    }

    /// Close the queue: blocked and future fetches return [`QueueError::Closed`].
    pub fn close(&self) {
        let mut state = self.lock_or_recover();
        state.closed = true;
        self.ready.notify_all();
    }

    /// Jobs still waiting on `queue`.
    pub fn pending(&self, queue: &QueueName) -> usize {
        self.lock_or_recover().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Every `complete` call so far, in call order.
    pub fn results(&self) -> Vec<(JobId, JobResult)> {
        self.lock_or_recover().results.clone()
    }

    /// Latest result stored for `job_id`.
    pub fn result(&self, job_id: &JobId) -> Option<JobResult> {
        self.lock_or_recover()
            .results
            .iter()
            .rev()
            .find(|(id, _)| id == job_id)
            .map(|(_, r)| r.clone())
    }

    /// Every `acknowledge` call so far, in call order.
    pub fn acknowledged(&self) -> Vec<JobId> {
        self.lock_or_recover().acknowledged.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, QueueError> {
        self.state.lock().map_err(|_| QueueError::Poisoned)
    }

    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobQueue for InMemoryJobQueue {
    fn fetch(&self, queue: &QueueName) -> Result<Job, QueueError> {
        let mut state = self.lock()?;
        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }

            if let Some(job) = state.queues.get_mut(queue).and_then(VecDeque::pop_front) {
                state.in_flight.insert(job.id.clone(), job.queue.clone());
                return Ok(job);
            }

            state = self.ready.wait(state).map_err(|_| QueueError::Poisoned)?;
        }
    }

    fn complete(&self, job_id: &JobId, result: &JobResult) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        if !state.in_flight.contains_key(job_id) {
            return Err(QueueError::UnknownJob(job_id.clone()));
        }
        state.results.push((job_id.clone(), result.clone()));
        Ok(())
    }

    fn acknowledge(&self, job_id: &JobId) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        if state.in_flight.remove(job_id).is_none() {
            return Err(QueueError::UnknownJob(job_id.clone()));
        }
        state.acknowledged.push(job_id.clone());
        Ok(())
    }
}
