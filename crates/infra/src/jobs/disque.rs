//! Disque-backed job queue.
//!
//! Disque speaks RESP, so the `redis` client drives it with raw commands:
//!
//! - **fetch**: `GETJOB TIMEOUT <ms> FROM <queue>`, retried until a job arrives
//! - **complete**: `ADDJOB <job id> <json result> 0` (results are published on a
//!   queue named after the job they belong to)
//! - **acknowledge**: `FASTACK <job id>`
//!
//! Every call opens its own connection from the shared client, so one worker
//! blocked in `GETJOB` never holds up another.

use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{instrument, trace};

use super::queue::{JobQueue, QueueError};
use super::types::{Job, JobId, JobResult, QueueName};

/// How long a single `GETJOB` waits before it is reissued.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DisqueJobQueue {
    client: redis::Client,
    fetch_timeout: Duration,
}

impl DisqueJobQueue {
    /// Connect to a Disque node, e.g. `redis://127.0.0.1:7711`.
    ///
    /// Opens one connection up front so a bad endpoint fails at startup rather
    /// than inside the first worker.
    pub fn connect(url: impl AsRef<str>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url.as_ref())
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        client
            .get_connection()
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    fn connection(&self) -> Result<redis::Connection, QueueError> {
        self.client
            .get_connection()
            .map_err(|e| QueueError::Connection(e.to_string()))
    }
}

impl JobQueue for DisqueJobQueue {
    #[instrument(skip_all, fields(queue = %queue), err)]
    fn fetch(&self, queue: &QueueName) -> Result<Job, QueueError> {
        let mut conn = self.connection()?;
        let timeout_ms = self.fetch_timeout.as_millis().max(1).to_string();

        loop {
            // Reply: nil on timeout, else [[queue, id, body], ...].
            let reply: Option<Vec<Vec<String>>> = redis::cmd("GETJOB")
                .arg("TIMEOUT")
                .arg(&timeout_ms)
                .arg("FROM")
                .arg(queue.as_str())
                .query(&mut conn)
                .map_err(|e| QueueError::Command(format!("GETJOB failed: {e}")))?;

            match reply.and_then(|jobs| jobs.into_iter().next()) {
                Some(entry) => return decode_entry(entry),
                None => trace!(queue = %queue, "GETJOB timed out; waiting again"),
            }
        }
    }

    #[instrument(skip_all, fields(job_id = %job_id), err)]
    fn complete(&self, job_id: &JobId, result: &JobResult) -> Result<(), QueueError> {
        let body = serde_json::to_string(result)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.connection()?;
        let _: String = redis::cmd("ADDJOB")
            .arg(job_id.as_str())
            .arg(&body)
            .arg(0)
            .query(&mut conn)
            .map_err(|e| QueueError::Command(format!("ADDJOB failed: {e}")))?;

        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %job_id), err)]
    fn acknowledge(&self, job_id: &JobId) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        let _: i64 = redis::cmd("FASTACK")
            .arg(job_id.as_str())
            .query(&mut conn)
            .map_err(|e| QueueError::Command(format!("FASTACK failed: {e}")))?;

        Ok(())
    }
}

fn decode_entry(entry: Vec<String>) -> Result<Job, QueueError> {
    let mut fields = entry.into_iter();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(queue), Some(id), Some(body)) => decode_job(queue, id, &body),
        _ => Err(QueueError::Deserialization(
            "GETJOB entry has fewer than three fields".to_string(),
        )),
    }
}

/// Turn one `GETJOB` entry into a [`Job`]; bodies are JSON documents.
fn decode_job(queue: String, id: String, body: &str) -> Result<Job, QueueError> {
    let payload: JsonValue = serde_json::from_str(body).map_err(|e| {
        QueueError::Deserialization(format!("job {id} on {queue} has a non-JSON body: {e}"))
    })?;

    Ok(Job::new(queue, id, payload))
}
