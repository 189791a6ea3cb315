//! Job, queue and result types shared by queue clients and the dispatcher.

use core::borrow::Borrow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Name of a work queue (one per attribute type, e.g. `phone`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

/// Broker-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(QueueName);
impl_string_newtype!(JobId);

impl JobId {
    /// Fresh locally generated id (UUIDv7). Real brokers assign their own.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

/// A unit of work delivered by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub queue: QueueName,
    pub id: JobId,
    pub payload: JsonValue,
}

impl Job {
    pub fn new(queue: impl Into<QueueName>, id: impl Into<JobId>, payload: JsonValue) -> Self {
        Self {
            queue: queue.into(),
            id: id.into(),
            payload,
        }
    }
}

/// Structured description of a failed job, written back in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub job_id: JobId,
    pub queue: QueueName,
    /// Outermost error message.
    pub message: String,
    /// Underlying causes, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    pub failed_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(job: &Job, error: &anyhow::Error) -> Self {
        Self {
            job_id: job.id.clone(),
            queue: job.queue.clone(),
            message: error.to_string(),
            causes: error.chain().skip(1).map(ToString::to_string).collect(),
            failed_at: Utc::now(),
        }
    }
}

/// What gets stored against a job id once it has been processed.
///
/// A success is stored as the runner's bare payload; a failure as
/// `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Failed { error: ErrorReport },
    Success(JsonValue),
}

impl JobResult {
    pub fn failed(job: &Job, error: &anyhow::Error) -> Self {
        Self::Failed {
            error: ErrorReport::new(job, error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    pub fn error_report(&self) -> Option<&ErrorReport> {
        match self {
            JobResult::Failed { error } => Some(error),
            JobResult::Success(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use serde_json::json;

    fn job() -> Job {
        Job::new("phone", "D-1", json!({"id": "0"}))
    }

    #[test]
    fn error_report_captures_cause_chain() {
        let err = Err::<(), _>(std::io::Error::other("index offline"))
            .context("suggest failed for record 0")
            .unwrap_err();

        let report = ErrorReport::new(&job(), &err);

        assert_eq!(report.job_id, JobId::from("D-1"));
        assert_eq!(report.queue, QueueName::from("phone"));
        assert_eq!(report.message, "suggest failed for record 0");
        assert_eq!(report.causes, vec!["index offline".to_string()]);
    }

    #[test]
    fn success_serializes_as_bare_payload() {
        let result = JobResult::Success(json!({"0": {"phone": {}}}));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"0": {"phone": {}}}));
    }

    #[test]
    fn failure_serializes_under_error_key_and_reads_back() {
        let result = JobResult::failed(&job(), &anyhow::anyhow!("boom"));
        let raw = serde_json::to_value(&result).unwrap();

        assert_eq!(raw["error"]["message"], json!("boom"));
        assert_eq!(raw["error"]["queue"], json!("phone"));
        assert!(raw["error"].get("causes").is_none());

        let back: JobResult = serde_json::from_value(raw).unwrap();
        assert!(back.is_failure());
        assert_eq!(back, result);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }
}
