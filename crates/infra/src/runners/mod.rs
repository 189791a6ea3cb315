//! Queue name -> runner routing.
//!
//! A runner is a plain function from a job payload to a serializable result.
//! Each queue maps to exactly one runner; which attribute type a queue serves
//! is decided here, at registration time.

pub mod suggest;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use linkage_core::AttributeResolver;

use crate::jobs::QueueName;

pub use suggest::{SuggestRequest, SuggestRunner};

/// Runner function type.
pub type Runner = Arc<dyn Fn(&JsonValue) -> anyhow::Result<JsonValue> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a runner is already registered for queue {0}")]
    Duplicate(QueueName),
}

/// Registered runners, ordered by queue name.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: BTreeMap<QueueName, Runner>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runner` as the handler for `queue`.
    pub fn register<F>(&mut self, queue: impl Into<QueueName>, runner: F) -> Result<(), RegistryError>
    where
        F: Fn(&JsonValue) -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        let queue = queue.into();
        if self.runners.contains_key(&queue) {
            return Err(RegistryError::Duplicate(queue));
        }
        self.runners.insert(queue, Arc::new(runner));
        Ok(())
    }

    /// Register a [`SuggestRunner`] for `queue`.
    pub fn register_suggest<R>(
        &mut self,
        queue: impl Into<QueueName>,
        runner: SuggestRunner<R>,
    ) -> Result<(), RegistryError>
    where
        R: AttributeResolver + 'static,
    {
        self.register(queue, move |payload| runner.run(payload))
    }

    pub fn get(&self, queue: &QueueName) -> Option<&Runner> {
        self.runners.get(queue)
    }

    pub fn queues(&self) -> impl Iterator<Item = &QueueName> {
        self.runners.keys()
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

impl IntoIterator for RunnerRegistry {
    type Item = (QueueName, Runner);
    type IntoIter = std::collections::btree_map::IntoIter<QueueName, Runner>;

    fn into_iter(self) -> Self::IntoIter {
        self.runners.into_iter()
    }
}

impl core::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("queues", &self.runners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_by_exact_queue_name() {
        let mut registry = RunnerRegistry::new();
        registry.register("phone", |_| Ok(json!("phone"))).unwrap();
        registry.register("twitter", |_| Ok(json!("twitter"))).unwrap();

        let runner = registry.get(&QueueName::from("twitter")).unwrap();
        assert_eq!(runner(&json!({})).unwrap(), json!("twitter"));
        assert!(registry.get(&QueueName::from("geocode")).is_none());
    }

    #[test]
    fn duplicate_queue_is_rejected() {
        let mut registry = RunnerRegistry::new();
        registry.register("phone", |_| Ok(json!(1))).unwrap();

        let err = registry.register("phone", |_| Ok(json!(2))).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(QueueName::from("phone")));

        // The first registration stays in place.
        let runner = registry.get(&QueueName::from("phone")).unwrap();
        assert_eq!(runner(&json!({})).unwrap(), json!(1));
    }

    #[test]
    fn queues_are_listed_in_order() {
        let mut registry = RunnerRegistry::new();
        for name in ["youtube", "geocode", "phone"] {
            registry.register(name, |_| Ok(json!(null))).unwrap();
        }

        let names: Vec<&str> = registry.queues().map(QueueName::as_str).collect();
        assert_eq!(names, vec!["geocode", "phone", "youtube"]);
        assert_eq!(registry.len(), 3);
    }
}
