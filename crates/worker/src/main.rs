use std::sync::Arc;

use anyhow::{Context, bail};

use linkage_infra::jobs::DisqueJobQueue;
use linkage_infra::{QueueDispatcher, RunnerRegistry, SuggestRunner, WorkerConfig, WorkerExit};

fn main() -> anyhow::Result<()> {
    linkage_observability::init();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let index = Arc::new(config.load_index()?);

    // One suggest queue per indexed field; the queue is named after the field.
    let mut registry = RunnerRegistry::new();
    for field in index.fields() {
        tracing::info!(field = %field, records = index.record_count(&field), "registering suggest runner");
        registry.register_suggest(field.as_str(), SuggestRunner::new(index.clone(), field.clone()))?;
    }

    if registry.is_empty() {
        bail!("index has no fields; no queues to serve");
    }

    let broker = DisqueJobQueue::connect(&config.broker_url)
        .with_context(|| format!("failed to connect to broker at {}", config.broker_url))?;
    tracing::info!(broker = %config.broker_url, "connected to broker");

    let dispatcher = QueueDispatcher::new(Arc::new(broker), registry).spawn()?;

    // Workers are fail-stop: log each one as it goes down, keep serving the rest.
    while let Some((queue, exit)) = dispatcher.wait_any() {
        match &exit {
            WorkerExit::QueueClosed => tracing::info!(queue = %queue, "worker stopped"),
            other => tracing::error!(queue = %queue, exit = ?other, "worker stopped; queue no longer serviced"),
        }
    }

    let failed: Vec<String> = dispatcher
        .join()
        .into_iter()
        .filter(|(_, exit)| exit.is_failure())
        .map(|(queue, _)| queue.to_string())
        .collect();

    if !failed.is_empty() {
        bail!("workers stopped with failures: {}", failed.join(", "));
    }

    Ok(())
}
