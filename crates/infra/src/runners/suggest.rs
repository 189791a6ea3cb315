//! Runner adapting an [`AttributeResolver`] to the queue runner contract.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use linkage_core::{AttributeResolver, FieldName, RecordId, suggest};

/// Payload accepted by [`SuggestRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// Record to find suggestions for.
    #[serde(alias = "ad_id")]
    pub id: RecordId,
    /// Field to match on; defaults to the runner's field.
    #[serde(default)]
    pub field: Option<FieldName>,
    /// Re-verify every candidate against the forward index.
    #[serde(default)]
    pub debug: bool,
}

/// Answers suggest requests for one attribute type.
#[derive(Debug)]
pub struct SuggestRunner<R> {
    resolver: Arc<R>,
    field: FieldName,
}

impl<R> SuggestRunner<R>
where
    R: AttributeResolver,
{
    pub fn new(resolver: Arc<R>, field: impl Into<FieldName>) -> Self {
        Self {
            resolver,
            field: field.into(),
        }
    }

    pub fn field(&self) -> &FieldName {
        &self.field
    }

    /// Decode `payload`, run [`suggest`], and return the suggestion map as JSON.
    pub fn run(&self, payload: &JsonValue) -> anyhow::Result<JsonValue> {
        let request = SuggestRequest::deserialize(payload).context("malformed suggest payload")?;
        let field = request.field.as_ref().unwrap_or(&self.field);

        debug!(record_id = %request.id, field = %field, debug = request.debug, "running suggest");

        let suggestions = suggest(&*self.resolver, &request.id, field, request.debug)
            .with_context(|| format!("suggest failed for record {} field {}", request.id, field))?;

        serde_json::to_value(suggestions).context("failed to serialize suggestions")
    }
}
