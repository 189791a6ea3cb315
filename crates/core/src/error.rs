//! Error model for attribute resolution and suggestion.

use thiserror::Error;

use crate::id::{AttributeValue, FieldName, RecordId};

/// Result type used across the suggestion engine.
pub type LinkageResult<T> = Result<T, LinkageError>;

/// Failure raised by a resolver backend (index store, search service, ...).
///
/// An empty reverse lookup is *not* an error; this covers I/O and similar
/// infrastructure failures only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("resolver backend error: {0}")]
    Backend(String),
}

impl ResolverError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Suggestion engine error.
///
/// None of these are retried internally; they propagate to whoever called
/// [`crate::suggest`] (normally a queue runner).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkageError {
    /// The resolver's `lookup` did not return a sequence of scalar values.
    #[error("invalid lookup result for record {record_id} field {field}: expected a sequence, got {found}")]
    InvalidLookupResult {
        record_id: RecordId,
        field: FieldName,
        found: String,
    },

    /// Debug verification found a candidate whose forward index does not hold
    /// the value it was reverse-looked-up by.
    #[error(
        "suggestion verification failed: record {candidate} was returned for {field}={value} but its lookup does not contain that value"
    )]
    SuggestionVerificationFailed {
        origin: RecordId,
        candidate: RecordId,
        field: FieldName,
        value: AttributeValue,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}
