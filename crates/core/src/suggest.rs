//! Cross-record suggestions from shared attribute values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{LinkageError, LinkageResult};
use crate::id::{AttributeValue, FieldName, RecordId};
use crate::resolver::{AttributeResolver, lookup_values};

/// `value -> related record ids` for one field of one record.
pub type ValueSuggestions = BTreeMap<AttributeValue, Vec<RecordId>>;

/// `record -> field -> value -> related record ids`.
///
/// Built fresh by every [`suggest`] call. A record never appears among its own
/// related ids. Serializes as plain nested JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionMap(BTreeMap<RecordId, BTreeMap<FieldName, ValueSuggestions>>);

impl SuggestionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Related ids for one `(record, field, value)`, if an entry was written.
    pub fn related(
        &self,
        record_id: &RecordId,
        field: &FieldName,
        value: &AttributeValue,
    ) -> Option<&[RecordId]> {
        self.0
            .get(record_id)?
            .get(field)?
            .get(value)
            .map(Vec::as_slice)
    }

    /// All value entries for one `(record, field)`.
    pub fn field(&self, record_id: &RecordId, field: &FieldName) -> Option<&ValueSuggestions> {
        self.0.get(record_id)?.get(field)
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordId> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Make sure `record -> field` exists and return its value map.
    fn field_entry(&mut self, record_id: &RecordId, field: &FieldName) -> &mut ValueSuggestions {
        self.0
            .entry(record_id.clone())
            .or_default()
            .entry(field.clone())
            .or_default()
    }
}

/// Suggest other records sharing any value of `field` with `record_id`.
///
/// One reverse lookup per value (O(N) in the number of values). With `debug`,
/// every candidate is looked up again to confirm it really holds the value,
/// which costs O(N*M) lookups.
///
/// Candidate order is sorted by record id. If the resolver's inverted index
/// does not list `record_id` itself for a value, that value is skipped.
///
/// Debug verification is a *membership* check: the candidate passes when its
/// lookup contains the value, not when the lookup equals it.
pub fn suggest<R>(
    resolver: &R,
    record_id: &RecordId,
    field: &FieldName,
    debug: bool,
) -> LinkageResult<SuggestionMap>
where
    R: AttributeResolver + ?Sized,
{
    let values = lookup_values(resolver, record_id, field)?;

    let mut result = SuggestionMap::new();
    result.field_entry(record_id, field);

    for value in values {
        let mut candidates = resolver.reverse_lookup(field, &value)?;

        if !candidates.remove(record_id) {
            debug!(
                record_id = %record_id,
                field = %field,
                value = %value,
                "origin record missing from its own reverse lookup; skipping value"
            );
            continue;
        }

        if debug {
            for candidate in &candidates {
                verify_candidate(resolver, record_id, candidate, field, &value)?;
            }
        }

        trace!(record_id = %record_id, field = %field, value = %value, related = candidates.len());

        let related: Vec<RecordId> = candidates.into_iter().collect();
        result.field_entry(record_id, field).insert(value, related);
    }

    Ok(result)
}

fn verify_candidate<R>(
    resolver: &R,
    origin: &RecordId,
    candidate: &RecordId,
    field: &FieldName,
    value: &AttributeValue,
) -> LinkageResult<()>
where
    R: AttributeResolver + ?Sized,
{
    let held = lookup_values(resolver, candidate, field)?;
    if held.contains(value) {
        return Ok(());
    }

    Err(LinkageError::SuggestionVerificationFailed {
        origin: origin.clone(),
        candidate: candidate.clone(),
        field: field.clone(),
        value: value.clone(),
    })
}
