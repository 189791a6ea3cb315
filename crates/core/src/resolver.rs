//! Attribute resolver contract.
//!
//! A resolver owns both directions of an attribute index for one attribute
//! type: the forward index (record -> values) and the inverted index
//! (value -> records). The suggestion engine only ever sees these through
//! [`AttributeResolver::lookup`] and [`AttributeResolver::reverse_lookup`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{LinkageError, LinkageResult, ResolverError};
use crate::id::{AttributeValue, FieldName, RecordId};

/// Pluggable lookup/reverse-lookup pair for one attribute type.
///
/// `lookup` returns the field exactly as the backing store holds it. Most
/// stores keep multi-valued fields as arrays, but nothing stops a document
/// from carrying a bare scalar; callers validate the shape with
/// [`lookup_values`] rather than trusting it.
pub trait AttributeResolver: Send + Sync {
    /// Raw field contents for `record_id`. A well-behaved resolver returns a
    /// JSON array of scalars, in the order the values were recorded.
    fn lookup(&self, record_id: &RecordId, field: &FieldName) -> Result<JsonValue, ResolverError>;

    /// Every record holding `value` in `field`. Empty when nobody does.
    fn reverse_lookup(
        &self,
        field: &FieldName,
        value: &AttributeValue,
    ) -> Result<BTreeSet<RecordId>, ResolverError>;
}

impl<R> AttributeResolver for Arc<R>
where
    R: AttributeResolver + ?Sized,
{
    fn lookup(&self, record_id: &RecordId, field: &FieldName) -> Result<JsonValue, ResolverError> {
        (**self).lookup(record_id, field)
    }

    fn reverse_lookup(
        &self,
        field: &FieldName,
        value: &AttributeValue,
    ) -> Result<BTreeSet<RecordId>, ResolverError> {
        (**self).reverse_lookup(field, value)
    }
}

impl<R> AttributeResolver for &R
where
    R: AttributeResolver + ?Sized,
{
    fn lookup(&self, record_id: &RecordId, field: &FieldName) -> Result<JsonValue, ResolverError> {
        (**self).lookup(record_id, field)
    }

    fn reverse_lookup(
        &self,
        field: &FieldName,
        value: &AttributeValue,
    ) -> Result<BTreeSet<RecordId>, ResolverError> {
        (**self).reverse_lookup(field, value)
    }
}

/// Look up `record_id` and check that the resolver honoured the contract.
///
/// Strings, numbers and booleans inside the array are accepted and converted
/// to their string form. Anything that is not an array, or an array holding
/// nulls/arrays/objects, is [`LinkageError::InvalidLookupResult`].
pub fn lookup_values<R>(
    resolver: &R,
    record_id: &RecordId,
    field: &FieldName,
) -> LinkageResult<Vec<AttributeValue>>
where
    R: AttributeResolver + ?Sized,
{
    let raw = resolver.lookup(record_id, field)?;

    let invalid = |found: &JsonValue| LinkageError::InvalidLookupResult {
        record_id: record_id.clone(),
        field: field.clone(),
        found: describe(found),
    };

    let JsonValue::Array(items) = &raw else {
        return Err(invalid(&raw));
    };

    items
        .iter()
        .map(|item| match item {
            JsonValue::String(s) => Ok(AttributeValue::new(s.as_str())),
            JsonValue::Number(n) => Ok(AttributeValue::new(n.to_string())),
            JsonValue::Bool(b) => Ok(AttributeValue::new(b.to_string())),
            other => Err(invalid(other)),
        })
        .collect()
}

fn describe(value: &JsonValue) -> String {
    let kind = match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    };
    format!("{kind} {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(JsonValue);

    impl AttributeResolver for Fixed {
        fn lookup(&self, _: &RecordId, _: &FieldName) -> Result<JsonValue, ResolverError> {
            Ok(self.0.clone())
        }

        fn reverse_lookup(
            &self,
            _: &FieldName,
            _: &AttributeValue,
        ) -> Result<BTreeSet<RecordId>, ResolverError> {
            Ok(BTreeSet::new())
        }
    }

    fn run(raw: JsonValue) -> LinkageResult<Vec<AttributeValue>> {
        lookup_values(&Fixed(raw), &RecordId::from("0"), &FieldName::from("phone"))
    }

    #[test]
    fn accepts_arrays_of_scalars_in_order() {
        let values = run(json!(["b", "a", 7, true])).unwrap();
        let values: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
        assert_eq!(values, vec!["b", "a", "7", "true"]);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(run(json!([])).unwrap().is_empty());
    }

    #[test]
    fn bare_scalar_is_rejected() {
        let err = run(json!("123-456-789")).unwrap_err();
        match err {
            LinkageError::InvalidLookupResult { found, .. } => assert!(found.starts_with("string")),
            other => panic!("expected InvalidLookupResult, got {other:?}"),
        }
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(matches!(
            run(json!(["ok", {"nested": 1}])),
            Err(LinkageError::InvalidLookupResult { .. })
        ));
        assert!(matches!(
            run(json!(["ok", null])),
            Err(LinkageError::InvalidLookupResult { .. })
        ));
        assert!(matches!(
            run(JsonValue::Null),
            Err(LinkageError::InvalidLookupResult { .. })
        ));
    }

    #[test]
    fn backend_errors_pass_through() {
        struct Broken;
        impl AttributeResolver for Broken {
            fn lookup(&self, _: &RecordId, _: &FieldName) -> Result<JsonValue, ResolverError> {
                Err(ResolverError::backend("index offline"))
            }
            fn reverse_lookup(
                &self,
                _: &FieldName,
                _: &AttributeValue,
            ) -> Result<BTreeSet<RecordId>, ResolverError> {
                Ok(BTreeSet::new())
            }
        }

        let err = lookup_values(&Broken, &RecordId::from("0"), &FieldName::from("phone")).unwrap_err();
        assert_eq!(err, LinkageError::Resolver(ResolverError::backend("index offline")));
    }
}
