//! In-memory attribute index.
//!
//! Keeps the forward and inverted indexes side by side so they can never
//! disagree. Used by the worker binary (loaded from a JSON snapshot) and as the
//! reference resolver in tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ResolverError;
use crate::id::{AttributeValue, FieldName, RecordId};
use crate::resolver::AttributeResolver;

/// Serialized form of an index: `field -> record -> values`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSnapshot(pub BTreeMap<FieldName, BTreeMap<RecordId, Vec<AttributeValue>>>);

/// Forward + inverted index over any number of fields.
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    forward: HashMap<FieldName, HashMap<RecordId, Vec<AttributeValue>>>,
    inverted: HashMap<FieldName, HashMap<AttributeValue, BTreeSet<RecordId>>>,
}

impl AttributeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let mut index = Self::new();
        for (field, records) in snapshot.0 {
            for (record_id, values) in records {
                index.insert(record_id, field.clone(), values);
            }
        }
        index
    }

    pub fn to_snapshot(&self) -> IndexSnapshot {
        let mut out = BTreeMap::new();
        for (field, records) in &self.forward {
            let records: BTreeMap<RecordId, Vec<AttributeValue>> = records
                .iter()
                .map(|(id, values)| (id.clone(), values.clone()))
                .collect();
            out.insert(field.clone(), records);
        }
        IndexSnapshot(out)
    }

    /// Set the values `record_id` holds for `field`, replacing any previous ones.
    ///
    /// Value order is kept for `lookup`; duplicates are kept too.
    pub fn insert<V>(
        &mut self,
        record_id: impl Into<RecordId>,
        field: impl Into<FieldName>,
        values: impl IntoIterator<Item = V>,
    ) where
        V: Into<AttributeValue>,
    {
        let record_id = record_id.into();
        let field = field.into();

        self.unlink(&record_id, &field);

        let values: Vec<AttributeValue> = values.into_iter().map(Into::into).collect();
        let postings = self.inverted.entry(field.clone()).or_default();
        for value in &values {
            postings
                .entry(value.clone())
                .or_default()
                .insert(record_id.clone());
        }

        self.forward.entry(field).or_default().insert(record_id, values);
    }

    /// Drop `record_id` from every field.
    pub fn remove_record(&mut self, record_id: &RecordId) {
        let fields: Vec<FieldName> = self.forward.keys().cloned().collect();
        for field in fields {
            self.unlink(record_id, &field);
        }
    }

    /// Fields with at least one record, sorted.
    pub fn fields(&self) -> Vec<FieldName> {
        let mut fields: Vec<FieldName> = self
            .forward
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(field, _)| field.clone())
            .collect();
        fields.sort();
        fields
    }

    pub fn record_count(&self, field: &FieldName) -> usize {
        self.forward.get(field).map_or(0, HashMap::len)
    }

    fn unlink(&mut self, record_id: &RecordId, field: &FieldName) {
        let Some(previous) = self
            .forward
            .get_mut(field)
            .and_then(|records| records.remove(record_id))
        else {
            return;
        };

        if let Some(postings) = self.inverted.get_mut(field) {
            for value in previous {
                if let Some(ids) = postings.get_mut(&value) {
                    ids.remove(record_id);
                    if ids.is_empty() {
                        postings.remove(&value);
                    }
                }
            }
        }
    }
}

impl AttributeResolver for AttributeIndex {
    fn lookup(&self, record_id: &RecordId, field: &FieldName) -> Result<JsonValue, ResolverError> {
        let values = self
            .forward
            .get(field)
            .and_then(|records| records.get(record_id))
            .map(|values| {
                values
                    .iter()
                    .map(|v| JsonValue::String(v.as_str().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(JsonValue::Array(values))
    }

    fn reverse_lookup(
        &self,
        field: &FieldName,
        value: &AttributeValue,
    ) -> Result<BTreeSet<RecordId>, ResolverError> {
        Ok(self
            .inverted
            .get(field)
            .and_then(|postings| postings.get(value))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(items: &[&str]) -> BTreeSet<RecordId> {
        items.iter().map(|s| RecordId::from(*s)).collect()
    }

    #[test]
    fn lookup_and_reverse_lookup_agree() {
        let mut index = AttributeIndex::new();
        index.insert("0", "phone", ["123-456-789"]);
        index.insert("1", "phone", ["123-456-789", "555-0100"]);

        let phone = FieldName::from("phone");
        assert_eq!(
            index.lookup(&RecordId::from("1"), &phone).unwrap(),
            json!(["123-456-789", "555-0100"])
        );
        assert_eq!(
            index
                .reverse_lookup(&phone, &AttributeValue::from("123-456-789"))
                .unwrap(),
            ids(&["0", "1"])
        );
    }

    #[test]
    fn unknown_record_or_value_is_empty_not_an_error() {
        let index = AttributeIndex::new();
        let phone = FieldName::from("phone");

        assert_eq!(index.lookup(&RecordId::from("9"), &phone).unwrap(), json!([]));
        assert!(index
            .reverse_lookup(&phone, &AttributeValue::from("nothing"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn reinsert_replaces_postings() {
        let mut index = AttributeIndex::new();
        index.insert("0", "phone", ["a"]);
        index.insert("0", "phone", ["b"]);

        let phone = FieldName::from("phone");
        assert!(index.reverse_lookup(&phone, &AttributeValue::from("a")).unwrap().is_empty());
        assert_eq!(
            index.reverse_lookup(&phone, &AttributeValue::from("b")).unwrap(),
            ids(&["0"])
        );
    }

    #[test]
    fn remove_record_clears_every_field() {
        let mut index = AttributeIndex::new();
        index.insert("0", "phone", ["a"]);
        index.insert("0", "twitter", ["@x"]);
        index.insert("1", "phone", ["a"]);

        index.remove_record(&RecordId::from("0"));

        assert_eq!(index.fields(), vec![FieldName::from("phone")]);
        assert_eq!(index.record_count(&FieldName::from("phone")), 1);
        assert_eq!(
            index
                .reverse_lookup(&FieldName::from("phone"), &AttributeValue::from("a"))
                .unwrap(),
            ids(&["1"])
        );
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let raw = json!({
            "phone": {"0": ["123-456-789"], "3": ["000-000-000"]},
            "twitter": {"1": ["@ads"]}
        });
        let snapshot: IndexSnapshot = serde_json::from_value(raw.clone()).unwrap();
        let index = AttributeIndex::from_snapshot(snapshot);

        assert_eq!(
            index.fields(),
            vec![FieldName::from("phone"), FieldName::from("twitter")]
        );
        assert_eq!(serde_json::to_value(index.to_snapshot()).unwrap(), raw);
    }
}
