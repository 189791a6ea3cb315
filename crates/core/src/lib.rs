//! `linkage-core` — attribute resolution and cross-record suggestions.
//!
//! This crate is pure logic: no queues, no IO. Resolvers for concrete attribute
//! types (phone numbers, social handles, image hashes, ...) plug in through
//! [`AttributeResolver`].

pub mod error;
pub mod id;
pub mod index;
pub mod resolver;
pub mod suggest;

pub use error::{LinkageError, LinkageResult, ResolverError};
pub use id::{AttributeValue, FieldName, RecordId};
pub use index::{AttributeIndex, IndexSnapshot};
pub use resolver::{AttributeResolver, lookup_values};
pub use suggest::{SuggestionMap, ValueSuggestions, suggest};
