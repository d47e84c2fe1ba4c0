//! # Encoding
//!
//! Prepares a caller document for storage: every schema field is validated
//! and transformed, defaults fill absent fields, and keys the store should
//! not hold are dropped. Virtual fields are recomputed on every read, so
//! they are dropped too. Relation keys are rejected outright, because a
//! relation is stored as its local field.

use tracing::trace;

use monarch_core::Document;
use monarch_schema::{NameKind, Schema};

use crate::error::EncodeError;

/// Validate `input` against `schema` and build the document to store.
///
/// # Errors
///
/// Returns [`EncodeError::RelationKey`] if the input sets a relation key,
/// or [`EncodeError::Field`] for the first field that fails validation.
pub fn encode(schema: &Schema, input: &Document) -> Result<Document, EncodeError> {
    let collection = schema.collection().as_str();

    for key in input.keys() {
        match schema.name_kind(key) {
            Some(NameKind::Relation) => {
                let local_field = schema
                    .relation(key)
                    .map(|r| r.local_field().to_string())
                    .unwrap_or_default();
                return Err(EncodeError::RelationKey {
                    collection: collection.to_string(),
                    field: key.to_string(),
                    local_field,
                });
            }
            Some(NameKind::Virtual) | None => {
                trace!(collection, field = key, "dropping non-stored key");
            }
            Some(NameKind::Id | NameKind::Field) => {}
        }
    }

    let mut out = Document::new();
    for (name, field) in schema.fields() {
        let value = field
            .validate(name, input.get(name))
            .map_err(|source| EncodeError::Field {
                collection: collection.to_string(),
                source,
            })?;
        if let Some(value) = value {
            out.insert(name, value);
        }
    }
    Ok(out)
}
