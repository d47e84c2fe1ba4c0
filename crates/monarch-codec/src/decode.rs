//! # Decoding
//!
//! Applies a schema and an effective projection to one raw document.
//!
//! 1. Every schema field the projection fetches is validated and
//!    transformed. The local field of a populated relation is skipped: the
//!    pipeline replaced it with the related document. `_id` is never
//!    replaced.
//! 2. Every populated relation the projection includes is decoded
//!    recursively against the target schema, using that schema's default
//!    projection, and attached under the relation key.
//! 3. Requested virtual fields are computed from the decoded fields, and
//!    support fields are removed.
//!
//! Raw keys the schema does not know are ignored. The first failure aborts
//! the whole document.

use serde::de::DeserializeOwned;

use monarch_core::{Document, Value, ID_FIELD};
use monarch_schema::{compose_projection, MissingTarget, Projection, Schema, SchemaResolver};

use crate::error::{CodecError, DecodeError, DecodeFailure};

/// Decode `raw` against `schema` under `projection`.
///
/// `populated` lists the relation keys the raw document was populated
/// with, in population order.
///
/// # Errors
///
/// Returns a [`DecodeError`] naming the first field that failed.
pub fn decode<R, S>(
    schema: &Schema,
    resolver: &R,
    raw: &Document,
    projection: &Projection,
    populated: &[S],
) -> Result<Document, DecodeError>
where
    R: SchemaResolver + ?Sized,
    S: AsRef<str>,
{
    let collection = schema.collection().as_str();

    let mut relations = Vec::with_capacity(populated.len());
    for key in populated {
        let key = key.as_ref();
        let relation = schema
            .relation(key)
            .ok_or_else(|| DecodeError::new(collection, key, DecodeFailure::UnknownRelation))?;
        relations.push((key, relation));
    }

    let mut out = Document::new();

    for (name, field) in schema.fields() {
        let replaced = name != ID_FIELD && relations.iter().any(|(_, r)| r.local_field() == name);
        if replaced || !projection.fetches(name) {
            continue;
        }
        let value = field
            .validate(name, raw.get(name))
            .map_err(|e| DecodeError::new(collection, name, e))?;
        if let Some(value) = value {
            out.insert(name, value);
        }
    }

    for (key, relation) in &relations {
        if !projection.includes(key) {
            continue;
        }
        let related = match raw.get(key) {
            Some(Value::Document(related)) => {
                let target = resolver.resolve(relation.target()).ok_or_else(|| {
                    DecodeError::new(
                        collection,
                        key,
                        DecodeFailure::UnresolvedTarget(relation.target().to_string()),
                    )
                })?;
                let target_projection = compose_projection(target, None)
                    .map_err(|e| DecodeError::new(collection, key, e))?;
                let decoded = decode(target, resolver, related, &target_projection, &[] as &[&str])
                    .map_err(|e| DecodeError::new(collection, key, DecodeFailure::Related(Box::new(e))))?;
                Value::Document(decoded)
            }
            None | Some(Value::Null) if relation.missing_target() == MissingTarget::Keep => Value::Null,
            None | Some(Value::Null) => {
                return Err(DecodeError::new(collection, key, DecodeFailure::MissingRelated))
            }
            Some(other) => {
                return Err(DecodeError::new(
                    collection,
                    key,
                    DecodeFailure::NotADocument {
                        found: other.type_name(),
                    },
                ))
            }
        };
        out.insert(*key, related);
    }

    let computed: Vec<(&str, Value)> = projection
        .virtuals()
        .iter()
        .filter_map(|name| schema.virtual_field(name))
        .map(|v| (v.name(), v.compute(&out)))
        .collect();
    for (name, value) in computed {
        out.insert(name, value);
    }

    for name in projection.support_fields() {
        out.remove(name);
    }

    Ok(out)
}

/// Decode with the schema's default projection and no populated relations.
///
/// # Errors
///
/// Returns a [`DecodeError`] naming the first field that failed.
pub fn decode_default<R>(schema: &Schema, resolver: &R, raw: &Document) -> Result<Document, DecodeError>
where
    R: SchemaResolver + ?Sized,
{
    let collection = schema.collection().as_str();
    let projection =
        compose_projection(schema, None).map_err(|e| DecodeError::new(collection, "", e))?;
    decode(schema, resolver, raw, &projection, &[] as &[&str])
}

/// Decode, then convert the output into `T`. Dates arrive as RFC 3339
/// strings.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] or [`CodecError::Deserialize`].
pub fn decode_as<T, R, S>(
    schema: &Schema,
    resolver: &R,
    raw: &Document,
    projection: &Projection,
    populated: &[S],
) -> Result<T, CodecError>
where
    T: DeserializeOwned,
    R: SchemaResolver + ?Sized,
    S: AsRef<str>,
{
    let decoded = decode(schema, resolver, raw, projection, populated)?;
    from_document(schema.collection().as_str(), &decoded)
}

/// Convert a decoded document into `T`.
///
/// # Errors
///
/// Returns [`CodecError::Deserialize`] if the shapes do not line up.
pub fn from_document<T: DeserializeOwned>(collection: &str, doc: &Document) -> Result<T, CodecError> {
    serde_json::from_value(doc.to_plain_json()).map_err(|e| CodecError::Deserialize {
        collection: collection.to_string(),
        reason: e.to_string(),
    })
}
