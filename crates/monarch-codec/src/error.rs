//! # Codec Errors
//!
//! A decode failure names the collection and the field where it happened,
//! and wraps the cause. When the cause is inside a populated relation the
//! nested [`DecodeError`] is kept, so the full path can be recovered with
//! [`DecodeError::path`].

use thiserror::Error;

use monarch_core::FieldError;
use monarch_schema::ProjectionError;

/// A raw document could not be decoded. No partial output is returned.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot decode '{collection}' at '{field}': {source}")]
pub struct DecodeError {
    /// Collection whose schema was being applied.
    pub collection: String,
    /// Field or relation key that failed.
    pub field: String,
    /// Why it failed.
    pub source: DecodeFailure,
}

/// The cause of a [`DecodeError`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeFailure {
    /// The field's own validation failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The populated document failed to decode against its own schema.
    #[error("in related document: {0}")]
    Related(Box<DecodeError>),

    /// A populated relation holds something other than a document.
    #[error("expected a related document, found {found}")]
    NotADocument {
        /// Runtime kind of the value found.
        found: &'static str,
    },

    /// A strictly populated relation is absent from the raw document.
    #[error("populated relation is missing")]
    MissingRelated,

    /// The key is not a relation of this schema.
    #[error("not a relation")]
    UnknownRelation,

    /// The relation's target collection has no schema.
    #[error("target collection '{0}' cannot be resolved")]
    UnresolvedTarget(String),

    /// The target schema's default projection could not be composed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl DecodeError {
    pub(crate) fn new(collection: &str, field: &str, source: impl Into<DecodeFailure>) -> Self {
        Self {
            collection: collection.to_string(),
            field: field.to_string(),
            source: source.into(),
        }
    }

    /// The dotted path from the outermost document to the failing field,
    /// e.g. `author.name`.
    pub fn path(&self) -> String {
        match &self.source {
            DecodeFailure::Related(inner) => format!("{}.{}", self.field, inner.path()),
            _ => self.field.clone(),
        }
    }

    /// The innermost field-level failure, if that is the cause.
    pub fn field_error(&self) -> Option<&FieldError> {
        match &self.source {
            DecodeFailure::Field(e) => Some(e),
            DecodeFailure::Related(inner) => inner.field_error(),
            _ => None,
        }
    }
}

/// A caller document could not be prepared for storage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A field failed validation.
    #[error("cannot encode '{collection}': {source}")]
    Field {
        /// Collection being written.
        collection: String,
        /// The field failure.
        source: FieldError,
    },

    /// Relations are populated on read; only their local field is stored.
    #[error("cannot encode '{collection}': '{field}' is a relation, write '{local_field}' instead")]
    RelationKey {
        /// Collection being written.
        collection: String,
        /// The relation key present in the input.
        field: String,
        /// The local field that stores the reference.
        local_field: String,
    },
}

/// Decoded output could not be converted into a caller type.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("cannot convert '{collection}' document: {reason}")]
    Deserialize {
        /// Collection the document was decoded from.
        collection: String,
        /// Deserializer message.
        reason: String,
    },
}
