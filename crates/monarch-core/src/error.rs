//! # Error Types — Field and Value Failures
//!
//! Leaf error types shared by every Monarch crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Field errors carry the field name and, for kind mismatches, the
//!   expected kind and the runtime kind that was found.
//! - Value errors describe malformed store-native input (non-document
//!   roots, unparseable dates, invalid collection names).
//! - Higher-level crates wrap these rather than re-stating them.

use thiserror::Error;

use crate::kind::FieldKind;

/// A single field failed validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The value is missing and the field has no default.
    #[error("field '{field}' is required")]
    Required {
        /// Name of the missing field.
        field: String,
    },

    /// The runtime kind of the value does not match the declared kind.
    #[error("field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the offending field.
        field: String,
        /// Kind the field was declared with.
        expected: FieldKind,
        /// Runtime kind of the value that was supplied.
        found: &'static str,
    },
}

impl FieldError {
    /// The name of the field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } | Self::TypeMismatch { field, .. } => field,
        }
    }
}

/// Malformed store-native input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// A document was expected at the root of the input.
    #[error("expected a document, found {0}")]
    NotADocument(&'static str),

    /// A `$date` value could not be parsed.
    #[error("invalid date {value:?}: {reason}")]
    InvalidDate {
        /// The raw date text.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A field kind name was not recognized.
    #[error("unknown field kind: {0:?}")]
    UnknownKind(String),

    /// A collection name violates the store's naming rules.
    #[error("invalid collection name {name:?}: {reason}")]
    InvalidCollectionName {
        /// The rejected name.
        name: String,
        /// Which rule was violated.
        reason: &'static str,
    },
}
