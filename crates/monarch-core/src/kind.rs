//! # Field Kinds — Closed Set of Value Kinds
//!
//! Defines the `FieldKind` enum used by every field declaration. Kind
//! checking is a single exhaustive `match` over [`Value`] variants; there
//! is no runtime type inspection and no implicit coercion. A string is
//! never accepted where a number is declared; converting between kinds
//! is the job of an explicit transformation.
//!
//! Adding a kind forces every `match` on `FieldKind` to handle it.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValueError;
use crate::value::Value;

/// The kind a field's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Integer or double.
    Number,
    /// UTC timestamp.
    Date,
    /// `true` / `false`.
    Boolean,
    /// Array of arbitrary values.
    Array,
    /// Embedded document.
    Document,
    /// Any non-null value. Used for the implicit `_id` field.
    Any,
}

impl FieldKind {
    /// Returns every kind in declaration order.
    pub fn all_kinds() -> &'static [FieldKind] {
        &[
            Self::String,
            Self::Number,
            Self::Date,
            Self::Boolean,
            Self::Array,
            Self::Document,
            Self::Any,
        ]
    }

    /// Returns the snake_case identifier for this kind.
    ///
    /// This must match the serde serialization format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Document => "document",
            Self::Any => "any",
        }
    }

    /// Whether `value` is a valid value of this kind.
    ///
    /// `Null` never matches; nullability is decided by the field, not the kind.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (Self::Any, _) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Int(_) | Value::Double(_)) => true,
            (Self::Date, Value::DateTime(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Document, Value::Document(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = ValueError;

    /// Parse a kind from the identifiers produced by [`FieldKind::as_str()`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "date" => Ok(Self::Date),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "document" => Ok(Self::Document),
            "any" => Ok(Self::Any),
            other => Err(ValueError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::Timestamp;
    use crate::value::Document;

    #[test]
    fn test_as_str_roundtrip() {
        for kind in FieldKind::all_kinds() {
            let parsed: FieldKind = kind.as_str().parse().unwrap_or_else(|e| {
                panic!("Failed to parse {:?}: {e}", kind.as_str())
            });
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("STRING".parse::<FieldKind>().is_err());
        assert!("int".parse::<FieldKind>().is_err());
        assert!("".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_serde_format_matches_as_str() {
        for kind in FieldKind::all_kinds() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_matches_is_strict() {
        assert!(FieldKind::String.matches(&Value::from("42")));
        assert!(!FieldKind::Number.matches(&Value::from("42")));
        assert!(FieldKind::Number.matches(&Value::Int(42)));
        assert!(FieldKind::Number.matches(&Value::Double(4.2)));
        assert!(!FieldKind::Boolean.matches(&Value::Int(1)));
        assert!(FieldKind::Date.matches(&Value::DateTime(Timestamp::from_millis(0).unwrap())));
        assert!(!FieldKind::Date.matches(&Value::from("2024-01-01T00:00:00Z")));
        assert!(FieldKind::Document.matches(&Value::Document(Document::new())));
        assert!(FieldKind::Array.matches(&Value::Array(vec![])));
    }

    #[test]
    fn test_null_never_matches() {
        for kind in FieldKind::all_kinds() {
            assert!(!kind.matches(&Value::Null), "{kind} accepted null");
        }
    }

    #[test]
    fn test_any_accepts_every_non_null() {
        assert!(FieldKind::Any.matches(&Value::from("x")));
        assert!(FieldKind::Any.matches(&Value::Int(1)));
        assert!(FieldKind::Any.matches(&Value::Bool(false)));
    }
}
