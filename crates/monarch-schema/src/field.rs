//! # Field Types
//!
//! A `FieldType` is the contract for one scalar field: its kind, whether it
//! is required, whether it accepts null, an optional default, and an
//! ordered chain of transformations.
//!
//! ## Validation Order
//!
//! ```text
//! absent ──▶ default? ──▶ yes: default (never transformed)
//!                    └──▶ no:  required? error : absent
//! null ────▶ nullable? null : kind mismatch
//! value ───▶ kind check ──▶ transform 1 ──▶ ... ──▶ transform n
//! ```
//!
//! The kind check is strict. Converting between kinds happens only through
//! an explicit transformation, typically on an `any` field.
//!
//! ## Construction
//!
//! Configuration calls consume the field type and return a new one, so a
//! definition cannot be mutated once it has been attached to a schema.

use std::fmt;
use std::sync::Arc;

use monarch_core::{FieldError, FieldKind, Value};

type TransformFn = dyn Fn(Value) -> Value + Send + Sync;

/// A named, pure value → value function applied after validation.
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
}

impl Transform {
    /// Wrap a closure as a named transformation.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The name used in configuration files.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the transformation on one value.
    pub fn apply(&self, value: Value) -> Value {
        (self.func)(value)
    }

    /// Look up a built-in transformation by name.
    ///
    /// Built-ins: `trim`, `lowercase`, `uppercase`, `stringify`, `round`,
    /// `truncate_date`.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "trim" => Some(Self::trim()),
            "lowercase" => Some(Self::lowercase()),
            "uppercase" => Some(Self::uppercase()),
            "stringify" => Some(Self::stringify()),
            "round" => Some(Self::round()),
            "truncate_date" => Some(Self::truncate_date()),
            _ => None,
        }
    }

    /// Strip leading and trailing whitespace from strings.
    pub fn trim() -> Self {
        Self::new("trim", |v| match v {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        })
    }

    /// Lowercase string values; other values pass through.
    pub fn lowercase() -> Self {
        Self::new("lowercase", |v| match v {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        })
    }

    /// Uppercase string values; other values pass through.
    pub fn uppercase() -> Self {
        Self::new("uppercase", |v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        })
    }

    /// Render any non-null value as a string.
    pub fn stringify() -> Self {
        Self::new("stringify", |v| match v {
            Value::Null | Value::String(_) => v,
            Value::Bool(b) => Value::String(b.to_string()),
            Value::Int(n) => Value::String(n.to_string()),
            Value::Double(f) => Value::String(f.to_string()),
            Value::DateTime(ts) => Value::String(ts.to_rfc3339()),
            Value::Array(_) | Value::Document(_) => Value::String(v.to_json().to_string()),
        })
    }

    /// Round doubles to the nearest integer.
    pub fn round() -> Self {
        Self::new("round", |v| match v {
            Value::Double(f) if f.is_finite() => Value::Int(f.round() as i64),
            other => other,
        })
    }

    /// Truncate dates to midnight UTC.
    pub fn truncate_date() -> Self {
        Self::new("truncate_date", |v| match v {
            Value::DateTime(ts) => Value::DateTime(ts.start_of_day()),
            other => other,
        })
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transform").field(&self.name).finish()
    }
}

/// Validation and transformation contract for a single field.
#[derive(Debug, Clone)]
pub struct FieldType {
    kind: FieldKind,
    required: bool,
    nullable: bool,
    default: Option<Value>,
    transforms: Vec<Transform>,
}

impl FieldType {
    /// A required, non-nullable field of `kind` with no default.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            nullable: false,
            default: None,
            transforms: Vec::new(),
        }
    }

    /// A required string field.
    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    /// A required number field.
    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    /// A required date field.
    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    /// A required boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// A required array field.
    pub fn array() -> Self {
        Self::new(FieldKind::Array)
    }

    /// A required embedded document field.
    pub fn document() -> Self {
        Self::new(FieldKind::Document)
    }

    /// A required field of any type.
    pub fn any() -> Self {
        Self::new(FieldKind::Any)
    }

    /// Reject documents where the field is absent.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Allow the field to be absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Accept explicit null. Also fixes the default to null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.default = Some(Value::Null);
        self
    }

    /// Fill absent values with `value`. A present value is never replaced.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Append a transformation; transformations run in registration order.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Append an ad-hoc transformation.
    pub fn map<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform(Transform::new(name, func))
    }

    /// The stored type.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether an explicit null is accepted.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Value written when the field is absent.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Transformations in the order they run.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Whether the configured default is itself a legal value of this field.
    pub fn default_is_valid(&self) -> bool {
        match &self.default {
            None => true,
            Some(Value::Null) => self.nullable,
            Some(value) => self.kind.matches(value),
        }
    }

    /// Validate a raw value and apply the transformation chain.
    ///
    /// `field` is used only for error context. Returns `Ok(None)` when the
    /// value is absent, the field is optional, and there is no default.
    ///
    /// # Errors
    ///
    /// - [`FieldError::Required`] if the value is absent, the field is
    ///   required, and no default exists.
    /// - [`FieldError::TypeMismatch`] if the value (including an explicit
    ///   null on a non-nullable field) does not match the declared kind.
    pub fn validate(&self, field: &str, raw: Option<&Value>) -> Result<Option<Value>, FieldError> {
        let value = match raw {
            None => {
                return match (&self.default, self.required) {
                    (Some(default), _) => Ok(Some(default.clone())),
                    (None, true) => Err(FieldError::Required {
                        field: field.to_string(),
                    }),
                    (None, false) => Ok(None),
                };
            }
            Some(Value::Null) if self.nullable => return Ok(Some(Value::Null)),
            Some(value) => value,
        };

        if !self.kind.matches(value) {
            return Err(FieldError::TypeMismatch {
                field: field.to_string(),
                expected: self.kind,
                found: value.type_name(),
            });
        }

        Ok(Some(
            self.transforms
                .iter()
                .fold(value.clone(), |acc, t| t.apply(acc)),
        ))
    }
}
