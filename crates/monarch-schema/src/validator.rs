//! # Collection Validators
//!
//! Renders a [`Schema`] as a `$jsonSchema` collection validator, the
//! document the store uses to reject malformed writes, and validates raw
//! JSON documents against it locally with the `jsonschema` crate.
//!
//! ## Kind Mapping
//!
//! | Kind       | Keyword                 |
//! |------------|-------------------------|
//! | `string`   | `type: string`          |
//! | `number`   | `type: number`          |
//! | `boolean`  | `type: boolean`         |
//! | `array`    | `type: array`           |
//! | `document` | `type: object`          |
//! | `date`     | `bsonType: date`        |
//! | `any`      | (unconstrained)         |
//!
//! Nullable fields also accept `null`. A field is listed as required only
//! when it is required and has no default, since a default is filled in on
//! the way in. `bsonType` is enforced by the store but not by local
//! validation, so dates are only checked store-side.

use std::fmt;

use jsonschema::Validator;
use serde_json::{json, Map, Value as JsonValue};
use thiserror::Error;

use monarch_core::FieldKind;

use crate::field::FieldType;
use crate::schema::Schema;

/// Error during collection validation.
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// The rendered schema could not be compiled.
    #[error("validator build error for collection '{collection}': {reason}")]
    Build {
        /// Collection the validator was rendered for.
        collection: String,
        /// Compiler message.
        reason: String,
    },

    /// The document did not conform to the collection validator.
    #[error("validation failed for collection '{collection}':\n{violations}")]
    ValidationFailed {
        /// Collection the document was checked against.
        collection: String,
        /// Every violation found.
        violations: ValidationViolations,
    },
}

/// A single validation violation with structured context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// JSON Pointer path to the violating value in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in the order they were found.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Render the body of a `$jsonSchema` validator for `schema`.
pub fn json_schema(schema: &Schema) -> JsonValue {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, field) in schema.fields() {
        let mut property = field_schema(field);
        if let Some((relation, rel)) = schema.relations().find(|(_, r)| r.local_field() == name) {
            property.insert(
                "description".to_string(),
                JsonValue::String(format!(
                    "references {}.{} as '{relation}'",
                    rel.target(),
                    rel.target_field()
                )),
            );
        }
        properties.insert(name.to_string(), JsonValue::Object(property));
        if field.is_required() && field.default_value().is_none() {
            required.push(JsonValue::String(name.to_string()));
        }
    }

    json!({
        "bsonType": "object",
        "title": schema.collection().as_str(),
        "required": required,
        "properties": properties,
    })
}

/// Render the full collection validator, `{"$jsonSchema": ...}`.
pub fn collection_validator(schema: &Schema) -> JsonValue {
    json!({ "$jsonSchema": json_schema(schema) })
}

fn field_schema(field: &FieldType) -> Map<String, JsonValue> {
    let mut out = Map::new();
    let (keyword, name) = match field.kind() {
        FieldKind::String => ("type", "string"),
        FieldKind::Number => ("type", "number"),
        FieldKind::Boolean => ("type", "boolean"),
        FieldKind::Array => ("type", "array"),
        FieldKind::Document => ("type", "object"),
        FieldKind::Date => ("bsonType", "date"),
        FieldKind::Any => return out,
    };
    let value = if field.is_nullable() {
        json!([name, "null"])
    } else {
        json!(name)
    };
    out.insert(keyword.to_string(), value);
    out
}

/// A compiled validator for one collection.
pub struct CollectionValidator {
    collection: String,
    validator: Validator,
}

impl fmt::Debug for CollectionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionValidator")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl CollectionValidator {
    /// Render and compile the validator for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::Build`] if the rendered schema does not
    /// compile.
    pub fn new(schema: &Schema) -> Result<Self, ValidatorError> {
        let collection = schema.collection().to_string();
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let validator = opts
            .build(&json_schema(schema))
            .map_err(|e| ValidatorError::Build {
                collection: collection.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            collection,
            validator,
        })
    }

    /// The collection this validator was compiled for.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check without collecting violations.
    pub fn is_valid(&self, instance: &JsonValue) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate a raw stored document (extended JSON).
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::ValidationFailed`] with every violation.
    pub fn validate(&self, instance: &JsonValue) -> Result<(), ValidatorError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidatorError::ValidationFailed {
                collection: self.collection.clone(),
                violations: ValidationViolations { violations },
            })
        }
    }
}
