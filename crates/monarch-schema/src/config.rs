//! # YAML Schema Definitions
//!
//! Loads collection schemas from a YAML file and builds a
//! [`SchemaRegistry`] from them.
//!
//! ```yaml
//! collections:
//!   - name: users
//!     fields:
//!       - { name: name, kind: string, transforms: [trim] }
//!       - { name: age, kind: number, default: 0 }
//!       - { name: status, kind: string, nullable: true }
//!       - { name: password, kind: string, required: false }
//!     omit: [password]
//!   - name: posts
//!     fields:
//!       - { name: title, kind: string }
//!       - { name: authorId, kind: string }
//!     relations:
//!       - { name: author, local: authorId, target: users }
//! ```
//!
//! Fields and relations are lists so that declaration order survives.
//! Defaults are extended JSON, so a date default is written as
//! `{ $date: "2024-01-01T00:00:00Z" }`. Transforms are referenced by
//! built-in name. Virtual fields carry code and cannot be declared here.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use monarch_core::{CollectionName, FieldKind, Value, ValueError, ID_FIELD};

use crate::field::{FieldType, Transform};
use crate::registry::{RegistryError, SchemaRegistry};
use crate::schema::{MissingTarget, Relation, Schema, SchemaError};

/// Errors raised while loading schema definitions.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read schema definitions '{path}': {reason}")]
    Read {
        /// Path of the definitions file.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The YAML is malformed or does not match the definition format.
    #[error("invalid schema definitions '{path}': {reason}")]
    Parse {
        /// Path of the definitions file, or `<inline>`.
        path: String,
        /// Parser message, with line and column when available.
        reason: String,
    },

    /// A transform name is not a built-in.
    #[error("collection '{collection}', field '{field}': unknown transform '{name}'")]
    UnknownTransform {
        /// Collection being defined.
        collection: String,
        /// Field declaring the transform.
        field: String,
        /// The unrecognized name.
        name: String,
    },

    /// A default could not be converted to a store value.
    #[error("collection '{collection}', field '{field}': invalid default: {source}")]
    InvalidDefault {
        /// Collection being defined.
        collection: String,
        /// Field declaring the default.
        field: String,
        /// Conversion failure.
        source: ValueError,
    },

    /// A collection or target name was rejected.
    #[error(transparent)]
    Name(#[from] ValueError),

    /// A collection definition is inconsistent.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Collections do not link up.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The root of a definitions file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub collections: Vec<CollectionConfig>,
}

/// One collection entry of a schema file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub omit: Vec<String>,
}

/// A scalar field declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub transforms: Vec<String>,
}

/// A relation declaration. `target_field` defaults to `_id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationConfig {
    pub name: String,
    pub local: String,
    pub target: String,
    #[serde(default = "default_target_field")]
    pub target_field: String,
    #[serde(default)]
    pub on_missing: MissingTarget,
}

fn default_required() -> bool {
    true
}

fn default_target_field() -> String {
    ID_FIELD.to_string()
}

impl RegistryConfig {
    /// Parse definitions from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid definitions
    /// document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, "<inline>")
    }

    /// Read and parse a definitions file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(yaml: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Build every collection schema and link them into a registry.
    ///
    /// # Errors
    ///
    /// Returns the first definition, naming or linking failure.
    pub fn into_registry(self) -> Result<SchemaRegistry, ConfigError> {
        let mut builder = SchemaRegistry::builder();
        for collection in self.collections {
            builder = builder.register(collection.into_schema()?);
        }
        Ok(builder.build()?)
    }
}

impl CollectionConfig {
    /// Build the schema this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a bad name, transform, default or
    /// inconsistent definition.
    pub fn into_schema(self) -> Result<Schema, ConfigError> {
        let mut builder = Schema::builder(CollectionName::new(&self.name)?);
        for field in self.fields {
            let name = field.name.clone();
            builder = builder.field(name, field.into_field_type(&self.name)?);
        }
        for relation in self.relations {
            let target = CollectionName::new(relation.target)?;
            builder = builder.relation(
                relation.name,
                Relation::new(relation.local, target, relation.target_field)
                    .on_missing(relation.on_missing),
            );
        }
        for name in self.omit {
            builder = builder.omit(name);
        }
        Ok(builder.build()?)
    }
}

impl FieldConfig {
    fn into_field_type(self, collection: &str) -> Result<FieldType, ConfigError> {
        let mut field = FieldType::new(self.kind);
        if !self.required {
            field = field.optional();
        }
        if self.nullable {
            field = field.nullable();
        }
        if let Some(default) = self.default {
            let value = Value::from_json(default).map_err(|source| ConfigError::InvalidDefault {
                collection: collection.to_string(),
                field: self.name.clone(),
                source,
            })?;
            field = field.with_default(value);
        }
        for name in &self.transforms {
            let transform =
                Transform::builtin(name).ok_or_else(|| ConfigError::UnknownTransform {
                    collection: collection.to_string(),
                    field: self.name.clone(),
                    name: name.clone(),
                })?;
            field = field.transform(transform);
        }
        Ok(field)
    }
}

/// Load a definitions file straight into a registry.
///
/// # Errors
///
/// Returns the first read, parse, definition or linking failure.
pub fn load_registry(path: &Path) -> Result<SchemaRegistry, ConfigError> {
    RegistryConfig::from_path(path)?.into_registry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaResolver;

    const BLOG: &str = r#"
collections:
  - name: users
    fields:
      - { name: name, kind: string, transforms: [trim] }
      - { name: age, kind: number, default: 0 }
      - { name: status, kind: string, nullable: true }
      - { name: joined, kind: date, default: { $date: "2024-01-01T00:00:00Z" } }
      - { name: password, kind: string, required: false }
    omit: [password]
  - name: posts
    fields:
      - { name: title, kind: string }
      - { name: authorId, kind: string }
      - { name: editorId, kind: string, required: false }
    relations:
      - { name: author, local: authorId, target: users }
      - { name: editor, local: editorId, target: users, on_missing: keep }
"#;

    #[test]
    fn test_load_blog_registry() {
        let registry = RegistryConfig::from_yaml_str(BLOG)
            .unwrap()
            .into_registry()
            .unwrap();
        assert_eq!(registry.len(), 2);

        let users = registry.get_by_name("users").unwrap();
        let names: Vec<&str> = users.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["_id", "name", "age", "status", "joined", "password"]);
        assert_eq!(users.field("age").unwrap().default_value(), Some(&Value::Int(0)));
        assert!(users.field("status").unwrap().is_nullable());
        assert!(!users.field("password").unwrap().is_required());
        assert!(matches!(
            users.field("joined").unwrap().default_value(),
            Some(Value::DateTime(_))
        ));
        assert_eq!(users.field("name").unwrap().transforms()[0].name(), "trim");
        assert_eq!(users.base_omit(), ["password".to_string()]);

        let posts = registry.get_by_name("posts").unwrap();
        let author = posts.relation("author").unwrap();
        assert_eq!(author.target_field(), "_id");
        assert_eq!(author.missing_target(), MissingTarget::Drop);
        assert_eq!(
            posts.relation("editor").unwrap().missing_target(),
            MissingTarget::Keep
        );
        assert!(registry.resolve(author.target()).is_some());
    }

    #[test]
    fn test_unknown_transform() {
        let yaml = r#"
collections:
  - name: users
    fields:
      - { name: name, kind: string, transforms: [shout] }
"#;
        let err = RegistryConfig::from_yaml_str(yaml)
            .unwrap()
            .into_registry()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransform { ref name, .. } if name == "shout"));
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let yaml = r#"
collections:
  - name: users
    fields:
      - { name: name, kind: text }
"#;
        let err = RegistryConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = r#"
collections:
  - name: users
    feilds: []
"#;
        assert!(matches!(
            RegistryConfig::from_yaml_str(yaml).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_dangling_relation_surfaces_registry_error() {
        let yaml = r#"
collections:
  - name: posts
    fields:
      - { name: authorId, kind: string }
    relations:
      - { name: author, local: authorId, target: users }
"#;
        let err = RegistryConfig::from_yaml_str(yaml)
            .unwrap()
            .into_registry()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Registry(RegistryError::UnknownTarget { .. })));
    }

    #[test]
    fn test_wrong_kind_default_surfaces_schema_error() {
        let yaml = r#"
collections:
  - name: users
    fields:
      - { name: age, kind: number, default: "zero" }
"#;
        let err = RegistryConfig::from_yaml_str(yaml)
            .unwrap()
            .into_registry()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::InvalidDefault { .. })));
    }

    #[test]
    fn test_invalid_collection_name() {
        let yaml = "collections:\n  - name: \"system.users\"\n";
        let err = RegistryConfig::from_yaml_str(yaml)
            .unwrap()
            .into_registry()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Name(ValueError::InvalidCollectionName { .. })));
    }

    #[test]
    fn test_missing_file() {
        let err = load_registry(Path::new("/nonexistent/monarch.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
