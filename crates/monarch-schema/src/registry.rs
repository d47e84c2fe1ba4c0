//! # Schema Registry
//!
//! Collections refer to each other by name, so schemas are defined
//! independently and linked through a registry. Relation targets are
//! resolved through [`SchemaResolver`] each time a pipeline is compiled,
//! never at definition time; two schemas may therefore relate to each other
//! in both directions.
//!
//! The registry checks every relation once, at build time: a target that
//! is not registered, or a target field the target schema does not
//! declare, is a startup error rather than a query-time one.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use monarch_core::CollectionName;

use crate::schema::Schema;

/// Resolves a collection name to its schema on demand.
pub trait SchemaResolver {
    fn resolve(&self, collection: &CollectionName) -> Option<&Schema>;
}

/// Errors raised while building a [`SchemaRegistry`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Two schemas were registered for the same collection.
    #[error("collection '{0}' is registered more than once")]
    DuplicateCollection(String),

    /// A relation targets a collection that is not registered.
    #[error("relation '{collection}.{relation}' targets unregistered collection '{target}'")]
    UnknownTarget {
        /// Collection declaring the relation.
        collection: String,
        /// Relation name.
        relation: String,
        /// The missing target collection.
        target: String,
    },

    /// A relation matches on a field the target schema does not declare.
    #[error("relation '{collection}.{relation}' matches unknown field '{target}.{field}'")]
    UnknownTargetField {
        /// Collection declaring the relation.
        collection: String,
        /// Relation name.
        relation: String,
        /// Target collection.
        target: String,
        /// The undeclared target field.
        field: String,
    },
}

/// Immutable map of collection name to schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<CollectionName, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Start collecting schemas.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A shared handle to the schema of `collection`.
    pub fn get(&self, collection: &CollectionName) -> Option<Arc<Schema>> {
        self.schemas.get(collection).cloned()
    }

    /// Look up by raw name.
    pub fn get_by_name(&self, collection: &str) -> Option<Arc<Schema>> {
        self.schemas
            .iter()
            .find(|(name, _)| name.as_str() == collection)
            .map(|(_, schema)| Arc::clone(schema))
    }

    /// Registered collection names in sorted order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionName> {
        self.schemas.keys()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaResolver for SchemaRegistry {
    fn resolve(&self, collection: &CollectionName) -> Option<&Schema> {
        self.schemas.get(collection).map(AsRef::as_ref)
    }
}

/// Collects schemas before cross-checking them.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: Vec<Schema>,
}

impl RegistryBuilder {
    /// Add a schema. Duplicates are reported by `build`.
    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Check every relation and freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] for a duplicate collection, an
    /// unregistered relation target, or an undeclared target field.
    pub fn build(self) -> Result<SchemaRegistry, RegistryError> {
        let mut schemas = BTreeMap::new();
        for schema in self.schemas {
            let name = schema.collection().clone();
            if schemas.contains_key(&name) {
                return Err(RegistryError::DuplicateCollection(name.to_string()));
            }
            schemas.insert(name, Arc::new(schema));
        }

        for schema in schemas.values() {
            for (relation_name, relation) in schema.relations() {
                let target = schemas.get(relation.target()).ok_or_else(|| {
                    RegistryError::UnknownTarget {
                        collection: schema.collection().to_string(),
                        relation: relation_name.to_string(),
                        target: relation.target().to_string(),
                    }
                })?;
                if target.field(relation.target_field()).is_none() {
                    return Err(RegistryError::UnknownTargetField {
                        collection: schema.collection().to_string(),
                        relation: relation_name.to_string(),
                        target: relation.target().to_string(),
                        field: relation.target_field().to_string(),
                    });
                }
            }
        }

        tracing::debug!(collections = schemas.len(), "schema registry built");
        Ok(SchemaRegistry { schemas })
    }
}
