//! # Collection Schemas
//!
//! A [`Schema`] describes one collection: ordered scalar fields, named
//! relations to other collections, computed virtual fields, and a set of
//! fields omitted by default.
//!
//! ## Names
//!
//! Field, relation and virtual names share one namespace per schema.
//! `_id` is always a field: if the definition does not declare it, an
//! optional `any` field is added at the front.
//!
//! ## Relations
//!
//! A relation names a local field holding a foreign key, the target
//! collection, and the field in the target that key matches. When the
//! relation is populated, the joined document is attached under the
//! relation's own name and the local field is removed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use monarch_core::{CollectionName, Document, FieldKind, Value, ID_FIELD};

use crate::field::FieldType;

/// What happens to a host document whose relation finds no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTarget {
    /// The host document is removed from the result set.
    #[default]
    Drop,
    /// The host document is kept and the relation decodes to null.
    Keep,
}

impl MissingTarget {
    /// The value used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for MissingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link from a local field to a field in another collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    local_field: String,
    target: CollectionName,
    target_field: String,
    on_missing: MissingTarget,
}

impl Relation {
    /// Join `local` on this collection to `target_field` on `target`. Hosts without a match are dropped.
    pub fn new(
        local_field: impl Into<String>,
        target: CollectionName,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            local_field: local_field.into(),
            target,
            target_field: target_field.into(),
            on_missing: MissingTarget::Drop,
        }
    }

    /// Shorthand for a relation matching the target's `_id`.
    pub fn to_id(local_field: impl Into<String>, target: CollectionName) -> Self {
        Self::new(local_field, target, ID_FIELD)
    }

    /// Choose what happens to a host whose target is missing.
    pub fn on_missing(mut self, on_missing: MissingTarget) -> Self {
        self.on_missing = on_missing;
        self
    }

    /// Keep host documents whose relation finds no match.
    pub fn keep_missing(self) -> Self {
        self.on_missing(MissingTarget::Keep)
    }

    /// Field on the host that holds the join key.
    pub fn local_field(&self) -> &str {
        &self.local_field
    }

    /// Collection the relation points at.
    pub fn target(&self) -> &CollectionName {
        &self.target
    }

    /// Field on the target that is matched against the local field.
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    pub fn missing_target(&self) -> MissingTarget {
        self.on_missing
    }
}

type ComputeFn = dyn Fn(&Document) -> Value + Send + Sync;

/// A field computed from other fields at decode time. Never stored.
#[derive(Clone)]
pub struct VirtualField {
    name: String,
    depends_on: Vec<String>,
    compute: Arc<ComputeFn>,
}

impl VirtualField {
    /// A virtual computed from the fields named in `depends_on`.
    pub fn new<I, S, F>(name: impl Into<String>, depends_on: I, compute: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            compute: Arc::new(compute),
        }
    }

    /// Name the virtual is exposed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields that must be fetched for this virtual to be computed.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Compute the value from an already-decoded document.
    pub fn compute(&self, decoded: &Document) -> Value {
        (self.compute)(decoded)
    }
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Which part of a schema a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Id,
    Field,
    Relation,
    Virtual,
}

/// Errors raised while building a schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A name is declared twice across fields, relations and virtuals.
    #[error("collection '{collection}': name '{name}' is declared more than once")]
    DuplicateName {
        /// Collection being defined.
        collection: String,
        /// The repeated name.
        name: String,
    },

    /// A reference to a name the schema does not declare.
    #[error("collection '{collection}': {context} refers to unknown field '{field}'")]
    UnknownField {
        /// Collection being defined.
        collection: String,
        /// The unknown name.
        field: String,
        /// Where the reference was made.
        context: String,
    },

    /// A field's default is not a legal value of that field.
    #[error("collection '{collection}': default for field '{field}' is not a valid {expected}")]
    InvalidDefault {
        /// Collection being defined.
        collection: String,
        /// The field with the bad default.
        field: String,
        /// The field's declared kind.
        expected: FieldKind,
    },
}

/// The definition of one collection.
#[derive(Debug, Clone)]
pub struct Schema {
    collection: CollectionName,
    fields: Vec<(String, FieldType)>,
    relations: Vec<(String, Relation)>,
    virtuals: Vec<VirtualField>,
    base_omit: Vec<String>,
}

impl Schema {
    /// Start a schema for `collection`.
    pub fn builder(collection: CollectionName) -> SchemaBuilder {
        SchemaBuilder {
            collection,
            fields: Vec::new(),
            relations: Vec::new(),
            virtuals: Vec::new(),
            base_omit: Vec::new(),
        }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// Scalar fields in declaration order, `_id` included.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// The scalar field called `name`.
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// The relation called `name`.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    pub fn virtuals(&self) -> &[VirtualField] {
        &self.virtuals
    }

    /// The virtual called `name`.
    pub fn virtual_field(&self, name: &str) -> Option<&VirtualField> {
        self.virtuals.iter().find(|v| v.name == name)
    }

    /// Names omitted when a query does not say otherwise.
    pub fn base_omit(&self) -> &[String] {
        &self.base_omit
    }

    /// Classify `name` against this schema.
    pub fn name_kind(&self, name: &str) -> Option<NameKind> {
        if name == ID_FIELD {
            Some(NameKind::Id)
        } else if self.field(name).is_some() {
            Some(NameKind::Field)
        } else if self.relation(name).is_some() {
            Some(NameKind::Relation)
        } else if self.virtual_field(name).is_some() {
            Some(NameKind::Virtual)
        } else {
            None
        }
    }
}

/// Accumulates a schema definition. Checked once in [`SchemaBuilder::build`].
#[derive(Debug)]
pub struct SchemaBuilder {
    collection: CollectionName,
    fields: Vec<(String, FieldType)>,
    relations: Vec<(String, Relation)>,
    virtuals: Vec<VirtualField>,
    base_omit: Vec<String>,
}

impl SchemaBuilder {
    /// Declare a scalar field.
    pub fn field(mut self, name: impl Into<String>, field: FieldType) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Declare a relation to another collection.
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.push((name.into(), relation));
        self
    }

    /// Declare a computed field.
    pub fn virtual_field(mut self, field: VirtualField) -> Self {
        self.virtuals.push(field);
        self
    }

    /// Omit `name` from query results by default.
    pub fn omit(mut self, name: impl Into<String>) -> Self {
        self.base_omit.push(name.into());
        self
    }

    /// Validate the definition and freeze it.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::DuplicateName`] for any name declared twice,
    ///   including a relation or virtual named `_id`.
    /// - [`SchemaError::UnknownField`] for a relation local field, virtual
    ///   dependency or default omit that names nothing in the schema.
    /// - [`SchemaError::InvalidDefault`] for a default of the wrong kind.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let collection = self.collection.as_str().to_string();
        let mut fields = self.fields;
        if !fields.iter().any(|(n, _)| n == ID_FIELD) {
            fields.insert(0, (ID_FIELD.to_string(), FieldType::any().optional()));
        }

        let mut seen: Vec<&str> = Vec::new();
        let names = fields
            .iter()
            .map(|(n, _)| n.as_str())
            .chain(self.relations.iter().map(|(n, _)| n.as_str()))
            .chain(self.virtuals.iter().map(|v| v.name.as_str()));
        for name in names {
            if seen.contains(&name) {
                return Err(SchemaError::DuplicateName {
                    collection,
                    name: name.to_string(),
                });
            }
            seen.push(name);
        }

        for (name, field) in &fields {
            if !field.default_is_valid() {
                return Err(SchemaError::InvalidDefault {
                    collection,
                    field: name.clone(),
                    expected: field.kind(),
                });
            }
        }

        let is_field = |name: &str| fields.iter().any(|(n, _)| n == name);

        for (name, relation) in &self.relations {
            if !is_field(relation.local_field()) {
                return Err(SchemaError::UnknownField {
                    collection,
                    field: relation.local_field().to_string(),
                    context: format!("relation '{name}'"),
                });
            }
        }

        for virtual_field in &self.virtuals {
            if let Some(dep) = virtual_field.depends_on.iter().find(|d| !is_field(d)) {
                return Err(SchemaError::UnknownField {
                    collection,
                    field: dep.clone(),
                    context: format!("virtual '{}'", virtual_field.name),
                });
            }
        }

        let mut base_omit: Vec<String> = Vec::with_capacity(self.base_omit.len());
        for name in self.base_omit {
            if !seen.contains(&name.as_str()) {
                return Err(SchemaError::UnknownField {
                    collection,
                    field: name,
                    context: "default omit".to_string(),
                });
            }
            if !base_omit.contains(&name) {
                base_omit.push(name);
            }
        }

        Ok(Schema {
            collection: self.collection,
            fields,
            relations: self.relations,
            virtuals: self.virtuals,
            base_omit,
        })
    }
}
