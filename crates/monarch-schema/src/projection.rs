//! # Projection Composer
//!
//! Merges a schema's default omit set, its virtual fields, and a per-query
//! projection request into one [`Projection`].
//!
//! ## Modes
//!
//! A request is a store-style map of name → 0/1. If every non-`_id` flag is
//! 1 the result selects exactly those names; if every non-`_id` flag is 0
//! the result omits them together with the schema's default omit set. A
//! request mixing the two is rejected. `_id` is the one exception: it is
//! included unless explicitly set to 0, in either mode.
//!
//! ## Virtual Fields
//!
//! The store has no virtual fields, so they never appear in the store
//! projection. Requested virtuals are listed separately for the codec. The
//! fields they depend on are fetched even when the caller did not ask for
//! them; such fields are recorded as *support* fields and stripped from
//! output after the virtuals are computed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use monarch_core::{Document, Value, ID_FIELD};

use crate::schema::{NameKind, Schema};

/// Errors raised while composing a projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The request both includes and excludes non-`_id` names.
    #[error(
        "collection '{collection}': projection cannot include '{included}' and exclude '{excluded}'"
    )]
    Conflicting {
        /// Collection being queried.
        collection: String,
        /// First included name.
        included: String,
        /// First excluded name.
        excluded: String,
    },

    /// The request names something the schema does not declare.
    #[error("collection '{collection}': cannot project unknown field '{field}'")]
    UnknownField {
        /// Collection being queried.
        collection: String,
        /// The unknown name.
        field: String,
    },

    /// A projection flag is neither 0/1 nor a boolean.
    #[error("projection flag for '{field}' must be 0, 1 or a boolean, found {found}")]
    InvalidFlag {
        /// The offending name.
        field: String,
        /// Runtime kind of the flag.
        found: &'static str,
    },
}

/// Whether a projection lists what to keep or what to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    Select,
    Omit,
}

impl ProjectionMode {
    /// The mode as it appears in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Omit => "omit",
        }
    }
}

impl std::fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's projection for one query, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectionRequest {
    entries: Vec<(String, bool)>,
}

impl ProjectionRequest {
    /// An empty request: fetch the schema's default fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request including each of `fields`.
    pub fn select<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(Self::new(), Self::include)
    }

    /// A request excluding each of `fields`.
    pub fn omit<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(Self::new(), Self::exclude)
    }

    /// Add an inclusion.
    pub fn include(self, field: impl Into<String>) -> Self {
        self.flag(field.into(), true)
    }

    /// Add an exclusion.
    pub fn exclude(self, field: impl Into<String>) -> Self {
        self.flag(field.into(), false)
    }

    fn flag(mut self, field: String, include: bool) -> Self {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = include,
            None => self.entries.push((field, include)),
        }
        self
    }

    /// Parse a store-style projection document such as `{"name": 1}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidFlag`] for a flag that is not
    /// `0`, `1`, `true` or `false`.
    pub fn from_document(doc: &Document) -> Result<Self, ProjectionError> {
        let mut request = Self::new();
        for (field, flag) in doc.iter() {
            let include = match flag {
                Value::Bool(b) => *b,
                Value::Int(0) => false,
                Value::Int(1) => true,
                other => {
                    return Err(ProjectionError::InvalidFlag {
                        field: field.to_string(),
                        found: other.type_name(),
                    })
                }
            };
            request = request.flag(field.to_string(), include);
        }
        Ok(request)
    }

    /// Entries in the order they were added.
    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The effective projection of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    mode: ProjectionMode,
    fields: Vec<(String, bool)>,
    virtuals: Vec<String>,
    support: Vec<String>,
}

impl Projection {
    /// Whether the fetched set was chosen by select or omit.
    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Store-level flags in order. Only `_id` may carry the opposite flag
    /// of the mode.
    pub fn fields(&self) -> &[(String, bool)] {
        &self.fields
    }

    /// Virtual fields the codec must compute.
    pub fn virtuals(&self) -> &[String] {
        &self.virtuals
    }

    /// Fields fetched only to compute virtuals.
    pub fn support_fields(&self) -> &[String] {
        &self.support
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| *f)
    }

    /// Whether the field or relation `name` belongs in decoded output.
    pub fn includes(&self, name: &str) -> bool {
        if self.support.iter().any(|s| s == name) {
            return false;
        }
        match (self.mode, self.flag(name)) {
            (_, Some(flag)) => flag,
            (ProjectionMode::Select, None) => name == ID_FIELD,
            (ProjectionMode::Omit, None) => true,
        }
    }

    /// Whether the store must return `name`, for output or for a virtual.
    pub fn fetches(&self, name: &str) -> bool {
        self.includes(name) || self.support.iter().any(|s| s == name)
    }

    /// Whether the virtual `name` is computed by this projection.
    pub fn includes_virtual(&self, name: &str) -> bool {
        self.virtuals.iter().any(|v| v == name)
    }

    /// Whether the projection leaves the store's document untouched.
    pub fn is_passthrough(&self) -> bool {
        self.mode == ProjectionMode::Omit && self.fields.is_empty()
    }

    /// Render as a store projection document (`{"name": 1, "_id": 0}`).
    pub fn to_document(&self) -> Document {
        self.fields
            .iter()
            .map(|(name, include)| (name.as_str(), Value::Int(i64::from(*include))))
            .collect()
    }
}

/// Compose the effective projection of one query against `schema`.
///
/// With no request (or an empty one) the schema's default omit set applies.
///
/// # Errors
///
/// - [`ProjectionError::UnknownField`] for a name that is not a field,
///   relation, virtual field or `_id`.
/// - [`ProjectionError::Conflicting`] for a request that mixes inclusion
///   and exclusion outside `_id`.
pub fn compose_projection(
    schema: &Schema,
    request: Option<&ProjectionRequest>,
) -> Result<Projection, ProjectionError> {
    let collection = schema.collection().as_str();
    let entries = request.map(ProjectionRequest::entries).unwrap_or_default();

    let mut kinds = Vec::with_capacity(entries.len());
    for (name, include) in entries {
        let kind = schema
            .name_kind(name)
            .ok_or_else(|| ProjectionError::UnknownField {
                collection: collection.to_string(),
                field: name.clone(),
            })?;
        kinds.push((name.as_str(), *include, kind));
    }

    let included = kinds.iter().find(|(_, inc, k)| *inc && *k != NameKind::Id);
    let excluded = kinds.iter().find(|(_, inc, k)| !*inc && *k != NameKind::Id);
    let mode = match (included, excluded) {
        (Some((inc, ..)), Some((exc, ..))) => {
            return Err(ProjectionError::Conflicting {
                collection: collection.to_string(),
                included: inc.to_string(),
                excluded: exc.to_string(),
            })
        }
        (Some(_), None) => ProjectionMode::Select,
        (None, Some(_)) => ProjectionMode::Omit,
        // Only `_id`, or nothing at all.
        (None, None) => match kinds.first() {
            Some((_, true, _)) => ProjectionMode::Select,
            _ => ProjectionMode::Omit,
        },
    };

    let projection = match mode {
        ProjectionMode::Select => compose_select(schema, &kinds),
        ProjectionMode::Omit => compose_omit(schema, &kinds),
    };

    tracing::debug!(
        collection,
        mode = %projection.mode,
        fields = projection.fields.len(),
        virtuals = projection.virtuals.len(),
        support = projection.support.len(),
        "projection composed"
    );
    Ok(projection)
}

fn compose_select(schema: &Schema, kinds: &[(&str, bool, NameKind)]) -> Projection {
    let mut fields: Vec<(String, bool)> = Vec::new();
    let mut virtuals: Vec<String> = Vec::new();
    for (name, include, kind) in kinds {
        match kind {
            NameKind::Virtual => virtuals.push(name.to_string()),
            _ => fields.push((name.to_string(), *include)),
        }
    }

    let mut support = Vec::new();
    for virtual_name in &virtuals {
        let Some(virtual_field) = schema.virtual_field(virtual_name) else {
            continue;
        };
        for dep in virtual_field.depends_on() {
            let existing = fields.iter().position(|(n, _)| n == dep);
            match existing {
                Some(i) if fields[i].1 => {}
                Some(i) => {
                    // Only `_id` can be excluded in select mode.
                    fields.remove(i);
                    support.push(dep.clone());
                }
                None if dep == ID_FIELD => {}
                None => {
                    fields.push((dep.clone(), true));
                    support.push(dep.clone());
                }
            }
        }
    }

    Projection {
        mode: ProjectionMode::Select,
        fields,
        virtuals,
        support,
    }
}

fn compose_omit(schema: &Schema, kinds: &[(&str, bool, NameKind)]) -> Projection {
    let mut omitted: Vec<String> = schema.base_omit().to_vec();
    for (name, include, _) in kinds {
        // An included `_id` is already the default.
        if !include && !omitted.iter().any(|o| o == name) {
            omitted.push(name.to_string());
        }
    }

    let virtuals: Vec<String> = schema
        .virtuals()
        .iter()
        .map(|v| v.name().to_string())
        .filter(|name| !omitted.contains(name))
        .collect();
    omitted.retain(|name| schema.virtual_field(name).is_none());

    let mut support = Vec::new();
    for virtual_name in &virtuals {
        let Some(virtual_field) = schema.virtual_field(virtual_name) else {
            continue;
        };
        for dep in virtual_field.depends_on() {
            if let Some(i) = omitted.iter().position(|o| o == dep) {
                omitted.remove(i);
                support.push(dep.clone());
            }
        }
    }

    Projection {
        mode: ProjectionMode::Omit,
        fields: omitted.into_iter().map(|name| (name, false)).collect(),
        virtuals,
        support,
    }
}
