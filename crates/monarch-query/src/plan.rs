//! # Query Planning
//!
//! Turns [`FindOptions`] into the one store command that answers them.
//!
//! - Nothing populated: a plain `find` carrying the store projection.
//! - Otherwise: an aggregation made of the compiled population pipeline,
//!   then `$sort`, `$skip` and `$limit`, then the projection as a final
//!   `$project`. Projecting last keeps local fields available to the joins
//!   and lets a select name a populated relation key.
//!
//! A passthrough projection is never sent. A select naming the local field
//! of a relation it also populates is rejected, since the join replaces
//! that field.

use serde_json::{json, Value as JsonValue};

use monarch_core::{Document, ID_FIELD};
use monarch_pipeline::{check_selection, compile_pipeline, Pipeline, Stage};
use monarch_schema::{
    compose_projection, Projection, ProjectionMode, ProjectionRequest, Schema, SchemaResolver,
};

use crate::error::QueryError;
use crate::store::{FindAndModify, FindCommand, ReturnDocument};

/// What to read and how to shape it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Document,
    pub projection: Option<ProjectionRequest>,
    /// Relation keys to populate, in order.
    pub populate: Vec<String>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match documents against `filter`. Empty matches everything.
    pub fn filter(mut self, filter: Document) -> Self {
        self.filter = filter;
        self
    }

    /// Keep only these names (plus `_id`).
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(ProjectionRequest::select(fields));
        self
    }

    /// Drop these names in addition to the schema's default omit set.
    pub fn omit<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(ProjectionRequest::omit(fields));
        self
    }

    /// Use a prebuilt projection request.
    pub fn projection(mut self, request: ProjectionRequest) -> Self {
        self.projection = Some(request);
        self
    }

    /// Replace the relation's local field with its target document.
    pub fn populate(mut self, key: impl Into<String>) -> Self {
        self.populate.push(key.into());
        self
    }

    /// Sort by `{field: 1 | -1}` keys, in order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Skip this many hosts after sorting.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Return at most this many hosts.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// How a single-document find-and-modify shapes and picks its result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyOptions {
    pub projection: Option<ProjectionRequest>,
    /// Picks which match is modified when several match.
    pub sort: Option<Document>,
    pub return_document: ReturnDocument,
}

impl ModifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape the returned document.
    pub fn projection(mut self, request: ProjectionRequest) -> Self {
        self.projection = Some(request);
        self
    }

    /// Modify the first match in this order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Return the document as written instead of as it was.
    pub fn return_after(mut self) -> Self {
        self.return_document = ReturnDocument::After;
        self
    }
}

/// The store command for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Find(FindCommand),
    Aggregate(Pipeline),
}

/// A planned query: the store command plus what the codec needs to decode
/// its results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub projection: Projection,
    pub populate: Vec<String>,
    pub command: Command,
}

impl QueryPlan {
    /// Render the store command as extended JSON.
    pub fn to_json(&self) -> JsonValue {
        match &self.command {
            Command::Find(find) => json!({ "find": find.to_document().to_json() }),
            Command::Aggregate(pipeline) => json!({ "aggregate": pipeline.to_json() }),
        }
    }
}

/// Plan `options` against `schema`.
///
/// # Errors
///
/// Returns [`QueryError::Projection`] or [`QueryError::Populate`]; the
/// store is never consulted.
pub fn plan_query<R>(schema: &Schema, resolver: &R, options: &FindOptions) -> Result<QueryPlan, QueryError>
where
    R: SchemaResolver + ?Sized,
{
    let projection = compose_projection(schema, options.projection.as_ref())?;
    check_selection(schema, &projection, &options.populate)?;
    let store_projection = store_projection(&projection);

    let command = if options.populate.is_empty() {
        Command::Find(FindCommand {
            filter: options.filter.clone(),
            projection: store_projection,
            sort: options.sort.clone(),
            skip: options.skip,
            limit: options.limit,
        })
    } else {
        let mut pipeline = compile_pipeline(schema, resolver, &options.filter, &options.populate)?;
        if let Some(sort) = &options.sort {
            pipeline.push(Stage::Sort(sort.clone()));
        }
        if let Some(skip) = options.skip {
            pipeline.push(Stage::Skip(skip));
        }
        if let Some(limit) = options.limit {
            pipeline.push(Stage::Limit(limit));
        }
        if let Some(project) = store_projection {
            pipeline.push(Stage::Project(project));
        }
        Command::Aggregate(pipeline)
    };

    tracing::debug!(
        collection = schema.collection().as_str(),
        populate = options.populate.len(),
        aggregate = matches!(command, Command::Aggregate(_)),
        "query planned"
    );

    Ok(QueryPlan {
        projection,
        populate: options.populate.clone(),
        command,
    })
}

/// Plan a find-and-modify: the projection to decode with and the store
/// options carrying it.
///
/// # Errors
///
/// Returns [`QueryError::Projection`] for an invalid projection request.
pub fn plan_modify(schema: &Schema, options: &ModifyOptions) -> Result<(Projection, FindAndModify), QueryError> {
    let projection = compose_projection(schema, options.projection.as_ref())?;
    let command = FindAndModify {
        sort: options.sort.clone(),
        projection: store_projection(&projection),
        return_document: options.return_document,
    };
    Ok((projection, command))
}

fn store_projection(projection: &Projection) -> Option<Document> {
    if projection.is_passthrough() {
        return None;
    }
    let mut document = projection.to_document();
    // A select of virtuals with no stored dependencies still needs an
    // inclusion, or the store would read it as "everything".
    let includes_any = projection.fields().iter().any(|(_, include)| *include);
    if projection.mode() == ProjectionMode::Select && !includes_any {
        document.insert(ID_FIELD, 1);
    }
    Some(document)
}
