//! # Store Contract
//!
//! The query layer speaks to a document store only through [`Store`].
//! Filters, updates and pipelines cross this boundary as store-native
//! documents and are never interpreted on the way.
//!
//! Implementations must be `Send + Sync`; every method returns a `Send`
//! future so a store can be shared across tasks behind an `Arc`.

use std::future::Future;

use thiserror::Error;

use monarch_core::{CollectionName, Document, Value};

/// Errors reported by a store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A query or expression operator the store does not implement.
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// A pipeline stage the store does not implement.
    #[error("unsupported pipeline stage '{0}'")]
    UnsupportedStage(String),

    /// A stage document is malformed.
    #[error("invalid {stage} stage: {reason}")]
    InvalidStage {
        /// Stage operator.
        stage: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A filter document is malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// An update document is malformed or cannot be applied.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// An insert reused an existing `_id`.
    #[error("duplicate _id {id} in collection '{collection}'")]
    DuplicateKey {
        /// Collection written to.
        collection: String,
        /// The clashing id, rendered as JSON.
        id: String,
    },

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A plain filtered read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindCommand {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindCommand {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Render as a store `find` command body.
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        out.insert("filter", self.filter.clone());
        if let Some(projection) = &self.projection {
            out.insert("projection", projection.clone());
        }
        if let Some(sort) = &self.sort {
            out.insert("sort", sort.clone());
        }
        if let Some(skip) = self.skip {
            out.insert("skip", i64::try_from(skip).unwrap_or(i64::MAX));
        }
        if let Some(limit) = self.limit {
            out.insert("limit", i64::try_from(limit).unwrap_or(i64::MAX));
        }
        out
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// Which version of a modified document a find-and-modify returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the change.
    #[default]
    Before,
    /// The document as written.
    After,
}

/// Options of a find-and-modify command.
///
/// `sort` picks which match is modified when several match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindAndModify {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub return_document: ReturnDocument,
}

/// A document store.
pub trait Store: Send + Sync {
    /// Plain filtered read.
    fn find(
        &self,
        collection: &CollectionName,
        command: &FindCommand,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Run an aggregation pipeline.
    fn aggregate(
        &self,
        collection: &CollectionName,
        pipeline: &[Document],
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Insert one document, returning its `_id`.
    fn insert_one(
        &self,
        collection: &CollectionName,
        document: Document,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send;

    /// Insert documents in order, returning their `_id`s.
    fn insert_many(
        &self,
        collection: &CollectionName,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    fn update_one(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn update_many(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    /// Replace the first match whole, keeping its `_id`.
    fn replace_one(
        &self,
        collection: &CollectionName,
        filter: &Document,
        replacement: Document,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    /// Atomically update one match and return it, or `None` if nothing
    /// matched.
    fn find_one_and_update(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
        options: &FindAndModify,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Atomically replace one match and return it.
    fn find_one_and_replace(
        &self,
        collection: &CollectionName,
        filter: &Document,
        replacement: Document,
        options: &FindAndModify,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Atomically delete one match and return the deleted document.
    /// `return_document` is ignored.
    fn find_one_and_delete(
        &self,
        collection: &CollectionName,
        filter: &Document,
        options: &FindAndModify,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Delete the first match, returning how many were deleted.
    fn delete_one(
        &self,
        collection: &CollectionName,
        filter: &Document,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn delete_many(
        &self,
        collection: &CollectionName,
        filter: &Document,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn count(
        &self,
        collection: &CollectionName,
        filter: &Document,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
