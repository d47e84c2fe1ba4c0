//! # Bound Collections
//!
//! A [`Collection`] binds one schema to a store and the registry its
//! relations resolve through. Reads are planned with [`plan_query`] and
//! every raw result is decoded before it reaches the caller; a result that
//! fails to decode fails the whole read. Writes are encoded first and are
//! never sent when encoding fails.
//!
//! Filters and update documents are forwarded to the store as given.
//! Replacements are encoded like inserts. Find-and-modify results are
//! decoded like reads, without population.
//!
//! [`Collection::find_stream`] decodes lazily and ends after the first
//! failure, so a caller can stop early without decoding the rest.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use monarch_codec::{decode, encode, from_document};
use monarch_core::{CollectionName, Document, DocumentId, Value, ID_FIELD};
use monarch_schema::{Projection, Schema, SchemaRegistry};

use crate::error::QueryError;
use crate::plan::{plan_modify, plan_query, Command, FindOptions, ModifyOptions, QueryPlan};
use crate::store::{Store, UpdateResult};

/// Decoded documents of one read, yielded one at a time.
pub type DocumentStream = BoxStream<'static, Result<Document, QueryError>>;

/// A schema-bound collection handle.
#[derive(Debug)]
pub struct Collection<S: Store> {
    store: Arc<S>,
    registry: Arc<SchemaRegistry>,
    schema: Arc<Schema>,
}

impl<S: Store> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<S: Store> Collection<S> {
    /// Bind `collection` from `registry` to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownCollection`] if the registry has no
    /// schema for it.
    pub fn new(store: Arc<S>, registry: Arc<SchemaRegistry>, collection: &str) -> Result<Self, QueryError> {
        let schema = registry
            .get_by_name(collection)
            .ok_or_else(|| QueryError::UnknownCollection(collection.to_string()))?;
        Ok(Self {
            store,
            registry,
            schema,
        })
    }

    /// The collection this handle queries.
    pub fn name(&self) -> &CollectionName {
        self.schema.collection()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Plan `options` without touching the store.
    pub fn plan(&self, options: &FindOptions) -> Result<QueryPlan, QueryError> {
        plan_query(&self.schema, &*self.registry, options)
    }

    /// Read and decode every matching document.
    pub async fn find(&self, options: &FindOptions) -> Result<Vec<Document>, QueryError> {
        let plan = self.plan(options)?;
        let raw = self.fetch(&plan).await?;
        let mut out = Vec::with_capacity(raw.len());
        for doc in &raw {
            let decoded = decode(
                &self.schema,
                &*self.registry,
                doc,
                &plan.projection,
                &plan.populate,
            )
            .map_err(|e| {
                warn!(collection = %self.name(), path = %e.path(), error = %e, "decode failed");
                e
            })?;
            out.push(decoded);
        }
        Ok(out)
    }

    /// Read the matches as a stream, decoding each one as it is pulled.
    ///
    /// Planning and store failures are returned up front. A decode failure
    /// is yielded in place of its document and ends the stream.
    pub async fn find_stream(&self, options: &FindOptions) -> Result<DocumentStream, QueryError> {
        let plan = self.plan(options)?;
        let raw = self.fetch(&plan).await?;
        let schema = Arc::clone(&self.schema);
        let registry = Arc::clone(&self.registry);
        let QueryPlan {
            projection, populate, ..
        } = plan;

        let mut failed = false;
        let decoded = raw.into_iter().map_while(move |doc| {
            if failed {
                return None;
            }
            let result = decode(&schema, &*registry, &doc, &projection, &populate).map_err(|e| {
                warn!(collection = %schema.collection(), path = %e.path(), error = %e, "decode failed");
                QueryError::from(e)
            });
            failed = result.is_err();
            Some(result)
        });
        Ok(stream::iter(decoded).boxed())
    }

    /// [`Collection::find_stream`] into a caller type.
    pub async fn find_stream_as<T>(
        &self,
        options: &FindOptions,
    ) -> Result<BoxStream<'static, Result<T, QueryError>>, QueryError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let collection = self.name().to_string();
        let documents = self.find_stream(options).await?;
        Ok(documents
            .map(move |doc| -> Result<T, QueryError> { Ok(from_document(&collection, &doc?)?) })
            .boxed())
    }

    /// Read the first match.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] when nothing matches.
    pub async fn find_one(&self, options: &FindOptions) -> Result<Document, QueryError> {
        let options = options.clone().limit(1);
        self.find(&options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found())
    }

    /// Read every match into a caller type.
    pub async fn find_as<T: DeserializeOwned>(&self, options: &FindOptions) -> Result<Vec<T>, QueryError> {
        let collection = self.name().as_str();
        self.find(options)
            .await?
            .iter()
            .map(|doc| from_document(collection, doc).map_err(QueryError::from))
            .collect()
    }

    pub async fn find_one_as<T: DeserializeOwned>(&self, options: &FindOptions) -> Result<T, QueryError> {
        let doc = self.find_one(options).await?;
        Ok(from_document(self.name().as_str(), &doc)?)
    }

    pub async fn count(&self, filter: &Document) -> Result<u64, QueryError> {
        Ok(self.store.count(self.name(), filter).await?)
    }

    /// Encode and insert one document, returning its `_id`.
    pub async fn insert_one(&self, document: &Document) -> Result<Value, QueryError> {
        let encoded = self.prepare(document)?;
        let id = self.store.insert_one(self.name(), encoded).await?;
        debug!(collection = %self.name(), "inserted one document");
        Ok(id)
    }

    /// Encode every document, then insert them together. Nothing is
    /// written if any document fails to encode.
    pub async fn insert_many(&self, documents: &[Document]) -> Result<Vec<Value>, QueryError> {
        let encoded = documents
            .iter()
            .map(|d| self.prepare(d))
            .collect::<Result<Vec<_>, _>>()?;
        let ids = self.store.insert_many(self.name(), encoded).await?;
        debug!(collection = %self.name(), count = ids.len(), "inserted documents");
        Ok(ids)
    }

    pub async fn update_one(&self, filter: &Document, update: &Document) -> Result<UpdateResult, QueryError> {
        Ok(self.store.update_one(self.name(), filter, update).await?)
    }

    pub async fn update_many(&self, filter: &Document, update: &Document) -> Result<UpdateResult, QueryError> {
        Ok(self.store.update_many(self.name(), filter, update).await?)
    }

    /// Encode `replacement` and write it over the first match. The stored
    /// `_id` is kept.
    pub async fn replace_one(&self, filter: &Document, replacement: &Document) -> Result<UpdateResult, QueryError> {
        let encoded = encode(&self.schema, replacement)?;
        Ok(self.store.replace_one(self.name(), filter, encoded).await?)
    }

    /// Atomically update one match and decode it, as it was or as written
    /// per `options`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] when nothing matches.
    pub async fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
        options: &ModifyOptions,
    ) -> Result<Document, QueryError> {
        let (projection, command) = plan_modify(&self.schema, options)?;
        let found = self
            .store
            .find_one_and_update(self.name(), filter, update, &command)
            .await?;
        self.decode_modified(found, &projection)
    }

    /// Atomically replace one match with the encoded `replacement` and
    /// decode it.
    pub async fn find_one_and_replace(
        &self,
        filter: &Document,
        replacement: &Document,
        options: &ModifyOptions,
    ) -> Result<Document, QueryError> {
        let encoded = encode(&self.schema, replacement)?;
        let (projection, command) = plan_modify(&self.schema, options)?;
        let found = self
            .store
            .find_one_and_replace(self.name(), filter, encoded, &command)
            .await?;
        self.decode_modified(found, &projection)
    }

    /// Atomically delete one match and decode what was deleted.
    pub async fn find_one_and_delete(&self, filter: &Document, options: &ModifyOptions) -> Result<Document, QueryError> {
        let (projection, command) = plan_modify(&self.schema, options)?;
        let found = self
            .store
            .find_one_and_delete(self.name(), filter, &command)
            .await?;
        self.decode_modified(found, &projection)
    }

    pub async fn delete_one(&self, filter: &Document) -> Result<u64, QueryError> {
        Ok(self.store.delete_one(self.name(), filter).await?)
    }

    pub async fn delete_many(&self, filter: &Document) -> Result<u64, QueryError> {
        Ok(self.store.delete_many(self.name(), filter).await?)
    }

    /// Run a caller pipeline as is. Results are raw, not decoded.
    pub async fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, QueryError> {
        Ok(self.store.aggregate(self.name(), pipeline).await?)
    }

    /// Run a caller pipeline and convert each raw result into `T`, for
    /// pipelines that reshape documents.
    pub async fn aggregate_as<T: DeserializeOwned>(&self, pipeline: &[Document]) -> Result<Vec<T>, QueryError> {
        let collection = self.name().as_str();
        self.aggregate(pipeline)
            .await?
            .iter()
            .map(|doc| from_document(collection, doc).map_err(QueryError::from))
            .collect()
    }

    fn not_found(&self) -> QueryError {
        QueryError::NotFound {
            collection: self.name().to_string(),
        }
    }

    fn decode_modified(&self, found: Option<Document>, projection: &Projection) -> Result<Document, QueryError> {
        let raw = found.ok_or_else(|| self.not_found())?;
        decode(&self.schema, &*self.registry, &raw, projection, &[] as &[&str]).map_err(|e| {
            warn!(collection = %self.name(), path = %e.path(), error = %e, "decode failed");
            QueryError::from(e)
        })
    }

    fn prepare(&self, document: &Document) -> Result<Document, QueryError> {
        let mut encoded = encode(&self.schema, document)?;
        if !encoded.contains_key(ID_FIELD) {
            encoded.insert(ID_FIELD, DocumentId::new());
        }
        Ok(encoded)
    }

    async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Document>, QueryError> {
        let result = match &plan.command {
            Command::Find(find) => self.store.find(self.name(), find).await,
            Command::Aggregate(pipeline) => {
                self.store
                    .aggregate(self.name(), &pipeline.to_documents())
                    .await
            }
        };
        match result {
            Ok(docs) => {
                debug!(collection = %self.name(), returned = docs.len(), "store read");
                Ok(docs)
            }
            Err(e) => {
                warn!(collection = %self.name(), error = %e, "store read failed");
                Err(e.into())
            }
        }
    }
}
