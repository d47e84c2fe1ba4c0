//! # Query Errors
//!
//! [`QueryError`] is the one error type a caller of [`crate::Collection`]
//! handles. Each layer's error converts into it with `?`.

use thiserror::Error;

use monarch_codec::{CodecError, DecodeError, EncodeError};
use monarch_pipeline::PopulateError;
use monarch_schema::ProjectionError;

use crate::store::StoreError;

/// Errors raised while planning, running or decoding a query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// No schema is registered for the collection.
    #[error("no schema registered for collection '{0}'")]
    UnknownCollection(String),

    /// A single-document read matched nothing.
    #[error("no document in '{collection}' matches the filter")]
    NotFound {
        /// Collection queried.
        collection: String,
    },

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Populate(#[from] PopulateError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Whether the error is a [`QueryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
