//! # monarch-codec — Document Codec
//!
//! Converts between raw stored documents and the documents callers see.
//!
//! - [`decode`] applies a schema and an effective projection to a raw
//!   document, recursing into populated relations and computing virtual
//!   fields. [`decode_as`] goes one step further into a caller `serde`
//!   type.
//! - [`encode`] validates a caller document for storage.
//!
//! Both directions are atomic: either the whole document converts or an
//! error names the first field that did not.
//!
//! ## Crate Policy
//!
//! - No I/O. Relation targets are resolved through
//!   [`monarch_schema::SchemaResolver`], never fetched.

pub mod decode;
pub mod encode;
pub mod error;

pub use decode::{decode, decode_as, decode_default, from_document};
pub use encode::encode;
pub use error::{CodecError, DecodeError, DecodeFailure, EncodeError};
