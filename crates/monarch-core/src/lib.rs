//! # monarch-core — Foundational Types for Monarch
//!
//! This crate is the leaf of the Monarch workspace. It defines the value
//! model every other crate speaks: store-native values, ordered documents,
//! field kinds, collection names, and field-level errors. It depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Closed value model.** [`Value`] is a tagged enum over the kinds the
//!    store can hold. Kind checks are exhaustive `match`es, never runtime
//!    type inspection.
//!
//! 2. **Ordered documents.** [`Document`] preserves insertion order, so
//!    output follows schema declaration order.
//!
//! 3. **Store-precision dates.** [`Timestamp`] is UTC and truncated to
//!    milliseconds, the precision the store keeps.
//!
//! 4. **Validated names.** [`CollectionName`] cannot hold a name the store
//!    would reject.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `monarch-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod kind;
pub mod temporal;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use error::{FieldError, ValueError};
pub use identity::{CollectionName, DocumentId};
pub use kind::FieldKind;
pub use temporal::Timestamp;
pub use value::{Document, Value};

/// Name of the primary key field every stored document carries.
pub const ID_FIELD: &str = "_id";
