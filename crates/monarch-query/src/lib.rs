//! # monarch-query — Query Layer
//!
//! Connects the engine to a document store.
//!
//! - [`Store`] is the async boundary to the store. Commands cross it as
//!   store-native documents.
//! - [`Collection`] binds a schema to a store. Reads become a plain `find`
//!   when nothing is populated and an aggregation otherwise, and every raw
//!   result is decoded before it is returned. Writes are encoded first.
//! - [`MemoryStore`] is an in-memory [`Store`] that evaluates the filters
//!   and stages the engine emits. Tests and the CLI run against it.
//!
//! ## Crate Policy
//!
//! - The engine crates stay synchronous; the only suspension points are
//!   [`Store`] calls.
//! - Caller filters, updates and raw pipelines are never rewritten.

pub mod collection;
pub mod error;
pub mod filter;
pub mod memory;
pub mod plan;
pub mod store;

// ─── Query re-exports ───────────────────────────────────────────────

pub use collection::{Collection, DocumentStream};
pub use error::QueryError;
pub use plan::{plan_modify, plan_query, Command, FindOptions, ModifyOptions, QueryPlan};

// ─── Store re-exports ───────────────────────────────────────────────

pub use memory::MemoryStore;
pub use store::{FindAndModify, FindCommand, ReturnDocument, Store, StoreError, UpdateResult};
