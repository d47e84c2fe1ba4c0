//! # monarch-schema — Field Types, Schemas & Projections
//!
//! Everything Monarch knows about the shape of a collection lives here.
//!
//! ## Definition (`field`, `schema`, `registry`)
//!
//! - [`FieldType`] validates and transforms one raw value: required or
//!   optional, nullable, defaulted, and an ordered transform chain.
//! - [`Schema`] groups ordered fields, relations to other collections,
//!   virtual fields and a default omit set under one collection name.
//! - [`SchemaRegistry`] binds collection names to schemas once at startup
//!   and checks that every relation target exists. Relation targets are
//!   resolved through [`SchemaResolver`] on each use.
//!
//! ## Projection (`projection`)
//!
//! [`compose_projection`] merges a schema's defaults with a per-query
//! select or omit request. Virtual fields are split out for the codec and
//! the fields they depend on are fetched as support fields.
//!
//! ## Loading & Export (`config`, `validator`)
//!
//! Schemas can be declared in YAML ([`load_registry`]) and rendered as a
//! `$jsonSchema` collection validator ([`collection_validator`]).
//!
//! ## Crate Policy
//!
//! - Depends only on `monarch-core` internally.
//! - Schemas are immutable once built and shared through `Arc`.
//! - Every operation here is synchronous and performs no I/O, except the
//!   explicit file loaders in `config`.

pub mod config;
pub mod field;
pub mod projection;
pub mod registry;
pub mod schema;
pub mod validator;

// ─── Definition re-exports ──────────────────────────────────────────

pub use field::{FieldType, Transform};
pub use registry::{RegistryBuilder, RegistryError, SchemaRegistry, SchemaResolver};
pub use schema::{
    MissingTarget, NameKind, Relation, Schema, SchemaBuilder, SchemaError, VirtualField,
};

// ─── Projection re-exports ──────────────────────────────────────────

pub use projection::{
    compose_projection, Projection, ProjectionError, ProjectionMode, ProjectionRequest,
};

// ─── Loading & export re-exports ────────────────────────────────────

pub use config::{load_registry, ConfigError, RegistryConfig};
pub use validator::{
    collection_validator, json_schema, CollectionValidator, ValidationViolations, ValidatorError,
    Violation,
};
