//! # monarch-pipeline — Relation Population
//!
//! Compiles "populate these relations" into the store's native aggregation
//! language. See [`compile_pipeline`] for the stage layout.
//!
//! ## Crate Policy
//!
//! - No I/O. A pipeline is data; running it is the query layer's job.
//! - Relation targets are resolved through [`monarch_schema::SchemaResolver`]
//!   on every call. Nothing is cached between compilations.

pub mod compile;
pub mod stage;

pub use compile::{check_selection, compile_pipeline, join_variable, temp_field, PopulateError};
pub use stage::{Lookup, Pipeline, Stage, Unwind};
