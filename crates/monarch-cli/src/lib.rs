//! # monarch-cli — Monarch Command-Line Interface
//!
//! ## Subcommands
//!
//! - `check`: load and link schema definitions
//! - `pipeline`: print the store command a read would run
//! - `projection`: print a composed projection
//! - `validator`: print or apply the `$jsonSchema` collection validator
//! - `decode`: decode raw stored documents
//! - `query`: run a read against an in-memory fixture
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers.
//! - Handlers delegate to the library crates and only format output.

pub mod args;
pub mod check;
pub mod decode;
pub mod inspect;
