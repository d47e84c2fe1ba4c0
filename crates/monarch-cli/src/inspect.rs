//! # Inspection Subcommands
//!
//! Print what the engine would send to the store without running it:
//!
//! - `pipeline`: the planned command, a `find` or an aggregation.
//! - `projection`: the composed projection and its virtual fields.
//! - `validator`: the `$jsonSchema` collection validator, or the
//!   violations of a file of raw documents against it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value as JsonValue};

use monarch_query::{plan_query, FindOptions};
use monarch_schema::{collection_validator, compose_projection, CollectionValidator, ValidatorError};

use crate::args::{parse_document, print_json, read_documents, CollectionArgs, ProjectionArgs};

/// Arguments for the pipeline subcommand.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub target: CollectionArgs,

    /// Filter as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub filter: Option<String>,

    /// Relation to populate. Repeatable; order is kept.
    #[arg(long, value_name = "RELATION")]
    pub populate: Vec<String>,

    #[command(flatten)]
    pub projection: ProjectionArgs,

    /// Sort as a JSON object, e.g. '{"name": 1}'.
    #[arg(long, value_name = "JSON")]
    pub sort: Option<String>,

    #[arg(long)]
    pub skip: Option<u64>,

    #[arg(long)]
    pub limit: Option<u64>,
}

impl PipelineArgs {
    pub fn find_options(&self) -> Result<FindOptions> {
        let mut options = FindOptions::new();
        if let Some(filter) = &self.filter {
            options = options.filter(parse_document("--filter", filter)?);
        }
        if let Some(sort) = &self.sort {
            options = options.sort(parse_document("--sort", sort)?);
        }
        options.projection = self.projection.request();
        options.populate = self.populate.clone();
        options.skip = self.skip;
        options.limit = self.limit;
        Ok(options)
    }
}

/// Arguments for the projection subcommand.
#[derive(Args, Debug)]
pub struct ProjectionCommandArgs {
    #[command(flatten)]
    pub target: CollectionArgs,

    #[command(flatten)]
    pub projection: ProjectionArgs,
}

/// Arguments for the validator subcommand.
#[derive(Args, Debug)]
pub struct ValidatorArgs {
    #[command(flatten)]
    pub target: CollectionArgs,

    /// Validate the raw documents in this JSON file instead of printing
    /// the validator.
    #[arg(long, value_name = "JSON")]
    pub check: Option<PathBuf>,
}

/// Execute the pipeline subcommand.
pub fn run_pipeline(args: &PipelineArgs) -> Result<u8> {
    print_json(&render_pipeline(args)?)?;
    Ok(0)
}

/// Compile the population pipeline for `args` as extended JSON.
pub fn render_pipeline(args: &PipelineArgs) -> Result<JsonValue> {
    let (registry, schema) = args.target.load()?;
    let plan = plan_query(&schema, &*registry, &args.find_options()?)?;
    Ok(plan.to_json())
}

/// Execute the projection subcommand.
pub fn run_projection(args: &ProjectionCommandArgs) -> Result<u8> {
    print_json(&render_projection(args)?)?;
    Ok(0)
}

/// Compose the projection for `args` and report its mode and names.
pub fn render_projection(args: &ProjectionCommandArgs) -> Result<JsonValue> {
    let (_, schema) = args.target.load()?;
    let projection = compose_projection(&schema, args.projection.request().as_ref())?;
    Ok(json!({
        "mode": projection.mode().as_str(),
        "projection": projection.to_document().to_json(),
        "virtuals": projection.virtuals(),
        "support": projection.support_fields(),
    }))
}

/// Execute the validator subcommand. With `--check`, exits 2 if any
/// document violates the validator.
pub fn run_validator(args: &ValidatorArgs) -> Result<u8> {
    let (_, schema) = args.target.load()?;
    let Some(path) = &args.check else {
        print_json(&collection_validator(&schema))?;
        return Ok(0);
    };

    let validator = CollectionValidator::new(&schema)?;
    let documents = read_documents(path)?;
    let mut failed = 0usize;
    for (i, document) in documents.iter().enumerate() {
        match validator.validate(&document.to_json()) {
            Ok(()) => {}
            Err(ValidatorError::ValidationFailed { violations, .. }) => {
                failed += 1;
                for violation in violations.violations() {
                    println!("document {i}: {violation}");
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!(
        "{} of {} documents valid against '{}'",
        documents.len() - failed,
        documents.len(),
        validator.collection()
    );
    Ok(if failed == 0 { 0 } else { 2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const BLOG: &str = r#"
collections:
  - name: users
    fields:
      - { name: name, kind: string }
      - { name: password, kind: string, required: false }
    omit: [password]
  - name: posts
    fields:
      - { name: title, kind: string }
      - { name: authorId, kind: string }
    relations:
      - { name: author, local: authorId, target: users }
"#;

    fn target(dir: &Path, collection: &str) -> CollectionArgs {
        let schemas = dir.join("schemas.yaml");
        std::fs::write(&schemas, BLOG).unwrap();
        CollectionArgs {
            schemas,
            collection: collection.to_string(),
        }
    }

    #[test]
    fn test_pipeline_with_populate() {
        let dir = tempfile::tempdir().unwrap();
        let args = PipelineArgs {
            target: target(dir.path(), "posts"),
            filter: Some(r#"{"title": "Hello"}"#.into()),
            populate: vec!["author".into()],
            projection: ProjectionArgs::default(),
            sort: None,
            skip: None,
            limit: Some(3),
        };
        let out = render_pipeline(&args).unwrap();
        let stages = out["aggregate"].as_array().unwrap();
        assert_eq!(stages.len(), 7);
        assert_eq!(stages[0], json!({ "$match": { "title": "Hello" } }));
        assert_eq!(stages[1]["$lookup"]["from"], "users");
        assert_eq!(stages[6], json!({ "$limit": 3 }));
    }

    #[test]
    fn test_pipeline_without_populate_is_a_find() {
        let dir = tempfile::tempdir().unwrap();
        let args = PipelineArgs {
            target: target(dir.path(), "users"),
            filter: None,
            populate: vec![],
            projection: ProjectionArgs::default(),
            sort: None,
            skip: None,
            limit: None,
        };
        let out = render_pipeline(&args).unwrap();
        assert_eq!(out, json!({ "find": { "filter": {}, "projection": { "password": 0 } } }));
    }

    #[test]
    fn test_unknown_collection_names_known_ones() {
        let dir = tempfile::tempdir().unwrap();
        let args = ProjectionCommandArgs {
            target: target(dir.path(), "comments"),
            projection: ProjectionArgs::default(),
        };
        let err = render_projection(&args).unwrap_err();
        assert!(err.to_string().contains("posts, users"));
    }

    #[test]
    fn test_projection_select() {
        let dir = tempfile::tempdir().unwrap();
        let args = ProjectionCommandArgs {
            target: target(dir.path(), "users"),
            projection: ProjectionArgs {
                select: vec!["name".into()],
                omit: vec![],
            },
        };
        let out = render_projection(&args).unwrap();
        assert_eq!(out["mode"], "select");
        assert_eq!(out["projection"], json!({ "name": 1 }));
    }
}
