//! # Check Subcommand
//!
//! Loads a schema definitions file, links every relation, and prints a
//! summary of each collection. Exits non-zero if the definitions do not
//! load.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value as JsonValue};

use monarch_schema::{load_registry, SchemaRegistry};

use crate::args::print_json;

/// Arguments for the check subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// YAML file declaring the collections.
    #[arg(long, value_name = "YAML")]
    pub schemas: PathBuf,
}

/// Execute the check subcommand.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let registry = load_registry(&args.schemas)?;
    tracing::info!(
        path = %args.schemas.display(),
        collections = registry.len(),
        "schema definitions loaded"
    );
    print_json(&summarize(&registry))?;
    Ok(0)
}

/// One entry per collection: its fields, relations, virtuals and default
/// omit set.
pub fn summarize(registry: &SchemaRegistry) -> JsonValue {
    let collections: Vec<JsonValue> = registry
        .schemas()
        .map(|schema| {
            let fields: Vec<JsonValue> = schema
                .fields()
                .map(|(name, field)| {
                    json!({
                        "name": name,
                        "kind": field.kind().as_str(),
                        "required": field.is_required(),
                        "nullable": field.is_nullable(),
                    })
                })
                .collect();
            let relations: Vec<JsonValue> = schema
                .relations()
                .map(|(name, relation)| {
                    json!({
                        "name": name,
                        "local": relation.local_field(),
                        "target": relation.target().as_str(),
                        "target_field": relation.target_field(),
                        "on_missing": relation.missing_target().as_str(),
                    })
                })
                .collect();
            json!({
                "name": schema.collection().as_str(),
                "fields": fields,
                "relations": relations,
                "virtuals": schema.virtuals().iter().map(|v| v.name()).collect::<Vec<_>>(),
                "omit": schema.base_omit(),
            })
        })
        .collect();
    json!({ "collections": collections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use monarch_schema::RegistryConfig;

    #[test]
    fn test_summary_lists_relations() {
        let registry = RegistryConfig::from_yaml_str(
            r#"
collections:
  - name: users
    fields:
      - { name: name, kind: string }
  - name: posts
    fields:
      - { name: authorId, kind: string }
    relations:
      - { name: author, local: authorId, target: users, on_missing: keep }
"#,
        )
        .unwrap()
        .into_registry()
        .unwrap();
        let summary = summarize(&registry);
        let posts = summary["collections"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "posts")
            .unwrap();
        assert_eq!(posts["relations"][0]["target"], "users");
        assert_eq!(posts["relations"][0]["on_missing"], "keep");
        assert_eq!(posts["fields"][0]["name"], "_id");
    }
}
