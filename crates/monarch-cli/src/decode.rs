//! # Decode and Query Subcommands
//!
//! `decode` runs raw stored documents through the codec, as a read would.
//! `query` loads a JSON fixture of collections into an in-memory store and
//! runs a full read against it: plan, store command, decode.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value as JsonValue;

use monarch_codec::decode;
use monarch_core::Document;
use monarch_pipeline::check_selection;
use monarch_query::{Collection, MemoryStore};
use monarch_schema::compose_projection;

use crate::args::{print_json, read_documents, read_json, CollectionArgs, ProjectionArgs};
use crate::inspect::PipelineArgs;

/// Arguments for the decode subcommand.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub target: CollectionArgs,

    /// JSON file with one raw document or an array of them.
    #[arg(long, value_name = "JSON")]
    pub input: PathBuf,

    /// Relation the raw documents were populated with. Repeatable.
    #[arg(long, value_name = "RELATION")]
    pub populate: Vec<String>,

    #[command(flatten)]
    pub projection: ProjectionArgs,
}

/// Arguments for the query subcommand.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub find: PipelineArgs,

    /// JSON object mapping collection names to arrays of raw documents.
    #[arg(long, value_name = "JSON")]
    pub data: PathBuf,
}

/// Execute the decode subcommand.
pub fn run_decode(args: &DecodeArgs) -> Result<u8> {
    print_json(&render_decode(args)?)?;
    Ok(0)
}

/// Decode stored documents read from `args.input`.
pub fn render_decode(args: &DecodeArgs) -> Result<JsonValue> {
    let (registry, schema) = args.target.load()?;
    let projection = compose_projection(&schema, args.projection.request().as_ref())?;
    check_selection(&schema, &projection, &args.populate)?;
    let raw = read_documents(&args.input)?;
    let mut out = Vec::with_capacity(raw.len());
    for (i, doc) in raw.iter().enumerate() {
        let decoded = decode(&schema, &*registry, doc, &projection, &args.populate)
            .with_context(|| format!("document {i} at '{}'", id_of(doc)))?;
        out.push(decoded.to_json());
    }
    Ok(JsonValue::Array(out))
}

fn id_of(doc: &Document) -> String {
    doc.get("_id")
        .map(|id| id.to_json().to_string())
        .unwrap_or_else(|| "<no _id>".to_string())
}

/// Execute the query subcommand.
pub fn run_query(args: &QueryArgs) -> Result<u8> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let out = runtime.block_on(render_query(args))?;
    print_json(&out)?;
    Ok(0)
}

pub async fn render_query(args: &QueryArgs) -> Result<JsonValue> {
    let (registry, _) = args.find.target.load()?;
    let store = Arc::new(MemoryStore::new());

    let JsonValue::Object(collections) = read_json(&args.data)? else {
        bail!("{} must hold an object of collections", args.data.display());
    };
    for (name, docs) in collections {
        let JsonValue::Array(docs) = docs else {
            bail!("collection '{name}' must be an array of documents");
        };
        let docs = docs
            .into_iter()
            .map(Document::from_json)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("collection '{name}' holds a non-document"))?;
        tracing::debug!(collection = %name, documents = docs.len(), "seeding fixture");
        store.seed(&name, docs).await;
    }

    let collection = Collection::new(store, registry, &args.find.target.collection)?;
    let found = collection.find(&args.find.find_options()?).await?;
    Ok(JsonValue::Array(found.iter().map(Document::to_json).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    const BLOG: &str = r#"
collections:
  - name: users
    fields:
      - { name: name, kind: string, transforms: [trim] }
      - { name: age, kind: number, default: 0 }
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
    fn test_decode_populated_documents() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        std::fs::write(
            &input,
            r#"[{"_id": "p1", "title": "Hi", "author": {"_id": "u1", "name": "  Ana "}}]"#,
        )
        .unwrap();
        let args = DecodeArgs {
            target: target(dir.path(), "posts"),
            input,
            populate: vec!["author".into()],
            projection: ProjectionArgs::default(),
        };
        let out = render_decode(&args).unwrap();
        assert_eq!(
            out,
            json!([{ "_id": "p1", "title": "Hi", "author": { "_id": "u1", "name": "Ana", "age": 0 } }])
        );
    }

    #[test]
    fn test_decode_failure_names_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        std::fs::write(&input, r#"{"_id": "u9", "name": 5}"#).unwrap();
        let args = DecodeArgs {
            target: target(dir.path(), "users"),
            input,
            populate: vec![],
            projection: ProjectionArgs::default(),
        };
        let err = render_decode(&args).unwrap_err();
        assert!(format!("{err:#}").contains(r#"document 0 at '"u9"'"#));
    }

    #[test]
    fn test_decode_rejects_selecting_replaced_local_field() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        std::fs::write(&input, "[]").unwrap();
        let args = DecodeArgs {
            target: target(dir.path(), "posts"),
            input,
            populate: vec!["author".into()],
            projection: ProjectionArgs {
                select: vec!["authorId".into(), "author".into()],
                omit: vec![],
            },
        };
        let err = render_decode(&args).unwrap_err();
        assert!(err.to_string().contains("cannot select 'authorId'"));
    }

    #[tokio::test]
    async fn test_query_drops_orphaned_post() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(
            &data,
            r#"{
                "users": [{"_id": "u1", "name": "Ana", "age": 30}],
                "posts": [
                    {"_id": "p1", "title": "Kept", "authorId": "u1"},
                    {"_id": "p2", "title": "Dropped", "authorId": "ghost"}
                ]
            }"#,
        )
        .unwrap();
        let args = QueryArgs {
            find: PipelineArgs {
                target: target(dir.path(), "posts"),
                filter: None,
                populate: vec!["author".into()],
                projection: ProjectionArgs {
                    select: vec!["title".into(), "author".into()],
                    omit: vec![],
                },
                sort: None,
                skip: None,
                limit: None,
            },
            data,
        };
        let out = render_query(&args).await.unwrap();
        assert_eq!(
            out,
            json!([{ "_id": "p1", "title": "Kept", "author": { "_id": "u1", "name": "Ana", "age": 30 } }])
        );
    }
}
