//! Arguments and helpers shared by several subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value as JsonValue;

use monarch_core::Document;
use monarch_schema::{load_registry, ProjectionRequest, Schema, SchemaRegistry};

/// Locates the schema definitions and the collection to work on.
#[derive(Args, Debug, Clone)]
pub struct CollectionArgs {
    /// YAML file declaring the collections.
    #[arg(long, value_name = "YAML")]
    pub schemas: PathBuf,

    /// Collection to work on.
    #[arg(long)]
    pub collection: String,
}

impl CollectionArgs {
    /// Load the registry and look up the collection's schema.
    pub fn load(&self) -> Result<(Arc<SchemaRegistry>, Arc<Schema>)> {
        let registry = load_registry(&self.schemas)?;
        let schema = registry.get_by_name(&self.collection).with_context(|| {
            let known = registry
                .collections()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("unknown collection '{}' (known: {known})", self.collection)
        })?;
        Ok((Arc::new(registry), schema))
    }
}

/// A per-query projection request.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectionArgs {
    /// Keep only this field. Repeatable.
    #[arg(long = "select", value_name = "FIELD", conflicts_with = "omit")]
    pub select: Vec<String>,

    /// Drop this field. Repeatable.
    #[arg(long = "omit", value_name = "FIELD")]
    pub omit: Vec<String>,
}

impl ProjectionArgs {
    pub fn request(&self) -> Option<ProjectionRequest> {
        match (self.select.is_empty(), self.omit.is_empty()) {
            (false, _) => Some(ProjectionRequest::select(self.select.iter().cloned())),
            (true, false) => Some(ProjectionRequest::omit(self.omit.iter().cloned())),
            (true, true) => None,
        }
    }
}

/// Parse a JSON object given on the command line.
pub fn parse_document(flag: &str, json: &str) -> Result<Document> {
    let value: JsonValue =
        serde_json::from_str(json).with_context(|| format!("{flag} is not valid JSON"))?;
    Document::from_json(value).with_context(|| format!("{flag} must be a JSON object"))
}

/// Read a JSON file.
pub fn read_json(path: &Path) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Read a JSON file holding one document or an array of documents.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let items = match read_json(path)? {
        JsonValue::Array(items) => items,
        object @ JsonValue::Object(_) => vec![object],
        other => bail!(
            "{} must hold a document or an array of documents, found {}",
            path.display(),
            json_kind(&other)
        ),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Document::from_json(item)
                .with_context(|| format!("{}: entry {i} is not a document", path.display()))
        })
        .collect()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monarch_core::doc;

    #[test]
    fn test_parse_document_requires_object() {
        let d = parse_document("--filter", r#"{"age": {"$gt": 3}}"#).unwrap();
        assert_eq!(d, doc! { "age": doc! { "$gt": 3 } });
        assert!(parse_document("--filter", "[1]").is_err());
        assert!(parse_document("--filter", "{").is_err());
    }

    #[test]
    fn test_read_documents_accepts_object_or_array() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        std::fs::write(&one, r#"{"name": "Ana"}"#).unwrap();
        assert_eq!(read_documents(&one).unwrap(), vec![doc! { "name": "Ana" }]);

        let many = dir.path().join("many.json");
        std::fs::write(&many, r#"[{"name": "Ana"}, {"name": "Bo"}]"#).unwrap();
        assert_eq!(read_documents(&many).unwrap().len(), 2);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "3").unwrap();
        let err = read_documents(&bad).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_projection_request() {
        assert!(ProjectionArgs::default().request().is_none());
        let args = ProjectionArgs {
            select: vec!["name".into()],
            omit: vec![],
        };
        assert_eq!(args.request(), Some(ProjectionRequest::select(["name"])));
    }
}
