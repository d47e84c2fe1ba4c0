//! # Pipeline Stages
//!
//! Typed aggregation stages and their store-native rendering. Stage order
//! is significant: the store runs stages strictly in sequence and each
//! stage's output is the next stage's input.

use serde_json::Value as JsonValue;

use monarch_core::{doc, CollectionName, Document, Value};

/// An equality join against another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: CollectionName,
    /// Pipeline-local variables, name → expression.
    pub let_vars: Document,
    pub pipeline: Vec<Stage>,
    /// Field receiving the array of joined documents.
    pub as_field: String,
}

/// Flattens an array field into one document per element.
#[derive(Debug, Clone, PartialEq)]
pub struct Unwind {
    pub path: String,
    /// Keep documents whose array is missing or empty.
    pub preserve_null_and_empty_arrays: bool,
}

/// One aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Lookup(Lookup),
    Unwind(Unwind),
    Set(Document),
    Unset(Vec<String>),
    Project(Document),
    Sort(Document),
    Skip(u64),
    Limit(u64),
}

impl Stage {
    /// The stage operator, e.g. `$lookup`.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Lookup(_) => "$lookup",
            Self::Unwind(_) => "$unwind",
            Self::Set(_) => "$set",
            Self::Unset(_) => "$unset",
            Self::Project(_) => "$project",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
        }
    }

    /// Render as a store-native stage document.
    pub fn to_document(&self) -> Document {
        let body: Value = match self {
            Self::Match(filter) => filter.clone().into(),
            Self::Lookup(lookup) => doc! {
                "from": lookup.from.as_str(),
                "let": lookup.let_vars.clone(),
                "pipeline": lookup.pipeline.iter().map(|s| Value::from(s.to_document())).collect::<Vec<_>>(),
                "as": lookup.as_field.as_str(),
            }
            .into(),
            Self::Unwind(unwind) => doc! {
                "path": format!("${}", unwind.path),
                "preserveNullAndEmptyArrays": unwind.preserve_null_and_empty_arrays,
            }
            .into(),
            Self::Set(fields) | Self::Project(fields) | Self::Sort(fields) => fields.clone().into(),
            Self::Unset(fields) => match fields.as_slice() {
                [single] => Value::from(single.as_str()),
                many => Value::Array(many.iter().map(|f| Value::from(f.as_str())).collect()),
            },
            Self::Skip(n) | Self::Limit(n) => Value::Int(i64::try_from(*n).unwrap_or(i64::MAX)),
        };
        let mut out = Document::with_capacity(1);
        out.insert(self.operator(), body);
        out
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render every stage, in order.
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// Render as an extended-JSON array.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.stages.iter().map(|s| s.to_document().to_json()).collect())
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

impl IntoIterator for Pipeline {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}

impl Extend<Stage> for Pipeline {
    fn extend<I: IntoIterator<Item = Stage>>(&mut self, iter: I) {
        self.stages.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_lookup() {
        let stage = Stage::Lookup(Lookup {
            from: CollectionName::new("users").unwrap(),
            let_vars: doc! { "ref_author__id": "$authorId" },
            pipeline: vec![Stage::Limit(1)],
            as_field: "__populate_author".into(),
        });
        assert_eq!(
            stage.to_document().to_json(),
            json!({
                "$lookup": {
                    "from": "users",
                    "let": { "ref_author__id": "$authorId" },
                    "pipeline": [{ "$limit": 1 }],
                    "as": "__populate_author",
                }
            })
        );
    }

    #[test]
    fn test_render_unwind_prefixes_path() {
        let stage = Stage::Unwind(Unwind {
            path: "__populate_author".into(),
            preserve_null_and_empty_arrays: false,
        });
        assert_eq!(
            stage.to_document().to_json(),
            json!({ "$unwind": { "path": "$__populate_author", "preserveNullAndEmptyArrays": false } })
        );
    }

    #[test]
    fn test_render_unset_single_and_many() {
        assert_eq!(
            Stage::Unset(vec!["a".into()]).to_document().to_json(),
            json!({ "$unset": "a" })
        );
        assert_eq!(
            Stage::Unset(vec!["a".into(), "b".into()]).to_document().to_json(),
            json!({ "$unset": ["a", "b"] })
        );
    }

    #[test]
    fn test_pipeline_to_json() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::Match(doc! { "published": true }));
        pipeline.extend([Stage::Skip(5), Stage::Limit(10)]);
        assert_eq!(pipeline.len(), 3);
        assert_eq!(
            pipeline.to_json(),
            json!([{ "$match": { "published": true } }, { "$skip": 5 }, { "$limit": 10 }])
        );
    }
}
