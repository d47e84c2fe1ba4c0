//! # In-Memory Store
//!
//! A [`Store`] over `tokio::sync::RwLock`-guarded vectors of documents.
//! It evaluates the filters in [`crate::filter`] and the pipeline stages
//! the query layer emits: `$match`, `$lookup` (both the `let`/`pipeline`
//! and the `localField`/`foreignField` forms), `$unwind`, `$set`
//! (`$addFields`), `$unset`, `$project`, `$sort`, `$skip`, `$limit` and
//! `$group`. Updates support `$set`, `$unset` and `$inc`; replacements keep
//! the stored `_id`.
//!
//! Every read returns clones; no lock is held across an await point.

use std::cmp::Ordering;
use std::collections::HashMap;

use tokio::sync::RwLock;

use monarch_core::{CollectionName, Document, DocumentId, Value, ID_FIELD};

use crate::filter::{compare, compare_fields, evaluate, matches, set_path};
use crate::store::{FindAndModify, FindCommand, ReturnDocument, Store, StoreError, UpdateResult};

type Collections = HashMap<String, Vec<Document>>;

/// An in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `collection` without any checks.
    pub async fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.collections
            .write()
            .await
            .insert(collection.to_string(), documents);
    }

    /// Snapshot of the raw stored documents of `collection`.
    pub async fn dump(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn stored<'a>(data: &'a Collections, collection: &str) -> &'a [Document] {
    data.get(collection).map(Vec::as_slice).unwrap_or_default()
}

fn filtered(docs: &[Document], filter: &Document) -> Result<Vec<Document>, StoreError> {
    let mut out = Vec::new();
    for doc in docs {
        if matches(doc, filter, &Document::new())? {
            out.push(doc.clone());
        }
    }
    Ok(out)
}

impl Store for MemoryStore {
    async fn find(
        &self,
        collection: &CollectionName,
        command: &FindCommand,
    ) -> Result<Vec<Document>, StoreError> {
        let data = self.collections.read().await;
        let mut docs = filtered(stored(&data, collection.as_str()), &command.filter)?;
        if let Some(sort) = &command.sort {
            sort_documents(&mut docs, sort)?;
        }
        let skip = command.skip.map_or(0, to_usize);
        let limit = command.limit.map_or(usize::MAX, to_usize);
        let docs = docs.into_iter().skip(skip).take(limit);
        match &command.projection {
            Some(projection) => docs.map(|d| project(d, projection)).collect(),
            None => Ok(docs.collect()),
        }
    }

    async fn aggregate(
        &self,
        collection: &CollectionName,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let data = self.collections.read().await;
        let input = stored(&data, collection.as_str()).to_vec();
        run_pipeline(&data, input, pipeline, &Document::new())
    }

    async fn insert_one(
        &self,
        collection: &CollectionName,
        document: Document,
    ) -> Result<Value, StoreError> {
        let mut ids = self.insert_many(collection, vec![document]).await?;
        ids.pop()
            .ok_or_else(|| StoreError::Backend("insert returned no id".to_string()))
    }

    async fn insert_many(
        &self,
        collection: &CollectionName,
        documents: Vec<Document>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut data = self.collections.write().await;
        let docs = data.entry(collection.to_string()).or_default();

        let mut prepared = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.get(ID_FIELD) {
                Some(id) => id.clone(),
                None => {
                    let id = Value::from(DocumentId::new());
                    document.insert(ID_FIELD, id.clone());
                    id
                }
            };
            let clash = docs
                .iter()
                .chain(prepared.iter().map(|(_, d)| d))
                .any(|d: &Document| d.get(ID_FIELD) == Some(&id));
            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    id: id.to_json().to_string(),
                });
            }
            prepared.push((id, document));
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (id, document) in prepared {
            docs.push(document);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, StoreError> {
        self.update(collection, filter, update, Some(1)).await
    }

    async fn update_many(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, StoreError> {
        self.update(collection, filter, update, None).await
    }

    async fn replace_one(
        &self,
        collection: &CollectionName,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, StoreError> {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(collection.as_str()) else {
            return Ok(UpdateResult::default());
        };
        let Some(i) = first_match(docs, filter, None)? else {
            return Ok(UpdateResult::default());
        };
        let replaced = apply_replacement(&docs[i], replacement)?;
        let modified = u64::from(docs[i] != replaced);
        docs[i] = replaced;
        Ok(UpdateResult { matched: 1, modified })
    }

    async fn find_one_and_update(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
        options: &FindAndModify,
    ) -> Result<Option<Document>, StoreError> {
        self.modify_one(collection, filter, options, |doc| apply_update(doc, update))
            .await
    }

    async fn find_one_and_replace(
        &self,
        collection: &CollectionName,
        filter: &Document,
        replacement: Document,
        options: &FindAndModify,
    ) -> Result<Option<Document>, StoreError> {
        self.modify_one(collection, filter, options, move |doc| {
            apply_replacement(doc, replacement)
        })
        .await
    }

    async fn find_one_and_delete(
        &self,
        collection: &CollectionName,
        filter: &Document,
        options: &FindAndModify,
    ) -> Result<Option<Document>, StoreError> {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(collection.as_str()) else {
            return Ok(None);
        };
        let Some(i) = first_match(docs, filter, options.sort.as_ref())? else {
            return Ok(None);
        };
        let deleted = docs.remove(i);
        shaped(deleted, options.projection.as_ref()).map(Some)
    }

    async fn delete_one(&self, collection: &CollectionName, filter: &Document) -> Result<u64, StoreError> {
        self.delete(collection, filter, Some(1)).await
    }

    async fn delete_many(&self, collection: &CollectionName, filter: &Document) -> Result<u64, StoreError> {
        self.delete(collection, filter, None).await
    }

    async fn count(&self, collection: &CollectionName, filter: &Document) -> Result<u64, StoreError> {
        let data = self.collections.read().await;
        let mut n = 0;
        for doc in stored(&data, collection.as_str()) {
            if matches(doc, filter, &Document::new())? {
                n += 1;
            }
        }
        Ok(n)
    }
}

impl MemoryStore {
    async fn update(
        &self,
        collection: &CollectionName,
        filter: &Document,
        update: &Document,
        max: Option<u64>,
    ) -> Result<UpdateResult, StoreError> {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(collection.as_str()) else {
            return Ok(UpdateResult::default());
        };

        // Apply to copies first so a failing update leaves nothing changed.
        let mut changes = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            if max.is_some_and(|m| changes.len() as u64 >= m) {
                break;
            }
            if matches(doc, filter, &Document::new())? {
                changes.push((i, apply_update(doc, update)?));
            }
        }

        let mut result = UpdateResult {
            matched: changes.len() as u64,
            modified: 0,
        };
        for (i, updated) in changes {
            if docs[i] != updated {
                docs[i] = updated;
                result.modified += 1;
            }
        }
        Ok(result)
    }

    async fn modify_one<F>(
        &self,
        collection: &CollectionName,
        filter: &Document,
        options: &FindAndModify,
        change: F,
    ) -> Result<Option<Document>, StoreError>
    where
        F: FnOnce(&Document) -> Result<Document, StoreError> + Send,
    {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(collection.as_str()) else {
            return Ok(None);
        };
        let Some(i) = first_match(docs, filter, options.sort.as_ref())? else {
            return Ok(None);
        };
        let changed = change(&docs[i])?;
        let before = std::mem::replace(&mut docs[i], changed);
        let returned = match options.return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => docs[i].clone(),
        };
        shaped(returned, options.projection.as_ref()).map(Some)
    }

    async fn delete(
        &self,
        collection: &CollectionName,
        filter: &Document,
        max: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(collection.as_str()) else {
            return Ok(0);
        };
        let mut doomed = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            if max.is_some_and(|m| doomed.len() as u64 >= m) {
                break;
            }
            if matches(doc, filter, &Document::new())? {
                doomed.push(i);
            }
        }
        for i in doomed.iter().rev() {
            docs.remove(*i);
        }
        Ok(doomed.len() as u64)
    }
}

// Index of the first match, in sort order when a sort is given.
fn first_match(docs: &[Document], filter: &Document, sort: Option<&Document>) -> Result<Option<usize>, StoreError> {
    let mut hits = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if matches(doc, filter, &Document::new())? {
            if sort.is_none() {
                return Ok(Some(i));
            }
            hits.push(i);
        }
    }
    if let Some(sort) = sort {
        let keys = sort_keys(sort)?;
        hits.sort_by(|a, b| compare_by_keys(&keys, &docs[*a], &docs[*b]));
    }
    Ok(hits.first().copied())
}

fn shaped(doc: Document, projection: Option<&Document>) -> Result<Document, StoreError> {
    match projection {
        Some(projection) => project(doc, projection),
        None => Ok(doc),
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

// ─── Updates ────────────────────────────────────────────────────────

fn apply_update(doc: &Document, update: &Document) -> Result<Document, StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document is empty".to_string()));
    }
    let mut out = doc.clone();
    for (op, fields) in update.iter() {
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::InvalidUpdate(format!("{op} expects a document")))?;
        for (path, value) in fields.iter() {
            if path == ID_FIELD {
                return Err(StoreError::InvalidUpdate("_id is immutable".to_string()));
            }
            match op {
                "$set" => set_path(&mut out, path, value.clone()),
                "$unset" => {
                    out.remove_path(path);
                }
                "$inc" => {
                    let next = increment(out.get_path(path), value, path)?;
                    set_path(&mut out, path, next);
                }
                other => return Err(StoreError::UnsupportedOperator(other.to_string())),
            }
        }
    }
    Ok(out)
}

fn apply_replacement(current: &Document, replacement: Document) -> Result<Document, StoreError> {
    if let Some(op) = replacement.keys().find(|k| k.starts_with('$')) {
        return Err(StoreError::InvalidUpdate(format!(
            "replacement cannot contain update operator '{op}'"
        )));
    }
    let id = current.get(ID_FIELD).cloned();
    if let (Some(id), Some(new_id)) = (&id, replacement.get(ID_FIELD)) {
        if id != new_id {
            return Err(StoreError::InvalidUpdate("_id is immutable".to_string()));
        }
    }
    let mut out = Document::with_capacity(replacement.len() + 1);
    if let Some(id) = id {
        out.insert(ID_FIELD, id);
    }
    for (key, value) in replacement {
        out.insert(key, value);
    }
    Ok(out)
}

fn increment(current: Option<&Value>, by: &Value, path: &str) -> Result<Value, StoreError> {
    match (current, by) {
        (None, Value::Int(_) | Value::Double(_)) => Ok(by.clone()),
        (Some(Value::Int(a)), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| StoreError::InvalidUpdate(format!("$inc overflows '{path}'"))),
        (Some(Value::Int(a)), Value::Double(b)) => Ok(Value::Double(*a as f64 + b)),
        (Some(Value::Double(a)), Value::Int(b)) => Ok(Value::Double(a + *b as f64)),
        (Some(Value::Double(a)), Value::Double(b)) => Ok(Value::Double(a + b)),
        _ => Err(StoreError::InvalidUpdate(format!(
            "$inc needs numbers at '{path}'"
        ))),
    }
}

// ─── Pipelines ──────────────────────────────────────────────────────

fn run_pipeline(
    data: &Collections,
    mut docs: Vec<Document>,
    pipeline: &[Document],
    vars: &Document,
) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (op, arg) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(StoreError::InvalidStage {
                    stage: "pipeline".to_string(),
                    reason: "each stage must have exactly one operator".to_string(),
                })
            }
        };
        docs = match op {
            "$match" => {
                let filter = stage_document(op, arg)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter, vars)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$lookup" => lookup(data, docs, stage_document(op, arg)?, vars)?,
            "$unwind" => unwind(docs, arg)?,
            "$set" | "$addFields" => {
                let fields = stage_document(op, arg)?;
                let mut out = Vec::with_capacity(docs.len());
                for mut doc in docs {
                    for (path, expr) in fields.iter() {
                        if let Some(value) = evaluate(expr, &doc, vars)? {
                            set_path(&mut doc, path, value);
                        }
                    }
                    out.push(doc);
                }
                out
            }
            "$unset" => {
                let paths = string_list(op, arg)?;
                docs.into_iter()
                    .map(|mut doc| {
                        for path in &paths {
                            doc.remove_path(path);
                        }
                        doc
                    })
                    .collect()
            }
            "$project" => {
                let projection = stage_document(op, arg)?;
                docs.into_iter()
                    .map(|d| project(d, projection))
                    .collect::<Result<_, _>>()?
            }
            "$sort" => {
                sort_documents(&mut docs, stage_document(op, arg)?)?;
                docs
            }
            "$skip" => {
                let n = stage_count(op, arg)?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = stage_count(op, arg)?;
                docs.into_iter().take(n).collect()
            }
            "$group" => group(docs, stage_document(op, arg)?, vars)?,
            other => return Err(StoreError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(docs)
}

fn invalid(stage: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidStage {
        stage: stage.to_string(),
        reason: reason.into(),
    }
}

fn stage_document<'a>(op: &str, arg: &'a Value) -> Result<&'a Document, StoreError> {
    arg.as_document()
        .ok_or_else(|| invalid(op, format!("expected a document, found {}", arg.type_name())))
}

fn stage_count(op: &str, arg: &Value) -> Result<usize, StoreError> {
    match arg {
        Value::Int(n) if *n >= 0 => Ok(usize::try_from(*n).unwrap_or(usize::MAX)),
        other => Err(invalid(op, format!("expected a non-negative integer, found {}", other.type_name()))),
    }
}

fn string_list(op: &str, arg: &Value) -> Result<Vec<String>, StoreError> {
    match arg {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(op, "expected field names"))
            })
            .collect(),
        other => Err(invalid(op, format!("expected field names, found {}", other.type_name()))),
    }
}

fn lookup(
    data: &Collections,
    docs: Vec<Document>,
    arg: &Document,
    outer_vars: &Document,
) -> Result<Vec<Document>, StoreError> {
    let from = arg
        .get("from")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("$lookup", "missing 'from'"))?;
    let as_field = arg
        .get("as")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("$lookup", "missing 'as'"))?;
    let foreign = stored(data, from);

    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let joined = match (arg.get("localField"), arg.get("foreignField")) {
            (Some(Value::String(local)), Some(Value::String(foreign_field))) => {
                let key = doc.get_path(local).cloned().unwrap_or(Value::Null);
                let filter = Document::from_iter([(foreign_field.as_str(), key)]);
                filtered(foreign, &filter)?
            }
            _ => {
                let mut vars = outer_vars.clone();
                if let Some(lets) = arg.get("let") {
                    let lets = stage_document("$lookup", lets)?;
                    for (name, expr) in lets.iter() {
                        vars.insert(name, evaluate(expr, &doc, outer_vars)?.unwrap_or(Value::Null));
                    }
                }
                let sub_pipeline: Vec<Document> = match arg.get("pipeline") {
                    Some(Value::Array(stages)) => stages
                        .iter()
                        .map(|s| {
                            s.as_document()
                                .cloned()
                                .ok_or_else(|| invalid("$lookup", "pipeline stages must be documents"))
                        })
                        .collect::<Result<_, _>>()?,
                    None => Vec::new(),
                    Some(_) => return Err(invalid("$lookup", "'pipeline' must be an array")),
                };
                run_pipeline(data, foreign.to_vec(), &sub_pipeline, &vars)?
            }
        };
        set_path(
            &mut doc,
            as_field,
            Value::Array(joined.into_iter().map(Value::Document).collect()),
        );
        out.push(doc);
    }
    Ok(out)
}

fn unwind(docs: Vec<Document>, arg: &Value) -> Result<Vec<Document>, StoreError> {
    let (path, preserve) = match arg {
        Value::String(path) => (path.as_str(), false),
        Value::Document(d) => (
            d.get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("$unwind", "missing 'path'"))?,
            d.get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        other => return Err(invalid("$unwind", format!("unexpected {}", other.type_name()))),
    };
    let path = path
        .strip_prefix('$')
        .ok_or_else(|| invalid("$unwind", "path must start with '$'"))?;

    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        match doc.get_path(path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) => {
                if preserve {
                    doc.remove_path(path);
                    out.push(doc);
                }
            }
            None | Some(Value::Null) => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

/// Apply a store projection: inclusion if any non-`_id` flag is set,
/// exclusion otherwise. Paths are top-level names.
fn project(doc: Document, projection: &Document) -> Result<Document, StoreError> {
    let mut flags = Vec::with_capacity(projection.len());
    for (name, flag) in projection.iter() {
        let include = match flag {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            other => {
                return Err(invalid(
                    "$project",
                    format!("flag for '{name}' must be 0/1, found {}", other.type_name()),
                ))
            }
        };
        flags.push((name, include));
    }

    let inclusive = flags.iter().any(|(name, inc)| *inc && *name != ID_FIELD);
    let id_excluded = flags.iter().any(|(name, inc)| !*inc && *name == ID_FIELD);

    if inclusive {
        Ok(doc
            .into_iter()
            .filter(|(key, _)| {
                if key == ID_FIELD {
                    !id_excluded
                } else {
                    flags.iter().any(|(name, inc)| *inc && name == key)
                }
            })
            .collect())
    } else {
        Ok(doc
            .into_iter()
            .filter(|(key, _)| !flags.iter().any(|(name, inc)| !*inc && name == key))
            .collect())
    }
}

fn sort_keys(sort: &Document) -> Result<Vec<(&str, bool)>, StoreError> {
    let mut keys = Vec::with_capacity(sort.len());
    for (path, direction) in sort.iter() {
        let descending = match direction {
            Value::Int(1) => false,
            Value::Int(-1) => true,
            other => {
                return Err(invalid(
                    "$sort",
                    format!("direction for '{path}' must be 1 or -1, found {}", other.to_json()),
                ))
            }
        };
        keys.push((path, descending));
    }
    Ok(keys)
}

fn compare_by_keys(keys: &[(&str, bool)], a: &Document, b: &Document) -> Ordering {
    keys.iter()
        .map(|(path, descending)| {
            let order = compare_fields(a.get_path(path), b.get_path(path));
            if *descending {
                order.reverse()
            } else {
                order
            }
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn sort_documents(docs: &mut [Document], sort: &Document) -> Result<(), StoreError> {
    let keys = sort_keys(sort)?;
    docs.sort_by(|a, b| compare_by_keys(&keys, a, b));
    Ok(())
}

// ─── Grouping ───────────────────────────────────────────────────────

fn group(docs: Vec<Document>, arg: &Document, vars: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = arg
        .get(ID_FIELD)
        .ok_or_else(|| invalid("$group", "missing '_id'"))?;
    let mut accumulators = Vec::with_capacity(arg.len());
    for (field, acc) in arg.iter() {
        if field == ID_FIELD {
            continue;
        }
        let single = acc
            .as_document()
            .filter(|d| d.len() == 1)
            .and_then(|d| d.iter().next());
        match single {
            Some((op, expr)) => accumulators.push((field, op, expr)),
            None => {
                return Err(invalid(
                    "$group",
                    format!("'{field}' must hold exactly one accumulator"),
                ))
            }
        }
    }

    // Groups keep the order their keys were first seen in.
    let mut groups: Vec<(Value, Vec<Document>)> = Vec::new();
    for doc in docs {
        let key = evaluate(key_expr, &doc, vars)?.unwrap_or(Value::Null);
        match groups
            .iter_mut()
            .find(|(k, _)| compare(k, &key) == Ordering::Equal)
        {
            Some((_, members)) => members.push(doc),
            None => groups.push((key, vec![doc])),
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut doc = Document::with_capacity(accumulators.len() + 1);
        doc.insert(ID_FIELD, key);
        for (field, op, expr) in &accumulators {
            doc.insert(*field, accumulate(op, expr, &members, vars)?);
        }
        out.push(doc);
    }
    Ok(out)
}

fn accumulate(op: &str, expr: &Value, members: &[Document], vars: &Document) -> Result<Value, StoreError> {
    let mut values = Vec::with_capacity(members.len());
    for doc in members {
        values.push(evaluate(expr, doc, vars)?);
    }
    let present = || values.iter().flatten().filter(|v| !v.is_null());
    Ok(match op {
        "$sum" => present().fold(Value::Int(0), |total, v| add(&total, v).unwrap_or(total)),
        "$avg" => {
            let numbers: Vec<f64> = present().filter_map(Value::as_f64).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "$min" => present().min_by(|a, b| compare(a, b)).cloned().unwrap_or(Value::Null),
        "$max" => present().max_by(|a, b| compare(a, b)).cloned().unwrap_or(Value::Null),
        "$first" => values.first().cloned().flatten().unwrap_or(Value::Null),
        "$last" => values.last().cloned().flatten().unwrap_or(Value::Null),
        "$push" => Value::Array(values.iter().flatten().cloned().collect()),
        "$count" => Value::Int(i64::try_from(members.len()).unwrap_or(i64::MAX)),
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    })
}

// Numeric sum; `None` for a non-number, which `$sum` skips.
fn add(total: &Value, v: &Value) -> Option<Value> {
    match (total, v) {
        (Value::Int(a), Value::Int(b)) => Some(
            a.checked_add(*b)
                .map_or(Value::Double(*a as f64 + *b as f64), Value::Int),
        ),
        (Value::Int(a), Value::Double(b)) => Some(Value::Double(*a as f64 + b)),
        (Value::Double(a), Value::Int(b)) => Some(Value::Double(a + *b as f64)),
        (Value::Double(a), Value::Double(b)) => Some(Value::Double(a + b)),
        _ => None,
    }
}
