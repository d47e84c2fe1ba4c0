//! # Filter & Expression Evaluation
//!
//! The subset of the store's query language [`MemoryStore`] understands:
//!
//! - field conditions: equality (array fields match any element), `$eq`,
//!   `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`
//! - logical: `$and`, `$or`, `$nor`
//! - `$expr` with aggregation expressions: `"$field"` paths, `"$$var"`
//!   variables, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$and`, `$or`
//!
//! Values of different kinds order by kind first (null, numbers, strings,
//! documents, arrays, booleans, dates), then by value.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use std::cmp::Ordering;

use monarch_core::{Document, Value};

use crate::store::StoreError;

/// Whether `doc` satisfies `filter`. `vars` holds pipeline variables for
/// `$expr`.
pub fn matches(doc: &Document, filter: &Document, vars: &Document) -> Result<bool, StoreError> {
    for (key, condition) in filter.iter() {
        let ok = match key {
            "$and" => all_of(doc, condition, vars, key)?.iter().all(|m| *m),
            "$or" => all_of(doc, condition, vars, key)?.iter().any(|m| *m),
            "$nor" => !all_of(doc, condition, vars, key)?.iter().any(|m| *m),
            "$expr" => truthy(&evaluate(condition, doc, vars)?.unwrap_or(Value::Null)),
            op if op.starts_with('$') => return Err(StoreError::UnsupportedOperator(op.to_string())),
            path => field_matches(doc.get_path(path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_of(doc: &Document, clauses: &Value, vars: &Document, op: &str) -> Result<Vec<bool>, StoreError> {
    let clauses = clauses
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("{op} expects an array")))?;
    clauses
        .iter()
        .map(|clause| match clause {
            Value::Document(clause) => matches(doc, clause, vars),
            other => Err(StoreError::InvalidFilter(format!(
                "{op} clauses must be documents, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

fn is_operator_document(value: &Value) -> Option<&Document> {
    match value {
        Value::Document(d) if !d.is_empty() && d.keys().all(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> Result<bool, StoreError> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(actual, condition));
    };
    for (op, operand) in operators.iter() {
        let ok = match op {
            "$eq" => equals(actual, operand),
            "$ne" => !equals(actual, operand),
            "$gt" => compares(actual, operand, |o| o == Ordering::Greater),
            "$gte" => compares(actual, operand, |o| o != Ordering::Less),
            "$lt" => compares(actual, operand, |o| o == Ordering::Less),
            "$lte" => compares(actual, operand, |o| o != Ordering::Greater),
            "$in" => in_list(actual, operand, op)?,
            "$nin" => !in_list(actual, operand, op)?,
            "$exists" => actual.is_some() == truthy(operand),
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// Null matches a missing field; an array matches if any element does.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) if value == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

fn compares(actual: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let candidates: Vec<&Value> = match actual {
        None => return false,
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    };
    candidates
        .into_iter()
        .any(|value| same_kind(value, operand) && accept(compare(value, operand)))
}

fn in_list(actual: Option<&Value>, operand: &Value, op: &str) -> Result<bool, StoreError> {
    let list = operand
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("{op} expects an array")))?;
    Ok(list.iter().any(|candidate| equals(actual, candidate)))
}

/// Evaluate an aggregation expression. `None` is a reference to a missing
/// field.
pub fn evaluate(expr: &Value, doc: &Document, vars: &Document) -> Result<Option<Value>, StoreError> {
    match expr {
        Value::String(s) if s.starts_with("$$") => {
            let path = &s[2..];
            Ok(match path.split_once('.') {
                None => vars.get(path).cloned(),
                Some((var, rest)) => match vars.get(var) {
                    Some(Value::Document(d)) => d.get_path(rest).cloned(),
                    _ => None,
                },
            })
        }
        Value::String(s) if s.starts_with('$') => Ok(doc.get_path(&s[1..]).cloned()),
        Value::Array(items) => {
            let evaluated = items
                .iter()
                .map(|item| -> Result<Value, StoreError> {
                    Ok(evaluate(item, doc, vars)?.unwrap_or(Value::Null))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Value::Array(evaluated)))
        }
        Value::Document(d) if d.len() == 1 => match d.iter().next() {
            Some((op, args)) if op.starts_with('$') => evaluate_operator(op, args, doc, vars).map(Some),
            _ => evaluate_document(d, doc, vars),
        },
        Value::Document(d) => evaluate_document(d, doc, vars),
        literal => Ok(Some(literal.clone())),
    }
}

fn evaluate_document(d: &Document, doc: &Document, vars: &Document) -> Result<Option<Value>, StoreError> {
    let mut out = Document::with_capacity(d.len());
    for (key, value) in d.iter() {
        if let Some(value) = evaluate(value, doc, vars)? {
            out.insert(key, value);
        }
    }
    Ok(Some(Value::Document(out)))
}

fn evaluate_operator(op: &str, args: &Value, doc: &Document, vars: &Document) -> Result<Value, StoreError> {
    let args: Vec<Value> = match args {
        Value::Array(items) => items
            .iter()
            .map(|a| -> Result<Value, StoreError> {
                Ok(evaluate(a, doc, vars)?.unwrap_or(Value::Null))
            })
            .collect::<Result<_, _>>()?,
        single => vec![evaluate(single, doc, vars)?.unwrap_or(Value::Null)],
    };
    let pair = || match args.as_slice() {
        [a, b] => Ok((a, b)),
        _ => Err(StoreError::InvalidFilter(format!("{op} expects two arguments"))),
    };
    Ok(Value::Bool(match op {
        "$eq" => pair().map(|(a, b)| compare(a, b) == Ordering::Equal)?,
        "$ne" => pair().map(|(a, b)| compare(a, b) != Ordering::Equal)?,
        "$gt" => pair().map(|(a, b)| compare(a, b) == Ordering::Greater)?,
        "$gte" => pair().map(|(a, b)| compare(a, b) != Ordering::Less)?,
        "$lt" => pair().map(|(a, b)| compare(a, b) == Ordering::Less)?,
        "$lte" => pair().map(|(a, b)| compare(a, b) != Ordering::Greater)?,
        "$and" => args.iter().all(truthy),
        "$or" => args.iter().any(truthy),
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    }))
}

/// Aggregation truthiness: null, false and zero are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Double(f) => *f != 0.0,
        _ => true,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int(_) | Value::Double(_) => 1,
        Value::String(_) => 2,
        Value::Document(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
        Value::DateTime(_) => 6,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    kind_rank(a) == kind_rank(b)
}

/// Total order over values, kind first.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Double(y)) => (*x as f64).total_cmp(y),
        (Value::Double(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| compare(p, q))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Document(x), Value::Document(y)) => {
            if x == y {
                Ordering::Equal
            } else {
                x.to_json().to_string().cmp(&y.to_json().to_string())
            }
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Compare two optional field values, missing sorting with null.
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    compare(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
}

/// Set a dotted path, creating intermediate documents.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Value::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Value::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}
