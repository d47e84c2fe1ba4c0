//! # Store-Native Values
//!
//! `Value` is the closed set of values a stored document can hold, and
//! `Document` is an insertion-ordered map of them. Field order is kept so
//! decoded output follows schema declaration order.
//!
//! ## JSON Representation
//!
//! [`Value::to_json`] uses extended JSON for dates (`{"$date": "<rfc3339>"}`)
//! so that a JSON round-trip is lossless. [`Value::to_plain_json`] renders
//! dates as bare RFC 3339 strings, which is what `serde` types with
//! `chrono` fields expect.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::ValueError;
use crate::temporal::Timestamp;

const DATE_KEY: &str = "$date";

/// A single store-native value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(Timestamp),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the runtime kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::DateTime(_) => "date",
            Self::Array(_) => "array",
            Self::Document(_) => "document",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Double(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&Timestamp> {
        match self {
            Self::DateTime(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Convert from JSON, recognizing extended-JSON `$date` objects.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidDate`] for a malformed `$date`.
    pub fn from_json(json: JsonValue) -> Result<Self, ValueError> {
        Ok(match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            JsonValue::Object(map) => {
                if map.len() == 1 {
                    if let Some(date) = map.get(DATE_KEY) {
                        return parse_extended_date(date).map(Self::DateTime);
                    }
                }
                Self::Document(Document::from_json_map(map)?)
            }
        })
    }

    /// Convert to extended JSON (dates as `{"$date": ...}`).
    pub fn to_json(&self) -> JsonValue {
        self.render(true)
    }

    /// Convert to plain JSON (dates as RFC 3339 strings).
    pub fn to_plain_json(&self) -> JsonValue {
        self.render(false)
    }

    fn render(&self, extended: bool) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(n) => JsonValue::Number((*n).into()),
            Self::Double(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::DateTime(ts) if extended => {
                let mut map = Map::new();
                map.insert(DATE_KEY.to_string(), JsonValue::String(ts.to_rfc3339()));
                JsonValue::Object(map)
            }
            Self::DateTime(ts) => JsonValue::String(ts.to_rfc3339()),
            Self::Array(items) => JsonValue::Array(items.iter().map(|v| v.render(extended)).collect()),
            Self::Document(doc) => doc.render(extended),
        }
    }
}

fn parse_extended_date(date: &JsonValue) -> Result<Timestamp, ValueError> {
    match date {
        JsonValue::String(s) => Timestamp::parse(s),
        JsonValue::Number(n) => match n.as_i64() {
            Some(millis) => Timestamp::from_millis(millis),
            None => Err(ValueError::InvalidDate {
                value: n.to_string(),
                reason: "epoch milliseconds must be an integer".to_string(),
            }),
        },
        other => Err(ValueError::InvalidDate {
            value: other.to_string(),
            reason: "expected an RFC 3339 string or epoch milliseconds".to_string(),
        }),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Self::DateTime(ts)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Self::from_json(json).map_err(D::Error::custom)
    }
}

// ─── Document ───────────────────────────────────────────────────────

/// An insertion-ordered, string-keyed map of values.
///
/// Equality ignores key order: two documents are equal when they hold the
/// same keys mapped to equal values.
#[derive(Debug, Clone, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert a value, replacing an existing key in place.
    ///
    /// Returns the previous value when the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve a dotted path (`"author.name"`, `"tags.0"`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Document(doc) => doc.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Remove a dotted path. Intermediate documents are left in place.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.remove(path),
            Some((head, rest)) => match self.get_mut(head)? {
                Value::Document(doc) => doc.remove_path(rest),
                _ => None,
            },
        }
    }

    /// Convert from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NotADocument`] if `json` is not an object.
    pub fn from_json(json: JsonValue) -> Result<Self, ValueError> {
        match json {
            JsonValue::Object(map) => Self::from_json_map(map),
            other => Err(ValueError::NotADocument(json_type_name(&other))),
        }
    }

    fn from_json_map(map: Map<String, JsonValue>) -> Result<Self, ValueError> {
        let mut doc = Self::with_capacity(map.len());
        for (key, value) in map {
            doc.entries.push((key, Value::from_json(value)?));
        }
        Ok(doc)
    }

    /// Convert to extended JSON.
    pub fn to_json(&self) -> JsonValue {
        self.render(true)
    }

    /// Convert to plain JSON.
    pub fn to_plain_json(&self) -> JsonValue {
        self.render(false)
    }

    fn render(&self, extended: bool) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.render(extended)))
            .collect();
        JsonValue::Object(map)
    }
}

fn json_type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "document",
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Self::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Self::from_json(json).map_err(D::Error::custom)
    }
}

/// Build a [`Document`] from `key: value` pairs.
///
/// ```
/// use monarch_core::{doc, Value};
///
/// let d = doc! { "name": "Ana", "age": 30, "nick": Value::Null };
/// assert_eq!(d.len(), 3);
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::Document::new() };
    ($($key:literal : $value:expr),+ $(,)?) => {{
        let mut d = $crate::Document::new();
        $( d.insert($key, $value); )+
        d
    }};
}
