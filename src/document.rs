//! The served JSON document: collections of records plus singleton resources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Top-level JSON object. Arrays are collections; everything else is a singleton.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Document from an arbitrary JSON value; the root must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Document(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Names of the keys holding arrays.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, v)| v.is_array())
            .map(|(k, _)| k.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_collection(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(Value::Array(_)))
    }

    pub fn is_singleton(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(v) if !v.is_array())
    }

    /// Records of a collection. Non-object array items are skipped.
    pub fn records(&self, name: &str) -> impl Iterator<Item = &Record> {
        let items: &[Value] = match self.0.get(name) {
            Some(Value::Array(items)) => items,
            _ => &[],
        };
        items.iter().filter_map(Value::as_object)
    }

    /// Mutable access to a collection, created empty on first use.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        let slot = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}

/// Whether a record id (number or string) equals the textual id from a URL.
pub fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        Value::Bool(b) => b.to_string() == id,
        _ => false,
    }
}

/// Textual form of a scalar, as it would appear in a URL or query string.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".into()),
        _ => None,
    }
}

/// Follows a dotted path (`author.name`) through nested objects.
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
