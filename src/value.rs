//! Value model shared by token scope, event parameters and context bindings.
//!
//! Rule authors wire loosely typed data through the engine, so the scalar
//! conversions here are deliberately permissive: every value has a text
//! rendition and a numeric rendition, and neither conversion can fail.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically typed value.
///
/// Serialized untagged, so configuration files spell values the natural
/// JSON way. Entity references precede maps in the variant order because an
/// untagged `{"entity_type": ..., "id": ...}` object must deserialize as an
/// entity, not as a plain map.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    /// Reference to an entity managed outside the engine.
    Entity(EntityRef),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    #[default]
    Null,
}

impl Value {
    /// Data-type name used when a value enters the context stack without an
    /// explicitly declared type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Entity(_) => "entity",
            Value::Null => "null",
        }
    }

    /// Text rendition used by lexical comparison.
    ///
    /// Booleans render as `true`/`false`, entities as `type:id`, null as the
    /// empty string. Compound values fall back to their JSON form.
    pub fn to_text(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Entity(entity) => entity.to_string(),
            Value::Null => String::new(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(&serde_json::Value::from(self.clone()))
                    .unwrap_or_default()
            }
        }
    }

    /// Numeric rendition used by numeric comparison.
    ///
    /// Strings go through full `f64` parsing; anything unparseable counts as
    /// `0`, including partially numeric strings such as `"5abc"`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Integer(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Entity(_) | Value::List(_) | Value::Map(_) | Value::Null => 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<EntityRef> for Value {
    fn from(value: EntityRef) -> Self {
        Value::Entity(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<HashMap<String, Value>>(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::String(s) => serde_json::Value::from(s),
            Value::Boolean(b) => serde_json::Value::from(b),
            Value::List(items) => serde_json::Value::Array(
                items.into_iter().map(serde_json::Value::from).collect(),
            ),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
            Value::Entity(entity) => serde_json::json!({
                "entity_type": entity.entity_type,
                "id": entity.id,
            }),
            Value::Null => serde_json::Value::Null,
        }
    }
}

/// Opaque reference to an entity: a stable type name plus an identifier.
///
/// The engine never dereferences entities; it only stacks and compares them.
/// Unknown fields are rejected so the untagged [`Value`] decoder cannot
/// mistake a wider map for an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// A value together with its declared data-type name.
///
/// Data types may be dotted paths like `field_item:integer`; only the
/// terminal segment names the context binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub data_type: String,
    pub value: Value,
}

impl TypedValue {
    pub fn new(data_type: impl Into<String>, value: Value) -> Self {
        Self {
            data_type: data_type.into(),
            value,
        }
    }

    /// Wrap a value, inferring the data-type name from its variant.
    pub fn of(value: Value) -> Self {
        Self {
            data_type: value.type_name().to_string(),
            value,
        }
    }

    /// Terminal segment of the data-type name, e.g. `foo:bar:baz` keys `baz`.
    pub fn key(&self) -> &str {
        self.data_type
            .rsplit(':')
            .next()
            .unwrap_or(self.data_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_renditions() {
        assert_eq!(Value::Integer(42).to_text(), "42");
        assert_eq!(Value::Float(1.5).to_text(), "1.5");
        assert_eq!(Value::String("abc".to_string()).to_text(), "abc");
        assert_eq!(Value::Boolean(true).to_text(), "true");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(
            Value::Entity(EntityRef::new("node", "17")).to_text(),
            "node:17"
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Integer(5).to_number(), 5.0);
        assert_eq!(Value::String(" 3.25 ".to_string()).to_number(), 3.25);
        assert_eq!(Value::String("abc".to_string()).to_number(), 0.0);
        // Partial numbers do not parse; they count as zero.
        assert_eq!(Value::String("5abc".to_string()).to_number(), 0.0);
        assert_eq!(Value::Boolean(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
    }

    #[test]
    fn test_typed_value_terminal_key() {
        let typed = TypedValue::new("foo:bar:baz", Value::Integer(1));
        assert_eq!(typed.key(), "baz");

        let flat = TypedValue::of(Value::String("x".to_string()));
        assert_eq!(flat.data_type, "string");
        assert_eq!(flat.key(), "string");
    }

    #[test]
    fn test_untagged_deserialization() {
        assert_eq!(serde_json::from_str::<Value>("5").unwrap(), Value::Integer(5));
        assert_eq!(
            serde_json::from_str::<Value>("1.5").unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(serde_json::from_str::<Value>("null").unwrap(), Value::Null);

        let entity: Value = serde_json::from_str(r#"{"entity_type":"node","id":"9"}"#).unwrap();
        assert_eq!(entity, Value::Entity(EntityRef::new("node", "9")));

        // Extra fields keep an object a plain map.
        let map: Value =
            serde_json::from_str(r#"{"entity_type":"node","id":"9","extra":1}"#).unwrap();
        assert!(matches!(map, Value::Map(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let value = Value::Map(
            [
                ("count".to_string(), Value::Integer(2)),
                (
                    "items".to_string(),
                    Value::List(vec![Value::from("a"), Value::from("b")]),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let json = serde_json::Value::from(value.clone());
        assert_eq!(Value::from(json), value);
    }
}
