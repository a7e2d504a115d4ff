use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cumulative odometer reading in meters.
pub const ODOMETER: &str = "odometer";
/// Protocol name reported by the tracking backend.
pub const PROTOCOL: &str = "protocol";
/// Alarm name attached to `alarm` events.
pub const ALARM: &str = "alarm";

/// A single scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Int(i) => Some(*i != 0),
            AttributeValue::Text(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            AttributeValue::Float(_) => None,
        }
    }

    /// Renders the value as text, the form protocol codes are compared in.
    pub fn to_text(&self) -> String {
        match self {
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Float(f) => f.to_string(),
            AttributeValue::Text(s) => s.clone(),
        }
    }
}

/// String-keyed scalar attribute bag carried by devices, positions and events.
///
/// Unknown protocol keys are kept as-is; the well-known keys above have typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from a JSON object. Nested objects and arrays are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::new();
        };

        let mut map = BTreeMap::new();
        for (key, value) in obj {
            let scalar = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => AttributeValue::Int(i),
                    None => AttributeValue::Float(n.as_f64().unwrap_or_default()),
                },
                serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
                other => AttributeValue::Text(other.to_string()),
            };
            map.insert(key.clone(), scalar);
        }
        Self(map)
    }

    /// Parse the JSON text column the tracking backend stores attributes in.
    pub fn parse(text: Option<&str>) -> Self {
        text.and_then(|t| serde_json::from_str::<serde_json::Value>(t).ok())
            .map(|v| Self::from_json(&v))
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttributeValue::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.0.insert(key.into(), value);
    }

    pub fn odometer(&self) -> Option<f64> {
        self.get_f64(ODOMETER)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get_str(PROTOCOL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
