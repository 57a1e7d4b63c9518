use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The plot-wide state object: the current region (`chr`, `start`, `end`) plus any keys the host
/// application or layers choose to store (per-panel slots are keyed by panel id, per-layer slots
/// by `"{panel}.{layer}"`).
///
/// State is treated as a snapshot. Updates produce a new value via [`State::patched`], so a fetch
/// that started against an older snapshot keeps reading consistent values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Map<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builds a state from a JSON value; non-object values produce an empty state.
    pub fn from_value(value: &Value) -> Self {
        Self(value.as_object().cloned().unwrap_or_default())
    }

    pub fn region(chr: impl Into<Value>, start: f64, end: f64) -> Self {
        let mut map = Map::new();
        map.insert("chr".to_string(), chr.into());
        map.insert("start".to_string(), Value::from(start));
        map.insert("end".to_string(), Value::from(end));
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    /// Numeric lookup that also accepts numeric strings (`"12345"`).
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        value_as_f64(self.0.get(key)?)
    }

    /// Renders a scalar value the way it appears inside request URLs and labels.
    pub fn get_display(&self, key: &str) -> Option<String> {
        scalar_to_string(self.0.get(key)?)
    }

    pub fn chr(&self) -> Option<String> {
        self.get_display("chr")
    }

    pub fn start(&self) -> Option<f64> {
        self.get_f64("start")
    }

    pub fn end(&self) -> Option<f64> {
        self.get_f64("end")
    }

    /// Returns a new snapshot with every key from `patch` written over this one.
    pub fn patched(&self, patch: &Map<String, Value>) -> Self {
        let mut next = self.0.clone();
        for (key, value) in patch {
            next.insert(key.clone(), value.clone());
        }
        Self(next)
    }

    /// Applies `update` to the object stored under `key`, replacing a missing or non-object slot
    /// with an empty one first.
    pub fn update_slot(&mut self, key: &str, update: impl FnOnce(&mut Map<String, Value>)) {
        let mut slot = match self.0.shift_remove(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        update(&mut slot);
        self.0.insert(key.to_string(), Value::Object(slot));
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Formats a number the way a browser would print it: integral values without a trailing `.0`.
pub fn number_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// String form of a scalar JSON value; objects and arrays have none.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(number_to_string),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
