use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A layout tree (plot, panel or data layer) held as plain JSON.
///
/// Layouts are user supplied and open ended; typed views are obtained with
/// [`Layout::to_typed`] after defaults have been merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout(Value);

impl Default for Layout {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl Layout {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(Error::InvalidLayout {
                message: format!("expected a JSON object, got {}", json_kind(&value)),
            });
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn get_f64(&self, dotted_path: &str) -> Option<f64> {
        self.get(dotted_path)?.as_f64()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get(dotted_path)?.as_bool()
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    /// Fills every key missing from this layout with the value from `default`.
    pub fn merge_defaults(&mut self, default: &Value) -> Result<()> {
        merge_layouts(&mut self.0, default)
    }

    /// Convenience for `merge_defaults` on an owned layout.
    pub fn with_defaults(mut self, default: &Value) -> Result<Self> {
        self.merge_defaults(default)?;
        Ok(self)
    }

    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone()).map_err(|err| Error::InvalidLayout {
            message: err.to_string(),
        })
    }
}

impl From<Value> for Layout {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Merges `default` into `custom` in place.
///
/// - keys absent from `custom` (or present as `null`) receive a deep copy of the default value
/// - object/object pairs merge recursively
/// - everything else keeps the custom value; arrays are atomic and never merged element-wise
///
/// Both arguments must be objects.
pub fn merge_layouts(custom: &mut Value, default: &Value) -> Result<()> {
    if !custom.is_object() || !default.is_object() {
        return Err(Error::LayoutMerge {
            custom: json_kind(custom),
            default: json_kind(default),
        });
    }
    merge_value(custom, default);
    Ok(())
}

fn merge_value(custom: &mut Value, default: &Value) {
    let (Value::Object(custom_map), Value::Object(default_map)) = (custom, default) else {
        return;
    };
    for (key, default_value) in default_map {
        let missing = custom_map.get(key).is_none_or(Value::is_null);
        if missing {
            custom_map.insert(key.clone(), default_value.clone());
            continue;
        }
        if let Some(custom_value) = custom_map.get_mut(key) {
            if custom_value.is_object() && default_value.is_object() {
                merge_value(custom_value, default_value);
            }
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
