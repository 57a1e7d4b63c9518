use crate::chain::Row;
use crate::state::scalar_to_string;
use serde_json::Value;

/// Substitutes `{{outname}}` placeholders with the row's scalar values.
///
/// Placeholders naming a missing key, an object or an array are left untouched.
pub fn format_fields(row: &Row, template: &str) -> String {
    let mut out = template.to_string();
    for (key, value) in row {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            continue;
        }
        let placeholder = format!("{{{{{key}}}}}");
        if !out.contains(&placeholder) {
            continue;
        }
        let text = scalar_to_string(value).unwrap_or_default();
        out = out.replace(&placeholder, &text);
    }
    out
}
