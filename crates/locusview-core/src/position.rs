//! Genomic position formatting and parsing (`1:1.5M-2M`, `chr7:117,559,590+50kb`).

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Formats a base-pair position in megabases with enough decimals to keep single-base
/// resolution (between 2 and 12 places).
pub fn position_int_to_string(position: f64) -> String {
    let magnitude = position.abs().log10().floor();
    let places = if magnitude.is_finite() {
        (6.0 - magnitude).clamp(2.0, 12.0) as usize
    } else {
        2
    };
    format!("{:.places$}", position / 1e6)
}

/// Parses `"1,500,000"`, `"1.5M"`, `"250kb"` or `"1G"` into base pairs.
pub fn position_string_to_int(text: &str) -> Option<f64> {
    let mut val = text.trim().to_uppercase().replace(',', "");
    let trimmed = val.trim_end_matches('B');
    let mult = match trimmed.chars().last() {
        Some('K') => 1e3,
        Some('M') => 1e6,
        Some('G') => 1e9,
        _ => 1.0,
    };
    if mult != 1.0 {
        val = trimmed[..trimmed.len() - 1].to_string();
    }
    let number: f64 = val.parse().ok()?;
    Some(number * mult)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionQuery {
    Range { chr: String, start: f64, end: f64 },
    Position { chr: String, position: f64 },
}

impl PositionQuery {
    /// The state keys this query sets. A single position carries no range and only sets `chr`
    /// and `position`.
    pub fn to_state_patch(&self) -> Map<String, Value> {
        let mut patch = Map::new();
        match self {
            PositionQuery::Range { chr, start, end } => {
                patch.insert("chr".to_string(), Value::String(chr.clone()));
                patch.insert("start".to_string(), Value::from(*start));
                patch.insert("end".to_string(), Value::from(*end));
            }
            PositionQuery::Position { chr, position } => {
                patch.insert("chr".to_string(), Value::String(chr.clone()));
                patch.insert("position".to_string(), Value::from(*position));
            }
        }
        patch
    }
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+):([\d,.]+[kmgbKMGB]*)([-+])([\d,.]+[kmgbKMGB]*)$").expect("valid regex")
    })
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+):([\d,.]+[kmgbKMGB]*)$").expect("valid regex"))
}

/// Parses `chr:start-end`, `chr:center+offset` or `chr:position`.
pub fn parse_position_query(text: &str) -> Option<PositionQuery> {
    let text = text.trim();
    if let Some(caps) = range_re().captures(text) {
        let chr = caps[1].to_string();
        let a = position_string_to_int(&caps[2])?;
        let b = position_string_to_int(&caps[4])?;
        return Some(if &caps[3] == "+" {
            PositionQuery::Range {
                chr,
                start: a - b,
                end: a + b,
            }
        } else {
            PositionQuery::Range {
                chr,
                start: a,
                end: b,
            }
        });
    }
    let caps = position_re().captures(text)?;
    Some(PositionQuery::Position {
        chr: caps[1].to_string(),
        position: position_string_to_int(&caps[2])?,
    })
}
