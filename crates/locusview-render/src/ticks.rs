//! Axis tick generation ("nice" round numbers, after R's `pretty()`).

use locusview_core::position::position_int_to_string;
use locusview_core::state::{number_to_string, scalar_to_string, value_as_f64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which generated end ticks must fall inside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickClip {
    Low,
    High,
    Both,
    #[default]
    Neither,
}

const SHRINK_SMALL: f64 = 0.75;
const HIGH_UNIT_BIAS: f64 = 1.5;
const MAX_TICKS: usize = 10_000;

/// Round-number ticks covering `range`, aiming for roughly `target` of them.
///
/// The first and last ticks may extend past the range unless clipped by `clip`.
pub fn pretty_ticks(range: [f64; 2], clip: TickClip, target: f64) -> Vec<f64> {
    let target = if target.is_finite() && target >= 1.0 {
        target.trunc()
    } else {
        5.0
    };
    let min_n = target / 3.0;
    let u5_bias = 0.5 + 1.5 * HIGH_UNIT_BIAS;

    let d = (range[0] - range[1]).abs();
    if d == 0.0 || !d.is_finite() {
        return vec![range[0]];
    }
    let mut c = d / target;
    if d.log10() < -2.0 {
        c = (d * SHRINK_SMALL) / min_n;
    }

    let base = 10f64.powf(c.log10().floor());
    let places = if base < 1.0 && base != 0.0 {
        base.log10().round().abs() as i32
    } else {
        0
    };

    let mut unit = base;
    if (2.0 * base) - c < HIGH_UNIT_BIAS * (c - unit) {
        unit = 2.0 * base;
        if (5.0 * base) - c < u5_bias * (c - unit) {
            unit = 5.0 * base;
            if (10.0 * base) - c < HIGH_UNIT_BIAS * (c - unit) {
                unit = 10.0 * base;
            }
        }
    }

    let mut ticks = Vec::new();
    let mut i = round_to((range[0] / unit).floor() * unit, places);
    while i < range[1] && ticks.len() < MAX_TICKS {
        ticks.push(i);
        i += unit;
        if places > 0 {
            i = round_to(i, places);
        }
    }
    ticks.push(i);

    if matches!(clip, TickClip::Low | TickClip::Both)
        && ticks.first().is_some_and(|&t| t < range[0])
    {
        ticks.remove(0);
    }
    if matches!(clip, TickClip::High | TickClip::Both)
        && ticks.last().is_some_and(|&t| t > range[1])
    {
        ticks.pop();
    }
    ticks
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// A tick at a data-space position with its display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub value: f64,
    pub text: String,
}

/// How numeric tick values are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickFormat {
    #[default]
    Number,
    /// Base pairs as megabases (`1.50`).
    Region,
}

impl TickFormat {
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some("region") => Self::Region,
            _ => Self::Number,
        }
    }

    pub fn format(self, value: f64) -> String {
        match self {
            Self::Number => number_to_string(value),
            Self::Region => position_int_to_string(value),
        }
    }
}

pub fn format_ticks(values: &[f64], format: TickFormat) -> Vec<Tick> {
    values
        .iter()
        .map(|&value| Tick {
            value,
            text: format.format(value),
        })
        .collect()
}

/// Reads ticks given explicitly in a layout: bare numbers or `{"x": .., "text": ..}` objects.
/// Entries without a numeric position are skipped.
pub fn ticks_from_layout(values: &[Value], format: TickFormat) -> Vec<Tick> {
    values
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => {
                let value = map.get("x").and_then(value_as_f64)?;
                let text = map
                    .get("text")
                    .and_then(scalar_to_string)
                    .unwrap_or_else(|| format.format(value));
                Some(Tick { value, text })
            }
            other => {
                let value = value_as_f64(other)?;
                Some(Tick {
                    value,
                    text: format.format(value),
                })
            }
        })
        .collect()
}
