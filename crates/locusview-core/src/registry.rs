//! Named-function registries: value transforms, scale functions and axis label functions.
//!
//! The engine never reaches for a process-wide registry. A [`Registries`] bundle is built once
//! (usually with [`Registries::standard`]) and handed to the plot and the requester.

use crate::state::{State, number_to_string, value_as_f64};
use crate::{Error, Result};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Maps one field value to another (`neglog10`, `scinotation`, ...).
pub type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Maps a value to a display property given the layout-provided parameters and the index of the
/// element being drawn.
pub type ScaleFn = Arc<dyn Fn(&Value, &Value, usize) -> Value + Send + Sync>;

/// Produces an axis label from the current state.
pub type LabelFn = Arc<dyn Fn(&State) -> String + Send + Sync>;

/// A string-keyed function table that rejects silent overwrites through [`FunctionRegistry::add`].
#[derive(Clone)]
pub struct FunctionRegistry<F: Clone> {
    kind: &'static str,
    functions: IndexMap<String, F>,
}

impl<F: Clone> fmt::Debug for FunctionRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("kind", &self.kind)
            .field("names", &self.list())
            .finish()
    }
}

impl<F: Clone> FunctionRegistry<F> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            functions: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Result<F> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFunction {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Inserts or replaces `name`; `None` removes it.
    pub fn set(&mut self, name: &str, function: Option<F>) {
        match function {
            Some(function) => {
                self.functions.insert(name.to_string(), function);
            }
            None => {
                self.functions.shift_remove(name);
            }
        }
    }

    /// Inserts `name`, failing if it is already registered.
    pub fn add(&mut self, name: &str, function: F) -> Result<()> {
        if self.functions.contains_key(name) {
            return Err(Error::RegistryConflict {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.functions.insert(name.to_string(), function);
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

/// A resolved `|a|b` transform suffix; steps apply left to right.
#[derive(Clone)]
pub struct TransformChain {
    names: Vec<String>,
    steps: Vec<TransformFn>,
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransformChain").field(&self.names).finish()
    }
}

impl TransformChain {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn apply(&self, value: &Value) -> Value {
        let mut cur = value.clone();
        for step in &self.steps {
            cur = step(&cur);
        }
        cur
    }
}

#[derive(Debug, Clone)]
pub struct TransformRegistry {
    inner: FunctionRegistry<TransformFn>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self {
            inner: FunctionRegistry::new("transformation"),
        }
    }

    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.insert("neglog10", neglog10);
        reg.insert("neglog10_or_100", neglog10_or_100);
        reg.insert("scinotation", scinotation);
        reg.insert("percent", percent);
        reg.insert("na", not_available);
        reg.insert("logtoscinotation", log_to_scinotation);
        reg.insert("urlencode", urlencode);
        reg.insert("htmlescape", htmlescape);
        reg
    }

    fn insert(&mut self, name: &str, f: fn(&Value) -> Value) {
        self.inner.set(name, Some(Arc::new(f)));
    }

    /// Resolves a transform suffix such as `"|neglog10|scinotation"`.
    ///
    /// An empty suffix resolves to `None`. Unknown names are an error.
    pub fn resolve(&self, suffix: &str) -> Result<Option<TransformChain>> {
        let names: Vec<&str> = suffix.split('|').filter(|s| !s.is_empty()).collect();
        if names.is_empty() {
            return Ok(None);
        }
        let mut steps = Vec::with_capacity(names.len());
        for name in &names {
            let Some(step) = self.inner.functions.get(*name) else {
                return Err(Error::UnknownTransform {
                    name: (*name).to_string(),
                });
            };
            steps.push(step.clone());
        }
        Ok(Some(TransformChain {
            names: names.into_iter().map(str::to_string).collect(),
            steps,
        }))
    }

    pub fn get(&self, name: &str) -> Result<TransformFn> {
        self.inner.get(name)
    }

    pub fn set(&mut self, name: &str, function: Option<TransformFn>) -> Result<()> {
        reject_pipe(self.inner.kind, name)?;
        self.inner.set(name, function);
        Ok(())
    }

    pub fn add(&mut self, name: &str, function: TransformFn) -> Result<()> {
        reject_pipe(self.inner.kind, name)?;
        self.inner.add(name, function)
    }

    pub fn list(&self) -> Vec<String> {
        self.inner.list()
    }
}

fn reject_pipe(kind: &'static str, name: &str) -> Result<()> {
    if name.starts_with('|') {
        return Err(Error::InvalidFunctionName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

pub type ScaleRegistry = FunctionRegistry<ScaleFn>;
pub type LabelRegistry = FunctionRegistry<LabelFn>;

impl FunctionRegistry<ScaleFn> {
    pub fn standard_scales() -> Self {
        let mut reg = Self::new("scale");
        reg.set("if", Some(Arc::new(if_equal) as ScaleFn));
        reg.set("numerical_bin", Some(Arc::new(numerical_bin) as ScaleFn));
        reg.set("categorical_bin", Some(Arc::new(categorical_bin) as ScaleFn));
        reg.set("ordinal_cycle", Some(Arc::new(ordinal_cycle) as ScaleFn));
        reg.set("interpolate", Some(Arc::new(interpolate) as ScaleFn));
        reg
    }
}

impl FunctionRegistry<LabelFn> {
    pub fn standard_labels() -> Self {
        let mut reg = Self::new("label");
        reg.set("chromosome", Some(Arc::new(chromosome_label) as LabelFn));
        reg
    }
}

/// The three registries a plot consults, passed explicitly to every component that needs them.
#[derive(Debug, Clone)]
pub struct Registries {
    pub transforms: Arc<TransformRegistry>,
    pub scales: Arc<ScaleRegistry>,
    pub labels: Arc<LabelRegistry>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registries {
    pub fn standard() -> Self {
        Self {
            transforms: Arc::new(TransformRegistry::standard()),
            scales: Arc::new(ScaleRegistry::standard_scales()),
            labels: Arc::new(LabelRegistry::standard_labels()),
        }
    }

    /// Registries with nothing registered.
    pub fn empty() -> Self {
        Self {
            transforms: Arc::new(TransformRegistry::new()),
            scales: Arc::new(ScaleRegistry::new("scale")),
            labels: Arc::new(LabelRegistry::new("label")),
        }
    }
}

fn number_value(x: f64) -> Value {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn neglog10(value: &Value) -> Value {
    match value_as_f64(value) {
        Some(x) => number_value(-x.log10()),
        None => Value::Null,
    }
}

fn neglog10_or_100(value: &Value) -> Value {
    match value_as_f64(value) {
        Some(x) if x == 0.0 => Value::from(100),
        Some(x) => number_value(-x.log10()),
        None => Value::Null,
    }
}

/// `0.000123` becomes `"1.23 × 10^-4"`; values within three orders of magnitude keep three
/// decimals.
fn scinotation(value: &Value) -> Value {
    let Some(x) = value_as_f64(value) else {
        return Value::Null;
    };
    let log = if x.abs() > 1.0 {
        x.abs().log10().ceil()
    } else {
        x.abs().log10().floor()
    };
    if log.abs() <= 3.0 {
        Value::String(format!("{x:.3}"))
    } else {
        let exp = format!("{x:.2e}");
        Value::String(exp.replacen('e', " × 10^", 1))
    }
}

fn percent(value: &Value) -> Value {
    let Some(x) = value_as_f64(value) else {
        return Value::Null;
    };
    if x == 1.0 {
        return Value::String("100%".to_string());
    }
    let mut text = to_precision(x * 100.0, 2);
    if text.contains('.') && !text.contains('e') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    Value::String(format!("{text}%"))
}

fn not_available(value: &Value) -> Value {
    if value.is_null() {
        Value::String("NA".to_string())
    } else {
        value.clone()
    }
}

/// Significant-digit formatting with exponent notation outside `1e-6..1e{precision}`.
pub(crate) fn to_precision(x: f64, precision: usize) -> String {
    if x == 0.0 || !x.is_finite() {
        return number_to_string(x);
    }
    let exponent = x.abs().log10().floor() as i32;
    if exponent < -6 || exponent >= precision as i32 {
        let text = format!("{:.*e}", precision.saturating_sub(1), x);
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{x:.decimals$}")
}

/// `-log10(p)` back to `p` in scientific notation: `3.5` becomes `"3.16 × 10^-4"`.
fn log_to_scinotation(value: &Value) -> Value {
    let Some(x) = value_as_f64(value).filter(|x| !x.is_nan()) else {
        return Value::String("NaN".to_string());
    };
    if x == 0.0 {
        return Value::String("1".to_string());
    }
    let exp = x.ceil();
    let base = 10f64.powf(exp - x);
    let text = if exp == 1.0 {
        format!("{:.4}", base / 10.0)
    } else if exp == 2.0 {
        format!("{:.3}", base / 100.0)
    } else {
        format!("{base:.2} × 10^-{}", exp as i64)
    };
    Value::String(text)
}

/// Characters `encodeURIComponent` leaves alone besides ASCII alphanumerics.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn urlencode(value: &Value) -> Value {
    let text = crate::state::scalar_to_string(value).unwrap_or_else(|| value.to_string());
    Value::String(utf8_percent_encode(&text, URI_COMPONENT).to_string())
}

/// Escapes quotes, angle brackets, ampersands and backticks; empty-ish values become `""`.
fn htmlescape(value: &Value) -> Value {
    let text = match value {
        Value::Null | Value::Bool(false) => return Value::String(String::new()),
        Value::String(s) if s.is_empty() => return Value::String(String::new()),
        Value::Number(n) if n.as_f64() == Some(0.0) => return Value::String(String::new()),
        other => crate::state::scalar_to_string(other).unwrap_or_else(|| other.to_string()),
    };
    let escaped = htmlize::escape_all_quotes(text.as_str()).replace('`', "&#x60;");
    Value::String(escaped)
}

/// `null_value` when set, otherwise null, so an array of scale specs falls through to the
/// next option.
fn null_value(parameters: &Value) -> Value {
    parameters
        .get("null_value")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Parameters: `field_value`, `then`, optional `else`.
fn if_equal(parameters: &Value, input: &Value, _index: usize) -> Value {
    let matches = !input.is_null() && parameters.get("field_value") == Some(input);
    let branch = if matches { "then" } else { "else" };
    parameters.get(branch).cloned().unwrap_or(Value::Null)
}

/// Parameters: `breaks` (ascending), `values`, optional `null_value`.
fn numerical_bin(parameters: &Value, input: &Value, _index: usize) -> Value {
    let Some(input) = value_as_f64(input).filter(|x| !x.is_nan()) else {
        return null_value(parameters);
    };
    let breaks: Vec<f64> = parameters
        .get("breaks")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(value_as_f64).collect())
        .unwrap_or_default();
    let Some(&first) = breaks.first() else {
        return null_value(parameters);
    };

    let mut threshold = first;
    for &curr in &breaks[1..] {
        let prev = threshold;
        threshold = if input < prev || input < curr { prev } else { curr };
    }
    breaks
        .iter()
        .position(|b| *b == threshold)
        .and_then(|idx| parameters.get("values")?.as_array()?.get(idx))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Parameters: `categories`, `values`, optional `null_value`.
fn categorical_bin(parameters: &Value, input: &Value, _index: usize) -> Value {
    let position = parameters
        .get("categories")
        .and_then(Value::as_array)
        .and_then(|categories| categories.iter().position(|c| c == input));
    match position {
        Some(idx) if !input.is_null() => parameters
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.get(idx))
            .cloned()
            .unwrap_or(Value::Null),
        _ => null_value(parameters),
    }
}

/// Parameters: `values`. Element `index` gets `values[index % len]`.
fn ordinal_cycle(parameters: &Value, _input: &Value, index: usize) -> Value {
    match parameters.get("values").and_then(Value::as_array) {
        Some(values) if !values.is_empty() => values[index % values.len()].clone(),
        _ => Value::Null,
    }
}

/// Parameters: `breaks` and `values` of equal length (at least two), optional `null_value`.
/// Numbers interpolate linearly and `#rgb`/`#rrggbb`/`rgb(..)` colours per channel.
fn interpolate(parameters: &Value, input: &Value, _index: usize) -> Value {
    let fallback = null_value(parameters);
    let breaks: Vec<f64> = parameters
        .get("breaks")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(value_as_f64).collect())
        .unwrap_or_default();
    let values = parameters
        .get("values")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if breaks.len() < 2 || breaks.len() != values.len() {
        return fallback;
    }
    let Some(input) = value_as_f64(input).filter(|x| !x.is_nan()) else {
        return fallback;
    };

    let last = breaks.len() - 1;
    if input <= breaks[0] {
        return values[0].clone();
    }
    if input >= breaks[last] {
        return values[last].clone();
    }
    let Some(upper) = (1..breaks.len()).rfind(|&i| breaks[i - 1] <= input && input <= breaks[i])
    else {
        return fallback;
    };
    let t = (input - breaks[upper - 1]) / (breaks[upper] - breaks[upper - 1]);
    if !t.is_finite() {
        return fallback;
    }
    interpolate_value(&values[upper - 1], &values[upper], t)
}

fn interpolate_value(a: &Value, b: &Value, t: f64) -> Value {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return number_value(x + (y - x) * t);
    }
    match (a.as_str().and_then(parse_color), b.as_str().and_then(parse_color)) {
        (Some(from), Some(to)) => {
            let channel = |i: usize| (from[i] + (to[i] - from[i]) * t).round() as u8;
            Value::String(format!("rgb({}, {}, {})", channel(0), channel(1), channel(2)))
        }
        _ => b.clone(),
    }
}

fn parse_color(text: &str) -> Option<[f64; 3]> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some([f64::from(r * 17), f64::from(g * 17), f64::from(b * 17)]),
            [r1, r2, g1, g2, b1, b2] => Some([
                f64::from(r1 * 16 + r2),
                f64::from(g1 * 16 + g2),
                f64::from(b1 * 16 + b2),
            ]),
            _ => None,
        };
    }
    let inner = text.strip_prefix("rgb(")?.strip_suffix(')')?;
    let channels: Vec<f64> = inner
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect::<Option<_>>()?;
    match channels.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        _ => None,
    }
}

fn chromosome_label(state: &State) -> String {
    match state.get("chr") {
        Some(chr) if value_as_f64(chr).is_some() => {
            let chr = crate::state::scalar_to_string(chr).unwrap_or_default();
            format!("Chromosome {chr} (Mb)")
        }
        _ => "Chromosome (Mb)".to_string(),
    }
}
