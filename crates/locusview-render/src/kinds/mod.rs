//! Data-layer kinds: how a layer of a given `type` turns rows into marks and places tooltips.

mod genes;
mod line;
mod scatter;

pub use genes::{GeneTrackItem, Genes, assign_tracks};
pub use line::Line;
pub use scatter::Scatter;

use crate::Result;
use crate::data_layer::{DataLayer, LayerFrame};
use crate::scene::Mark;
use crate::tooltip::{Tooltip, TooltipPlacement};
use locusview_core::state::value_as_f64;
use locusview_core::{Registries, Row};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub trait DataLayerKind: Send + Sync {
    fn name(&self) -> &'static str;

    /// Kind defaults, merged under the caller's layer layout.
    fn default_layout(&self) -> Value;

    fn marks(&self, layer: &DataLayer, frame: &LayerFrame<'_>) -> Result<Vec<Mark>>;

    /// Placement before viewport clamping; `None` when the datum cannot be located on screen.
    fn position_tooltip(
        &self,
        layer: &DataLayer,
        tooltip: &Tooltip,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement>;
}

#[derive(Clone, Default)]
pub struct LayerKindRegistry {
    kinds: FxHashMap<&'static str, Arc<dyn DataLayerKind>>,
}

impl fmt::Debug for LayerKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.list()).finish()
    }
}

impl LayerKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: Arc<dyn DataLayerKind>) {
        self.kinds.insert(kind.name(), kind);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataLayerKind>> {
        self.kinds.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// `scatter`, `line` and `genes`.
    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.insert(Arc::new(Scatter));
        reg.insert(Arc::new(Line));
        reg.insert(Arc::new(Genes));
        reg
    }
}

/// Resolves a layout parameter that is either a literal or a scale-function spec
/// (`{"scale_function": .., "field": .., "parameters": ..}`) evaluated against `row`, the
/// `index`-th element of its layer. An array of specs yields the first non-null result.
pub(crate) fn resolve_scaled(
    param: Option<&Value>,
    row: &Row,
    index: usize,
    registries: &Registries,
) -> Result<Option<Value>> {
    match param {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(spec)) if spec.contains_key("scale_function") => {
            let name = spec
                .get("scale_function")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let scale = registries.scales.get(name)?;
            let input = spec
                .get("field")
                .and_then(Value::as_str)
                .and_then(|field| row.get(field))
                .cloned()
                .unwrap_or(Value::Null);
            let parameters = spec.get("parameters").cloned().unwrap_or(Value::Null);
            let out = scale(&parameters, &input, index);
            Ok((!out.is_null()).then_some(out))
        }
        Some(Value::Array(options)) => {
            for option in options {
                if let Some(value) = resolve_scaled(Some(option), row, index, registries)? {
                    return Ok(Some(value));
                }
            }
            Ok(None)
        }
        Some(other) => Ok(Some(other.clone())),
    }
}

pub(crate) fn field_f64(row: &Row, field: Option<&str>) -> Option<f64> {
    field
        .and_then(|f| row.get(f))
        .and_then(value_as_f64)
        .filter(|v| v.is_finite())
}
