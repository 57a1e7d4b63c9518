//! Typed plot, panel and data-layer layouts.
//!
//! Layouts arrive as JSON, are merged against the defaults below with
//! [`locusview_core::merge_layouts`], and are then deserialized into these structs. Keys the
//! engine does not interpret are kept in each struct's `extra` map so a layout serializes back
//! without loss.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

pub fn default_plot_layout() -> Value {
    json!({
        "state": {},
        "width": 1,
        "height": 1,
        "min_width": 1,
        "min_height": 1,
        "resizable": false,
        "aspect_ratio": 1,
        "panels": {},
        "panel_boundaries": true
    })
}

pub fn default_panel_layout() -> Value {
    json!({
        "title": null,
        "description": null,
        "y_index": null,
        "width": 0,
        "height": 0,
        "origin": { "x": 0, "y": 0 },
        "min_width": 1,
        "min_height": 1,
        "proportional_width": null,
        "proportional_height": null,
        "proportional_origin": { "x": 0, "y": 0 },
        "margin": { "top": 0, "right": 0, "bottom": 0, "left": 0 },
        "cliparea": { "height": 0, "width": 0, "origin": { "x": 0, "y": 0 } },
        "axes": { "x": {}, "y1": {}, "y2": {} },
        "interaction": { "x_linked": false },
        "data_layers": {}
    })
}

pub fn default_data_layer_layout() -> Value {
    json!({
        "type": "",
        "fields": [],
        "x_axis": {},
        "y_axis": {}
    })
}

/// How the plot reacts to its container changing size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resizable {
    #[default]
    Fixed,
    /// Width follows the container; height follows from the aspect ratio.
    Responsive,
    /// Resized through an explicit drag handle.
    Manual,
}

impl Serialize for Resizable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resizable::Fixed => serializer.serialize_bool(false),
            Resizable::Responsive => serializer.serialize_str("responsive"),
            Resizable::Manual => serializer.serialize_str("manual"),
        }
    }
}

impl<'de> Deserialize<'de> for Resizable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if s == "responsive" => Resizable::Responsive,
            Value::String(s) if s == "manual" => Resizable::Manual,
            _ => Resizable::Fixed,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotLayout {
    pub state: Map<String, Value>,
    pub width: f64,
    pub height: f64,
    pub min_width: f64,
    pub min_height: f64,
    pub resizable: Resizable,
    pub aspect_ratio: f64,
    pub panels: IndexMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PlotLayout {
    fn default() -> Self {
        Self {
            state: Map::new(),
            width: 1.0,
            height: 1.0,
            min_width: 1.0,
            min_height: 1.0,
            resizable: Resizable::Fixed,
            aspect_ratio: 1.0,
            panels: IndexMap::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Origin {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipArea {
    pub width: f64,
    pub height: f64,
    pub origin: Origin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLayout {
    pub render: bool,
    pub label: Option<String>,
    /// Name of a label function, evaluated against the current state.
    pub label_function: Option<String>,
    pub label_offset: Option<f64>,
    pub ticks: Option<Vec<Value>>,
    pub tick_format: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelAxes {
    pub x: AxisLayout,
    pub y1: AxisLayout,
    pub y2: AxisLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelInteraction {
    /// Linked panels share horizontal margins so their x axes line up.
    pub x_linked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelLayout {
    pub title: Option<String>,
    pub description: Option<String>,
    pub y_index: Option<i64>,
    pub width: f64,
    pub height: f64,
    pub origin: Origin,
    pub min_width: f64,
    pub min_height: f64,
    pub proportional_width: Option<f64>,
    pub proportional_height: Option<f64>,
    pub proportional_origin: Origin,
    pub margin: Margin,
    pub cliparea: ClipArea,
    pub axes: PanelAxes,
    pub interaction: PanelInteraction,
    pub data_layers: IndexMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            y_index: None,
            width: 0.0,
            height: 0.0,
            origin: Origin::default(),
            min_width: 1.0,
            min_height: 1.0,
            proportional_width: None,
            proportional_height: None,
            proportional_origin: Origin::default(),
            margin: Margin::default(),
            cliparea: ClipArea::default(),
            axes: PanelAxes::default(),
            interaction: PanelInteraction::default(),
            data_layers: IndexMap::new(),
            extra: Map::new(),
        }
    }
}

/// Binds a layer dimension to a data field and shapes the extent it contributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisBinding {
    pub field: Option<String>,
    /// Panel y axis (1 or 2) for `y_axis`; unused on `x_axis`.
    pub axis: Option<i64>,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
    pub lower_buffer: Option<f64>,
    pub upper_buffer: Option<f64>,
    pub min_extent: Option<[f64; 2]>,
    /// A decoupled binding contributes nothing to the panel extent.
    pub decoupled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipLayout {
    /// Body template with `{{field}}` placeholders.
    pub html: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayerLayout {
    #[serde(rename = "type")]
    pub kind: String,
    pub fields: Vec<String>,
    pub z_index: Option<i64>,
    pub id_field: Option<String>,
    pub selectable: bool,
    pub x_axis: AxisBinding,
    pub y_axis: AxisBinding,
    pub tooltip: Option<TooltipLayout>,
    /// Kind-specific parameters (`point_size`, `color`, `exon_height`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataLayerLayout {
    /// The panel y axis this layer draws against, 1 unless 2 is requested.
    pub fn y_axis_number(&self) -> u8 {
        if self.y_axis.axis == Some(2) { 2 } else { 1 }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.extra
            .get(key)
            .and_then(locusview_core::state::value_as_f64)
            .unwrap_or(default)
    }
}
