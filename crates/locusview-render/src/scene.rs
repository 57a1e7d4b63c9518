//! Headless render output: what a drawing backend needs to paint a plot.

use crate::geom::{Point, Rect, Size};
use crate::ticks::Tick;
use crate::tooltip::Tooltip;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotScene {
    pub id: String,
    pub size: Size,
    pub curtain: Option<String>,
    /// Panels in `y_index` order.
    pub panels: Vec<PanelScene>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelScene {
    pub id: String,
    pub origin: Point,
    pub size: Size,
    /// Plotting area in panel coordinates.
    pub clip: Rect,
    pub title: Option<String>,
    pub curtain: Option<String>,
    pub axes: Vec<AxisScene>,
    /// Layers in `z_index` order.
    pub layers: Vec<LayerScene>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScene {
    /// `x`, `y1` or `y2`.
    pub axis: String,
    /// Translation of the axis group within the panel.
    pub origin: Point,
    pub ticks: Vec<PlacedTick>,
    pub label: Option<AxisLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedTick {
    #[serde(flatten)]
    pub tick: Tick,
    /// Pixel offset along the axis.
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLabel {
    pub text: String,
    pub position: Point,
    /// Degrees.
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerScene {
    pub id: String,
    pub kind: String,
    pub z_index: usize,
    pub marks: Vec<Mark>,
    pub tooltips: Vec<Tooltip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mark", rename_all = "snake_case")]
pub enum Mark {
    Point {
        id: String,
        center: Point,
        size: f64,
        shape: String,
        color: Value,
        selected: bool,
    },
    Polyline {
        points: Vec<Point>,
        style: Map<String, Value>,
    },
    Gene {
        id: String,
        name: String,
        /// 1-based track number.
        track: usize,
        bbox: Rect,
        boundary: Rect,
        exons: Vec<Rect>,
        label: String,
        label_anchor: String,
        label_position: Point,
        selected: bool,
    },
}
