use crate::data_layer::{DataLayer, Dimension, LayerFrame};
use crate::geom::{Point, Rect, Size, point, rect, size};
use crate::kinds::LayerKindRegistry;
use crate::layout::{AxisLayout, PanelLayout, default_panel_layout};
use crate::measure::TextMeasurer;
use crate::ordering::OrderedIds;
use crate::scale::{LinearScale, extent_of};
use crate::scene::{AxisLabel, AxisScene, PanelScene, PlacedTick};
use crate::ticks::{Tick, TickClip, TickFormat, format_ticks, pretty_ticks, ticks_from_layout};
use crate::tooltip::TooltipPlacement;
use crate::{Error, Result};
use indexmap::IndexMap;
use locusview_core::{Registries, Row, State, merge_layouts};
use serde_json::{Map, Value};

/// Horizontal pixels per generated x tick.
const X_TICK_SPACING: f64 = 120.0;

/// What a panel needs from its plot while rendering.
pub(crate) struct RenderContext<'a> {
    pub state: &'a State,
    /// Page position of the plot's top-left corner.
    pub page_origin: Point,
    pub viewport: Rect,
    pub measurer: &'a dyn TextMeasurer,
    pub registries: &'a Registries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAxis {
    X,
    Y1,
    Y2,
}

impl PanelAxis {
    pub fn name(self) -> &'static str {
        match self {
            PanelAxis::X => "x",
            PanelAxis::Y1 => "y1",
            PanelAxis::Y2 => "y2",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AxisState {
    extent: Option<[f64; 2]>,
    ticks: Vec<Tick>,
    scale: Option<LinearScale>,
}

/// A horizontal band of the plot holding data layers that share axes.
#[derive(Debug)]
pub struct Panel {
    id: String,
    layout: PanelLayout,
    data_layers: IndexMap<String, DataLayer>,
    z_order: OrderedIds,
    x: AxisState,
    y1: AxisState,
    y2: AxisState,
    curtain: Option<String>,
}

/// An axis renders unless its layout is empty or says `render: false`.
fn axis_render_flag(axis: &Map<String, Value>) -> bool {
    !axis.is_empty() && axis.get("render") != Some(&Value::Bool(false))
}

impl Panel {
    pub(crate) fn new(
        id: &str,
        mut layout: Value,
        parent: Size,
        sibling_count: usize,
        kinds: &LayerKindRegistry,
    ) -> Result<Self> {
        if !layout.is_object() {
            return Err(Error::InvalidLayout {
                message: format!("panel {id} layout must be an object"),
            });
        }
        merge_layouts(&mut layout, &default_panel_layout())?;
        if let Some(axes) = layout.get_mut("axes").and_then(Value::as_object_mut) {
            for name in ["x", "y1", "y2"] {
                let Some(Value::Object(axis)) = axes.get_mut(name) else {
                    continue;
                };
                let render = axis_render_flag(axis);
                axis.insert("render".to_string(), Value::Bool(render));
            }
        }
        let layout: PanelLayout = serde_json::from_value(layout)?;

        let mut panel = Self {
            id: id.to_string(),
            layout,
            data_layers: IndexMap::new(),
            z_order: OrderedIds::new(),
            x: AxisState::default(),
            y1: AxisState::default(),
            y2: AxisState::default(),
            curtain: None,
        };
        panel.initialize_layout(parent, sibling_count, kinds)?;
        Ok(panel)
    }

    /// Fills in missing proportional dimensions, applies geometry and adds declared layers.
    fn initialize_layout(
        &mut self,
        parent: Size,
        sibling_count: usize,
        kinds: &LayerKindRegistry,
    ) -> Result<()> {
        if self.layout.width == 0.0 && self.layout.proportional_width.is_none() {
            self.layout.proportional_width = Some(1.0);
        }
        if self.layout.height == 0.0 && self.layout.proportional_height.is_none() {
            self.layout.proportional_height = Some(if sibling_count > 0 {
                1.0 / sibling_count as f64
            } else {
                1.0
            });
        }
        self.set_dimensions(None, None, parent);
        self.set_origin(None, None);
        self.set_margin(None, None, None, None);

        let declared: Vec<(String, Value)> = self
            .layout
            .data_layers
            .iter()
            .map(|(id, layout)| (id.clone(), layout.clone()))
            .collect();
        for (layer_id, layer_layout) in declared {
            self.add_data_layer(&layer_id, layer_layout, kinds)?;
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn layout(&self) -> &PanelLayout {
        &self.layout
    }

    pub(crate) fn layout_mut(&mut self) -> &mut PanelLayout {
        &mut self.layout
    }

    pub fn size(&self) -> Size {
        size(self.layout.width, self.layout.height)
    }

    pub fn origin(&self) -> Point {
        point(self.layout.origin.x, self.layout.origin.y)
    }

    /// The plotting area in panel coordinates.
    pub fn clip_rect(&self) -> Rect {
        let clip = &self.layout.cliparea;
        rect(clip.origin.x, clip.origin.y, clip.width, clip.height)
    }

    pub fn curtain(&self) -> Option<&str> {
        self.curtain.as_deref()
    }

    pub(crate) fn drop_curtain(&mut self, message: &str) {
        if self.curtain.is_none() {
            self.curtain = Some(message.to_string());
        }
    }

    pub(crate) fn raise_curtain(&mut self) {
        self.curtain = None;
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.layout.title = title;
    }

    /// Applies explicit dimensions (floored at the minimums) when both are given and valid,
    /// otherwise derives them from the proportional share of `parent`. The plotting area is
    /// always recomputed.
    pub fn set_dimensions(&mut self, width: Option<f64>, height: Option<f64>, parent: Size) {
        match (width, height) {
            (Some(w), Some(h)) => {
                if w.is_finite() && w >= 0.0 && h.is_finite() && h >= 0.0 {
                    self.layout.width = w.round().max(self.layout.min_width);
                    self.layout.height = h.round().max(self.layout.min_height);
                }
            }
            _ => {
                if let Some(pw) = self.layout.proportional_width {
                    self.layout.width = (pw * parent.width).max(self.layout.min_width);
                }
                if let Some(ph) = self.layout.proportional_height {
                    self.layout.height = (ph * parent.height).max(self.layout.min_height);
                }
            }
        }
        self.update_cliparea();
    }

    /// Moves the panel within the plot. Coordinates are rounded and clamped to be non-negative.
    pub fn set_origin(&mut self, x: Option<f64>, y: Option<f64>) {
        if let Some(x) = x.filter(|v| v.is_finite()) {
            self.layout.origin.x = x.round().max(0.0);
        }
        if let Some(y) = y.filter(|v| v.is_finite()) {
            self.layout.origin.y = y.round().max(0.0);
        }
    }

    /// Sets any given margins (rounded, non-negative), then shrinks opposing margins together
    /// until they fit inside the panel.
    pub fn set_margin(
        &mut self,
        top: Option<f64>,
        right: Option<f64>,
        bottom: Option<f64>,
        left: Option<f64>,
    ) {
        let margin = &mut self.layout.margin;
        for (slot, value) in [
            (&mut margin.top, top),
            (&mut margin.right, right),
            (&mut margin.bottom, bottom),
            (&mut margin.left, left),
        ] {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                *slot = v.round().max(0.0);
            }
        }
        (margin.top, margin.bottom) = fit_pair(margin.top, margin.bottom, self.layout.height);
        (margin.left, margin.right) = fit_pair(margin.left, margin.right, self.layout.width);
        self.update_cliparea();
    }

    /// Widens the panel so its plotting area keeps its width under the given shared
    /// horizontal margins.
    pub(crate) fn align_x_margins(&mut self, left: f64, right: f64) {
        let margin = &mut self.layout.margin;
        let delta = (left - margin.left).max(0.0) + (right - margin.right).max(0.0);
        margin.left = left;
        margin.right = right;
        self.layout.width += delta;
        self.update_cliparea();
    }

    fn update_cliparea(&mut self) {
        let margin = self.layout.margin;
        let clip = &mut self.layout.cliparea;
        clip.width = (self.layout.width - (margin.left + margin.right)).max(0.0);
        clip.height = (self.layout.height - (margin.top + margin.bottom)).max(0.0);
        clip.origin.x = margin.left;
        clip.origin.y = margin.top;
    }

    /// Adds a data layer, shifting later layers up when the layout requests a `z_index`.
    pub fn add_data_layer(
        &mut self,
        id: &str,
        layout: Value,
        kinds: &LayerKindRegistry,
    ) -> Result<&mut DataLayer> {
        if self.data_layers.contains_key(id) {
            return Err(Error::DuplicateId {
                kind: "data layer",
                id: id.to_string(),
            });
        }
        let declared = layout.clone();
        let layer = DataLayer::new(&self.id, id, layout, kinds)?;
        let requested = layer.layout().z_index;
        self.z_order.insert(id, requested);
        self.data_layers.insert(id.to_string(), layer);
        self.reindex_layers();
        self.layout
            .data_layers
            .entry(id.to_string())
            .or_insert(declared);
        self.data_layers
            .get_mut(id)
            .ok_or_else(|| Error::NotFound {
                kind: "data layer",
                id: id.to_string(),
            })
    }

    /// Removes a layer, closing its tooltips and the gap it leaves in the z order.
    pub fn remove_data_layer(&mut self, id: &str) -> Result<DataLayer> {
        let Some(mut layer) = self.data_layers.shift_remove(id) else {
            return Err(Error::NotFound {
                kind: "data layer",
                id: id.to_string(),
            });
        };
        layer.destroy_all_tooltips();
        self.z_order.remove(id);
        self.reindex_layers();
        self.layout.data_layers.shift_remove(id);
        Ok(layer)
    }

    fn reindex_layers(&mut self) {
        for (id, z) in self.z_order.indexed() {
            if let Some(layer) = self.data_layers.get_mut(id) {
                layer.set_z_index(z);
            }
        }
    }

    pub fn data_layer(&self, id: &str) -> Option<&DataLayer> {
        self.data_layers.get(id)
    }

    pub fn data_layer_mut(&mut self, id: &str) -> Option<&mut DataLayer> {
        self.data_layers.get_mut(id)
    }

    /// Layers in declaration order.
    pub fn data_layers(&self) -> impl Iterator<Item = &DataLayer> {
        self.data_layers.values()
    }

    pub(crate) fn data_layers_mut(&mut self) -> impl Iterator<Item = &mut DataLayer> {
        self.data_layers.values_mut()
    }

    pub fn z_order(&self) -> &OrderedIds {
        &self.z_order
    }

    /// Recomputes the x, y1 and y2 extents from every layer that is not decoupled.
    pub fn generate_extents(&mut self, state: &State) {
        self.x.extent = None;
        self.y1.extent = None;
        self.y2.extent = None;
        for layer in self.data_layers.values() {
            if !layer.is_decoupled(Dimension::X) {
                let extent = layer.get_axis_extent(Dimension::X, state);
                self.x.extent = fold_extent(self.x.extent, extent);
            }
            if !layer.is_decoupled(Dimension::Y) {
                let extent = layer.get_axis_extent(Dimension::Y, state);
                let target = if layer.layout().y_axis_number() == 2 {
                    &mut self.y2
                } else {
                    &mut self.y1
                };
                target.extent = fold_extent(target.extent, extent);
            }
        }
    }

    /// Builds ticks and scales from the current extents. y extents are widened to cover their
    /// ticks.
    fn compute_axes(&mut self) {
        let clip = self.layout.cliparea;

        let x_layout = &self.layout.axes.x;
        let x_format = TickFormat::parse(x_layout.tick_format.as_deref());
        self.x.ticks = match (&x_layout.ticks, self.x.extent) {
            (Some(explicit), _) => ticks_from_layout(explicit, x_format),
            (None, Some(extent)) => format_ticks(
                &pretty_ticks(extent, TickClip::Both, clip.width / X_TICK_SPACING),
                x_format,
            ),
            (None, None) => Vec::new(),
        };
        self.x.scale = self
            .x
            .extent
            .map(|extent| LinearScale::new(extent, [0.0, clip.width]));

        for (axis_layout, axis) in [
            (&self.layout.axes.y1, &mut self.y1),
            (&self.layout.axes.y2, &mut self.y2),
        ] {
            let format = TickFormat::parse(axis_layout.tick_format.as_deref());
            axis.ticks = match (&axis_layout.ticks, axis.extent) {
                (Some(explicit), _) => ticks_from_layout(explicit, format),
                (None, Some(extent)) => {
                    format_ticks(&pretty_ticks(extent, TickClip::Neither, 5.0), format)
                }
                (None, None) => Vec::new(),
            };
            if let Some([lo, hi]) = axis.extent {
                let tick_values = axis.ticks.iter().map(|t| t.value);
                axis.extent = extent_of([lo, hi].into_iter().chain(tick_values));
            }
            axis.scale = axis
                .extent
                .map(|extent| LinearScale::new(extent, [clip.height, 0.0]));
        }
    }

    fn axis_state(&self, axis: PanelAxis) -> &AxisState {
        match axis {
            PanelAxis::X => &self.x,
            PanelAxis::Y1 => &self.y1,
            PanelAxis::Y2 => &self.y2,
        }
    }

    pub fn extent(&self, axis: PanelAxis) -> Option<[f64; 2]> {
        self.axis_state(axis).extent
    }

    pub fn ticks(&self, axis: PanelAxis) -> &[Tick] {
        &self.axis_state(axis).ticks
    }

    pub fn scale(&self, axis: PanelAxis) -> Option<LinearScale> {
        self.axis_state(axis).scale
    }

    fn axis_layout(&self, axis: PanelAxis) -> &AxisLayout {
        match axis {
            PanelAxis::X => &self.layout.axes.x,
            PanelAxis::Y1 => &self.layout.axes.y1,
            PanelAxis::Y2 => &self.layout.axes.y2,
        }
    }

    fn axis_scene(&self, axis: PanelAxis, ctx: &RenderContext<'_>) -> Result<Option<AxisScene>> {
        let axis_layout = self.axis_layout(axis);
        let state = self.axis_state(axis);
        let Some(scale) = state.scale else {
            return Ok(None);
        };
        if !axis_layout.render {
            return Ok(None);
        }

        let text = match (&axis_layout.label, &axis_layout.label_function) {
            (Some(label), _) => Some(label.clone()),
            (None, Some(name)) => {
                let label_fn = ctx.registries.labels.get(name)?;
                Some(label_fn(ctx.state))
            }
            (None, None) => None,
        };
        let offset = axis_layout.label_offset.unwrap_or(0.0);
        let l = &self.layout;
        let clip = l.cliparea;
        let (origin, label_position, rotation) = match axis {
            PanelAxis::X => (
                point(l.margin.left, l.height - l.margin.bottom),
                point(clip.width / 2.0, offset),
                0.0,
            ),
            PanelAxis::Y1 => (
                point(l.margin.left, l.margin.top),
                point(-offset, clip.height / 2.0),
                -90.0,
            ),
            PanelAxis::Y2 => (
                point(l.width - l.margin.right, l.margin.top),
                point(offset, clip.height / 2.0),
                -90.0,
            ),
        };

        Ok(Some(AxisScene {
            axis: axis.name().to_string(),
            origin,
            ticks: state
                .ticks
                .iter()
                .map(|tick| PlacedTick {
                    tick: tick.clone(),
                    offset: scale.map(tick.value),
                })
                .collect(),
            label: text.map(|text| AxisLabel {
                text,
                position: label_position,
                rotation,
            }),
        }))
    }

    fn frame<'a>(&self, layer: &DataLayer, ctx: &RenderContext<'a>) -> LayerFrame<'a> {
        let clip = self.layout.cliparea;
        LayerFrame {
            state: ctx.state,
            clip: size(clip.width, clip.height),
            x_scale: self.x.scale,
            y_scale: if layer.layout().y_axis_number() == 2 {
                self.y2.scale
            } else {
                self.y1.scale
            },
            page_origin: point(
                ctx.page_origin.x + self.layout.origin.x + clip.origin.x,
                ctx.page_origin.y + self.layout.origin.y + clip.origin.y,
            ),
            viewport: ctx.viewport,
            measurer: ctx.measurer,
            registries: ctx.registries,
        }
    }

    /// Regenerates extents, ticks and scales, repositions open tooltips and draws axes and
    /// layers (in z order).
    pub(crate) fn render(&mut self, ctx: &RenderContext<'_>) -> Result<PanelScene> {
        self.generate_extents(ctx.state);
        self.compute_axes();

        let mut axes = Vec::new();
        for axis in [PanelAxis::X, PanelAxis::Y1, PanelAxis::Y2] {
            if let Some(scene) = self.axis_scene(axis, ctx)? {
                axes.push(scene);
            }
        }

        let order: Vec<String> = self.z_order.iter().map(str::to_string).collect();
        let mut layers = Vec::with_capacity(order.len());
        for id in &order {
            let Some(layer) = self.data_layers.get(id) else {
                continue;
            };
            let frame = self.frame(layer, ctx);
            if let Some(layer) = self.data_layers.get_mut(id) {
                layer.position_all_tooltips(&frame);
                layers.push(layer.scene(&frame)?);
            }
        }

        Ok(PanelScene {
            id: self.id.clone(),
            origin: self.origin(),
            size: self.size(),
            clip: self.clip_rect(),
            title: self.layout.title.clone(),
            curtain: self.curtain.clone(),
            axes,
            layers,
        })
    }

    pub(crate) fn create_tooltip(
        &mut self,
        layer_id: &str,
        datum: Row,
        tooltip_id: &str,
        cursor: Option<Point>,
        ctx: &RenderContext<'_>,
    ) -> Result<Option<TooltipPlacement>> {
        let Some(layer) = self.data_layers.get(layer_id) else {
            return Err(Error::NotFound {
                kind: "data layer",
                id: layer_id.to_string(),
            });
        };
        let frame = self.frame(layer, ctx);
        let layer = self
            .data_layers
            .get_mut(layer_id)
            .ok_or_else(|| Error::NotFound {
                kind: "data layer",
                id: layer_id.to_string(),
            })?;
        Ok(layer.create_tooltip(datum, tooltip_id, cursor, &frame))
    }

    /// The panel layout with live data-layer layouts, in declaration order.
    pub fn layout_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.layout)?;
        let mut layers = Map::new();
        for (id, layer) in &self.data_layers {
            layers.insert(id.clone(), layer.layout_value()?);
        }
        if let Some(map) = value.as_object_mut() {
            map.insert("data_layers".to_string(), Value::Object(layers));
        }
        Ok(value)
    }
}

fn fold_extent(acc: Option<[f64; 2]>, next: Option<[f64; 2]>) -> Option<[f64; 2]> {
    match (acc, next) {
        (Some([a0, a1]), Some([b0, b1])) => extent_of([a0, a1, b0, b1]),
        (None, Some(next)) => extent_of(next),
        (acc, None) => acc,
    }
}

/// Shrinks two opposing margins symmetrically until their sum fits in `total`.
fn fit_pair(a: f64, b: f64, total: f64) -> (f64, f64) {
    if a + b <= total {
        return (a, b);
    }
    let extra = ((a + b - total) / 2.0).ceil();
    let (mut a, mut b) = ((a - extra).max(0.0), (b - extra).max(0.0));
    if a + b > total {
        if a > b {
            a = (total - b).max(0.0);
        } else {
            b = (total - a).max(0.0);
        }
    }
    (a, b)
}
