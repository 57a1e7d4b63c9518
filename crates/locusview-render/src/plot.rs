use crate::data_layer::DataLayer;
use crate::geom::{Point, Rect, Size, point, rect, size};
use crate::layout::{Margin, PlotLayout, Resizable, default_plot_layout};
use crate::ordering::OrderedIds;
use crate::panel::{Panel, RenderContext};
use crate::scene::PlotScene;
use crate::tooltip::TooltipPlacement;
use crate::{Error, RenderOptions, Result};
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use locusview_core::{Requester, Row, State, merge_layouts};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Notification passed to [`Plot::on_update`] hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotEvent {
    Resized { width: f64, height: f64 },
    Rendered { generation: u64 },
    CurtainDropped { generation: u64, message: String },
}

pub type UpdateHook = Arc<dyn Fn(&PlotEvent) + Send + Sync>;

/// How a finished remap cycle was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapStatus {
    Rendered,
    /// A layer failed; the plot shows a curtain with this message and was not redrawn.
    Failed { message: String },
    /// A newer cycle started before this one finished; its results were dropped.
    Stale,
}

#[derive(Debug, Clone)]
struct LayerJob {
    layer_id: String,
    fields: Vec<String>,
}

#[derive(Debug, Clone)]
struct PanelJob {
    panel_id: String,
    layers: Vec<LayerJob>,
}

/// One in-flight remap: a state snapshot plus the field requests of every layer.
///
/// Running it needs no access to the plot, so a newer [`Plot::begin_remap`] may start while it
/// is pending.
pub struct RemapCycle {
    generation: u64,
    state: Arc<State>,
    requester: Arc<Requester>,
    panels: Vec<PanelJob>,
}

impl fmt::Debug for RemapCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemapCycle")
            .field("generation", &self.generation)
            .field("panels", &self.panels)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct LayerResult {
    pub panel_id: String,
    pub layer_id: String,
    pub result: locusview_core::Result<Vec<Row>>,
}

/// Settled results of a [`RemapCycle`], in panel then layer declaration order.
#[derive(Debug)]
pub struct RemapOutcome {
    pub generation: u64,
    pub state: Arc<State>,
    pub layers: Vec<LayerResult>,
}

impl RemapCycle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Fetches every layer concurrently and waits for all of them to settle.
    pub fn run(self) -> BoxFuture<'static, RemapOutcome> {
        Box::pin(async move {
            let RemapCycle {
                generation,
                state,
                requester,
                panels,
            } = self;

            let panel_futures = panels.into_iter().map(|panel| {
                let state = Arc::clone(&state);
                let requester = Arc::clone(&requester);
                async move {
                    let layer_futures = panel.layers.into_iter().map(|job| {
                        let state = Arc::clone(&state);
                        let requester = Arc::clone(&requester);
                        let panel_id = panel.panel_id.clone();
                        async move {
                            let result = requester.get_data(&state, &job.fields).await;
                            LayerResult {
                                panel_id,
                                layer_id: job.layer_id,
                                result,
                            }
                        }
                    });
                    join_all(layer_futures).await
                }
            });
            let layers = join_all(panel_futures)
                .await
                .into_iter()
                .flatten()
                .collect();

            RemapOutcome {
                generation,
                state,
                layers,
            }
        })
    }
}

/// The top-level visualization: panels stacked in `y_index` order, the shared state and the
/// remap/render cycle.
pub struct Plot {
    id: String,
    layout: PlotLayout,
    state: Arc<State>,
    requester: Arc<Requester>,
    options: RenderOptions,
    panels: IndexMap<String, Panel>,
    y_order: OrderedIds,
    initialized: bool,
    generation: u64,
    curtain: Option<String>,
    page_origin: Point,
    viewport: Option<Rect>,
    hooks: Vec<UpdateHook>,
    scene: Option<PlotScene>,
}

impl fmt::Debug for Plot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plot")
            .field("id", &self.id)
            .field("layout", &self.layout)
            .field("state", &self.state)
            .field("panels", &self.panels)
            .field("y_order", &self.y_order)
            .field("generation", &self.generation)
            .field("curtain", &self.curtain)
            .finish_non_exhaustive()
    }
}

impl Plot {
    /// Merges `layout` over the plot defaults, adds its declared panels and lays them out.
    pub fn new(
        id: impl Into<String>,
        mut layout: Value,
        requester: Requester,
        options: RenderOptions,
    ) -> Result<Self> {
        if !layout.is_object() {
            return Err(Error::InvalidLayout {
                message: "plot layout must be an object".to_string(),
            });
        }
        merge_layouts(&mut layout, &default_plot_layout())?;
        let layout: PlotLayout = serde_json::from_value(layout)?;
        for (name, value) in [
            ("width", layout.width),
            ("height", layout.height),
            ("aspect_ratio", layout.aspect_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidLayout {
                    message: format!("plot layout parameter `{name}` must be a positive number"),
                });
            }
        }

        let state = State::from_map(layout.state.clone());
        let declared: Vec<(String, Value)> = layout
            .panels
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();

        let mut plot = Self {
            id: id.into(),
            layout,
            state: Arc::new(state),
            requester: Arc::new(requester),
            options,
            panels: IndexMap::new(),
            y_order: OrderedIds::new(),
            initialized: false,
            generation: 0,
            curtain: None,
            page_origin: point(0.0, 0.0),
            viewport: None,
            hooks: Vec::new(),
            scene: None,
        };
        for (panel_id, panel_layout) in declared {
            plot.add_panel(&panel_id, panel_layout)?;
        }
        plot.position_panels();
        plot.set_dimensions(Some(plot.layout.width), Some(plot.layout.height));
        plot.initialized = true;
        Ok(plot)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn size(&self) -> Size {
        size(self.layout.width, self.layout.height)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Swaps the data sources used by later remap cycles.
    pub fn set_requester(&mut self, requester: Requester) {
        self.requester = Arc::new(requester);
    }

    pub fn curtain(&self) -> Option<&str> {
        self.curtain.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The scene produced by the last successful render.
    pub fn last_scene(&self) -> Option<&PlotScene> {
        self.scene.as_ref()
    }

    /// Page position of the plot's top-left corner, used to place tooltips.
    pub fn set_page_origin(&mut self, origin: Point) {
        self.page_origin = origin;
    }

    /// Area tooltips must stay inside; defaults to the plot's own bounds.
    pub fn set_viewport(&mut self, viewport: Option<Rect>) {
        self.viewport = viewport;
    }

    pub fn on_update(&mut self, hook: impl Fn(&PlotEvent) + Send + Sync + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    fn emit(&self, event: PlotEvent) {
        for hook in &self.hooks {
            hook(&event);
        }
    }

    pub fn panel(&self, id: &str) -> Option<&Panel> {
        self.panels.get(id)
    }

    pub fn panel_mut(&mut self, id: &str) -> Option<&mut Panel> {
        self.panels.get_mut(id)
    }

    pub fn panel_ids(&self) -> impl Iterator<Item = &str> {
        self.panels.keys().map(String::as_str)
    }

    pub fn y_order(&self) -> &OrderedIds {
        &self.y_order
    }

    pub fn data_layer(&self, panel_id: &str, layer_id: &str) -> Option<&DataLayer> {
        self.panels.get(panel_id)?.data_layer(layer_id)
    }

    fn panel_entry(&mut self, id: &str) -> Result<&mut Panel> {
        self.panels.get_mut(id).ok_or_else(|| Error::NotFound {
            kind: "panel",
            id: id.to_string(),
        })
    }

    fn ensure_state_slot(&mut self, key: &str) {
        if !self.state.contains_key(key) {
            Arc::make_mut(&mut self.state).insert(key, Value::Object(Map::new()));
        }
    }

    /// Adds a panel, shifting later panels down when the layout requests a `y_index`.
    ///
    /// The panel has no data until the next [`Plot::refresh`].
    pub fn add_panel(&mut self, id: &str, layout: Value) -> Result<&mut Panel> {
        if self.panels.contains_key(id) {
            return Err(Error::DuplicateId {
                kind: "panel",
                id: id.to_string(),
            });
        }
        let declared = layout.clone();
        let panel = Panel::new(
            id,
            layout,
            self.size(),
            self.panels.len(),
            &self.options.layer_kinds,
        )?;
        let layer_slots: Vec<String> = panel.data_layers().map(DataLayer::state_id).collect();
        self.y_order.insert(id, panel.layout().y_index);
        self.panels.insert(id.to_string(), panel);
        self.reindex_panels();

        self.ensure_state_slot(id);
        for slot in layer_slots {
            self.ensure_state_slot(&slot);
        }
        self.layout.panels.entry(id.to_string()).or_insert(declared);

        if self.initialized {
            self.position_panels();
            self.set_dimensions(Some(self.layout.width), Some(self.layout.height));
        }
        self.panel_entry(id)
    }

    /// Removes a panel along with its layers' tooltips and state slots.
    pub fn remove_panel(&mut self, id: &str) -> Result<()> {
        let Some(mut panel) = self.panels.shift_remove(id) else {
            return Err(Error::NotFound {
                kind: "panel",
                id: id.to_string(),
            });
        };
        let state = Arc::make_mut(&mut self.state);
        for layer in panel.data_layers_mut() {
            layer.destroy_all_tooltips();
            state.remove(&layer.state_id());
        }
        state.remove(id);
        self.layout.panels.shift_remove(id);
        self.y_order.remove(id);
        self.reindex_panels();

        if self.initialized {
            self.position_panels();
            self.set_dimensions(Some(self.layout.width), Some(self.layout.height));
        }
        Ok(())
    }

    fn reindex_panels(&mut self) {
        for (id, y) in self.y_order.indexed() {
            if let Some(panel) = self.panels.get_mut(id) {
                panel.layout_mut().y_index = Some(y as i64);
            }
        }
    }

    pub fn add_data_layer(
        &mut self,
        panel_id: &str,
        layer_id: &str,
        layout: Value,
    ) -> Result<&mut DataLayer> {
        let kinds = Arc::clone(&self.options.layer_kinds);
        let slot = self
            .panel_entry(panel_id)?
            .add_data_layer(layer_id, layout, &kinds)?
            .state_id();
        self.ensure_state_slot(&slot);
        self.panel_entry(panel_id)?
            .data_layer_mut(layer_id)
            .ok_or_else(|| Error::NotFound {
                kind: "data layer",
                id: layer_id.to_string(),
            })
    }

    pub fn remove_data_layer(&mut self, panel_id: &str, layer_id: &str) -> Result<()> {
        let layer = self.panel_entry(panel_id)?.remove_data_layer(layer_id)?;
        Arc::make_mut(&mut self.state).remove(&layer.state_id());
        Ok(())
    }

    /// Normalizes proportional heights to sum to 1, resizes every panel to its share of the plot
    /// and stacks panels top to bottom in `y_index` order. Panels marked `x_linked` share the
    /// widest left and right margins among them.
    pub fn position_panels(&mut self) {
        let plot_height = self.layout.height;
        let mut linked = Margin::default();
        for panel in self.panels.values_mut() {
            let layout = panel.layout_mut();
            if layout.proportional_height.is_none() && plot_height > 0.0 {
                layout.proportional_height = Some(layout.height / plot_height);
            }
            if layout.proportional_width.is_none() {
                layout.proportional_width = Some(1.0);
            }
            if layout.interaction.x_linked {
                linked.left = linked.left.max(layout.margin.left);
                linked.right = linked.right.max(layout.margin.right);
            }
        }

        let total = self.sum_proportional_height();
        if !(total.is_finite() && total > 0.0) {
            return;
        }
        let adjustment = 1.0 / total;
        for panel in self.panels.values_mut() {
            let layout = panel.layout_mut();
            layout.proportional_height = layout.proportional_height.map(|ph| ph * adjustment);
        }

        let order: Vec<String> = self.y_order.iter().map(str::to_string).collect();
        for id in &order {
            if let Some(panel) = self.panels.get_mut(id) {
                if panel.layout().interaction.x_linked {
                    panel.align_x_margins(linked.left, linked.right);
                }
            }
        }
        self.stack_panels(&order);

        self.set_dimensions(None, None);

        let plot = self.size();
        for id in &order {
            if let Some(panel) = self.panels.get_mut(id) {
                let pw = panel.layout().proportional_width.unwrap_or(1.0);
                let ph = panel.layout().proportional_height.unwrap_or(0.0);
                panel.set_dimensions(Some(plot.width * pw), Some(plot.height * ph), plot);
            }
        }
        // Resizing changes heights, so origins are recomputed from the final ones.
        self.stack_panels(&order);
    }

    /// Places panels one below the other from their current heights and records each origin
    /// as a share of the stacked height.
    fn stack_panels(&mut self, order: &[String]) {
        let mut y_offset = 0.0;
        for id in order {
            if let Some(panel) = self.panels.get_mut(id) {
                panel.set_origin(Some(0.0), Some(y_offset));
                panel.layout_mut().proportional_origin.x = 0.0;
                y_offset += panel.layout().height;
            }
        }
        for id in order {
            if let Some(panel) = self.panels.get_mut(id) {
                let layout = panel.layout_mut();
                layout.proportional_origin.y = if y_offset > 0.0 {
                    layout.origin.y / y_offset
                } else {
                    0.0
                };
            }
        }
    }

    /// Sums proportional heights, first giving every panel without a positive share an equal
    /// one.
    fn sum_proportional_height(&mut self) -> f64 {
        let n = self.panels.len();
        let mut total = 0.0;
        for panel in self.panels.values_mut() {
            let layout = panel.layout_mut();
            let share = match layout.proportional_height {
                Some(ph) if ph > 0.0 => ph,
                _ => {
                    let share = 1.0 / n as f64;
                    layout.proportional_height = Some(share);
                    share
                }
            };
            total += share;
        }
        total
    }

    /// With both dimensions, resizes the plot (floored at the panels' aggregated minimums, and
    /// following the aspect ratio in responsive mode) and redistributes panels proportionally.
    /// Without them, shrink-wraps the plot around its panels.
    pub fn set_dimensions(&mut self, width: Option<f64>, height: Option<f64>) {
        let mut min_width: f64 = 1.0;
        let mut min_height: f64 = 1.0;
        for panel in self.panels.values() {
            let layout = panel.layout();
            min_width = min_width.max(layout.min_width);
            if let Some(ph) = layout.proportional_height.filter(|ph| *ph > 0.0) {
                min_height = min_height.max(layout.min_height / ph);
            }
        }
        self.layout.min_width = min_width;
        self.layout.min_height = min_height;

        match (width, height) {
            (Some(w), Some(h)) if w.is_finite() && w >= 0.0 && h.is_finite() && h >= 0.0 => {
                self.layout.width = w.round().max(min_width);
                self.layout.height = h.round().max(min_height);
                if self.layout.resizable == Resizable::Responsive {
                    self.layout.height = self.layout.width / self.layout.aspect_ratio;
                    if self.layout.height < min_height {
                        self.layout.height = min_height;
                        self.layout.width = self.layout.height * self.layout.aspect_ratio;
                    }
                }
                let plot = self.size();
                let order: Vec<String> = self.y_order.iter().map(str::to_string).collect();
                let mut y_offset = 0.0;
                for id in &order {
                    if let Some(panel) = self.panels.get_mut(id) {
                        let panel_height =
                            panel.layout().proportional_height.unwrap_or(0.0) * plot.height;
                        panel.set_dimensions(Some(plot.width), Some(panel_height), plot);
                        panel.set_origin(Some(0.0), Some(y_offset));
                        let layout = panel.layout_mut();
                        layout.proportional_origin.x = 0.0;
                        layout.proportional_origin.y = y_offset / plot.height;
                        y_offset += layout.height;
                    }
                }
            }
            (Some(_), Some(_)) => {}
            _ if !self.panels.is_empty() => {
                let mut w: f64 = 0.0;
                let mut h = 0.0;
                for panel in self.panels.values() {
                    w = w.max(panel.layout().width);
                    h += panel.layout().height;
                }
                self.layout.width = w.max(min_width);
                self.layout.height = h.max(min_height);
            }
            _ => {}
        }

        if self.layout.height > 0.0 {
            self.layout.aspect_ratio = self.layout.width / self.layout.height;
        }
        self.emit(PlotEvent::Resized {
            width: self.layout.width,
            height: self.layout.height,
        });
    }

    /// Reacts to the host container changing size. Only responsive plots follow it; returns
    /// whether the plot was resized.
    pub fn handle_resize(&mut self, width: f64, height: f64) -> bool {
        if self.layout.resizable != Resizable::Responsive {
            return false;
        }
        self.set_dimensions(Some(width), Some(height));
        self.set_dimensions(None, None);
        if self.scene.is_some() {
            match self.render() {
                Ok(scene) => self.scene = Some(scene),
                Err(err) => {
                    tracing::warn!(plot = %self.id, error = %err, "re-render after resize failed");
                }
            }
        }
        true
    }

    /// Merges `patch` into a new state snapshot and prepares a remap of every layer against it.
    ///
    /// Open tooltips are closed. Any cycle begun earlier becomes stale.
    pub fn begin_remap(&mut self, patch: &Map<String, Value>) -> RemapCycle {
        self.state = Arc::new(self.state.patched(patch));
        self.generation += 1;

        let mut panels = Vec::with_capacity(self.panels.len());
        for (panel_id, panel) in self.panels.iter_mut() {
            let mut layers = Vec::new();
            for layer in panel.data_layers_mut() {
                layer.destroy_all_tooltips();
                layers.push(LayerJob {
                    layer_id: layer.id().to_string(),
                    fields: layer.fields().to_vec(),
                });
            }
            panels.push(PanelJob {
                panel_id: panel_id.clone(),
                layers,
            });
        }
        tracing::debug!(
            plot = %self.id,
            generation = self.generation,
            panels = panels.len(),
            "remap started"
        );

        RemapCycle {
            generation: self.generation,
            state: Arc::clone(&self.state),
            requester: Arc::clone(&self.requester),
            panels,
        }
    }

    /// Applies a settled cycle.
    ///
    /// Results from a superseded cycle are discarded. Otherwise every successful layer takes its
    /// new rows; if any layer failed the plot drops a curtain with the first error (in panel then
    /// layer order) and is not redrawn. A clean cycle lays the panels out and renders.
    pub fn finish_remap(&mut self, outcome: RemapOutcome) -> RemapStatus {
        if outcome.generation != self.generation {
            tracing::warn!(
                plot = %self.id,
                generation = outcome.generation,
                current = self.generation,
                "discarding stale remap results"
            );
            return RemapStatus::Stale;
        }

        let mut first_error: Option<String> = None;
        for LayerResult {
            panel_id,
            layer_id,
            result,
        } in outcome.layers
        {
            let Some(panel) = self.panels.get_mut(&panel_id) else {
                continue;
            };
            match result {
                Ok(rows) => {
                    if let Some(layer) = panel.data_layer_mut(&layer_id) {
                        layer.set_data(rows);
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    panel.drop_curtain(&message);
                    first_error.get_or_insert(message);
                }
            }
        }

        if let Some(message) = first_error {
            return self.drop_curtain(message);
        }

        self.curtain = None;
        for panel in self.panels.values_mut() {
            panel.raise_curtain();
        }
        self.position_panels();
        match self.render() {
            Ok(scene) => {
                self.scene = Some(scene);
                tracing::debug!(plot = %self.id, generation = self.generation, "rendered");
                self.emit(PlotEvent::Rendered {
                    generation: self.generation,
                });
                RemapStatus::Rendered
            }
            Err(err) => self.drop_curtain(err.to_string()),
        }
    }

    fn drop_curtain(&mut self, message: String) -> RemapStatus {
        tracing::error!(
            plot = %self.id,
            generation = self.generation,
            error = %message,
            "remap failed"
        );
        self.curtain = Some(message.clone());
        self.emit(PlotEvent::CurtainDropped {
            generation: self.generation,
            message: message.clone(),
        });
        RemapStatus::Failed { message }
    }

    /// Merges `patch` into the state, refetches every layer and renders once all have settled.
    pub async fn apply_state(&mut self, patch: Map<String, Value>) -> RemapStatus {
        let cycle = self.begin_remap(&patch);
        let outcome = cycle.run().await;
        self.finish_remap(outcome)
    }

    /// Refetches every layer against the current state.
    pub async fn refresh(&mut self) -> RemapStatus {
        self.apply_state(Map::new()).await
    }

    /// Draws every panel in `y_index` order.
    pub fn render(&mut self) -> Result<PlotScene> {
        let state = Arc::clone(&self.state);
        let measurer = Arc::clone(&self.options.text_measurer);
        let registries = self.options.registries.clone();
        let viewport = self.viewport();
        let ctx = RenderContext {
            state: &state,
            page_origin: self.page_origin,
            viewport,
            measurer: measurer.as_ref(),
            registries: &registries,
        };

        let order: Vec<String> = self.y_order.iter().map(str::to_string).collect();
        let mut panels = Vec::with_capacity(order.len());
        for id in &order {
            if let Some(panel) = self.panels.get_mut(id) {
                panels.push(panel.render(&ctx)?);
            }
        }
        Ok(PlotScene {
            id: self.id.clone(),
            size: self.size(),
            curtain: self.curtain.clone(),
            panels,
        })
    }

    fn viewport(&self) -> Rect {
        self.viewport.unwrap_or_else(|| {
            rect(
                self.page_origin.x,
                self.page_origin.y,
                self.layout.width,
                self.layout.height,
            )
        })
    }

    /// Opens (or repositions) a tooltip on a layer. `cursor` is in the panel's plotting-area
    /// coordinates. Placement needs the scales of a previous render and is `None` before one.
    pub fn create_tooltip(
        &mut self,
        panel_id: &str,
        layer_id: &str,
        datum: Row,
        tooltip_id: &str,
        cursor: Option<Point>,
    ) -> Result<Option<TooltipPlacement>> {
        let state = Arc::clone(&self.state);
        let measurer = Arc::clone(&self.options.text_measurer);
        let registries = self.options.registries.clone();
        let ctx = RenderContext {
            state: &state,
            page_origin: self.page_origin,
            viewport: self.viewport(),
            measurer: measurer.as_ref(),
            registries: &registries,
        };
        self.panel_entry(panel_id)?
            .create_tooltip(layer_id, datum, tooltip_id, cursor, &ctx)
    }

    pub fn destroy_tooltip(
        &mut self,
        panel_id: &str,
        layer_id: &str,
        tooltip_id: &str,
    ) -> Result<bool> {
        let layer = self
            .panel_entry(panel_id)?
            .data_layer_mut(layer_id)
            .ok_or_else(|| Error::NotFound {
                kind: "data layer",
                id: layer_id.to_string(),
            })?;
        Ok(layer.destroy_tooltip(tooltip_id))
    }

    /// Toggles `element_id` in a selectable layer's `selected` list, kept in the layer's own
    /// state slot. Returns whether the element is now selected.
    pub fn toggle_selection(
        &mut self,
        panel_id: &str,
        layer_id: &str,
        element_id: &str,
    ) -> Result<bool> {
        let layer = self
            .data_layer(panel_id, layer_id)
            .ok_or_else(|| Error::NotFound {
                kind: "data layer",
                id: format!("{panel_id}.{layer_id}"),
            })?;
        if !layer.layout().selectable {
            return Ok(false);
        }
        let slot = layer.state_id();
        let mut selected = layer.selected_ids(&self.state);
        let now_selected = match selected.iter().position(|id| id == element_id) {
            Some(idx) => {
                selected.remove(idx);
                false
            }
            None => {
                selected.push(element_id.to_string());
                true
            }
        };
        Arc::make_mut(&mut self.state).update_slot(&slot, |map| {
            map.insert(
                "selected".to_string(),
                Value::Array(selected.into_iter().map(Value::String).collect()),
            );
        });
        Ok(now_selected)
    }

    /// The full plot layout as it stands: current state, geometry and live panel layouts.
    pub fn layout_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.layout)?;
        let mut panels = Map::new();
        for (id, panel) in &self.panels {
            panels.insert(id.clone(), panel.layout_value()?);
        }
        if let Some(map) = value.as_object_mut() {
            map.insert("state".to_string(), self.state.to_value());
            map.insert("panels".to_string(), Value::Object(panels));
        }
        Ok(value)
    }
}
