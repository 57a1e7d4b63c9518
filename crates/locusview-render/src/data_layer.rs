use crate::geom::{Point, Rect, Size};
use crate::kinds::{DataLayerKind, LayerKindRegistry};
use crate::layout::{DataLayerLayout, default_data_layer_layout};
use crate::measure::TextMeasurer;
use crate::scale::{LinearScale, extent_of};
use crate::scene::{LayerScene, Mark};
use crate::tooltip::{Tooltip, TooltipPlacement};
use crate::{Error, Result};
use indexmap::IndexMap;
use locusview_core::state::{scalar_to_string, value_as_f64};
use locusview_core::template::format_fields;
use locusview_core::{Registries, Row, State, merge_layouts};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

/// Everything a layer needs from its panel to draw itself or place a tooltip.
pub struct LayerFrame<'a> {
    pub state: &'a State,
    /// Plotting area size.
    pub clip: Size,
    pub x_scale: Option<LinearScale>,
    /// The y scale of the axis this layer is bound to.
    pub y_scale: Option<LinearScale>,
    /// Page position of the plotting area's top-left corner.
    pub page_origin: Point,
    pub viewport: Rect,
    pub measurer: &'a dyn TextMeasurer,
    pub registries: &'a Registries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    X,
    Y,
}

pub struct DataLayer {
    id: String,
    panel_id: String,
    layout: DataLayerLayout,
    kind: Arc<dyn DataLayerKind>,
    data: Vec<Row>,
    initialized: bool,
    tooltips: IndexMap<String, Tooltip>,
}

impl fmt::Debug for DataLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLayer")
            .field("id", &self.id)
            .field("panel_id", &self.panel_id)
            .field("kind", &self.kind.name())
            .field("rows", &self.data.len())
            .field("tooltips", &self.tooltips.len())
            .finish()
    }
}

impl DataLayer {
    pub(crate) fn new(
        panel_id: &str,
        id: &str,
        mut layout: Value,
        kinds: &LayerKindRegistry,
    ) -> Result<Self> {
        let Some(map) = layout.as_object_mut() else {
            return Err(Error::InvalidLayout {
                message: format!("data layer {id} layout must be an object"),
            });
        };
        let Some(type_name) = map.get("type").and_then(Value::as_str) else {
            return Err(Error::InvalidLayout {
                message: format!("data layer {id} layout has no string `type`"),
            });
        };
        let Some(kind) = kinds.get(type_name) else {
            return Err(Error::UnknownLayerType {
                type_name: type_name.to_string(),
            });
        };
        if let Some(Value::Object(y_axis)) = map.get_mut("y_axis") {
            let axis = y_axis.get("axis").and_then(Value::as_i64);
            if !matches!(axis, Some(1 | 2)) {
                y_axis.insert("axis".to_string(), json!(1));
            }
        }

        merge_layouts(&mut layout, &kind.default_layout())?;
        merge_layouts(&mut layout, &default_data_layer_layout())?;
        let layout: DataLayerLayout = serde_json::from_value(layout)?;

        Ok(Self {
            id: id.to_string(),
            panel_id: panel_id.to_string(),
            layout,
            kind,
            data: Vec::new(),
            initialized: false,
            tooltips: IndexMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn panel_id(&self) -> &str {
        &self.panel_id
    }

    /// Key of this layer's slot in the plot state.
    pub fn state_id(&self) -> String {
        format!("{}.{}", self.panel_id, self.id)
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn layout(&self) -> &DataLayerLayout {
        &self.layout
    }

    pub(crate) fn set_z_index(&mut self, z_index: usize) {
        self.layout.z_index = Some(z_index as i64);
    }

    pub fn z_index(&self) -> usize {
        self.layout.z_index.map_or(0, |z| z.max(0) as usize)
    }

    pub fn fields(&self) -> &[String] {
        &self.layout.fields
    }

    pub fn data(&self) -> &[Row] {
        &self.data
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replaces the layer's rows with a freshly fetched set.
    pub fn set_data(&mut self, rows: Vec<Row>) {
        self.data = rows;
        self.initialized = true;
    }

    /// The id of a row, read from `id_field` (default `id`).
    pub fn element_id(&self, row: &Row) -> Option<String> {
        let field = self.layout.id_field.as_deref().unwrap_or("id");
        row.get(field).and_then(scalar_to_string)
    }

    /// Ids recorded as selected in this layer's state slot.
    pub fn selected_ids(&self, state: &State) -> Vec<String> {
        state
            .get(&self.state_id())
            .and_then(|slot| slot.get("selected"))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(scalar_to_string).collect())
            .unwrap_or_default()
    }

    /// The `[min, max]` this layer contributes along `dimension`.
    ///
    /// An explicit floor and ceiling win outright. Otherwise the extent of the bound field is
    /// widened by the buffers and minimum extent, then pinned by whichever of floor/ceiling is
    /// set. A fetched layer with no rows spans its minimum extent when one is set; otherwise an
    /// x binding with no data falls back to the state's `start`/`end`.
    pub fn get_axis_extent(&self, dimension: Dimension, state: &State) -> Option<[f64; 2]> {
        let axis = match dimension {
            Dimension::X => &self.layout.x_axis,
            Dimension::Y => &self.layout.y_axis,
        };
        if let (Some(floor), Some(ceiling)) = (axis.floor, axis.ceiling) {
            return Some([floor, ceiling]);
        }

        // Fetched but empty: an empty region still spans min_extent, without buffers.
        if axis.field.is_some() && self.initialized && self.data.is_empty() {
            if let Some(min_extent) = axis.min_extent {
                return Some(min_extent);
            }
        }

        let data_extent = axis.field.as_deref().and_then(|field| {
            extent_of(
                self.data
                    .iter()
                    .filter_map(|row| row.get(field).and_then(value_as_f64)),
            )
        });
        if let Some([lo, hi]) = data_extent {
            let span = hi - lo;
            let mut candidates = vec![lo, hi];
            if let Some(lower) = axis.lower_buffer {
                candidates.push(lo - span * lower);
            }
            if let Some(upper) = axis.upper_buffer {
                candidates.push(hi + span * upper);
            }
            if let Some([a, b]) = axis.min_extent {
                candidates.extend([a, b]);
            }
            let [mut lo, mut hi] = extent_of(candidates).unwrap_or([lo, hi]);
            if let Some(floor) = axis.floor {
                lo = floor;
            }
            if let Some(ceiling) = axis.ceiling {
                hi = ceiling;
            }
            return Some([lo, hi]);
        }

        match (dimension, state.start(), state.end()) {
            (Dimension::X, Some(start), Some(end)) => Some([start, end]),
            _ => None,
        }
    }

    pub fn is_decoupled(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::X => self.layout.x_axis.decoupled,
            Dimension::Y => self.layout.y_axis.decoupled,
        }
    }

    /// Opens a tooltip for `datum` under `id`, or repositions the existing one.
    pub fn create_tooltip(
        &mut self,
        datum: Row,
        id: &str,
        cursor: Option<Point>,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement> {
        if let Some(existing) = self.tooltips.get_mut(id) {
            if cursor.is_some() {
                existing.cursor = cursor;
            }
            return self.position_tooltip(id, frame);
        }
        let html = self
            .layout
            .tooltip
            .as_ref()
            .and_then(|t| t.html.as_deref())
            .map(|template| format_fields(&datum, template))
            .unwrap_or_default();
        let size = frame.measurer.measure_tooltip(&html);
        self.tooltips.insert(
            id.to_string(),
            Tooltip {
                id: id.to_string(),
                datum,
                html,
                size,
                cursor,
                placement: None,
            },
        );
        self.position_tooltip(id, frame)
    }

    pub fn position_tooltip(
        &mut self,
        id: &str,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement> {
        let tooltip = self.tooltips.get(id)?;
        let placement = self
            .kind
            .position_tooltip(self, tooltip, frame)
            .map(|p| p.clamp_to(tooltip.size, frame.viewport));
        if let Some(tooltip) = self.tooltips.get_mut(id) {
            tooltip.placement = placement;
        }
        placement
    }

    pub fn position_all_tooltips(&mut self, frame: &LayerFrame<'_>) {
        let ids: Vec<String> = self.tooltips.keys().cloned().collect();
        for id in ids {
            self.position_tooltip(&id, frame);
        }
    }

    pub fn tooltip(&self, id: &str) -> Option<&Tooltip> {
        self.tooltips.get(id)
    }

    pub fn tooltips(&self) -> impl Iterator<Item = &Tooltip> {
        self.tooltips.values()
    }

    /// Returns whether a tooltip was open under `id`.
    pub fn destroy_tooltip(&mut self, id: &str) -> bool {
        self.tooltips.shift_remove(id).is_some()
    }

    pub fn destroy_all_tooltips(&mut self) {
        self.tooltips.clear();
    }

    pub fn marks(&self, frame: &LayerFrame<'_>) -> Result<Vec<Mark>> {
        self.kind.marks(self, frame)
    }

    pub(crate) fn scene(&self, frame: &LayerFrame<'_>) -> Result<LayerScene> {
        Ok(LayerScene {
            id: self.id.clone(),
            kind: self.kind.name().to_string(),
            z_index: self.z_index(),
            marks: self.marks(frame)?,
            tooltips: self.tooltips.values().cloned().collect(),
        })
    }

    pub fn layout_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.layout)?)
    }
}
