use super::{DataLayerKind, field_f64, resolve_scaled};
use crate::Result;
use crate::data_layer::{DataLayer, LayerFrame};
use crate::geom::point;
use crate::scene::Mark;
use crate::tooltip::{Tooltip, TooltipPlacement, place_beside};
use locusview_core::Row;
use locusview_core::state::value_as_f64;
use serde_json::{Value, json};
use std::f64::consts::PI;

/// Off-canvas coordinate for values that cannot be placed.
const OFFSCREEN: f64 = -1000.0;
const DEFAULT_POINT_SIZE: f64 = 40.0;

/// Points at `(x_axis.field, y_axis.field)`, sized, shaped and coloured per row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scatter;

impl Scatter {
    fn point_size(
        layer: &DataLayer,
        row: &Row,
        index: usize,
        frame: &LayerFrame<'_>,
    ) -> Result<f64> {
        let param = layer.layout().param("point_size");
        let size = resolve_scaled(param, row, index, frame.registries)?;
        Ok(size
            .as_ref()
            .and_then(value_as_f64)
            .unwrap_or(DEFAULT_POINT_SIZE))
    }

    fn project(layer: &DataLayer, row: &Row, frame: &LayerFrame<'_>) -> (f64, f64) {
        let layout = layer.layout();
        let x = field_f64(row, layout.x_axis.field.as_deref())
            .zip(frame.x_scale)
            .map_or(OFFSCREEN, |(v, scale)| scale.map(v));
        let y = field_f64(row, layout.y_axis.field.as_deref())
            .zip(frame.y_scale)
            .map_or(OFFSCREEN, |(v, scale)| scale.map(v));
        (x, y)
    }
}

impl DataLayerKind for Scatter {
    fn name(&self) -> &'static str {
        "scatter"
    }

    fn default_layout(&self) -> Value {
        json!({
            "point_size": DEFAULT_POINT_SIZE,
            "point_shape": "circle",
            "color": "#888888",
            "y_axis": { "axis": 1 },
            "selectable": true,
            "id_field": "id"
        })
    }

    fn marks(&self, layer: &DataLayer, frame: &LayerFrame<'_>) -> Result<Vec<Mark>> {
        let layout = layer.layout();
        let selected = layer.selected_ids(frame.state);
        let shape = layout
            .param("point_shape")
            .and_then(Value::as_str)
            .unwrap_or("circle")
            .to_string();

        let mut marks = Vec::with_capacity(layer.data().len());
        for (idx, row) in layer.data().iter().enumerate() {
            let (x, y) = Self::project(layer, row, frame);
            let id = layer.element_id(row).unwrap_or_else(|| idx.to_string());
            let color = resolve_scaled(layout.param("color"), row, idx, frame.registries)?
                .unwrap_or_else(|| Value::String("#888888".to_string()));
            marks.push(Mark::Point {
                selected: layout.selectable && selected.contains(&id),
                id,
                center: point(x, y),
                size: Self::point_size(layer, row, idx, frame)?,
                shape: shape.clone(),
                color,
            });
        }
        Ok(marks)
    }

    fn position_tooltip(
        &self,
        layer: &DataLayer,
        tooltip: &Tooltip,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement> {
        let (x, y) = Self::project(layer, &tooltip.datum, frame);
        if x == OFFSCREEN || y == OFFSCREEN {
            return None;
        }
        let index = layer
            .data()
            .iter()
            .position(|row| *row == tooltip.datum)
            .unwrap_or_default();
        let size =
            Self::point_size(layer, &tooltip.datum, index, frame).unwrap_or(DEFAULT_POINT_SIZE);
        let radius = (size / PI).sqrt();
        Some(place_beside(
            point(x, y),
            frame.page_origin,
            frame.clip,
            tooltip.size,
            radius,
        ))
    }
}
