use super::{DataLayerKind, field_f64};
use crate::Result;
use crate::data_layer::{DataLayer, LayerFrame};
use crate::geom::{Point, point};
use crate::scene::Mark;
use crate::tooltip::{STROKE_WIDTH, Tooltip, TooltipPlacement, place_above_below, place_beside};
use serde_json::{Value, json};

/// A polyline through the rows in order, e.g. a recombination-rate trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Line;

impl Line {
    /// `(x, y)` data values of every row with both fields present.
    fn series(layer: &DataLayer) -> Vec<(f64, f64)> {
        let layout = layer.layout();
        let x_field = layout.x_axis.field.as_deref();
        let y_field = layout.y_axis.field.as_deref();
        layer
            .data()
            .iter()
            .filter_map(|row| Some((field_f64(row, x_field)?, field_f64(row, y_field)?)))
            .collect()
    }
}

/// Interpolated y at `x` and the bracketing segment, for ascending `series`.
fn interpolate(series: &[(f64, f64)], x: f64) -> Option<(f64, (f64, f64), (f64, f64))> {
    let first = *series.first()?;
    let last = *series.last()?;
    let idx = series.partition_point(|&(sx, _)| sx < x);
    if idx == 0 {
        return Some((first.1, first, first));
    }
    if idx == series.len() {
        return Some((last.1, last, last));
    }
    let a = series[idx - 1];
    let b = series[idx];
    let y = if b.0 == a.0 {
        b.1
    } else {
        a.1 + (b.1 - a.1) * (x - a.0) / (b.0 - a.0)
    };
    Some((y, a, b))
}

impl DataLayerKind for Line {
    fn name(&self) -> &'static str {
        "line"
    }

    fn default_layout(&self) -> Value {
        json!({
            "style": { "fill": "transparent", "stroke-width": "2px" },
            "interpolate": "linear",
            "x_axis": { "field": "x" },
            "y_axis": { "field": "y", "axis": 1 },
            "hitarea_width": 5,
            "selectable": false
        })
    }

    fn marks(&self, layer: &DataLayer, frame: &LayerFrame<'_>) -> Result<Vec<Mark>> {
        let (Some(x_scale), Some(y_scale)) = (frame.x_scale, frame.y_scale) else {
            return Ok(Vec::new());
        };
        let points: Vec<Point> = Self::series(layer)
            .into_iter()
            .map(|(x, y)| point(x_scale.map(x), y_scale.map(y)))
            .collect();
        let style = layer
            .layout()
            .param("style")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(vec![Mark::Polyline { points, style }])
    }

    /// Follows the cursor along the line: the y under the cursor is interpolated from the two
    /// bracketing rows. Steep segments get a side placement, shallow ones above/below.
    fn position_tooltip(
        &self,
        layer: &DataLayer,
        tooltip: &Tooltip,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement> {
        let x_scale = frame.x_scale?;
        let y_scale = frame.y_scale?;
        let series = Self::series(layer);
        let data_x = match tooltip.cursor {
            Some(cursor) => x_scale.invert(cursor.x),
            None => field_f64(&tooltip.datum, layer.layout().x_axis.field.as_deref())?,
        };
        let (data_y, a, b) = interpolate(&series, data_x)?;

        let anchor = point(x_scale.map(data_x), y_scale.map(data_y));
        let dx = x_scale.map(b.0) - x_scale.map(a.0);
        let dy = y_scale.map(b.1) - y_scale.map(a.1);
        let slope = if dx == 0.0 { 0.0 } else { dy / dx };

        Some(if slope.abs() > 1.0 {
            place_beside(anchor, frame.page_origin, frame.clip, tooltip.size, STROKE_WIDTH)
        } else {
            place_above_below(anchor, frame.page_origin, frame.clip, tooltip.size, STROKE_WIDTH)
        })
    }
}
