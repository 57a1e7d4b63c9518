use super::{DataLayerKind, field_f64};
use crate::Result;
use crate::data_layer::{DataLayer, LayerFrame};
use crate::geom::{point, rect};
use crate::measure::TextStyle;
use crate::scene::Mark;
use crate::tooltip::{ARROW_WIDTH, STROKE_WIDTH, Tooltip, TooltipPlacement, TooltipSide, center_on};
use locusview_core::Row;
use locusview_core::state::{scalar_to_string, value_as_f64};
use serde_json::{Value, json};

/// Gene models stacked on non-overlapping tracks, each with a strand-arrowed label and the exons
/// of its first transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct Genes;

#[derive(Debug, Clone, Copy)]
struct GeneGeometry {
    label_font_size: f64,
    label_exon_spacing: f64,
    exon_height: f64,
    bounding_box_padding: f64,
    track_vertical_spacing: f64,
}

impl GeneGeometry {
    fn of(layer: &DataLayer) -> Self {
        let layout = layer.layout();
        Self {
            label_font_size: layout.param_f64("label_font_size", 12.0),
            label_exon_spacing: layout.param_f64("label_exon_spacing", 4.0),
            exon_height: layout.param_f64("exon_height", 16.0),
            bounding_box_padding: layout.param_f64("bounding_box_padding", 6.0),
            track_vertical_spacing: layout.param_f64("track_vertical_spacing", 10.0),
        }
    }

    fn track_height(&self) -> f64 {
        2.0 * self.bounding_box_padding
            + self.label_font_size
            + self.label_exon_spacing
            + self.exon_height
            + self.track_vertical_spacing
    }

    fn track_top(&self, track: usize) -> f64 {
        (track.saturating_sub(1)) as f64 * self.track_height()
    }
}

/// Where a gene landed: its row, 1-based track and padded horizontal display range (pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneTrackItem {
    pub index: usize,
    pub track: usize,
    pub display_start: f64,
    pub display_end: f64,
    /// `start`, `middle` or `end`.
    pub text_anchor: &'static str,
}

impl GeneTrackItem {
    pub fn display_width(&self) -> f64 {
        self.display_end - self.display_start
    }
}

fn gene_name(row: &Row) -> String {
    row.get("gene_name")
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

/// Assigns every gene to the first track where its display range, widened to fit its label,
/// does not collide with a gene already placed there.
pub fn assign_tracks(layer: &DataLayer, frame: &LayerFrame<'_>) -> Vec<GeneTrackItem> {
    let Some(x_scale) = frame.x_scale else {
        return Vec::new();
    };
    let geometry = GeneGeometry::of(layer);
    let view_start = frame.state.start().unwrap_or(x_scale.domain[0]);
    let view_end = frame.state.end().unwrap_or(x_scale.domain[1]);
    let font = geometry.label_font_size;
    let style = TextStyle {
        font_size: font,
        font_weight: None,
    };

    let mut tracks: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    let mut out = Vec::with_capacity(layer.data().len());
    for (index, row) in layer.data().iter().enumerate() {
        let (Some(start), Some(end)) = (field_f64(row, Some("start")), field_f64(row, Some("end")))
        else {
            continue;
        };
        let mut ds = x_scale.map(start.max(view_start));
        let mut de = x_scale.map(end.min(view_end));
        let label_width = frame
            .measurer
            .measure(&format!("{}→", gene_name(row)), &style)
            .width;
        let mut text_anchor = "middle";
        if de - ds < label_width {
            if start < view_start {
                de = ds + label_width + font;
                text_anchor = "start";
            } else if end > view_end {
                ds = de - label_width - font;
                text_anchor = "end";
            } else {
                let centered_margin = (label_width - (de - ds)) / 2.0 + font;
                if ds - centered_margin < x_scale.map(view_start) {
                    ds = x_scale.map(view_start);
                    de = ds + label_width;
                    text_anchor = "start";
                } else if de + centered_margin > x_scale.map(view_end) {
                    de = x_scale.map(view_end);
                    ds = de - label_width;
                    text_anchor = "end";
                } else {
                    ds -= centered_margin;
                    de += centered_margin;
                }
            }
        }
        ds -= geometry.bounding_box_padding;
        de += geometry.bounding_box_padding;
        let width = de - ds;

        let mut track = 0;
        loop {
            if track == tracks.len() {
                tracks.push(Vec::new());
            }
            let collides = tracks[track].iter().any(|&(ps, pe)| {
                let min_start = ps.min(ds);
                let max_end = pe.max(de);
                max_end - min_start < (pe - ps) + width
            });
            if !collides {
                tracks[track].push((ds, de));
                break;
            }
            track += 1;
        }

        out.push(GeneTrackItem {
            index,
            track: track + 1,
            display_start: ds,
            display_end: de,
            text_anchor,
        });
    }
    out
}

impl DataLayerKind for Genes {
    fn name(&self) -> &'static str {
        "genes"
    }

    fn default_layout(&self) -> Value {
        json!({
            "label_font_size": 12,
            "label_exon_spacing": 4,
            "exon_height": 16,
            "bounding_box_padding": 6,
            "track_vertical_spacing": 10,
            "selectable": true,
            "id_field": "gene_id"
        })
    }

    fn marks(&self, layer: &DataLayer, frame: &LayerFrame<'_>) -> Result<Vec<Mark>> {
        let Some(x_scale) = frame.x_scale else {
            return Ok(Vec::new());
        };
        let geometry = GeneGeometry::of(layer);
        let selected = layer.selected_ids(frame.state);
        let pad = geometry.bounding_box_padding;
        let font = geometry.label_font_size;

        let mut marks = Vec::new();
        for item in assign_tracks(layer, frame) {
            let row = &layer.data()[item.index];
            let name = gene_name(row);
            let id = layer.element_id(row).unwrap_or_else(|| name.clone());
            let top = geometry.track_top(item.track);
            let start_px = field_f64(row, Some("start")).map_or(0.0, |v| x_scale.map(v));
            let end_px = field_f64(row, Some("end")).map_or(0.0, |v| x_scale.map(v));

            let exon_top = top + pad + font + geometry.label_exon_spacing;
            let exons = row
                .get("transcripts")
                .and_then(Value::as_array)
                .and_then(|transcripts| transcripts.first())
                .and_then(|transcript| transcript.get("exons"))
                .and_then(Value::as_array)
                .map(|exons| {
                    exons
                        .iter()
                        .filter_map(|exon| {
                            let s = exon.get("start").and_then(value_as_f64)?;
                            let e = exon.get("end").and_then(value_as_f64)?;
                            let (s, e) = (x_scale.map(s), x_scale.map(e));
                            Some(rect(s, exon_top, e - s, geometry.exon_height))
                        })
                        .collect()
                })
                .unwrap_or_default();

            let label_x = match item.text_anchor {
                "start" => item.display_start + pad,
                "end" => item.display_end - pad,
                _ => item.display_start + item.display_width() / 2.0,
            };
            let label = if row.get("strand").and_then(Value::as_str) == Some("+") {
                format!("{name}→")
            } else {
                format!("←{name}")
            };

            marks.push(Mark::Gene {
                selected: layer.layout().selectable && selected.contains(&id),
                id,
                name,
                track: item.track,
                bbox: rect(
                    item.display_start,
                    top,
                    item.display_width(),
                    geometry.track_height() - geometry.track_vertical_spacing,
                ),
                boundary: rect(
                    start_px,
                    top + pad + font + geometry.label_exon_spacing
                        + geometry.exon_height.max(3.0) / 2.0,
                    end_px - start_px,
                    1.0,
                ),
                exons,
                label,
                label_anchor: item.text_anchor.to_string(),
                label_position: point(label_x, top + pad + font),
            });
        }
        Ok(marks)
    }

    /// Centred on the visible part of the gene, below its bounding box unless the box sits too
    /// close to the bottom of the plotting area.
    fn position_tooltip(
        &self,
        layer: &DataLayer,
        tooltip: &Tooltip,
        frame: &LayerFrame<'_>,
    ) -> Option<TooltipPlacement> {
        let key = layer.element_id(&tooltip.datum);
        let name = gene_name(&tooltip.datum);
        let item = assign_tracks(layer, frame).into_iter().find(|item| {
            let row = &layer.data()[item.index];
            match &key {
                Some(key) => layer.element_id(row).as_ref() == Some(key),
                None => gene_name(row) == name,
            }
        })?;

        let geometry = GeneGeometry::of(layer);
        let size = tooltip.size;
        let center_x =
            (item.display_start + item.display_end) / 2.0 - geometry.bounding_box_padding / 2.0;
        let (left, arrow_left) =
            center_on(center_x, frame.page_origin.x, frame.clip.width, size.width);
        let arrow_left = arrow_left - ARROW_WIDTH / 2.0;

        let bbox_top = geometry.track_top(item.track);
        let bbox_height = geometry.track_height() - geometry.track_vertical_spacing;
        let reach = STROKE_WIDTH + ARROW_WIDTH;
        Some(if size.height + reach > frame.clip.height - (bbox_top + bbox_height) {
            TooltipPlacement {
                left,
                top: frame.page_origin.y + bbox_top - (size.height + reach),
                side: TooltipSide::Above,
                arrow_left,
                arrow_top: size.height - STROKE_WIDTH,
            }
        } else {
            TooltipPlacement {
                left,
                top: frame.page_origin.y + bbox_top + bbox_height + reach,
                side: TooltipSide::Below,
                arrow_left,
                arrow_top: -reach,
            }
        })
    }
}
