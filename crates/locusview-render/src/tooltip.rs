//! Tooltip boxes and their placement relative to the datum they describe.
//!
//! All placements are computed in page coordinates. Anchors are given in clip-area coordinates
//! together with the page position of the clip area's top-left corner.

use crate::geom::{Point, Rect, Size};
use locusview_core::Row;
use serde::{Deserialize, Serialize};

/// Size of the connecting arrow, in pixels.
pub const ARROW_WIDTH: f64 = 7.0;
/// Border width of the tooltip box.
pub const STROKE_WIDTH: f64 = 1.0;

/// Where the tooltip body sits relative to its anchor. The arrow points the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipSide {
    Left,
    Right,
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipPlacement {
    pub left: f64,
    pub top: f64,
    pub side: TooltipSide,
    /// Arrow offset from the box's top-left corner.
    pub arrow_left: f64,
    pub arrow_top: f64,
}

impl TooltipPlacement {
    /// Shifts the box so it lies inside `viewport`, moving the arrow by the opposite amount so it
    /// keeps pointing at the same screen point. A box larger than the viewport is aligned to the
    /// viewport's top/left edge.
    pub fn clamp_to(mut self, size: Size, viewport: Rect) -> Self {
        let dx = shift_into(self.left, size.width, viewport.min_x(), viewport.max_x());
        let dy = shift_into(self.top, size.height, viewport.min_y(), viewport.max_y());
        self.left += dx;
        self.arrow_left -= dx;
        self.top += dy;
        self.arrow_top -= dy;
        self
    }

    /// The screen point the arrow is attached to.
    pub fn arrow_origin(&self) -> Point {
        crate::geom::point(self.left + self.arrow_left, self.top + self.arrow_top)
    }
}

fn shift_into(start: f64, extent: f64, min: f64, max: f64) -> f64 {
    if start < min || extent > max - min {
        min - start
    } else if start + extent > max {
        max - (start + extent)
    } else {
        0.0
    }
}

/// Places the box to the left or right of `anchor`, whichever side has more room, centred
/// vertically unless that would cross the clip area's top or bottom edge.
///
/// `offset` is the distance from the anchor to the edge of the marker (a point's radius).
pub fn place_beside(
    anchor: Point,
    page_origin: Point,
    clip: Size,
    tooltip: Size,
    offset: f64,
) -> TooltipPlacement {
    let gap = offset + ARROW_WIDTH + STROKE_WIDTH;
    let (left, side, arrow_left) = if anchor.x <= clip.width / 2.0 {
        (
            page_origin.x + anchor.x + gap,
            TooltipSide::Right,
            -(ARROW_WIDTH + STROKE_WIDTH),
        )
    } else {
        (
            page_origin.x + anchor.x - tooltip.width - gap,
            TooltipSide::Left,
            tooltip.width - STROKE_WIDTH,
        )
    };

    let (top, arrow_top) = if anchor.y - tooltip.height / 2.0 <= 0.0 {
        (page_origin.y + anchor.y - 1.5 * ARROW_WIDTH - 6.0, 6.0)
    } else if anchor.y + tooltip.height / 2.0 >= clip.height {
        (
            page_origin.y + anchor.y + ARROW_WIDTH + 6.0 - tooltip.height,
            tooltip.height - 2.0 * ARROW_WIDTH - 6.0,
        )
    } else {
        (
            page_origin.y + anchor.y - tooltip.height / 2.0,
            tooltip.height / 2.0 - ARROW_WIDTH,
        )
    };

    TooltipPlacement {
        left,
        top,
        side,
        arrow_left,
        arrow_top,
    }
}

/// Horizontal centring on `x`, pushed inward when the box would cross either clip edge.
/// Returns the box's page `left` and the arrow offset before `arrow_inset` is subtracted.
pub(crate) fn center_on(x: f64, page_x: f64, clip_width: f64, width: f64) -> (f64, f64) {
    let offset_right = (width / 2.0 - x).max(0.0);
    let offset_left = (width / 2.0 + x - clip_width).max(0.0);
    let left = page_x + x - width / 2.0 - offset_left + offset_right;
    let arrow_left = width / 2.0 + offset_left - offset_right;
    (left, arrow_left)
}

/// Places the box above or below `anchor`, below when there is no room above.
pub fn place_above_below(
    anchor: Point,
    page_origin: Point,
    clip: Size,
    tooltip: Size,
    stroke: f64,
) -> TooltipPlacement {
    let (left, arrow_left) = center_on(anchor.x, page_origin.x, clip.width, tooltip.width);
    let arrow_left = (arrow_left - ARROW_WIDTH).clamp(
        ARROW_WIDTH / 2.0,
        (tooltip.width - 2.5 * ARROW_WIDTH).max(ARROW_WIDTH / 2.0),
    );
    let reach = stroke + ARROW_WIDTH;
    if tooltip.height + reach > anchor.y {
        TooltipPlacement {
            left,
            top: page_origin.y + anchor.y + reach,
            side: TooltipSide::Below,
            arrow_left,
            arrow_top: -reach,
        }
    } else {
        TooltipPlacement {
            left,
            top: page_origin.y + anchor.y - (tooltip.height + reach),
            side: TooltipSide::Above,
            arrow_left,
            arrow_top: tooltip.height - stroke,
        }
    }
}

/// A materialized tooltip owned by a data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tooltip {
    pub id: String,
    pub datum: Row,
    pub html: String,
    pub size: Size,
    /// Cursor position in clip-area coordinates when the tooltip was requested, if any.
    pub cursor: Option<Point>,
    pub placement: Option<TooltipPlacement>,
}
