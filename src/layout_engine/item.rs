use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::layout_engine::rect::Rect;

new_key_type! {
    /// Stable handle for a tracked item.
    pub struct ItemId;
}

/// How an item participates in a layout pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Repositioned by the packer on every pass.
    #[default]
    Free,
    /// Occupies space at its committed rect but is never moved.
    Pinned,
    /// Mid-drag or mid-fit: reserves space at its tentative place rect while
    /// everything else packs around it.
    Placing,
}

/// An entity tracked by the layout. The engine owns the collection; the
/// packer only ever sees the rects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutItem {
    /// Outer size including margins, as measured by the embedder.
    pub outer_width: f64,
    pub outer_height: f64,
    /// Last committed placement. Width/height mirror the packed rect size
    /// (outer size plus gutter, grid-snapped).
    pub rect: Rect,
    /// Tentative placement used while dragging or fitting.
    pub place_rect: Rect,
    pub state: ItemState,
    pub(crate) needs_positioning: bool,
    pub(crate) did_drag: bool,
}

/// Layout-level measurements needed to snap and clamp a place rect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaceContext {
    pub is_horizontal: bool,
    pub column_width: Option<f64>,
    pub row_height: Option<f64>,
    pub gutter: f64,
    pub inner_width: f64,
    pub inner_height: f64,
    pub max_y: f64,
}

impl LayoutItem {
    pub(crate) fn new(outer_width: f64, outer_height: f64) -> Self {
        LayoutItem {
            outer_width,
            outer_height,
            rect: Rect::default(),
            place_rect: Rect::default(),
            state: ItemState::Free,
            needs_positioning: false,
            did_drag: false,
        }
    }

    pub(crate) fn drag_start(&mut self, ctx: &PlaceContext) {
        self.state = ItemState::Placing;
        self.needs_positioning = false;
        self.did_drag = false;
        self.position_place_rect(self.rect.x, self.rect.y, false, ctx);
    }

    pub(crate) fn drag_move(&mut self, x: f64, y: f64, ctx: &PlaceContext) {
        self.did_drag = true;
        self.position_place_rect(x, y, false, ctx);
    }

    pub(crate) fn drag_stop(&mut self) {
        self.needs_positioning =
            self.rect.x != self.place_rect.x || self.rect.y != self.place_rect.y;
        self.did_drag = false;
    }

    pub(crate) fn commit_place_rect(&mut self) {
        self.rect.x = self.place_rect.x;
        self.rect.y = self.place_rect.y;
    }

    /// Snap and clamp the tentative rect. `is_max_y_open` lifts the clamp on
    /// the growing axis so a fit target can extend the container.
    pub(crate) fn position_place_rect(
        &mut self,
        x: f64,
        y: f64,
        is_max_y_open: bool,
        ctx: &PlaceContext,
    ) {
        self.place_rect.x = self.place_rect_coord(x, true, false, ctx);
        self.place_rect.y = self.place_rect_coord(y, false, is_max_y_open, ctx);
    }

    /// One axis of the place-rect position: snap to whole grid segments when
    /// that axis has a grid, then clamp to the parent bound unless
    /// `is_max_open`.
    fn place_rect_coord(&self, coord: f64, is_x: bool, is_max_open: bool, ctx: &PlaceContext) -> f64 {
        let size = if is_x { self.outer_width } else { self.outer_height };
        let segment = if is_x { ctx.column_width } else { ctx.row_height };
        let mut parent_size = if is_x { ctx.inner_width } else { ctx.inner_height };

        if !is_x {
            // content may already extend past the measured height
            parent_size = parent_size.max(ctx.max_y);
            // keep the gutter from bumping up the bound when rows are not on
            // a grid
            if ctx.row_height.is_none() {
                parent_size -= ctx.gutter;
            }
        }

        let mut coord = coord;
        let max;
        let scale;
        match segment {
            Some(grid) => {
                let segment = grid + ctx.gutter;
                // allow the last column to reach the edge
                if is_x {
                    parent_size += ctx.gutter;
                }
                coord = (coord / segment).round();
                // floor the bounded axis, let the growing axis round up
                let is_bounded_axis = if ctx.is_horizontal { !is_x } else { is_x };
                let mut max_segments = if is_bounded_axis {
                    (parent_size / segment).floor()
                } else {
                    (parent_size / segment).ceil()
                };
                max_segments -= (size / segment).ceil();
                max = max_segments;
                scale = segment;
            }
            None => {
                max = parent_size - size;
                scale = 1.0;
            }
        }

        if !is_max_open {
            coord = coord.min(max);
        }
        (coord * scale).max(0.0)
    }
}
