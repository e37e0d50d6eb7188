use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::layout_engine::rect::Rect;

/// Tolerance applied when matching a rect against a free space. Fractional
/// outer sizes measured by the embedding layer can come back a hair larger
/// than the space they were packed out of; without the slack, near-exact fits
/// spill onto the next row.
pub(crate) const FIT_TOLERANCE: f64 = 1.0;

/// Scan/sort order for the free-space list. Ties always break on the
/// secondary axis, ascending.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Top to bottom, then left to right. Used for vertical packing.
    #[default]
    DownwardLeftToRight,
    /// Left to right, then top to bottom. Used for horizontal packing.
    RightwardTopToBottom,
}

impl SortDirection {
    fn compare(self, a: &Rect, b: &Rect) -> Ordering {
        match self {
            SortDirection::DownwardLeftToRight => {
                a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
            }
            SortDirection::RightwardTopToBottom => {
                a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
            }
        }
    }
}

/// First-fit free-space packer. Owns the set of candidate free regions inside
/// the bounding area; `spaces` stays pairwise containment-free and sorted by
/// `sort_direction` between operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packer {
    /// Bounding width; may be `f64::INFINITY` for horizontal packing.
    pub width: f64,
    /// Bounding height; may be `f64::INFINITY` for vertical packing.
    pub height: f64,
    pub sort_direction: SortDirection,
    spaces: Vec<Rect>,
}

impl Packer {
    pub fn new(width: f64, height: f64, sort_direction: SortDirection) -> Self {
        let mut packer = Packer {
            width,
            height,
            sort_direction,
            spaces: Vec::new(),
        };
        packer.reset();
        packer
    }

    /// Discard all free-space state and start over with a single rect spanning
    /// the full bounding area. Must run before every layout pass.
    pub fn reset(&mut self) {
        self.spaces.clear();
        self.spaces.push(Rect {
            x: 0.0,
            y: 0.0,
            width: self.width,
            height: self.height,
        });
    }

    pub fn spaces(&self) -> &[Rect] { &self.spaces }

    fn fits(space: &Rect, rect: &Rect) -> bool {
        space.width >= rect.width - FIT_TOLERANCE && space.height >= rect.height - FIT_TOLERANCE
    }

    /// Move `rect` to the origin of the first free space that can hold it and
    /// commit the occupied region. First-fit in the current scan order, not
    /// best-fit: deterministic and cheap, not globally optimal. Returns
    /// `false` with `rect` untouched when no space fits; the caller decides
    /// how to handle the overflow.
    pub fn pack(&mut self, rect: &mut Rect) -> bool {
        let Some(space) = self.spaces.iter().find(|space| Self::fits(space, rect)) else {
            return false;
        };
        rect.x = space.x;
        rect.y = space.y;
        let occupied = *rect;
        self.placed(&occupied);
        true
    }

    /// Recompute the free-space list after `rect` occupies a region, whether
    /// it got there through `pack` or was reserved externally (pinned or
    /// mid-drag items). Every overlapped space is replaced by its maximal
    /// free strips; untouched spaces are kept.
    pub fn placed(&mut self, rect: &Rect) {
        let mut revised = Vec::with_capacity(self.spaces.len() + 3);
        for space in &self.spaces {
            match space.maximal_free_rects(rect) {
                Some(strips) => revised.extend(strips),
                None => revised.push(*space),
            }
        }
        self.spaces = revised;
        self.merge_sort_spaces();
    }

    /// Return a freed region (e.g. from a removed item) to the free list.
    pub fn add_space(&mut self, rect: Rect) {
        self.spaces.push(rect);
        self.merge_sort_spaces();
    }

    /// Prune redundant free rects, then restore scan order. Idempotent.
    pub fn merge_sort_spaces(&mut self) {
        merge_rects(&mut self.spaces);
        let direction = self.sort_direction;
        self.spaces.sort_by(|a, b| direction.compare(a, b));
    }
}

/// Remove every rect wholly contained in another, in place. The pairwise scan
/// is order-sensitive: when two rects contain each other (i.e. they are
/// equal), the one earlier in the list survives.
fn merge_rects(rects: &mut Vec<Rect>) {
    let mut i = 0;
    while i < rects.len() {
        let rect = rects[i];
        let mut j = 0;
        while j < rects.len() {
            if i != j && rect.contains(&rects[j]) {
                rects.remove(j);
                if j < i {
                    i -= 1;
                }
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}
