use serde::{Deserialize, Serialize};

use crate::layout_engine::error::LayoutError;

/// Axis-aligned rectangle in layout coordinates. A plain value type: copies
/// never alias, and both the free-space list and committed item placements
/// hold their own `Rect`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Negative dimensions are rejected outright; coercing them to zero would
    /// corrupt the containment and overlap math downstream.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Rect, LayoutError> {
        if width < 0.0 || height < 0.0 {
            return Err(LayoutError::InvalidDimension { width, height });
        }
        Ok(Rect { x, y, width, height })
    }

    pub fn right(&self) -> f64 { self.x + self.width }

    pub fn bottom(&self) -> f64 { self.y + self.height }

    /// Whether this rect wholly encloses `other`. Non-strict: touching edges
    /// count, and a zero-size `other` is treated as a point.
    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.x + other.width
            && self.bottom() >= other.y + other.height
    }

    /// Whether the open interiors intersect. Sharing only an edge is not an
    /// overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// The maximal free strips of this rect left uncovered by `occupant`.
    ///
    /// Returns `None` when the rects do not overlap at all, which tells the
    /// caller to keep the original rect. `Some(vec![])` means the occupant
    /// covers this rect entirely. The top/right/bottom/left strips are each
    /// computed independently and may overlap one another; that redundancy is
    /// pruned later by the packer's merge pass.
    pub fn maximal_free_rects(&self, occupant: &Rect) -> Option<Vec<Rect>> {
        if !self.overlaps(occupant) {
            return None;
        }

        let mut free = Vec::with_capacity(4);

        // top
        if self.y < occupant.y {
            free.push(Rect {
                x: self.x,
                y: self.y,
                width: self.width,
                height: occupant.y - self.y,
            });
        }
        // right
        if self.right() > occupant.right() {
            free.push(Rect {
                x: occupant.right(),
                y: self.y,
                width: self.right() - occupant.right(),
                height: self.height,
            });
        }
        // bottom
        if self.bottom() > occupant.bottom() {
            free.push(Rect {
                x: self.x,
                y: occupant.bottom(),
                width: self.width,
                height: self.bottom() - occupant.bottom(),
            });
        }
        // left
        if self.x < occupant.x {
            free.push(Rect {
                x: self.x,
                y: self.y,
                width: occupant.x - self.x,
                height: self.height,
            });
        }

        Some(free)
    }

    /// Exact dimensional fit test. The packer layers its sub-pixel tolerance
    /// on top of this; the predicate itself stays strict.
    pub fn can_fit(&self, other: &Rect) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}
