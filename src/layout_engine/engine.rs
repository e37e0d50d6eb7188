use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, instrument, trace, warn};

use crate::actor;
use crate::common::config::LayoutSettings;
use crate::layout_engine::error::LayoutError;
use crate::layout_engine::item::{ItemId, ItemState, LayoutItem, PlaceContext};
use crate::layout_engine::packer::{Packer, SortDirection};
use crate::layout_engine::rect::Rect;

/// Notifications for the embedding layer. Purely informational; the packing
/// math never depends on anyone listening.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum LayoutEvent {
    /// A full pass finished; `container_size` is the required extent along
    /// the packing axis.
    LayoutComplete { container_size: f64 },
    ItemPlaced { id: ItemId, x: f64, y: f64 },
    ItemRemoved { id: ItemId },
    FitComplete { id: ItemId },
    DragItemPositioned { id: ItemId },
}

pub type EventSender = actor::Sender<LayoutEvent>;
pub type EventReceiver = actor::Receiver<LayoutEvent>;

/// Drives tracked items through measure, pack, and extent bookkeeping. One
/// engine per laid-out container; the embedder holds it directly rather than
/// going through any global registry.
pub struct LayoutEngine {
    settings: LayoutSettings,
    items: SlotMap<ItemId, LayoutItem>,
    /// Iteration order for packing: insertion order until a drag or fit
    /// re-sorts by screen position.
    order: Vec<ItemId>,
    packer: Packer,
    inner_width: f64,
    inner_height: f64,
    max_x: f64,
    max_y: f64,
    events_tx: Option<EventSender>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    items: Vec<LayoutItem>,
}

impl LayoutEngine {
    pub fn new(settings: LayoutSettings) -> Result<Self, LayoutError> {
        settings.validate()?;
        let sort_direction = if settings.is_horizontal {
            SortDirection::RightwardTopToBottom
        } else {
            SortDirection::DownwardLeftToRight
        };
        Ok(LayoutEngine {
            settings,
            items: SlotMap::with_key(),
            order: Vec::new(),
            packer: Packer::new(0.0, 0.0, sort_direction),
            inner_width: 0.0,
            inner_height: 0.0,
            max_x: 0.0,
            max_y: 0.0,
            events_tx: None,
        })
    }

    pub fn set_events_tx(&mut self, tx: EventSender) { self.events_tx = Some(tx); }

    pub fn settings(&self) -> &LayoutSettings { &self.settings }

    fn emit(&self, event: LayoutEvent) {
        if let Some(tx) = &self.events_tx {
            tx.send(event);
        }
    }

    // ---------- tracked set ----------

    pub fn add_item(&mut self, outer_width: f64, outer_height: f64) -> Result<ItemId, LayoutError> {
        if outer_width < 0.0 || outer_height < 0.0 {
            return Err(LayoutError::InvalidDimension {
                width: outer_width,
                height: outer_height,
            });
        }
        let id = self.items.insert(LayoutItem::new(outer_width, outer_height));
        self.order.push(id);
        Ok(id)
    }

    /// Remove an item and hand its occupied region back to the packer, so the
    /// hole stays packable until the next full pass rebuilds the free list.
    pub fn remove_item(&mut self, id: ItemId) -> Result<(), LayoutError> {
        let item = self.items.remove(id).ok_or(LayoutError::UnknownItem)?;
        self.order.retain(|&other| other != id);
        self.packer.add_space(item.rect);
        self.emit(LayoutEvent::ItemRemoved { id });
        Ok(())
    }

    pub fn item(&self, id: ItemId) -> Option<&LayoutItem> { self.items.get(id) }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Current placements in iteration order.
    pub fn positions(&self) -> Vec<(ItemId, Rect)> {
        self.order.iter().map(|&id| (id, self.items[id].rect)).collect()
    }

    /// Pin an item: it keeps reserving space at its committed rect but is no
    /// longer repositioned by the packer.
    pub fn set_pinned(&mut self, id: ItemId, pinned: bool) -> Result<(), LayoutError> {
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        item.state = if pinned { ItemState::Pinned } else { ItemState::Free };
        Ok(())
    }

    /// Record an externally determined position, e.g. for pinned items whose
    /// placement the embedder controls.
    pub fn set_item_position(&mut self, id: ItemId, x: f64, y: f64) -> Result<(), LayoutError> {
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        item.rect.x = x;
        item.rect.y = y;
        Ok(())
    }

    // ---------- layout passes ----------

    /// Record a new container size. Returns whether the bounded axis changed,
    /// i.e. whether a re-layout would produce different output.
    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        let changed = if self.settings.is_horizontal {
            height != self.inner_height
        } else {
            width != self.inner_width
        };
        self.inner_width = width;
        self.inner_height = height;
        changed
    }

    /// Required container extent along the packing axis. The trailing gutter
    /// is not content.
    pub fn container_size(&self) -> f64 {
        if self.settings.is_horizontal {
            self.max_x - self.settings.gutter
        } else {
            self.max_y - self.settings.gutter
        }
    }

    fn reset_pass(&mut self) {
        let gutter = self.settings.gutter;
        if self.settings.is_horizontal {
            self.packer.width = f64::INFINITY;
            self.packer.height = self.inner_height + gutter;
            self.packer.sort_direction = SortDirection::RightwardTopToBottom;
        } else {
            self.packer.width = self.inner_width + gutter;
            self.packer.height = f64::INFINITY;
            self.packer.sort_direction = SortDirection::DownwardLeftToRight;
        }
        self.packer.reset();
        self.max_x = 0.0;
        self.max_y = 0.0;
    }

    /// Run a full layout pass: reserve pinned and in-flight items, then pack
    /// every free item in iteration order.
    #[instrument(name = "layout_engine::layout", skip(self))]
    pub fn layout(&mut self) {
        self.reset_pass();

        let stamped: Vec<ItemId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| self.items[id].state != ItemState::Free)
            .collect();
        for id in stamped {
            let rect = self.stamp_rect(id);
            self.packer.placed(&rect);
            self.update_max(&rect);
        }

        let free: Vec<ItemId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| self.items[id].state == ItemState::Free)
            .collect();
        for id in free {
            let (w, h) = {
                let item = &self.items[id];
                (item.outer_width, item.outer_height)
            };
            let mut rect = self.items[id].rect;
            self.size_rect(&mut rect, w, h);
            if !self.packer.pack(&mut rect) {
                // soft-extend the packing axis rather than dropping the item
                warn!(?id, width = rect.width, height = rect.height,
                    "no free space fits; extending layout");
                if self.settings.is_horizontal {
                    rect.x = self.max_x;
                    rect.y = 0.0;
                } else {
                    rect.x = 0.0;
                    rect.y = self.max_y;
                }
                self.packer.placed(&rect);
            }
            self.update_max(&rect);
            self.items[id].rect = rect;
            trace!(?id, x = rect.x, y = rect.y, "item placed");
            self.emit(LayoutEvent::ItemPlaced { id, x: rect.x, y: rect.y });
        }

        let container_size = self.container_size();
        debug!(items = self.order.len(), container_size, "layout pass complete");
        self.emit(LayoutEvent::LayoutComplete { container_size });
    }

    /// The reservation for a non-free item: committed rect for pinned items,
    /// tentative place rect mid-drag/fit, sized the same way movable items
    /// are.
    fn stamp_rect(&mut self, id: ItemId) -> Rect {
        let (state, mut rect, w, h) = {
            let item = &self.items[id];
            let rect = if item.state == ItemState::Placing {
                item.place_rect
            } else {
                item.rect
            };
            (item.state, rect, item.outer_width, item.outer_height)
        };
        self.size_rect(&mut rect, w, h);
        if state == ItemState::Placing {
            self.items[id].place_rect = rect;
        }
        rect
    }

    /// Size an item's rect for packing: gutter, optional grid snap, and a
    /// clamp to the bounded dimension so no item is unplaceable.
    fn size_rect(&self, rect: &mut Rect, outer_width: f64, outer_height: f64) {
        let mut w = outer_width;
        let mut h = outer_height;
        // zero-size items skip grid snapping but still occupy a zero-area
        // rect
        if w != 0.0 || h != 0.0 {
            w = apply_grid_gutter(w, self.settings.column_width, self.settings.gutter);
            h = apply_grid_gutter(h, self.settings.row_height, self.settings.gutter);
        }
        rect.width = w.min(self.packer.width);
        rect.height = h.min(self.packer.height);
    }

    fn update_max(&mut self, rect: &Rect) {
        self.max_x = self.max_x.max(rect.x + rect.width);
        self.max_y = self.max_y.max(rect.y + rect.height);
    }

    fn place_context(&self) -> PlaceContext {
        PlaceContext {
            is_horizontal: self.settings.is_horizontal,
            column_width: self.settings.column_width,
            row_height: self.settings.row_height,
            gutter: self.settings.gutter,
            inner_width: self.inner_width,
            inner_height: self.inner_height,
            max_y: self.max_y,
        }
    }

    // ---------- drag ----------

    /// Begin dragging: the item turns into a stamp at its current position so
    /// subsequent passes pack everything else around it.
    pub fn item_drag_start(&mut self, id: ItemId) -> Result<(), LayoutError> {
        let ctx = self.place_context();
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        item.drag_start(&ctx);
        trace!(?id, "drag start");
        Ok(())
    }

    /// Track the pointer during a drag. Re-packing around the moved stamp is
    /// the caller's (debounced) responsibility.
    pub fn item_drag_move(&mut self, id: ItemId, x: f64, y: f64) -> Result<(), LayoutError> {
        let ctx = self.place_context();
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        item.drag_move(x, y, &ctx);
        Ok(())
    }

    /// Finish a drag: commit the tentative position, release the stamp, and
    /// re-sort iteration order by final screen position.
    pub fn item_drag_end(&mut self, id: ItemId) -> Result<(), LayoutError> {
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        let did_drag = item.did_drag;
        item.drag_stop();
        let needs_positioning = item.needs_positioning;

        if !did_drag && !needs_positioning {
            // never moved; release the stamp and call it a day
            item.state = ItemState::Free;
            trace!(?id, "drag end without movement");
            return Ok(());
        }

        if !needs_positioning {
            item.commit_place_rect();
        }
        // repack everything else around the reservation
        self.layout();

        let item = &mut self.items[id];
        item.state = ItemState::Free;
        item.commit_place_rect();
        item.needs_positioning = false;
        self.sort_items_by_position();
        trace!(?id, "drag end");
        if needs_positioning {
            self.emit(LayoutEvent::DragItemPositioned { id });
        }
        Ok(())
    }

    /// Reserve an item at a target position and pack everything else around
    /// it. Unlike a drag, the growing axis may extend past the current
    /// container, so an item can be fitted below all existing content.
    #[instrument(name = "layout_engine::fit", skip(self))]
    pub fn fit(&mut self, id: ItemId, x: Option<f64>, y: Option<f64>) -> Result<(), LayoutError> {
        let ctx = self.place_context();
        let item = self.items.get_mut(id).ok_or(LayoutError::UnknownItem)?;
        item.state = ItemState::Placing;
        let x = x.unwrap_or(item.rect.x);
        let y = y.unwrap_or(item.rect.y);
        item.position_place_rect(x, y, true, &ctx);

        self.layout();

        let item = &mut self.items[id];
        item.state = ItemState::Free;
        item.commit_place_rect();
        self.sort_items_by_position();
        self.emit(LayoutEvent::FitComplete { id });
        Ok(())
    }

    /// Reorder iteration by final screen position so passes after a drag stay
    /// stable.
    pub fn sort_items_by_position(&mut self) {
        let items = &self.items;
        if self.settings.is_horizontal {
            self.order.sort_by(|&a, &b| {
                items[a].rect.x.total_cmp(&items[b].rect.x)
                    .then(items[a].rect.y.total_cmp(&items[b].rect.y))
            });
        } else {
            self.order.sort_by(|&a, &b| {
                items[a].rect.y.total_cmp(&items[b].rect.y)
                    .then(items[a].rect.x.total_cmp(&items[b].rect.x))
            });
        }
    }

    // ---------- persistence ----------

    /// Snapshot the tracked set (sizes, committed rects, states, order) to a
    /// RON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let snapshot = Snapshot {
            items: self.order.iter().map(|&id| self.items[id].clone()).collect(),
        };
        let data = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default())?;
        std::fs::write(path.as_ref(), data)
            .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Replace the tracked set from a snapshot. Ids are freshly allocated;
    /// the next pass recomputes placements.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let data = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        let snapshot: Snapshot = ron::from_str(&data)?;
        self.items.clear();
        self.order.clear();
        for item in snapshot.items {
            let id = self.items.insert(item);
            self.order.push(id);
        }
        debug!(items = self.order.len(), "layout state restored");
        Ok(())
    }
}

/// Round a measurement up to whole grid segments (cell size plus gutter).
/// Sub-pixel remainders snap to the nearest segment instead of always up, so
/// fractional measurements don't push an exact fit into an extra cell.
fn apply_grid_gutter(measurement: f64, grid: Option<f64>, gutter: f64) -> f64 {
    let Some(grid) = grid else {
        return measurement + gutter;
    };
    let segment = grid + gutter;
    let remainder = measurement % segment;
    let segments = measurement / segment;
    let segments = if remainder != 0.0 && remainder < 1.0 {
        segments.round()
    } else {
        segments.ceil()
    };
    segments * segment
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actor;

    fn settings() -> LayoutSettings {
        LayoutSettings {
            gutter: 10.0,
            ..LayoutSettings::default()
        }
    }

    fn engine() -> LayoutEngine {
        let mut engine = LayoutEngine::new(settings()).unwrap();
        engine.resize(300.0, 400.0);
        engine
    }

    fn xy(engine: &LayoutEngine, id: ItemId) -> (f64, f64) {
        let rect = engine.item(id).unwrap().rect;
        (rect.x, rect.y)
    }

    #[test]
    fn vertical_pass_wraps_when_the_row_fills_up() {
        let mut engine = engine();
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        let c = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        // bounded width 310 (inner + gutter); 110-wide rects: two per row
        assert_eq!(xy(&engine, a), (0.0, 0.0));
        assert_eq!(xy(&engine, b), (110.0, 0.0));
        assert_eq!(xy(&engine, c), (0.0, 60.0));
        assert_eq!(engine.container_size(), 110.0);
    }

    #[test]
    fn horizontal_pass_stacks_down_the_bounded_column() {
        let mut engine = LayoutEngine::new(LayoutSettings {
            is_horizontal: true,
            gutter: 10.0,
            ..LayoutSettings::default()
        })
        .unwrap();
        engine.resize(400.0, 300.0);
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        let c = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        assert_eq!(xy(&engine, a), (0.0, 0.0));
        assert_eq!(xy(&engine, b), (0.0, 60.0));
        assert_eq!(xy(&engine, c), (0.0, 120.0));
        assert_eq!(engine.container_size(), 100.0);
    }

    #[test]
    fn grid_snapping_rounds_sizes_up_to_whole_segments() {
        let mut engine = LayoutEngine::new(LayoutSettings {
            column_width: Some(60.0),
            gutter: 10.0,
            ..LayoutSettings::default()
        })
        .unwrap();
        engine.resize(300.0, 400.0);
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        // 100 snaps up to 2 segments of 70 = 140 wide; two fit in 310
        assert_eq!(engine.item(a).unwrap().rect.width, 140.0);
        assert_eq!(xy(&engine, a), (0.0, 0.0));
        assert_eq!(xy(&engine, b), (140.0, 0.0));
    }

    #[test]
    fn zero_size_items_occupy_nothing() {
        let mut engine = engine();
        let ghost = engine.add_item(0.0, 0.0).unwrap();
        let solid = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        // the zero-area rect leaves the free list untouched
        assert_eq!(xy(&engine, ghost), (0.0, 0.0));
        assert_eq!(xy(&engine, solid), (0.0, 0.0));
        assert_eq!(engine.container_size(), 50.0);
    }

    #[test]
    fn oversized_items_are_clamped_to_the_bounded_axis() {
        let mut engine = engine();
        let wide = engine.add_item(900.0, 50.0).unwrap();
        engine.layout();

        assert_eq!(engine.item(wide).unwrap().rect.width, 310.0);
        assert_eq!(xy(&engine, wide), (0.0, 0.0));
    }

    #[test]
    fn pinned_items_reserve_space_before_packing() {
        let mut engine = engine();
        let pinned = engine.add_item(100.0, 50.0).unwrap();
        let movable = engine.add_item(100.0, 50.0).unwrap();
        engine.set_pinned(pinned, true).unwrap();
        engine.layout();

        // pinned stays at its committed origin; the movable item packs
        // around the reservation
        assert_eq!(xy(&engine, pinned), (0.0, 0.0));
        assert_eq!(xy(&engine, movable), (110.0, 0.0));
    }

    #[test]
    fn layout_emits_placement_and_completion_events() {
        let (tx, mut rx) = actor::channel();
        let mut engine = engine();
        engine.set_events_tx(tx);
        let a = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        let mut events = Vec::new();
        while let Ok((_span, event)) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], LayoutEvent::ItemPlaced { id, .. } if id == a));
        assert!(
            matches!(events[1], LayoutEvent::LayoutComplete { container_size } if container_size == 50.0)
        );
    }

    #[test]
    fn drag_end_repacks_around_the_drop_and_resorts_by_position() {
        let mut engine = engine();
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        let c = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();
        assert_eq!(xy(&engine, c), (0.0, 60.0));

        engine.item_drag_start(c).unwrap();
        engine.item_drag_move(c, 5.0, 2.0).unwrap();
        engine.item_drag_end(c).unwrap();

        // c holds its drop point; a and b flow around the stamp
        assert_eq!(xy(&engine, c), (5.0, 2.0));
        assert_eq!(xy(&engine, a), (115.0, 0.0));
        assert_eq!(xy(&engine, b), (115.0, 60.0));
        // iteration order now follows screen position: a, c, b
        let order: Vec<ItemId> = engine.positions().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, c, b]);
    }

    #[test]
    fn drag_without_movement_changes_nothing() {
        let mut engine = engine();
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();
        let before = engine.positions();

        engine.item_drag_start(b).unwrap();
        engine.item_drag_end(b).unwrap();

        assert_eq!(engine.positions(), before);
        assert_eq!(engine.item(a).unwrap().state, ItemState::Free);
        assert_eq!(engine.item(b).unwrap().state, ItemState::Free);
    }

    #[test]
    fn fit_can_extend_the_container_downward() {
        let (tx, mut rx) = actor::channel();
        let mut engine = engine();
        engine.set_events_tx(tx);
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        engine.fit(b, Some(0.0), Some(500.0)).unwrap();

        assert_eq!(xy(&engine, b), (0.0, 500.0));
        assert_eq!(xy(&engine, a), (0.0, 0.0));
        assert_eq!(engine.container_size(), 550.0);

        let mut saw_fit_complete = false;
        while let Ok((_span, event)) = rx.try_recv() {
            if matches!(event, LayoutEvent::FitComplete { id } if id == b) {
                saw_fit_complete = true;
            }
        }
        assert!(saw_fit_complete);
    }

    #[test]
    fn removing_an_item_frees_its_space_and_reflows() {
        let mut engine = engine();
        let a = engine.add_item(100.0, 50.0).unwrap();
        let b = engine.add_item(100.0, 50.0).unwrap();
        let c = engine.add_item(100.0, 50.0).unwrap();
        engine.layout();

        engine.remove_item(b).unwrap();
        assert_eq!(engine.len(), 2);
        engine.layout();

        // c moves up into the vacated slot next to a
        assert_eq!(xy(&engine, a), (0.0, 0.0));
        assert_eq!(xy(&engine, c), (110.0, 0.0));
    }

    #[test]
    fn unknown_item_operations_fail() {
        let mut engine = engine();
        let a = engine.add_item(100.0, 50.0).unwrap();
        engine.remove_item(a).unwrap();
        assert_eq!(engine.remove_item(a), Err(LayoutError::UnknownItem));
        assert_eq!(engine.item_drag_start(a), Err(LayoutError::UnknownItem));
        assert_eq!(engine.fit(a, None, None), Err(LayoutError::UnknownItem));
    }

    #[test]
    fn negative_item_sizes_are_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.add_item(-1.0, 5.0),
            Err(LayoutError::InvalidDimension { width: -1.0, height: 5.0 })
        );
    }

    #[test]
    fn resize_reports_bounded_axis_changes_only() {
        let mut engine = engine();
        assert!(!engine.resize(300.0, 999.0)); // height is the growing axis
        assert!(engine.resize(280.0, 999.0));
        assert!(!engine.resize(280.0, 400.0));
    }

    #[test]
    fn snapshot_round_trips_the_tracked_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.ron");

        let mut engine = engine();
        engine.add_item(100.0, 50.0).unwrap();
        engine.add_item(80.0, 40.0).unwrap();
        engine.layout();
        let before: Vec<Rect> =
            engine.positions().into_iter().map(|(_, rect)| rect).collect();
        engine.save(&path).unwrap();

        let mut restored = LayoutEngine::new(settings()).unwrap();
        restored.restore(&path).unwrap();
        let after: Vec<Rect> =
            restored.positions().into_iter().map(|(_, rect)| rect).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn apply_grid_gutter_rounds_as_documented() {
        assert_eq!(apply_grid_gutter(100.0, None, 10.0), 110.0);
        assert_eq!(apply_grid_gutter(100.0, Some(60.0), 10.0), 140.0);
        assert_eq!(apply_grid_gutter(70.0, Some(60.0), 10.0), 70.0);
        // a sub-pixel overhang rounds back down instead of adding a segment
        assert_eq!(apply_grid_gutter(70.5, Some(60.0), 10.0), 70.0);
        assert_eq!(apply_grid_gutter(72.0, Some(60.0), 10.0), 140.0);
    }
}
