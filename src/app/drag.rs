use std::mem;

use ratatui::layout::Rect;

use crate::links::{LinkId, LinkStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    Pointer,
    Keyboard,
}

/// Screen rows occupied by one visible list position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlot {
    pub top: u16,
    pub height: u16,
}

impl RowSlot {
    /// Doubled centre so odd heights stay on the integer grid.
    fn center2(&self) -> u32 {
        2 * u32::from(self.top) + u32::from(self.height)
    }
}

/// Geometry of the rendered list, captured on every draw for hit-testing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListLayout {
    pub area: Rect,
    /// Store position drawn in the first slot.
    pub first: usize,
    pub slots: Vec<RowSlot>,
    /// Leading columns of each row that act as the drag handle.
    pub handle_width: u16,
}

impl ListLayout {
    pub fn on_handle(&self, column: u16) -> bool {
        column >= self.area.x && column < self.area.x.saturating_add(self.handle_width)
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        let area = self.area;
        column >= area.x
            && column < area.x.saturating_add(area.width)
            && row >= area.y
            && row < area.y.saturating_add(area.height)
    }

    /// Store position of the row drawn at screen `row`.
    pub fn slot_at(&self, row: u16) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| row >= slot.top && row < slot.top.saturating_add(slot.height))
            .map(|idx| self.first + idx)
    }

    /// Store position whose row centre is closest to `row`. Earlier rows win
    /// ties.
    pub fn nearest_slot(&self, row: u16) -> Option<usize> {
        let pointer2 = 2 * u32::from(row) + 1;
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| slot.center2().abs_diff(pointer2))
            .map(|(idx, _)| self.first + idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging {
        active: LinkId,
        over: Option<LinkId>,
        source: DragSource,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Reordered { from: usize, to: usize },
    Unchanged,
    Cancelled,
}

/// Tracks one drag gesture by row id and turns its completion into at most
/// one `reorder` on the live store.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn active(&self) -> Option<LinkId> {
        match self.state {
            DragState::Dragging { active, .. } => Some(active),
            DragState::Idle => None,
        }
    }

    pub fn over(&self) -> Option<LinkId> {
        match self.state {
            DragState::Dragging { over, .. } => over,
            DragState::Idle => None,
        }
    }

    pub fn source(&self) -> Option<DragSource> {
        match self.state {
            DragState::Dragging { source, .. } => Some(source),
            DragState::Idle => None,
        }
    }

    /// Starts a gesture on `active`. Any gesture already running is replaced.
    pub fn begin(&mut self, active: LinkId, source: DragSource) {
        tracing::debug!(%active, ?source, "drag started");
        self.state = DragState::Dragging {
            active,
            over: Some(active),
            source,
        };
    }

    /// Retargets a pointer drag. Outside the list there is no drop target.
    pub fn pointer_moved(&mut self, column: u16, row: u16, layout: &ListLayout, ids: &[LinkId]) {
        let DragState::Dragging { over, .. } = &mut self.state else {
            return;
        };
        *over = if layout.contains(column, row) {
            layout
                .nearest_slot(row)
                .and_then(|slot| ids.get(slot).copied())
        } else {
            None
        };
    }

    /// Moves the keyboard drop target by `delta` positions, clamped to the list.
    pub fn step(&mut self, delta: isize, ids: &[LinkId]) {
        let DragState::Dragging { active, over, .. } = &mut self.state else {
            return;
        };
        if ids.is_empty() {
            *over = None;
            return;
        }
        let anchor = over.unwrap_or(*active);
        let Some(current) = ids.iter().position(|id| *id == anchor) else {
            *over = None;
            return;
        };
        let last = ids.len() as isize - 1;
        let next = (current as isize + delta).clamp(0, last) as usize;
        *over = Some(ids[next]);
    }

    pub fn cancel(&mut self) -> DropOutcome {
        if let DragState::Dragging { active, .. } = mem::take(&mut self.state) {
            tracing::debug!(%active, "drag cancelled");
        }
        DropOutcome::Cancelled
    }

    /// Completes the gesture. Both ids are resolved against the live store
    /// right now, never from positions seen when the drag began.
    pub fn drop_on(&mut self, store: &mut LinkStore) -> Result<DropOutcome, StoreError> {
        let DragState::Dragging { active, over, .. } = mem::take(&mut self.state) else {
            return Ok(DropOutcome::Cancelled);
        };
        let Some(over) = over else {
            tracing::debug!(%active, "dropped outside any target");
            return Ok(DropOutcome::Cancelled);
        };
        let (Some(from), Some(to)) = (store.position_of(active), store.position_of(over)) else {
            tracing::debug!(%active, %over, "drag row no longer present");
            return Ok(DropOutcome::Cancelled);
        };
        if from == to {
            return Ok(DropOutcome::Unchanged);
        }
        store.reorder(from, to)?;
        tracing::debug!(from, to, "drag dropped");
        Ok(DropOutcome::Reordered { from, to })
    }

    /// Display order while dragging: the active row shown at the target slot.
    /// The store itself is untouched until the drop.
    pub fn preview_order(&self, ids: &[LinkId]) -> Vec<LinkId> {
        let mut order = ids.to_vec();
        let DragState::Dragging {
            active,
            over: Some(over),
            ..
        } = self.state
        else {
            return order;
        };
        let from = order.iter().position(|id| *id == active);
        let to = order.iter().position(|id| *id == over);
        if let (Some(from), Some(to)) = (from, to) {
            let moved = order.remove(from);
            order.insert(to, moved);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{LinkRecord, Platform};
    use assert_matches::assert_matches;

    fn store_of(n: usize) -> LinkStore {
        LinkStore::from_records((0..n).map(|i| LinkRecord {
            platform: Platform::Github,
            link: format!("https://github.com/{i}"),
        }))
    }

    fn layout(rows: usize) -> ListLayout {
        ListLayout {
            area: Rect::new(0, 2, 40, (rows * 4) as u16),
            first: 0,
            slots: (0..rows)
                .map(|i| RowSlot {
                    top: 2 + (i * 4) as u16,
                    height: 4,
                })
                .collect(),
            handle_width: 3,
        }
    }

    #[test]
    fn nearest_slot_uses_row_centres() {
        let layout = layout(3);
        assert_eq!(layout.nearest_slot(2), Some(0));
        assert_eq!(layout.nearest_slot(5), Some(0));
        assert_eq!(layout.nearest_slot(6), Some(1));
        assert_eq!(layout.nearest_slot(13), Some(2));
        assert_eq!(layout.nearest_slot(40), Some(2));
        assert_eq!(ListLayout::default().nearest_slot(3), None);
    }

    #[test]
    fn scrolled_layout_maps_to_store_positions() {
        let layout = ListLayout {
            first: 3,
            ..layout(2)
        };
        assert_eq!(layout.slot_at(7), Some(4));
        assert_eq!(layout.nearest_slot(2), Some(3));
        assert!(layout.on_handle(2));
        assert!(!layout.on_handle(3));
    }

    #[test]
    fn pointer_drop_issues_single_reorder() -> anyhow::Result<()> {
        let mut store = store_of(3);
        let ids = store.ids();
        let layout = layout(3);
        let notices = store.subscribe();
        let mut drag = DragController::new();

        drag.begin(ids[0], DragSource::Pointer);
        drag.pointer_moved(5, 7, &layout, &ids);
        drag.pointer_moved(5, 12, &layout, &ids);
        assert_eq!(drag.over(), Some(ids[2]));
        assert_eq!(drag.preview_order(&ids), vec![ids[1], ids[2], ids[0]]);
        assert_eq!(store.ids(), ids);

        assert_eq!(drag.drop_on(&mut store)?, DropOutcome::Reordered { from: 0, to: 2 });
        assert_eq!(store.ids(), vec![ids[1], ids[2], ids[0]]);
        assert_eq!(notices.try_iter().count(), 1);
        assert!(!drag.is_dragging());
        Ok(())
    }

    #[test]
    fn drop_outside_list_leaves_store_untouched() -> anyhow::Result<()> {
        let mut store = store_of(2);
        let ids = store.ids();
        let layout = layout(2);
        let notices = store.subscribe();
        let mut drag = DragController::new();

        drag.begin(ids[1], DragSource::Pointer);
        drag.pointer_moved(5, 3, &layout, &ids);
        drag.pointer_moved(80, 3, &layout, &ids);
        assert_eq!(drag.over(), None);
        assert_eq!(drag.preview_order(&ids), ids);

        assert_eq!(drag.drop_on(&mut store)?, DropOutcome::Cancelled);
        assert_eq!(store.ids(), ids);
        assert_eq!(notices.try_iter().count(), 0);
        Ok(())
    }

    #[test]
    fn dropping_on_itself_is_not_a_reorder() -> anyhow::Result<()> {
        let mut store = store_of(2);
        let before = store.revision();
        let mut drag = DragController::new();
        drag.begin(store.ids()[0], DragSource::Keyboard);
        assert_eq!(drag.drop_on(&mut store)?, DropOutcome::Unchanged);
        assert_eq!(store.revision(), before);
        Ok(())
    }

    #[test]
    fn keyboard_steps_clamp_to_bounds() -> anyhow::Result<()> {
        let mut store = store_of(3);
        let ids = store.ids();
        let mut drag = DragController::new();
        drag.begin(ids[1], DragSource::Keyboard);
        drag.step(-1, &ids);
        drag.step(-1, &ids);
        assert_eq!(drag.over(), Some(ids[0]));
        drag.step(5, &ids);
        assert_eq!(drag.over(), Some(ids[2]));
        assert_eq!(drag.drop_on(&mut store)?, DropOutcome::Reordered { from: 1, to: 2 });
        assert_eq!(store.ids(), vec![ids[0], ids[2], ids[1]]);
        Ok(())
    }

    #[test]
    fn positions_resolve_against_live_store_at_drop() -> anyhow::Result<()> {
        let mut store = store_of(4);
        let ids = store.ids();
        let mut drag = DragController::new();
        drag.begin(ids[3], DragSource::Keyboard);
        drag.step(-2, &ids);
        assert_eq!(drag.over(), Some(ids[1]));

        // A row above both shifts every position down by one mid-gesture.
        store.remove_entry(0)?;
        assert_eq!(drag.drop_on(&mut store)?, DropOutcome::Reordered { from: 2, to: 0 });
        assert_eq!(store.ids(), vec![ids[3], ids[1], ids[2]]);
        Ok(())
    }

    #[test]
    fn removed_active_row_cancels_drop() -> anyhow::Result<()> {
        let mut store = store_of(3);
        let ids = store.ids();
        let mut drag = DragController::new();
        drag.begin(ids[2], DragSource::Keyboard);
        drag.step(-1, &ids);
        store.remove_entry(2)?;
        assert_matches!(drag.drop_on(&mut store), Ok(DropOutcome::Cancelled));
        assert_eq!(store.ids(), vec![ids[0], ids[1]]);
        Ok(())
    }

    #[test]
    fn cancel_mid_drag_issues_nothing() {
        let store = store_of(3);
        let ids = store.ids();
        let before = store.revision();
        let mut drag = DragController::new();
        drag.begin(ids[0], DragSource::Keyboard);
        drag.step(2, &ids);
        assert_eq!(drag.cancel(), DropOutcome::Cancelled);
        assert_eq!(store.revision(), before);
        assert!(drag.active().is_none());
    }
}
