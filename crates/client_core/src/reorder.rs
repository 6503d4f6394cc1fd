//! Drag-and-drop reordering of the displayed day, independent of any UI toolkit.
//!
//! Pointer and keyboard gestures both end in a [`DropOutcome`], which is applied
//! with the same remove-then-insert splice.

use shared::domain::{Activity, ActivityId};
use tracing::debug;

/// Pointer travel, in pixels, before a press turns into a drag.
pub const DEFAULT_ACTIVATION_DISTANCE_PX: f32 = 8.0;

/// Moves the item at `from` to `to`, shifting the items in between by one.
///
/// Returns `false` and leaves `items` untouched when either index is out of range.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Index of the slot whose center is nearest to `dragged`'s center.
/// Ties go to the lower index.
pub fn closest_center(dragged: &Rect, slots: &[(ActivityId, Rect)]) -> Option<usize> {
    let center = dragged.center();
    slots
        .iter()
        .enumerate()
        .map(|(index, (_, rect))| (index, rect.center().distance_to(center)))
        .fold(None, |best: Option<(usize, f32)>, (index, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((index, distance)),
        })
        .map(|(index, _)| index)
}

/// Where a pointer press landed inside an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// The draggable body of the item.
    Handle,
    /// An embedded button or link (edit, delete, open link, zoom image).
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderKey {
    /// Space or Enter: pick up the focused item, or drop the carried one.
    Pickup,
    Up,
    Down,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragPhase {
    Idle,
    /// Pressed but not yet past the activation distance.
    Pending {
        active: ActivityId,
        origin: usize,
        press: Point,
    },
    Dragging {
        active: ActivityId,
        origin: usize,
        press: Point,
        over: usize,
    },
    Keyboard {
        active: ActivityId,
        origin: usize,
        slot: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropOutcome {
    pub active: ActivityId,
    pub from: usize,
    pub to: usize,
}

impl DropOutcome {
    /// Applies the move if `activities[from]` is still the dragged item.
    pub fn apply(&self, activities: &mut Vec<Activity>) -> bool {
        if activities.get(self.from).map(|a| a.id) != Some(self.active) {
            return false;
        }
        move_item(activities, self.from, self.to)
    }
}

#[derive(Debug, Clone)]
pub struct ReorderController {
    phase: DragPhase,
    activation_distance: f32,
}

impl Default for ReorderController {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE_PX)
    }
}

impl ReorderController {
    pub fn new(activation_distance: f32) -> Self {
        Self {
            phase: DragPhase::Idle,
            activation_distance: activation_distance.max(0.0),
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, DragPhase::Idle)
    }

    pub fn active(&self) -> Option<ActivityId> {
        match self.phase {
            DragPhase::Idle => None,
            DragPhase::Pending { active, .. }
            | DragPhase::Dragging { active, .. }
            | DragPhase::Keyboard { active, .. } => Some(active),
        }
    }

    /// Current drop target while a drag is in progress.
    pub fn target(&self) -> Option<usize> {
        match self.phase {
            DragPhase::Dragging { over, .. } => Some(over),
            DragPhase::Keyboard { slot, .. } => Some(slot),
            DragPhase::Idle | DragPhase::Pending { .. } => None,
        }
    }

    pub fn cancel(&mut self) {
        if !self.is_idle() {
            debug!(active = ?self.active(), "reorder gesture cancelled");
        }
        self.phase = DragPhase::Idle;
    }

    /// Arms a drag on `id`. Presses on embedded controls never arm one.
    pub fn pointer_down(
        &mut self,
        order: &[ActivityId],
        id: ActivityId,
        target: PointerTarget,
        at: Point,
    ) -> bool {
        if target == PointerTarget::Control || !self.is_idle() {
            return false;
        }
        let Some(origin) = order.iter().position(|candidate| *candidate == id) else {
            return false;
        };
        self.phase = DragPhase::Pending {
            active: id,
            origin,
            press: at,
        };
        true
    }

    /// Tracks the pointer; returns the slot currently under the dragged item.
    pub fn pointer_move(&mut self, slots: &[(ActivityId, Rect)], at: Point) -> Option<usize> {
        let (active, origin, press) = match self.phase {
            DragPhase::Pending {
                active,
                origin,
                press,
            } => {
                if press.distance_to(at) <= self.activation_distance {
                    return None;
                }
                debug!(active = active.0, origin, "drag started");
                (active, origin, press)
            }
            DragPhase::Dragging {
                active,
                origin,
                press,
                ..
            } => (active, origin, press),
            DragPhase::Idle | DragPhase::Keyboard { .. } => return None,
        };

        let dragged = slots
            .iter()
            .find(|(id, _)| *id == active)
            .map(|(_, rect)| rect.translated(at.x - press.x, at.y - press.y));
        let over = dragged
            .and_then(|rect| closest_center(&rect, slots))
            .unwrap_or(origin);

        self.phase = DragPhase::Dragging {
            active,
            origin,
            press,
            over,
        };
        Some(over)
    }

    /// Ends a pointer gesture. A press that never became a drag is a click.
    pub fn pointer_up(&mut self) -> Option<DropOutcome> {
        let phase = std::mem::replace(&mut self.phase, DragPhase::Idle);
        match phase {
            DragPhase::Dragging {
                active,
                origin,
                over,
                ..
            } => Self::outcome(active, origin, over),
            DragPhase::Keyboard { .. } => {
                self.phase = phase;
                None
            }
            DragPhase::Idle | DragPhase::Pending { .. } => None,
        }
    }

    /// Keyboard reordering over `order`, with `focused` the item holding focus.
    pub fn key(
        &mut self,
        order: &[ActivityId],
        focused: ActivityId,
        key: ReorderKey,
    ) -> Option<DropOutcome> {
        match (self.phase, key) {
            (DragPhase::Idle, ReorderKey::Pickup) => {
                if let Some(origin) = order.iter().position(|id| *id == focused) {
                    self.phase = DragPhase::Keyboard {
                        active: focused,
                        origin,
                        slot: origin,
                    };
                }
                None
            }
            (
                DragPhase::Keyboard {
                    active,
                    origin,
                    slot,
                },
                ReorderKey::Up | ReorderKey::Down,
            ) => {
                let last = order.len().saturating_sub(1);
                let slot = if key == ReorderKey::Up {
                    slot.saturating_sub(1)
                } else {
                    (slot + 1).min(last)
                };
                self.phase = DragPhase::Keyboard {
                    active,
                    origin,
                    slot,
                };
                None
            }
            (
                DragPhase::Keyboard {
                    active,
                    origin,
                    slot,
                },
                ReorderKey::Pickup,
            ) => {
                self.phase = DragPhase::Idle;
                Self::outcome(active, origin, slot)
            }
            (_, ReorderKey::Escape) => {
                self.cancel();
                None
            }
            _ => None,
        }
    }

    fn outcome(active: ActivityId, from: usize, to: usize) -> Option<DropOutcome> {
        if from == to {
            debug!(active = active.0, "dropped on origin; order unchanged");
            return None;
        }
        debug!(active = active.0, from, to, "drop");
        Some(DropOutcome { active, from, to })
    }
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
