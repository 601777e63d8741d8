//! Input model: modifier keys and the gesture state machine.
//!
//! A pointer gesture runs start → move* → end. `InputState` holds the active
//! gesture between those phases, carrying everything needed to recompute the
//! live geometry from the gesture's starting point (so moves never accumulate
//! rounding) and to roll the document back if the gesture is cancelled.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::{Element, ElementId};
use crate::geometry::{Rect, ResizeHandle};

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held; disables snapping while dragging.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// A move gesture over the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    /// Selected elements being dragged (descendants not repeated).
    pub roots: Vec<ElementId>,
    /// Every element that moves, with its position when the gesture started.
    pub origins: Vec<(ElementId, Point)>,
    /// Snapping applies only to a single dragged element without Shift.
    pub snap_enabled: bool,
    /// Document elements before the gesture, restored on cancel.
    pub before: Vec<Element>,
}

impl DragSession {
    /// Starting position of `id`, if it takes part in the drag.
    #[must_use]
    pub fn origin_of(&self, id: &str) -> Option<Point> {
        self.origins.iter().find(|(oid, _)| oid == id).map(|(_, p)| *p)
    }
}

/// A resize gesture on one element's handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    pub id: ElementId,
    pub handle: ResizeHandle,
    /// Local box of the element when the gesture started.
    pub origin: Rect,
    /// Document elements before the gesture, restored on cancel.
    pub before: Vec<Element>,
}

/// The gesture currently in progress, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// The user is moving the selection.
    Dragging(DragSession),
    /// The user is resizing an element by one of its handles.
    Resizing(ResizeSession),
}

impl InputState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Elements captured when the active gesture started.
    #[must_use]
    pub fn before(&self) -> Option<&[Element]> {
        match self {
            Self::Idle => None,
            Self::Dragging(s) => Some(&s.before),
            Self::Resizing(s) => Some(&s.before),
        }
    }
}
