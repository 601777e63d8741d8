#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use std::collections::HashMap;

use crate::camera::{Camera, Point};
use crate::consts::HANDLE_RADIUS_PX;
use crate::doc::{Element, ElementId};
use crate::geometry::{ResizeHandle, visual_bounding_box};

/// Which part of an element was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeHandle),
}

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub element_id: ElementId,
    pub part: HitPart,
}

/// Test what is under `world_pt`, checking the selected element's handles first.
///
/// `elements` must be in paint order (back to front).
#[must_use]
pub fn hit_test(world_pt: Point, elements: &[Element], camera: &Camera, selected: Option<&Element>) -> Option<Hit> {
    if let Some(sel) = selected
        && let Some(handle) = handle_at(sel, world_pt, camera)
    {
        return Some(Hit { element_id: sel.id.clone(), part: HitPart::ResizeHandle(handle) });
    }
    element_at(elements, world_pt).map(|el| Hit { element_id: el.id.clone(), part: HitPart::Body })
}

/// The topmost element whose visual box contains `world_pt`.
///
/// Groups have no surface of their own; a hit on a member resolves to its
/// outermost enclosing group so the group is picked as a unit.
#[must_use]
pub fn element_at(elements: &[Element], world_pt: Point) -> Option<&Element> {
    let hit = elements
        .iter()
        .rev()
        .filter(|el| !el.is_group())
        .find(|el| visual_bounding_box(el).contains(world_pt))?;
    Some(outermost(hit, elements))
}

fn outermost<'a>(element: &'a Element, elements: &'a [Element]) -> &'a Element {
    let by_id: HashMap<&str, &Element> = elements.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut current = element;
    // Bounded by the element count in case of a malformed parent chain.
    for _ in 0..elements.len() {
        let Some(parent) = current.group_id.as_deref().and_then(|g| by_id.get(g)) else {
            break;
        };
        current = parent;
    }
    current
}

/// The resize handle of `element` nearest to `world_pt`, if within reach.
///
/// Handles sit on the visual box. The reach is a fixed screen radius, so it
/// shrinks in document units as the camera zooms in.
#[must_use]
pub fn handle_at(element: &Element, world_pt: Point, camera: &Camera) -> Option<ResizeHandle> {
    let radius = camera.screen_dist_to_world(HANDLE_RADIUS_PX);
    let bounds = visual_bounding_box(element);

    let mut best: Option<(ResizeHandle, f64)> = None;
    for handle in ResizeHandle::ALL {
        let p = handle.position_on(&bounds);
        let dist = (p.x - world_pt.x).hypot(p.y - world_pt.y);
        if dist <= radius && best.is_none_or(|(_, d)| dist < d) {
            best = Some((handle, dist));
        }
    }
    best.map(|(handle, _)| handle)
}
