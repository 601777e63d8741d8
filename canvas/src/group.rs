//! Group algebra: membership expansion, id remapping, and group-level transforms.
//!
//! A group's geometry is the cached union of its members' visual boxes. The
//! functions here never mutate the document; resize and rotate return the
//! updates they intend so the document can apply them in one step.

#[cfg(test)]
#[path = "group_test.rs"]
mod group_test;

use std::collections::{HashMap, HashSet};

use crate::camera::Point;
use crate::doc::{Element, ElementId, ElementPatch};
use crate::geometry::{Rect, is_axis_swapped, normalize_rotation, quarter_turns, visual_bounding_box};

/// An intended change to one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildUpdate {
    pub id: ElementId,
    pub updates: ElementPatch,
}

/// Result of rotating a group's members by 90°.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateOutcome {
    pub child_updates: Vec<ChildUpdate>,
    /// Union of the rotated members; `None` if the group has no members.
    pub new_group_bounds: Option<Rect>,
}

fn index(elements: &[Element]) -> HashMap<&str, &Element> {
    elements.iter().map(|e| (e.id.as_str(), e)).collect()
}

/// The element with `id` followed by all of its descendants, depth first.
///
/// Unknown ids yield an empty list. Member ids that no longer exist are skipped.
#[must_use]
pub fn expand<'a>(id: &str, elements: &'a [Element]) -> Vec<&'a Element> {
    expand_all(&[id], elements)
}

/// Expand several ids, yielding each element at most once.
///
/// Selecting a group together with one of its own members returns the member
/// once, in the position it was first reached.
#[must_use]
pub fn expand_all<'a, S: AsRef<str>>(ids: &[S], elements: &'a [Element]) -> Vec<&'a Element> {
    let by_id = index(elements);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        let mut stack = vec![id.as_ref()];
        while let Some(current) = stack.pop() {
            let Some(el) = by_id.get(current) else {
                continue;
            };
            if !seen.insert(el.id.as_str()) {
                continue;
            }
            out.push(*el);
            stack.extend(el.child_ids().iter().rev().map(String::as_str));
        }
    }
    out
}

/// Ids of every descendant of `id`, not including `id` itself.
#[must_use]
pub fn descendant_ids(id: &str, elements: &[Element]) -> Vec<ElementId> {
    expand(id, elements).into_iter().skip(1).map(|e| e.id.clone()).collect()
}

/// Rewrite `group_id` and `child_ids` references through `id_map`.
///
/// References missing from the map are left untouched.
pub fn remap_ids(elements: &mut [Element], id_map: &HashMap<ElementId, ElementId>) {
    for el in elements {
        if let Some(new_parent) = el.group_id.as_ref().and_then(|g| id_map.get(g)) {
            el.group_id = Some(new_parent.clone());
        }
        if let Some(children) = el.child_ids_mut() {
            for child in children.iter_mut() {
                if let Some(new_child) = id_map.get(child) {
                    child.clone_from(new_child);
                }
            }
        }
    }
}

/// Smallest axis-aligned box covering the visual boxes of `elements`.
///
/// Returns `None` when `elements` is empty.
#[must_use]
pub fn union_bounds<'a, I>(elements: I) -> Option<Rect>
where
    I: IntoIterator<Item = &'a Element>,
{
    elements
        .into_iter()
        .map(visual_bounding_box)
        .reduce(|acc, r| acc.union(&r))
}

/// Cached bounds a group should have: the union of its direct members.
#[must_use]
pub fn member_bounds(group: &Element, elements: &[Element]) -> Option<Rect> {
    let by_id = index(elements);
    union_bounds(group.child_ids().iter().filter_map(|id| by_id.get(id.as_str()).copied()))
}

fn scale_ratio(new: f64, old: f64) -> f64 {
    if old > 0.0 && old.is_finite() && new.is_finite() { new / old } else { 1.0 }
}

/// Proportionally rescale every descendant of `group` from `old_bounds` to `new_bounds`.
///
/// Positions are scaled relative to the group origin and sizes are scaled in
/// visual space. Members turned 90°/270° have their scaled visual size swapped
/// back before it is written to local width/height. Sizes floor at `min_size`.
#[must_use]
pub fn resize_children(
    group: &Element,
    old_bounds: Rect,
    new_bounds: Rect,
    elements: &[Element],
    min_size: f64,
) -> Vec<ChildUpdate> {
    let sx = scale_ratio(new_bounds.width, old_bounds.width);
    let sy = scale_ratio(new_bounds.height, old_bounds.height);

    expand(&group.id, elements)
        .into_iter()
        .skip(1)
        .map(|child| {
            let visual = visual_bounding_box(child);
            let vx = new_bounds.x + (visual.x - old_bounds.x) * sx;
            let vy = new_bounds.y + (visual.y - old_bounds.y) * sy;
            let vw = visual.width * sx;
            let vh = visual.height * sy;

            let (w, h) = if quarter_turns(child.rotation).is_some() {
                if is_axis_swapped(child.rotation) { (vh, vw) } else { (vw, vh) }
            } else {
                (child.width * sx, child.height * sy)
            };
            let (w, h) = (w.max(min_size), h.max(min_size));

            let cx = vx + vw / 2.0;
            let cy = vy + vh / 2.0;
            ChildUpdate {
                id: child.id.clone(),
                updates: ElementPatch::geometry(Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)),
            }
        })
        .collect()
}

/// Rotate every descendant of `group` 90° clockwise about the group's center.
///
/// Each member's center offset is mapped `(x, y) -> (y, -x)` and its own
/// rotation advances by 90°. Nested groups and the returned group bounds are
/// recomputed from the rotated member states.
#[must_use]
pub fn rotate_children(group: &Element, elements: &[Element]) -> RotateOutcome {
    let pivot = group.local_rect().center();
    let descendants = expand(&group.id, elements);

    let mut simulated: HashMap<&str, Element> = HashMap::with_capacity(descendants.len());
    let mut order: Vec<&str> = Vec::with_capacity(descendants.len());
    let mut child_updates = Vec::new();

    for child in descendants.iter().skip(1) {
        let mut next = (*child).clone();
        if !child.is_group() {
            let center = child.local_rect().center();
            let offset = Point::new(center.x - pivot.x, center.y - pivot.y);
            let moved = Point::new(pivot.x + offset.y, pivot.y - offset.x);
            next.x = moved.x - child.width / 2.0;
            next.y = moved.y - child.height / 2.0;
            next.rotation = normalize_rotation(child.rotation + 90.0);
            child_updates.push(ChildUpdate {
                id: child.id.clone(),
                updates: ElementPatch {
                    x: Some(next.x),
                    y: Some(next.y),
                    rotation: Some(next.rotation),
                    ..Default::default()
                },
            });
        }
        order.push(child.id.as_str());
        simulated.insert(child.id.as_str(), next);
    }

    // Depth-first order lists parents before members, so walk it backwards.
    for id in order.iter().rev() {
        let Some(nested) = simulated.get(id) else {
            continue;
        };
        if !nested.is_group() {
            continue;
        }
        let bounds = union_bounds(nested.child_ids().iter().filter_map(|c| simulated.get(c.as_str())));
        if let Some(bounds) = bounds {
            if let Some(nested) = simulated.get_mut(id) {
                nested.set_local_rect(bounds);
            }
            child_updates.push(ChildUpdate { id: (*id).to_owned(), updates: ElementPatch::geometry(bounds) });
        }
    }

    let new_group_bounds = union_bounds(group.child_ids().iter().filter_map(|c| simulated.get(c.as_str())));
    RotateOutcome { child_updates, new_group_bounds }
}
