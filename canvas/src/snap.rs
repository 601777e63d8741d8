//! Snapping: align a dragged element's edges and centers with other elements.
//!
//! Each element exposes six snap points taken from its visual bounding box.
//! The X axis (left, right, center-x) and the Y axis (top, bottom, center-y)
//! are resolved independently, so a drag may snap on one axis, both, or
//! neither. Only an axis that finds a target within the threshold is adjusted.

#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;

use serde::Serialize;

use crate::doc::Element;
use crate::geometry::{Rect, visual_bounding_box};

/// Orientation of an alignment guide. A vertical guide marks an X-axis snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapAxis {
    Vertical,
    Horizontal,
}

/// An alignment guide to draw while dragging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapLine {
    pub axis: SnapAxis,
    /// X for a vertical guide, Y for a horizontal one.
    pub position: f64,
    /// Extent along the guide, spanning the visible canvas.
    pub start: f64,
    pub end: f64,
}

/// The six canonical alignment coordinates of an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapPoints {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl SnapPoints {
    #[must_use]
    pub fn from_rect(r: &Rect) -> Self {
        Self {
            left: r.x,
            right: r.right(),
            top: r.y,
            bottom: r.bottom(),
            center_x: r.x + r.width / 2.0,
            center_y: r.y + r.height / 2.0,
        }
    }

    #[must_use]
    pub fn x_points(&self) -> [f64; 3] {
        [self.left, self.right, self.center_x]
    }

    #[must_use]
    pub fn y_points(&self) -> [f64; 3] {
        [self.top, self.bottom, self.center_y]
    }
}

/// Snap points of an element, derived from its visual (rotated) box.
#[must_use]
pub fn snap_points(element: &Element) -> SnapPoints {
    SnapPoints::from_rect(&visual_bounding_box(element))
}

/// Nearest target within `threshold` of `candidate`.
///
/// A strictly smaller distance wins; on an exact tie the first target
/// encountered is kept.
#[must_use]
pub fn resolve_axis(candidate: f64, targets: &[f64], threshold: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &target in targets {
        let distance = (target - candidate).abs();
        if distance > threshold {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((target, distance));
        }
    }
    best.map(|(target, _)| target)
}

/// Corrected position and guides produced by [`snap`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapResult {
    pub x: f64,
    pub y: f64,
    pub lines: Vec<SnapLine>,
}

/// Best candidate/target pairing found on one axis.
struct AxisMatch {
    offset: f64,
    distance: f64,
    target: f64,
    target_box: Rect,
}

/// Resolve the dragged element's current position against `others`.
///
/// `dragged` must already sit at the raw (unsnapped) drag position; the result
/// carries the corrected local `x`/`y`. `others` may include the dragged
/// element itself, which is ignored. `visible` is the document rectangle on
/// screen, used to size the guide lines.
#[must_use]
pub fn snap<'a, I>(dragged: &Element, others: I, threshold: f64, visible: Rect) -> SnapResult
where
    I: IntoIterator<Item = &'a Element>,
{
    let own_box = visual_bounding_box(dragged);
    let own = SnapPoints::from_rect(&own_box);

    let mut best_x: Option<AxisMatch> = None;
    let mut best_y: Option<AxisMatch> = None;

    for other in others {
        if other.id == dragged.id {
            continue;
        }
        let target_box = visual_bounding_box(other);
        let theirs = SnapPoints::from_rect(&target_box);
        consider(&mut best_x, &own.x_points(), &theirs.x_points(), threshold, target_box);
        consider(&mut best_y, &own.y_points(), &theirs.y_points(), threshold, target_box);
    }

    let mut result = SnapResult { x: dragged.x, y: dragged.y, lines: Vec::new() };
    let snapped_box = Rect::new(
        own_box.x + best_x.as_ref().map_or(0.0, |m| m.offset),
        own_box.y + best_y.as_ref().map_or(0.0, |m| m.offset),
        own_box.width,
        own_box.height,
    );

    if let Some(m) = best_x {
        result.x += m.offset;
        result.lines.push(SnapLine {
            axis: SnapAxis::Vertical,
            position: m.target,
            start: visible.y.min(snapped_box.y).min(m.target_box.y),
            end: visible.bottom().max(snapped_box.bottom()).max(m.target_box.bottom()),
        });
    }
    if let Some(m) = best_y {
        result.y += m.offset;
        result.lines.push(SnapLine {
            axis: SnapAxis::Horizontal,
            position: m.target,
            start: visible.x.min(snapped_box.x).min(m.target_box.x),
            end: visible.right().max(snapped_box.right()).max(m.target_box.right()),
        });
    }

    result
}

fn consider(best: &mut Option<AxisMatch>, candidates: &[f64; 3], targets: &[f64; 3], threshold: f64, target_box: Rect) {
    for &candidate in candidates {
        let Some(target) = resolve_axis(candidate, targets, threshold) else {
            continue;
        };
        let distance = (target - candidate).abs();
        if best.as_ref().is_none_or(|b| distance < b.distance) {
            *best = Some(AxisMatch { offset: target - candidate, distance, target, target_box });
        }
    }
}
