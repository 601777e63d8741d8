//! Geometry transforms: rotation-aware bounding boxes and handle-driven resizing.
//!
//! Every function here is pure. Elements store their geometry in an un-rotated
//! local frame (`x`/`y` is the top-left corner before rotation, rotation is
//! applied about the box center). Anything that compares elements on screen,
//! such as snapping, grouping, or hit testing, works on the *visual* box: the
//! axis-aligned rectangle covering the rotated local box.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::consts::CUSTOM_POINT_SCALE;
use crate::doc::Element;
use crate::error::ParseError;

/// Tolerance used when deciding whether a rotation is an exact right angle.
const RIGHT_ANGLE_EPSILON: f64 = 1e-9;

/// Axis-aligned rectangle in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether `pt` lies inside or on the border of this rectangle.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Whether every field is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Reduce a rotation in degrees to `[0, 360)`. Non-finite input becomes 0.
#[must_use]
pub fn normalize_rotation(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let r = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360; adding 0.0 clears a negative zero.
    if r >= 360.0 { 0.0 } else { r + 0.0 }
}

/// Number of clockwise quarter turns (0..=3) if `rotation` is a right angle.
#[must_use]
pub fn quarter_turns(rotation: f64) -> Option<u8> {
    let r = normalize_rotation(rotation);
    let turns = (r / 90.0).round();
    if (r - turns * 90.0).abs() > RIGHT_ANGLE_EPSILON {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let turns = turns as u8;
    Some(turns % 4)
}

/// Whether local and visual axes are swapped (rotation ≡ 90 mod 180).
#[must_use]
pub fn is_axis_swapped(rotation: f64) -> bool {
    matches!(quarter_turns(rotation), Some(1 | 3))
}

/// Visual box of a local rectangle rotated by `rotation` degrees about its center.
///
/// Right angles are handled exactly (no trigonometry), so boxes at 0/90/180/270
/// carry no floating-point drift. Other angles use the axis-aligned extent of the
/// four rotated corners.
#[must_use]
pub fn visual_bounds(local: Rect, rotation: f64) -> Rect {
    let center = local.center();
    let (width, height) = match quarter_turns(rotation) {
        Some(0 | 2) => return local,
        Some(_) => (local.height, local.width),
        None => {
            let theta = normalize_rotation(rotation).to_radians();
            let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
            (local.width * cos + local.height * sin, local.width * sin + local.height * cos)
        }
    };
    Rect::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
}

/// Visual (rotation-aware) bounding box of an element.
#[must_use]
pub fn visual_bounding_box(element: &Element) -> Rect {
    visual_bounds(element.local_rect(), element.rotation)
}

/// One of the eight resize handles around a selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::N,
        ResizeHandle::Ne,
        ResizeHandle::E,
        ResizeHandle::Se,
        ResizeHandle::S,
        ResizeHandle::Sw,
        ResizeHandle::W,
        ResizeHandle::Nw,
    ];

    fn moves_left(self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::E | Self::Ne | Self::Se)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::N | Self::Ne | Self::Nw)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::S | Self::Se | Self::Sw)
    }

    /// Where this handle sits on `rect`.
    #[must_use]
    pub fn position_on(self, rect: &Rect) -> Point {
        let x = if self.moves_left() {
            rect.x
        } else if self.moves_right() {
            rect.right()
        } else {
            rect.center().x
        };
        let y = if self.moves_top() {
            rect.y
        } else if self.moves_bottom() {
            rect.bottom()
        } else {
            rect.center().y
        };
        Point::new(x, y)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::S => "s",
            Self::E => "e",
            Self::W => "w",
            Self::Ne => "ne",
            Self::Nw => "nw",
            Self::Se => "se",
            Self::Sw => "sw",
        }
    }
}

impl FromStr for ResizeHandle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| ParseError::UnknownHandle(s.to_owned()))
    }
}

/// New local geometry after dragging `handle` of `rect` by `(dx, dy)`.
///
/// Width and height never fall below `min_size`. The edge opposite the dragged
/// handle stays fixed: when a size is clamped, the position shift uses the
/// clamped change rather than the raw pointer delta.
#[must_use]
pub fn resize_rect(rect: Rect, handle: ResizeHandle, dx: f64, dy: f64, min_size: f64) -> Rect {
    let mut out = rect;

    if handle.moves_right() {
        out.width = (rect.width + dx).max(min_size);
    } else if handle.moves_left() {
        out.width = (rect.width - dx).max(min_size);
        out.x = rect.x + (rect.width - out.width);
    }

    if handle.moves_bottom() {
        out.height = (rect.height + dy).max(min_size);
    } else if handle.moves_top() {
        out.height = (rect.height - dy).max(min_size);
        out.y = rect.y + (rect.height - out.height);
    }

    out
}

/// New local geometry of `element` after dragging one of its handles.
#[must_use]
pub fn resize(element: &Element, handle: ResizeHandle, dx: f64, dy: f64, min_size: f64) -> Rect {
    resize_rect(element.local_rect(), handle, dx, dy, min_size)
}

/// Normalize a free polygon into the `0..=100` custom point space.
///
/// Returns the polygon's bounds together with the normalized points, or `None`
/// for an empty or non-finite point list. An axis with zero span collapses to 0
/// instead of dividing by zero.
#[must_use]
pub fn normalize_polygon(points: &[Point]) -> Option<(Rect, Vec<Point>)> {
    let first = points.first()?;
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let bounds = Rect::new(min_x, min_y, max_x - min_x, max_y - min_y);
    let scale = |v: f64, origin: f64, span: f64| {
        if span > 0.0 { (v - origin) / span * CUSTOM_POINT_SCALE } else { 0.0 }
    };
    let normalized = points
        .iter()
        .map(|p| Point::new(scale(p.x, min_x, bounds.width), scale(p.y, min_y, bounds.height)))
        .collect();
    Some((bounds, normalized))
}
