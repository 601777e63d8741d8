//! Document model: elements, sparse updates, and persisted snapshots.
//!
//! This module defines the data types that describe what is on the canvas
//! (`Element`, `ElementKind` and the per-kind property structs), a sparse-update
//! type for incremental edits (`ElementPatch`), and the serializable
//! `Snapshot` used both for undo/redo frames and for file export/import.
//!
//! The JSON shape is flat: common fields sit next to a `type` tag
//! (`shape | text | icon | group`) and the kind-specific fields.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::consts::{
    DEFAULT_FILL, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_OUTLINE, DEFAULT_STROKE_WEIGHT, DEFAULT_TEXT_COLOR,
    SNAPSHOT_VERSION,
};
use crate::error::{ImportError, ParseError};
use crate::geometry::{Rect, normalize_rotation};

/// Unique identifier for an element, minted from the document counter.
pub type ElementId = String;

/// Built-in polygon outlines plus free-form custom polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Circle,
    Triangle,
    Diamond,
    Pentagon,
    Hexagon,
    Star,
    Arrow,
    /// Outline given by `ShapeProps::custom_points`.
    Custom,
}

impl ShapeType {
    pub const ALL: [ShapeType; 9] = [
        ShapeType::Rectangle,
        ShapeType::Circle,
        ShapeType::Triangle,
        ShapeType::Diamond,
        ShapeType::Pentagon,
        ShapeType::Hexagon,
        ShapeType::Star,
        ShapeType::Arrow,
        ShapeType::Custom,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Triangle => "triangle",
            Self::Diamond => "diamond",
            Self::Pentagon => "pentagon",
            Self::Hexagon => "hexagon",
            Self::Star => "star",
            Self::Arrow => "arrow",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for ShapeType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::UnknownShape(s.to_owned()))
    }
}

/// Fields of a `shape` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    pub shape_type: ShapeType,
    pub fill_color: String,
    pub outline_color: String,
    pub stroke_weight: f64,
    /// Polygon outline in the normalized `0..=100` space, for `ShapeType::Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_points: Option<Vec<Point>>,
    /// Label drawn inside the shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl ShapeProps {
    #[must_use]
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            shape_type,
            fill_color: DEFAULT_FILL.to_owned(),
            outline_color: DEFAULT_OUTLINE.to_owned(),
            stroke_weight: DEFAULT_STROKE_WEIGHT,
            custom_points: None,
            text: None,
            font_size: None,
            font_family: None,
            text_color: None,
        }
    }
}

/// Fields of a `text` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    pub content: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
}

impl TextProps {
    #[must_use]
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            color: DEFAULT_TEXT_COLOR.to_owned(),
        }
    }
}

/// Fields of an `icon` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconProps {
    pub icon_type: String,
    pub color: String,
    pub stroke_weight: f64,
}

impl IconProps {
    #[must_use]
    pub fn new(icon_type: &str) -> Self {
        Self {
            icon_type: icon_type.to_owned(),
            color: DEFAULT_OUTLINE.to_owned(),
            stroke_weight: DEFAULT_STROKE_WEIGHT,
        }
    }
}

/// Fields of a `group` element. The group owns membership, not lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProps {
    pub child_ids: Vec<ElementId>,
}

/// The kind of an element together with its kind-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Shape(ShapeProps),
    Text(TextProps),
    Icon(IconProps),
    /// Geometry of a group is the cached union of its children's visual boxes.
    Group(GroupProps),
}

impl ElementKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shape(_) => "shape",
            Self::Text(_) => "text",
            Self::Icon(_) => "icon",
            Self::Group(_) => "group",
        }
    }
}

/// An element as stored in the document and in snapshot files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    /// Left edge of the un-rotated local box.
    pub x: f64,
    /// Top edge of the un-rotated local box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees about the box center, in `[0, 360)`.
    pub rotation: f64,
    /// Paint order; dense over the document.
    pub z_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Back-reference to the owning group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<ElementId>,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Build an element at `rect` with no rotation, link, or parent.
    #[must_use]
    pub fn new(id: ElementId, kind: ElementKind, rect: Rect) -> Self {
        Self {
            id,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            rotation: 0.0,
            z_index: 0,
            link: None,
            group_id: None,
            kind,
        }
    }

    /// The stored, un-rotated box.
    #[must_use]
    pub fn local_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_local_rect(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ElementKind::Group(_))
    }

    /// Member ids if this is a group, otherwise an empty slice.
    #[must_use]
    pub fn child_ids(&self) -> &[ElementId] {
        match &self.kind {
            ElementKind::Group(g) => &g.child_ids,
            _ => &[],
        }
    }

    #[must_use]
    pub fn child_ids_mut(&mut self) -> Option<&mut Vec<ElementId>> {
        match &mut self.kind {
            ElementKind::Group(g) => Some(&mut g.child_ids),
            _ => None,
        }
    }

    /// Shallow-merge a sparse update. Returns false if the patch was rejected
    /// (props that do not fit this element's kind); nothing is applied then.
    pub fn apply_patch(&mut self, patch: &ElementPatch) -> bool {
        let kind = match &patch.props {
            Some(props) => match merge_kind_props(&self.kind, props) {
                Some(kind) => Some(kind),
                None => return false,
            },
            None => None,
        };

        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.width {
            self.width = w;
        }
        if let Some(h) = patch.height {
            self.height = h;
        }
        if let Some(r) = patch.rotation {
            self.rotation = normalize_rotation(r);
        }
        if let Some(ref link) = patch.link {
            self.link = if link.is_empty() { None } else { Some(link.clone()) };
        }
        if let Some(kind) = kind {
            self.kind = kind;
        }
        true
    }
}

/// Merge JSON `props` into the kind-specific fields of `kind`.
///
/// Null values remove optional keys. The `type` tag cannot be changed. Returns
/// `None` if the merged object no longer describes a valid element of the kind.
fn merge_kind_props(kind: &ElementKind, props: &serde_json::Value) -> Option<ElementKind> {
    let incoming = props.as_object()?;
    let mut current = match serde_json::to_value(kind) {
        Ok(value) => value,
        Err(_) => return None,
    };
    let existing = current.as_object_mut()?;
    for (k, v) in incoming {
        if k == "type" {
            continue;
        }
        if v.is_null() {
            existing.remove(k);
        } else {
            existing.insert(k.clone(), v.clone());
        }
    }
    match serde_json::from_value(current) {
        Ok(kind) => Some(kind),
        Err(_) => None,
    }
}

/// Sparse update for an element. Only present fields are applied.
///
/// `z_index` and `group_id` are deliberately absent: paint order and group
/// membership are maintained by the document's reorder and group actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// New rotation in degrees; reduced modulo 360 on apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    /// New link URL; an empty string clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Kind-specific keys to merge or remove (null values delete keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
}

impl ElementPatch {
    /// Patch that sets the whole local box.
    #[must_use]
    pub fn geometry(rect: Rect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..Default::default()
        }
    }

    /// Whether the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A full serializable copy of document state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
    /// Next value of the id counter; never reused.
    pub next_id: u64,
    pub elements: Vec<Element>,
}

impl Snapshot {
    /// A snapshot with no elements.
    #[must_use]
    pub fn empty() -> Self {
        Self::capture(1, &[])
    }

    /// Deep-copy `elements` into a fresh snapshot stamped with the current time.
    #[must_use]
    pub fn capture(next_id: u64, elements: &[Element]) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            timestamp: now_ms(),
            next_id,
            elements: elements.to_vec(),
        }
    }

    /// Parse and validate a snapshot from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for invalid JSON or a wrong shape, and the other
    /// `ImportError` variants when [`Snapshot::validate`] rejects the content.
    pub fn from_json(text: &str) -> Result<Self, ImportError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Pretty-printed JSON as written to snapshot files.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check version, id uniqueness, geometry, and group referential integrity.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ImportError::UnsupportedVersion { found: self.version, supported: SNAPSHOT_VERSION });
        }

        let mut by_id: HashMap<&str, &Element> = HashMap::with_capacity(self.elements.len());
        for el in &self.elements {
            if by_id.insert(el.id.as_str(), el).is_some() {
                return Err(ImportError::DuplicateId(el.id.clone()));
            }
            validate_geometry(el)?;
        }

        for el in &self.elements {
            if let Some(parent_id) = &el.group_id {
                let linked = by_id
                    .get(parent_id.as_str())
                    .is_some_and(|parent| parent.child_ids().contains(&el.id));
                if !linked {
                    return Err(broken(el, parent_id));
                }
            }
            for child_id in el.child_ids() {
                let linked = by_id
                    .get(child_id.as_str())
                    .is_some_and(|child| child.group_id.as_deref() == Some(el.id.as_str()));
                if !linked {
                    return Err(broken(el, child_id));
                }
            }
        }

        for el in &self.elements {
            let mut seen = HashSet::new();
            let mut cursor = el.group_id.as_deref();
            while let Some(parent_id) = cursor {
                if !seen.insert(parent_id) || parent_id == el.id {
                    return Err(broken(el, parent_id));
                }
                cursor = by_id.get(parent_id).and_then(|p| p.group_id.as_deref());
            }
        }

        Ok(())
    }
}

fn broken(el: &Element, reference: &str) -> ImportError {
    ImportError::BrokenGroupReference { id: el.id.clone(), reference: reference.to_owned() }
}

fn validate_geometry(el: &Element) -> Result<(), ImportError> {
    let invalid = |field| ImportError::InvalidGeometry { id: el.id.clone(), field };
    if !el.x.is_finite() {
        return Err(invalid("x"));
    }
    if !el.y.is_finite() {
        return Err(invalid("y"));
    }
    if !el.width.is_finite() || el.width <= 0.0 {
        return Err(invalid("width"));
    }
    if !el.height.is_finite() || el.height <= 0.0 {
        return Err(invalid("height"));
    }
    if !el.rotation.is_finite() {
        return Err(invalid("rotation"));
    }
    Ok(())
}

/// Current wall-clock time in epoch milliseconds.
#[cfg(target_arch = "wasm32")]
#[must_use]
pub fn now_ms() -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let ms = js_sys::Date::now() as i64;
    ms
}

/// Current wall-clock time in epoch milliseconds.
#[cfg(not(target_arch = "wasm32"))]
#[must_use]
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
