//! Shared numeric constants for the canvas crate.

// ── Document ────────────────────────────────────────────────────

/// Current snapshot format version written by export and accepted by import.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Prefix for ids minted from the document's monotonic counter.
pub const ID_PREFIX: &str = "element-";

// ── History ─────────────────────────────────────────────────────

/// Maximum number of snapshots kept in the undo stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ── Geometry ────────────────────────────────────────────────────

/// Width/height floor for elements resized directly.
pub const MIN_ELEMENT_SIZE: f64 = 20.0;

/// Width/height floor for children rescaled through their group.
pub const MIN_CHILD_SIZE: f64 = 10.0;

/// Side length of a freshly added shape or icon.
pub const DEFAULT_ELEMENT_SIZE: f64 = 100.0;

/// Size of a freshly added text box.
pub const DEFAULT_TEXT_WIDTH: f64 = 200.0;
pub const DEFAULT_TEXT_HEIGHT: f64 = 50.0;

/// Upper bound of the normalized custom polygon coordinate space.
pub const CUSTOM_POINT_SCALE: f64 = 100.0;

// ── Interaction ─────────────────────────────────────────────────

/// Offset applied on every paste or duplicate so copies never overlap.
pub const PASTE_OFFSET: f64 = 20.0;

/// Snap distance in screen pixels; divided by zoom before use.
pub const SNAP_THRESHOLD_PX: f64 = 5.0;

/// Screen-space hit slop in pixels for resize handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Zoom limits accepted by the camera.
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 3.0;

// ── Styling defaults ────────────────────────────────────────────

pub const DEFAULT_FILL: &str = "#D94B4B";
pub const DEFAULT_OUTLINE: &str = "#1F1A17";
pub const DEFAULT_STROKE_WEIGHT: f64 = 2.0;
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
pub const DEFAULT_FONT_FAMILY: &str = "Inter";
pub const DEFAULT_TEXT_COLOR: &str = "#1F1A17";
