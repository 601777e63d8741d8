//! Browser surface: a `wasm-bindgen` wrapper around [`ElementDocument`].
//!
//! Structured values cross the boundary as JSON strings in the same shapes the
//! snapshot file uses. Pointer positions arrive in screen pixels and are
//! converted through the board camera; drag and resize deltas arrive already in
//! document units.

use std::fmt::Display;

use wasm_bindgen::prelude::*;

use crate::camera::{Camera, Point};
use crate::doc::{ElementPatch, ShapeType};
use crate::engine::{ElementDocument, SubscriptionId};
use crate::geometry::ResizeHandle;
use crate::input::Modifiers;

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_error)
}

#[wasm_bindgen]
pub struct Board {
    doc: ElementDocument,
}

impl Default for Board {
    fn default() -> Self {
        Self { doc: ElementDocument::new() }
    }
}

#[wasm_bindgen]
impl Board {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Reads ---

    /// All elements in paint order, as a JSON array.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn elements_json(&self) -> Result<String, JsValue> {
        to_json(self.doc.elements())
    }

    /// Selected ids as a JSON array.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn selection_json(&self) -> Result<String, JsValue> {
        to_json(self.doc.selection())
    }

    /// Active snap guides as a JSON array.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn snap_lines_json(&self) -> Result<String, JsValue> {
        to_json(self.doc.snap_lines())
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.doc.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.doc.can_redo()
    }

    // --- View ---

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.doc.set_viewport(width, height);
    }

    pub fn set_camera(&mut self, pan_x: f64, pan_y: f64, zoom: f64) {
        self.doc.set_camera(Camera::new(pan_x, pan_y, zoom));
    }

    /// Id of the element under a screen point, resolved to its outermost group.
    #[must_use]
    pub fn element_at(&self, screen_x: f64, screen_y: f64) -> Option<String> {
        let world = self.doc.camera().screen_to_world(Point::new(screen_x, screen_y));
        self.doc.element_at(world).map(|e| e.id.clone())
    }

    /// Name of the primary selection's resize handle under a screen point.
    #[must_use]
    pub fn handle_at(&self, screen_x: f64, screen_y: f64) -> Option<String> {
        let world = self.doc.camera().screen_to_world(Point::new(screen_x, screen_y));
        self.doc.handle_at(world).map(|h| h.as_str().to_owned())
    }

    // --- Adding ---

    /// # Errors
    ///
    /// Fails for an unknown shape type name.
    pub fn add_shape(&mut self, shape_type: &str, x: f64, y: f64) -> Result<String, JsValue> {
        let shape_type: ShapeType = shape_type.parse().map_err(js_error)?;
        Ok(self.doc.add_shape(shape_type, Point::new(x, y)))
    }

    pub fn add_text(&mut self, content: &str, x: f64, y: f64) -> String {
        self.doc.add_text(content, Point::new(x, y))
    }

    pub fn add_icon(&mut self, icon_type: &str, x: f64, y: f64) -> String {
        self.doc.add_icon(icon_type, Point::new(x, y))
    }

    /// Add a free polygon from a JSON array of `{x, y}` document points.
    ///
    /// # Errors
    ///
    /// Fails for malformed JSON.
    pub fn add_custom_shape(&mut self, points_json: &str) -> Result<Option<String>, JsValue> {
        let points: Vec<Point> = serde_json::from_str(points_json).map_err(js_error)?;
        Ok(self.doc.add_custom_shape(&points))
    }

    // --- Editing ---

    /// Merge a JSON patch into an element without committing.
    ///
    /// # Errors
    ///
    /// Fails for malformed JSON.
    pub fn update_element(&mut self, id: &str, patch_json: &str) -> Result<bool, JsValue> {
        let patch: ElementPatch = serde_json::from_str(patch_json).map_err(js_error)?;
        Ok(self.doc.update_element(id, &patch))
    }

    pub fn save_snapshot(&mut self) {
        self.doc.save_snapshot();
    }

    pub fn delete_element(&mut self, id: &str) -> bool {
        self.doc.delete_element(id)
    }

    pub fn delete_selected(&mut self) -> bool {
        self.doc.delete_selected()
    }

    pub fn rotate_selected(&mut self) -> bool {
        self.doc.rotate_selected()
    }

    pub fn nudge_selected(&mut self, dx: f64, dy: f64) -> bool {
        self.doc.nudge_selected(dx, dy)
    }

    pub fn bring_to_front(&mut self) -> bool {
        self.doc.bring_to_front()
    }

    pub fn bring_to_back(&mut self) -> bool {
        self.doc.bring_to_back()
    }

    pub fn group_selected(&mut self) -> Option<String> {
        self.doc.group_selected_elements()
    }

    pub fn ungroup_selected(&mut self) -> Vec<String> {
        self.doc.ungroup_selected_elements()
    }

    pub fn copy_selected(&mut self) -> bool {
        self.doc.copy_selected_element()
    }

    pub fn paste(&mut self) -> Option<String> {
        self.doc.paste_element()
    }

    pub fn duplicate_selected(&mut self) -> Option<String> {
        self.doc.duplicate_selected_element()
    }

    // --- Selection ---

    pub fn select(&mut self, id: &str) -> bool {
        self.doc.select(id)
    }

    pub fn add_to_selection(&mut self, id: &str) -> bool {
        self.doc.add_to_selection(id)
    }

    pub fn toggle_selection(&mut self, id: &str) -> bool {
        self.doc.toggle_selection(id)
    }

    pub fn select_all(&mut self) {
        self.doc.select_all();
    }

    pub fn clear_selection(&mut self) {
        self.doc.clear_selection();
    }

    // --- Gestures ---

    pub fn start_drag(&mut self, shift: bool) -> bool {
        self.doc.start_drag(Modifiers { shift, ..Default::default() })
    }

    pub fn drag_to(&mut self, dx: f64, dy: f64) -> bool {
        self.doc.drag_to(dx, dy)
    }

    pub fn end_drag(&mut self) -> bool {
        self.doc.end_drag()
    }

    /// # Errors
    ///
    /// Fails for an unknown handle name.
    pub fn start_resize(&mut self, id: &str, handle: &str) -> Result<bool, JsValue> {
        let handle: ResizeHandle = handle.parse().map_err(js_error)?;
        Ok(self.doc.start_resize(id, handle))
    }

    pub fn resize_to(&mut self, dx: f64, dy: f64) -> bool {
        self.doc.resize_to(dx, dy)
    }

    pub fn end_resize(&mut self) -> bool {
        self.doc.end_resize()
    }

    pub fn cancel_gesture(&mut self) -> bool {
        self.doc.cancel_gesture()
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        self.doc.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.doc.redo()
    }

    // --- Files ---

    /// The document as pretty-printed snapshot JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn export_json(&self) -> Result<String, JsValue> {
        self.doc.save_json().map_err(js_error)
    }

    /// Replace the document with snapshot JSON.
    ///
    /// # Errors
    ///
    /// Fails with the import error message; the board is left untouched.
    pub fn import_json(&mut self, text: &str) -> Result<(), JsValue> {
        self.doc.load_json(text).map_err(js_error)
    }

    // --- Notifications ---

    /// Call `callback` with `"elements"`, `"selection"` or `"history"` after each change.
    pub fn on_change(&mut self, callback: js_sys::Function) -> SubscriptionId {
        self.doc.subscribe(move |change| {
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(change.as_str())) {
                tracing::warn!(?err, change = change.as_str(), "change callback failed");
            }
        })
    }

    pub fn off_change(&mut self, id: SubscriptionId) -> bool {
        self.doc.unsubscribe(id)
    }
}
