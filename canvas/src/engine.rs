//! The element document: canonical element list plus selection, clipboard,
//! gesture state and undo history.
//!
//! Every user-visible action is a method on [`ElementDocument`]. Discrete
//! actions (add, delete, group, paste, reorder, ...) commit exactly one history
//! entry. Continuous gestures mutate the live elements on every pointer move and
//! commit once when the gesture ends. Actions that change nothing commit nothing.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::camera::{Camera, Point};
use crate::config::EngineConfig;
use crate::consts::{DEFAULT_TEXT_HEIGHT, DEFAULT_TEXT_WIDTH, ID_PREFIX};
use crate::doc::{
    Element, ElementId, ElementKind, ElementPatch, GroupProps, IconProps, ShapeProps, ShapeType, Snapshot, TextProps,
};
use crate::error::ImportError;
use crate::geometry::{Rect, ResizeHandle, normalize_polygon, normalize_rotation, resize_rect};
use crate::group::{self, ChildUpdate};
use crate::history::History;
use crate::hit::{self, Hit};
use crate::input::{DragSession, InputState, Modifiers, ResizeSession};
use crate::snap::{self, SnapLine};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// What part of the document changed, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Elements,
    Selection,
    History,
}

impl Change {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elements => "elements",
            Self::Selection => "selection",
            Self::History => "history",
        }
    }
}

/// Handle returned by [`ElementDocument::subscribe`].
pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(Change)>;

/// A copied subtree, kept in paint order.
#[derive(Debug, Clone)]
struct Clipboard {
    root: ElementId,
    elements: Vec<Element>,
}

/// The element store.
///
/// `elements` is kept in paint order, so an element's index is its `z_index`.
pub struct ElementDocument {
    config: EngineConfig,
    elements: Vec<Element>,
    selection: Vec<ElementId>,
    clipboard: Option<Clipboard>,
    history: History,
    next_id: u64,
    input: InputState,
    snap_lines: Vec<SnapLine>,
    camera: Camera,
    viewport_width: f64,
    viewport_height: f64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl Default for ElementDocument {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl fmt::Debug for ElementDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDocument")
            .field("elements", &self.elements.len())
            .field("selection", &self.selection)
            .field("history", &self.history.len())
            .field("next_id", &self.next_id)
            .field("input", &self.input)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ElementDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            history: History::new(Snapshot::empty(), config.history_limit),
            config,
            elements: Vec::new(),
            selection: Vec::new(),
            clipboard: None,
            next_id: 1,
            input: InputState::Idle,
            snap_lines: Vec::new(),
            camera: Camera::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    // --- Queries ---

    /// All elements in paint order (back to front).
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Selected ids; the first is the primary selection.
    #[must_use]
    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    /// The primary selected element.
    #[must_use]
    pub fn primary_element(&self) -> Option<&Element> {
        self.selection.first().and_then(|id| self.element(id))
    }

    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    /// Guide lines from the latest snapped drag move.
    #[must_use]
    pub fn snap_lines(&self) -> &[SnapLine] {
        &self.snap_lines
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn is_gesture_active(&self) -> bool {
        !self.input.is_idle()
    }

    // --- Observers ---

    /// Register a callback invoked after every change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(Change) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a callback. Returns false if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, change: Change) {
        for (_, listener) in &mut self.listeners {
            listener(change);
        }
    }

    // --- View ---

    /// Update the viewport size in CSS pixels.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Camera::new(camera.pan_x, camera.pan_y, camera.zoom);
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// The document rectangle currently on screen.
    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        self.camera.visible_rect(self.viewport_width, self.viewport_height)
    }

    /// Topmost element under a document point, resolved to its outermost group.
    #[must_use]
    pub fn element_at(&self, world_pt: Point) -> Option<&Element> {
        hit::element_at(&self.elements, world_pt)
    }

    /// Resize handle of the primary selection under a document point.
    #[must_use]
    pub fn handle_at(&self, world_pt: Point) -> Option<ResizeHandle> {
        hit::handle_at(self.primary_element()?, world_pt, &self.camera)
    }

    #[must_use]
    pub fn hit_test(&self, world_pt: Point) -> Option<Hit> {
        hit::hit_test(world_pt, &self.elements, &self.camera, self.primary_element())
    }

    // --- Selection ---

    /// Make `id` the only selected element.
    pub fn select(&mut self, id: &str) -> bool {
        if self.element(id).is_none() {
            return false;
        }
        self.set_selection(vec![id.to_owned()]);
        true
    }

    pub fn add_to_selection(&mut self, id: &str) -> bool {
        if self.element(id).is_none() || self.selection.iter().any(|s| s == id) {
            return false;
        }
        let mut next = self.selection.clone();
        next.push(id.to_owned());
        self.set_selection(next);
        true
    }

    /// Add `id` to the selection, or remove it if already selected.
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if self.element(id).is_none() {
            return false;
        }
        let mut next = self.selection.clone();
        if let Some(pos) = next.iter().position(|s| s == id) {
            next.remove(pos);
        } else {
            next.push(id.to_owned());
        }
        self.set_selection(next);
        true
    }

    /// Select every top-level element.
    pub fn select_all(&mut self) {
        let ids = self.elements.iter().filter(|e| e.group_id.is_none()).map(|e| e.id.clone()).collect();
        self.set_selection(ids);
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(Vec::new());
    }

    fn set_selection(&mut self, ids: Vec<ElementId>) {
        if self.selection != ids {
            self.selection = ids;
            self.notify(Change::Selection);
        }
    }

    fn prune_selection(&mut self) {
        let kept: Vec<ElementId> = self.selection.iter().filter(|id| self.element(id).is_some()).cloned().collect();
        self.set_selection(kept);
    }

    /// Selected ids that exist and are not inside another selected element.
    fn selection_roots(&self) -> Vec<ElementId> {
        let selected: HashSet<&str> = self.selection.iter().map(String::as_str).collect();
        let mut roots: Vec<ElementId> = Vec::new();
        for id in &self.selection {
            if self.element(id).is_none() || roots.contains(id) {
                continue;
            }
            if self.ancestors(id).iter().any(|a| selected.contains(a.as_str())) {
                continue;
            }
            roots.push(id.clone());
        }
        roots
    }

    // --- Adding ---

    /// Add a shape with its top-left corner at `at`.
    pub fn add_shape(&mut self, shape_type: ShapeType, at: Point) -> ElementId {
        let size = self.config.default_size;
        self.insert_new(ElementKind::Shape(ShapeProps::new(shape_type)), Rect::new(at.x, at.y, size, size))
    }

    pub fn add_text(&mut self, content: &str, at: Point) -> ElementId {
        let rect = Rect::new(at.x, at.y, DEFAULT_TEXT_WIDTH, DEFAULT_TEXT_HEIGHT);
        self.insert_new(ElementKind::Text(TextProps::new(content)), rect)
    }

    pub fn add_icon(&mut self, icon_type: &str, at: Point) -> ElementId {
        let size = self.config.default_size;
        self.insert_new(ElementKind::Icon(IconProps::new(icon_type)), Rect::new(at.x, at.y, size, size))
    }

    /// Add a free polygon drawn in document coordinates.
    ///
    /// The element is placed at the polygon's bounds (floored to the minimum
    /// size) and stores its outline normalized to `0..=100`. Returns `None` for
    /// an empty or non-finite point list.
    pub fn add_custom_shape(&mut self, points: &[Point]) -> Option<ElementId> {
        let (bounds, normalized) = normalize_polygon(points)?;
        let min = self.config.min_element_size;
        let mut props = ShapeProps::new(ShapeType::Custom);
        props.custom_points = Some(normalized);
        let rect = Rect::new(bounds.x, bounds.y, bounds.width.max(min), bounds.height.max(min));
        Some(self.insert_new(ElementKind::Shape(props), rect))
    }

    fn insert_new(&mut self, kind: ElementKind, rect: Rect) -> ElementId {
        self.finish_gesture();
        let id = self.mint_id();
        debug!(%id, kind = kind.name(), "element added");
        self.elements.push(Element::new(id.clone(), kind, rect));
        self.repack_z();
        self.notify(Change::Elements);
        self.set_selection(vec![id.clone()]);
        self.commit();
        id
    }

    // --- Live edits (no history entry) ---

    /// Shallow-merge `patch` into an element.
    ///
    /// Does not commit; call [`ElementDocument::save_snapshot`] when the edit
    /// is complete. Patches with non-finite numbers or non-positive sizes are
    /// rejected, as are geometry fields on a group, whose box is derived from
    /// its members.
    pub fn update_element(&mut self, id: &str, patch: &ElementPatch) -> bool {
        if !patch_is_sane(patch) {
            warn!(%id, "rejected element patch with invalid geometry");
            return false;
        }
        let Some(el) = self.get_mut(id) else {
            return false;
        };
        if el.is_group() && patch_touches_geometry(patch) {
            warn!(%id, "rejected geometry patch on a group");
            return false;
        }
        if !el.apply_patch(patch) {
            warn!(%id, "rejected element patch with props for another kind");
            return false;
        }
        self.refresh_ancestors(id);
        self.notify(Change::Elements);
        true
    }

    /// Move an element and all of its descendants by `(dx, dy)`. Does not commit.
    pub fn update_element_position(&mut self, id: &str, dx: f64, dy: f64) -> bool {
        if !delta_is_finite(dx, dy) {
            return false;
        }
        let ids: HashSet<ElementId> = group::expand(id, &self.elements).into_iter().map(|e| e.id.clone()).collect();
        if ids.is_empty() {
            return false;
        }
        self.translate(&ids, dx, dy);
        self.refresh_ancestors(id);
        self.notify(Change::Elements);
        true
    }

    /// Drag one handle of an element by `(dx, dy)` from its current box.
    ///
    /// Groups rescale their members proportionally. Does not commit.
    pub fn resize_element(&mut self, id: &str, handle: ResizeHandle, dx: f64, dy: f64) -> bool {
        if !delta_is_finite(dx, dy) {
            return false;
        }
        let Some(origin) = self.element(id).map(Element::local_rect) else {
            return false;
        };
        let base = self.elements.clone();
        self.apply_resize(id, origin, handle, dx, dy, &base)
    }

    // --- Gestures ---

    /// Begin moving the current selection. Ends any gesture already in progress.
    pub fn start_drag(&mut self, modifiers: Modifiers) -> bool {
        self.finish_gesture();
        let roots = self.selection_roots();
        if roots.is_empty() {
            return false;
        }
        let origins = group::expand_all(&roots, &self.elements)
            .into_iter()
            .map(|e| (e.id.clone(), Point::new(e.x, e.y)))
            .collect();
        let snap_enabled = roots.len() == 1 && !modifiers.shift;
        debug!(count = roots.len(), snap_enabled, "drag started");
        self.input = InputState::Dragging(DragSession { roots, origins, snap_enabled, before: self.elements.clone() });
        true
    }

    /// Move the dragged selection to `(dx, dy)` from where the drag started.
    ///
    /// The delta is in document units. A single element snaps to the others.
    pub fn drag_to(&mut self, dx: f64, dy: f64) -> bool {
        if !delta_is_finite(dx, dy) {
            return false;
        }
        let session = match std::mem::take(&mut self.input) {
            InputState::Dragging(session) => session,
            other => {
                self.input = other;
                return false;
            }
        };

        let (dx, dy, lines) = self.snapped_delta(&session, dx, dy);
        {
            let origins: HashMap<&str, Point> = session.origins.iter().map(|(id, p)| (id.as_str(), *p)).collect();
            for el in &mut self.elements {
                if let Some(origin) = origins.get(el.id.as_str()) {
                    el.x = origin.x + dx;
                    el.y = origin.y + dy;
                }
            }
        }
        for root in &session.roots {
            self.refresh_ancestors(root);
        }
        self.snap_lines = lines;
        self.input = InputState::Dragging(session);
        self.notify(Change::Elements);
        true
    }

    fn snapped_delta(&self, session: &DragSession, dx: f64, dy: f64) -> (f64, f64, Vec<SnapLine>) {
        if !session.snap_enabled {
            return (dx, dy, Vec::new());
        }
        let Some(root) = session.roots.first() else {
            return (dx, dy, Vec::new());
        };
        let (Some(origin), Some(live)) = (session.origin_of(root), self.element(root)) else {
            return (dx, dy, Vec::new());
        };

        let mut probe = live.clone();
        probe.x = origin.x + dx;
        probe.y = origin.y + dy;

        let ancestors = self.ancestors(root);
        let excluded: HashSet<&str> = session
            .origins
            .iter()
            .map(|(id, _)| id.as_str())
            .chain(ancestors.iter().map(String::as_str))
            .collect();
        let threshold = self.camera.screen_dist_to_world(self.config.snap_threshold);
        let result = snap::snap(
            &probe,
            self.elements.iter().filter(|e| !excluded.contains(e.id.as_str())),
            threshold,
            self.visible_rect(),
        );
        (result.x - origin.x, result.y - origin.y, result.lines)
    }

    /// Finish a drag. Returns true if a history entry was committed.
    pub fn end_drag(&mut self) -> bool {
        if !matches!(self.input, InputState::Dragging(_)) {
            return false;
        }
        self.finish_gesture()
    }

    /// Begin resizing `id` by one of its handles. Ends any gesture already in progress.
    pub fn start_resize(&mut self, id: &str, handle: ResizeHandle) -> bool {
        self.finish_gesture();
        let Some(origin) = self.element(id).map(Element::local_rect) else {
            return false;
        };
        debug!(%id, handle = handle.as_str(), "resize started");
        self.input = InputState::Resizing(ResizeSession {
            id: id.to_owned(),
            handle,
            origin,
            before: self.elements.clone(),
        });
        true
    }

    /// Apply the handle drag `(dx, dy)` measured from where the resize started.
    pub fn resize_to(&mut self, dx: f64, dy: f64) -> bool {
        if !delta_is_finite(dx, dy) {
            return false;
        }
        let session = match std::mem::take(&mut self.input) {
            InputState::Resizing(session) => session,
            other => {
                self.input = other;
                return false;
            }
        };
        let changed = self.apply_resize(&session.id, session.origin, session.handle, dx, dy, &session.before);
        self.input = InputState::Resizing(session);
        changed
    }

    /// Finish a resize. Returns true if a history entry was committed.
    pub fn end_resize(&mut self) -> bool {
        if !matches!(self.input, InputState::Resizing(_)) {
            return false;
        }
        self.finish_gesture()
    }

    /// Abort the active gesture and restore the elements it started from.
    pub fn cancel_gesture(&mut self) -> bool {
        let before = match std::mem::take(&mut self.input) {
            InputState::Idle => return false,
            InputState::Dragging(s) => s.before,
            InputState::Resizing(s) => s.before,
        };
        self.snap_lines.clear();
        debug!("gesture cancelled");
        if self.elements != before {
            self.elements = before;
            self.notify(Change::Elements);
            self.prune_selection();
        }
        true
    }

    /// Close the active gesture, committing if it changed anything.
    fn finish_gesture(&mut self) -> bool {
        let before = match std::mem::take(&mut self.input) {
            InputState::Idle => return false,
            InputState::Dragging(s) => s.before,
            InputState::Resizing(s) => s.before,
        };
        self.snap_lines.clear();
        if self.elements == before {
            debug!("gesture ended without changes");
            return false;
        }
        debug!("gesture committed");
        self.commit();
        true
    }

    fn apply_resize(
        &mut self,
        id: &str,
        origin: Rect,
        handle: ResizeHandle,
        dx: f64,
        dy: f64,
        base: &[Element],
    ) -> bool {
        let Some(target) = base.iter().find(|e| e.id == id) else {
            return false;
        };
        let next = resize_rect(origin, handle, dx, dy, self.config.min_element_size);
        if target.is_group() {
            let updates = group::resize_children(target, origin, next, base, self.config.min_child_size);
            self.apply_updates(&updates);
        }
        let Some(el) = self.get_mut(id) else {
            return false;
        };
        el.set_local_rect(next);
        self.refresh_ancestors(id);
        self.notify(Change::Elements);
        true
    }

    // --- Discrete actions ---

    /// Delete an element. Groups take their members with them.
    pub fn delete_element(&mut self, id: &str) -> bool {
        if self.element(id).is_none() {
            return false;
        }
        self.delete_ids(&[id.to_owned()])
    }

    pub fn delete_selected(&mut self) -> bool {
        let roots = self.selection_roots();
        self.delete_ids(&roots)
    }

    fn delete_ids(&mut self, ids: &[ElementId]) -> bool {
        self.finish_gesture();
        let doomed: HashSet<ElementId> =
            group::expand_all(ids, &self.elements).into_iter().map(|e| e.id.clone()).collect();
        if doomed.is_empty() {
            return false;
        }

        let mut parents: Vec<ElementId> = Vec::new();
        for el in self.elements.iter().filter(|e| doomed.contains(&e.id)) {
            if let Some(parent) = &el.group_id
                && !doomed.contains(parent)
                && !parents.contains(parent)
            {
                parents.push(parent.clone());
            }
        }

        self.elements.retain(|e| !doomed.contains(&e.id));
        for el in &mut self.elements {
            if let Some(children) = el.child_ids_mut() {
                children.retain(|c| !doomed.contains(c));
            }
        }
        for parent in &parents {
            self.repair_group(parent);
        }
        self.repack_z();
        debug!(count = doomed.len(), "elements deleted");

        self.notify(Change::Elements);
        self.prune_selection();
        self.commit();
        true
    }

    /// Wrap the selection in a new group. Needs at least two selected elements.
    ///
    /// Members sharing one parent group stay nested under it; otherwise the new
    /// group is top-level and the members leave their old groups.
    pub fn group_selected_elements(&mut self) -> Option<ElementId> {
        self.finish_gesture();
        let members = self.selection_roots();
        if members.len() < 2 {
            return None;
        }
        let bounds = group::union_bounds(members.iter().filter_map(|id| self.element(id)))?;

        let mut old_parents: Vec<ElementId> = Vec::new();
        for id in &members {
            if let Some(parent) = self.element(id).and_then(|e| e.group_id.clone())
                && !old_parents.contains(&parent)
            {
                old_parents.push(parent);
            }
        }
        let all_nested = members.iter().all(|id| self.element(id).is_some_and(|e| e.group_id.is_some()));
        let shared_parent = if all_nested && old_parents.len() == 1 { old_parents.first().cloned() } else { None };

        let group_id = self.mint_id();
        for parent_id in &old_parents {
            let Some(children) = self.get_mut(parent_id).and_then(Element::child_ids_mut) else {
                continue;
            };
            let insert_at = children.iter().position(|c| members.contains(c));
            children.retain(|c| !members.contains(c));
            if shared_parent.as_ref() == Some(parent_id)
                && let Some(pos) = insert_at
            {
                children.insert(pos.min(children.len()), group_id.clone());
            }
        }
        for id in &members {
            if let Some(el) = self.get_mut(id) {
                el.group_id = Some(group_id.clone());
            }
        }

        let mut group_el =
            Element::new(group_id.clone(), ElementKind::Group(GroupProps { child_ids: members.clone() }), bounds);
        group_el.group_id.clone_from(&shared_parent);
        self.elements.push(group_el);
        for parent_id in &old_parents {
            self.repair_group(parent_id);
        }
        self.repack_z();
        debug!(group = %group_id, members = members.len(), "grouped");

        self.notify(Change::Elements);
        self.set_selection(vec![group_id.clone()]);
        self.commit();
        Some(group_id)
    }

    /// Dissolve every selected group, selecting its former members.
    ///
    /// Members move up to the dissolved group's own parent. Returns the freed ids.
    pub fn ungroup_selected_elements(&mut self) -> Vec<ElementId> {
        self.finish_gesture();
        let groups: Vec<ElementId> =
            self.selection_roots().into_iter().filter(|id| self.element(id).is_some_and(Element::is_group)).collect();
        if groups.is_empty() {
            return Vec::new();
        }

        let mut freed = Vec::new();
        for group_id in &groups {
            freed.extend(self.dissolve(group_id));
        }
        self.repack_z();
        debug!(groups = groups.len(), freed = freed.len(), "ungrouped");

        self.notify(Change::Elements);
        self.set_selection(freed.clone());
        self.commit();
        freed
    }

    /// Copy the primary selection (with its members) to the clipboard.
    pub fn copy_selected_element(&mut self) -> bool {
        let Some(root) = self.selection_roots().into_iter().next() else {
            return false;
        };
        let mut elements = self.subtree_in_paint_order(&root);
        if let Some(copied_root) = elements.iter_mut().find(|e| e.id == root) {
            copied_root.group_id = None;
        }
        debug!(%root, count = elements.len(), "copied");
        self.clipboard = Some(Clipboard { root, elements });
        true
    }

    /// Paste the clipboard one offset step further than the previous paste.
    pub fn paste_element(&mut self) -> Option<ElementId> {
        let offset = self.config.paste_offset;
        let clipboard = self.clipboard.as_mut()?;
        for el in &mut clipboard.elements {
            el.x += offset;
            el.y += offset;
        }
        let root = clipboard.root.clone();
        let copies = clipboard.elements.clone();
        Some(self.insert_copies(&root, copies))
    }

    /// Copy the primary selection in place, offset by one paste step.
    pub fn duplicate_selected_element(&mut self) -> Option<ElementId> {
        let root = self.selection_roots().into_iter().next()?;
        let offset = self.config.paste_offset;
        let mut copies = self.subtree_in_paint_order(&root);
        for el in &mut copies {
            el.x += offset;
            el.y += offset;
            if el.id == root {
                el.group_id = None;
            }
        }
        Some(self.insert_copies(&root, copies))
    }

    fn insert_copies(&mut self, root: &str, mut copies: Vec<Element>) -> ElementId {
        self.finish_gesture();
        let mut id_map: HashMap<ElementId, ElementId> = HashMap::with_capacity(copies.len());
        for el in &copies {
            let fresh = self.mint_id();
            id_map.insert(el.id.clone(), fresh);
        }
        group::remap_ids(&mut copies, &id_map);
        for el in &mut copies {
            if let Some(fresh) = id_map.get(&el.id) {
                el.id.clone_from(fresh);
            }
        }
        let new_root = id_map.get(root).cloned().unwrap_or_else(|| root.to_owned());
        debug!(root = %new_root, count = copies.len(), "pasted");

        self.elements.extend(copies);
        self.repack_z();
        self.notify(Change::Elements);
        self.set_selection(vec![new_root.clone()]);
        self.commit();
        new_root
    }

    /// Move the primary selection (and its members) to the top of the paint order.
    pub fn bring_to_front(&mut self) -> bool {
        self.reorder(true)
    }

    /// Move the primary selection (and its members) to the bottom of the paint order.
    pub fn bring_to_back(&mut self) -> bool {
        self.reorder(false)
    }

    fn reorder(&mut self, to_front: bool) -> bool {
        let Some(root) = self.selection_roots().into_iter().next() else {
            return false;
        };
        let block: HashSet<ElementId> =
            group::expand(&root, &self.elements).into_iter().map(|e| e.id.clone()).collect();
        let n = self.elements.len();
        let k = block.len();
        let in_place = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| block.contains(&e.id))
            .all(|(i, _)| if to_front { i >= n - k } else { i < k });
        if in_place {
            return false;
        }

        self.finish_gesture();
        let (moving, rest): (Vec<Element>, Vec<Element>) =
            std::mem::take(&mut self.elements).into_iter().partition(|e| block.contains(&e.id));
        self.elements = if to_front {
            rest.into_iter().chain(moving).collect()
        } else {
            moving.into_iter().chain(rest).collect()
        };
        self.repack_z();
        debug!(%root, to_front, "reordered");

        self.notify(Change::Elements);
        self.commit();
        true
    }

    /// Turn every selected element 90° clockwise. Groups turn about their center.
    pub fn rotate_selected(&mut self) -> bool {
        let roots = self.selection_roots();
        if roots.is_empty() {
            return false;
        }
        self.finish_gesture();
        for id in &roots {
            let Some(el) = self.element(id) else {
                continue;
            };
            if el.is_group() {
                let outcome = group::rotate_children(el, &self.elements);
                self.apply_updates(&outcome.child_updates);
                if let Some(bounds) = outcome.new_group_bounds
                    && let Some(group_el) = self.get_mut(id)
                {
                    group_el.set_local_rect(bounds);
                }
            } else if let Some(el) = self.get_mut(id) {
                el.rotation = normalize_rotation(el.rotation + 90.0);
            }
            self.refresh_ancestors(id);
        }
        debug!(count = roots.len(), "rotated");

        self.notify(Change::Elements);
        self.commit();
        true
    }

    /// Move the selection by `(dx, dy)` and commit, as for arrow keys.
    pub fn nudge_selected(&mut self, dx: f64, dy: f64) -> bool {
        if !delta_is_finite(dx, dy) || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        let roots = self.selection_roots();
        if roots.is_empty() {
            return false;
        }
        self.finish_gesture();
        let ids: HashSet<ElementId> =
            group::expand_all(&roots, &self.elements).into_iter().map(|e| e.id.clone()).collect();
        self.translate(&ids, dx, dy);
        for root in &roots {
            self.refresh_ancestors(root);
        }
        self.notify(Change::Elements);
        self.commit();
        true
    }

    // --- History ---

    /// Record the current elements as a new undo step.
    pub fn save_snapshot(&mut self) {
        self.commit();
    }

    /// Step back one history entry. An active gesture is cancelled first.
    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        let elements = snapshot.elements.clone();
        debug!(index = self.history.index(), "undo");
        self.restore(elements);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        let elements = snapshot.elements.clone();
        debug!(index = self.history.index(), "redo");
        self.restore(elements);
        true
    }

    fn restore(&mut self, elements: Vec<Element>) {
        self.elements = elements;
        self.notify(Change::Elements);
        self.prune_selection();
        self.notify(Change::History);
    }

    fn commit(&mut self) {
        self.history.push(Snapshot::capture(self.next_id, &self.elements));
        self.notify(Change::History);
    }

    // --- Import / export ---

    /// A deep copy of the document state.
    #[must_use]
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::capture(self.next_id, &self.elements)
    }

    /// Replace the whole document with `snapshot`.
    ///
    /// History restarts at the imported state; selection and any active
    /// gesture are cleared.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the document is left untouched.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) -> Result<(), ImportError> {
        if let Err(err) = snapshot.validate() {
            warn!(error = %err, "snapshot rejected");
            return Err(err);
        }
        let Snapshot { next_id, mut elements, .. } = snapshot;
        elements.sort_by_key(|e| e.z_index);
        for el in &mut elements {
            el.rotation = normalize_rotation(el.rotation);
        }

        self.input = InputState::Idle;
        self.snap_lines.clear();
        self.elements = elements;
        self.repack_z();
        self.next_id = next_id.max(1);
        self.history.reset(Snapshot::capture(self.next_id, &self.elements));
        debug!(elements = self.elements.len(), next_id = self.next_id, "snapshot imported");

        self.notify(Change::Elements);
        self.set_selection(Vec::new());
        self.notify(Change::History);
        Ok(())
    }

    /// Parse snapshot JSON and import it.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for unreadable JSON, or the validation failure.
    pub fn load_json(&mut self, text: &str) -> Result<(), ImportError> {
        let snapshot: Snapshot = match serde_json::from_str(text) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "snapshot JSON rejected");
                return Err(err.into());
            }
        };
        self.import_snapshot(snapshot)
    }

    /// Pretty-printed snapshot JSON of the current document.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization fails.
    pub fn save_json(&self) -> Result<String, serde_json::Error> {
        self.export_snapshot().to_json_pretty()
    }

    // --- Internals ---

    fn position(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    /// A fresh id from the counter, skipping any already in use.
    fn mint_id(&mut self) -> ElementId {
        loop {
            let id = format!("{ID_PREFIX}{}", self.next_id);
            self.next_id += 1;
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    fn repack_z(&mut self) {
        for (i, el) in self.elements.iter_mut().enumerate() {
            el.z_index = i64::try_from(i).unwrap_or(i64::MAX);
        }
    }

    fn translate(&mut self, ids: &HashSet<ElementId>, dx: f64, dy: f64) {
        for el in self.elements.iter_mut().filter(|e| ids.contains(&e.id)) {
            el.x += dx;
            el.y += dy;
        }
    }

    fn apply_updates(&mut self, updates: &[ChildUpdate]) {
        for update in updates {
            if let Some(el) = self.get_mut(&update.id)
                && !el.apply_patch(&update.updates)
            {
                warn!(id = %update.id, "group update rejected");
            }
        }
    }

    /// Ids of the groups enclosing `id`, innermost first.
    fn ancestors(&self, id: &str) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = Vec::new();
        let mut cursor = self.element(id).and_then(|e| e.group_id.clone());
        while let Some(parent) = cursor {
            if out.contains(&parent) || out.len() > self.elements.len() {
                break;
            }
            cursor = self.element(&parent).and_then(|e| e.group_id.clone());
            out.push(parent);
        }
        out
    }

    /// Recompute the cached bounds of every group enclosing `id`.
    fn refresh_ancestors(&mut self, id: &str) {
        for group_id in self.ancestors(id) {
            let Some(pos) = self.position(&group_id) else {
                break;
            };
            if let Some(bounds) = group::member_bounds(&self.elements[pos], &self.elements) {
                self.elements[pos].set_local_rect(bounds);
            }
        }
    }

    /// After members were removed from `group_id`: dissolve it if fewer than
    /// two remain, otherwise refresh its bounds and those above it.
    fn repair_group(&mut self, group_id: &str) {
        let Some(group_el) = self.element(group_id) else {
            return;
        };
        if group_el.child_ids().len() >= 2 {
            if let Some(bounds) = group::member_bounds(group_el, &self.elements)
                && let Some(group_el) = self.get_mut(group_id)
            {
                group_el.set_local_rect(bounds);
            }
            self.refresh_ancestors(group_id);
            return;
        }
        let parent = group_el.group_id.clone();
        self.dissolve(group_id);
        debug!(group = group_id, "group dissolved");
        if let Some(parent) = parent {
            self.repair_group(&parent);
        }
    }

    /// Remove a group element, handing its members to the group's parent.
    fn dissolve(&mut self, group_id: &str) -> Vec<ElementId> {
        let Some(group_el) = self.element(group_id) else {
            return Vec::new();
        };
        let members = group_el.child_ids().to_vec();
        let parent = group_el.group_id.clone();
        for id in &members {
            if let Some(el) = self.get_mut(id) {
                el.group_id.clone_from(&parent);
            }
        }
        if let Some(parent_id) = &parent
            && let Some(children) = self.get_mut(parent_id).and_then(Element::child_ids_mut)
            && let Some(pos) = children.iter().position(|c| c == group_id)
        {
            children.splice(pos..=pos, members.iter().cloned());
        }
        self.elements.retain(|e| e.id != group_id);
        members
    }

    /// `root` and its descendants, cloned in paint order.
    fn subtree_in_paint_order(&self, root: &str) -> Vec<Element> {
        let ids: HashSet<&str> = group::expand(root, &self.elements).into_iter().map(|e| e.id.as_str()).collect();
        self.elements.iter().filter(|e| ids.contains(e.id.as_str())).cloned().collect()
    }
}

fn patch_is_sane(patch: &ElementPatch) -> bool {
    let finite = [patch.x, patch.y, patch.rotation].into_iter().flatten().all(f64::is_finite);
    let sized = [patch.width, patch.height].into_iter().flatten().all(|v| v.is_finite() && v > 0.0);
    finite && sized
}

fn patch_touches_geometry(patch: &ElementPatch) -> bool {
    [patch.x, patch.y, patch.width, patch.height, patch.rotation].iter().any(Option::is_some)
}

fn delta_is_finite(dx: f64, dy: f64) -> bool {
    dx.is_finite() && dy.is_finite()
}
