#![allow(clippy::float_cmp)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use super::*;
use crate::snap::SnapAxis;

// =============================================================
// Helpers
// =============================================================

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn rect_of(doc: &ElementDocument, id: &str) -> Rect {
    doc.element(id).map(Element::local_rect).unwrap_or(Rect::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN))
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn assert_rect(actual: Rect, expected: Rect) {
    assert!(
        approx_eq(actual.x, expected.x)
            && approx_eq(actual.y, expected.y)
            && approx_eq(actual.width, expected.width)
            && approx_eq(actual.height, expected.height),
        "expected {expected:?}, got {actual:?}"
    );
}

fn rectangle(doc: &mut ElementDocument, x: f64, y: f64) -> ElementId {
    doc.add_shape(ShapeType::Rectangle, pt(x, y))
}

fn assert_dense_z(doc: &ElementDocument) {
    for (i, el) in doc.elements().iter().enumerate() {
        assert_eq!(el.z_index, i64::try_from(i).unwrap_or(-1), "z gap at {}", el.id);
    }
}

fn select_many(doc: &mut ElementDocument, ids: &[&ElementId]) {
    doc.clear_selection();
    for id in ids {
        assert!(doc.add_to_selection(id));
    }
}

/// Two 100x100 rectangles at (0,0) and (200,0), grouped.
fn grouped_pair() -> (ElementDocument, ElementId, ElementId, ElementId) {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 200.0, 0.0);
    select_many(&mut doc, &[&a, &b]);
    let g = doc.group_selected_elements().unwrap_or_default();
    (doc, a, b, g)
}

// =============================================================
// Adding
// =============================================================

#[test]
fn add_shape_mints_sequential_ids_and_commits() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 10.0, 20.0);
    let b = doc.add_shape(ShapeType::Star, pt(0.0, 0.0));
    assert_eq!(a, "element-1");
    assert_eq!(b, "element-2");
    assert_eq!(doc.selection(), [b.clone()]);
    assert_eq!(doc.history().len(), 3);
    assert!(doc.can_undo());
    assert_rect(rect_of(&doc, &a), Rect::new(10.0, 20.0, 100.0, 100.0));
    assert_dense_z(&doc);
}

#[test]
fn add_text_and_icon_use_their_default_sizes() {
    let mut doc = ElementDocument::new();
    let t = doc.add_text("hello", pt(5.0, 5.0));
    let i = doc.add_icon("heart", pt(0.0, 0.0));
    assert_rect(rect_of(&doc, &t), Rect::new(5.0, 5.0, 200.0, 50.0));
    assert_rect(rect_of(&doc, &i), Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(matches!(doc.element(&t).map(|e| &e.kind), Some(ElementKind::Text(p)) if p.content == "hello"));
}

#[test]
fn add_custom_shape_normalizes_points() {
    let mut doc = ElementDocument::new();
    let id = doc.add_custom_shape(&[pt(10.0, 10.0), pt(110.0, 10.0), pt(60.0, 60.0)]).unwrap_or_default();
    assert_rect(rect_of(&doc, &id), Rect::new(10.0, 10.0, 100.0, 50.0));
    let Some(ElementKind::Shape(props)) = doc.element(&id).map(|e| &e.kind) else {
        panic!("custom shape missing");
    };
    assert_eq!(props.shape_type, ShapeType::Custom);
    assert_eq!(
        props.custom_points.as_deref(),
        Some(&[pt(0.0, 0.0), pt(100.0, 0.0), pt(50.0, 100.0)][..])
    );
}

#[test]
fn add_custom_shape_rejects_empty() {
    let mut doc = ElementDocument::new();
    assert!(doc.add_custom_shape(&[]).is_none());
    assert!(doc.is_empty());
    assert!(!doc.can_undo());
}

#[test]
fn config_default_size_applies() {
    let config = EngineConfig { default_size: 40.0, ..EngineConfig::default() };
    let mut doc = ElementDocument::with_config(config);
    let id = rectangle(&mut doc, 0.0, 0.0);
    assert_rect(rect_of(&doc, &id), Rect::new(0.0, 0.0, 40.0, 40.0));
}

// =============================================================
// Live edits
// =============================================================

#[test]
fn update_element_does_not_commit() {
    let mut doc = ElementDocument::new();
    let id = rectangle(&mut doc, 0.0, 0.0);
    let before = doc.history().len();
    let patch = ElementPatch { x: Some(50.0), props: Some(json!({ "fillColor": "#000000" })), ..Default::default() };
    assert!(doc.update_element(&id, &patch));
    assert_eq!(doc.history().len(), before);
    assert_eq!(doc.element(&id).map(|e| e.x), Some(50.0));
    assert!(matches!(doc.element(&id).map(|e| &e.kind), Some(ElementKind::Shape(p)) if p.fill_color == "#000000"));

    doc.save_snapshot();
    assert_eq!(doc.history().len(), before + 1);
}

#[test]
fn update_element_rejects_bad_geometry_and_unknown_ids() {
    let mut doc = ElementDocument::new();
    let id = rectangle(&mut doc, 0.0, 0.0);
    assert!(!doc.update_element(&id, &ElementPatch { width: Some(0.0), ..Default::default() }));
    assert!(!doc.update_element(&id, &ElementPatch { x: Some(f64::NAN), ..Default::default() }));
    assert!(!doc.update_element("nope", &ElementPatch { x: Some(1.0), ..Default::default() }));
    assert_rect(rect_of(&doc, &id), Rect::new(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn group_geometry_is_derived_from_members() {
    let (mut doc, a, _b, g) = grouped_pair();
    let patch = ElementPatch { x: Some(500.0), rotation: Some(90.0), ..Default::default() };
    assert!(!doc.update_element(&g, &patch));
    assert_rect(rect_of(&doc, &g), Rect::new(0.0, 0.0, 300.0, 100.0));
    assert_eq!(doc.element(&g).map(|e| e.rotation), Some(0.0));
    assert_rect(rect_of(&doc, &a), Rect::new(0.0, 0.0, 100.0, 100.0));

    let link = ElementPatch { link: Some("https://example.com".to_owned()), ..Default::default() };
    assert!(doc.update_element(&g, &link));
    assert_eq!(doc.element(&g).and_then(|e| e.link.as_deref()), Some("https://example.com"));
}

#[test]
fn update_element_position_moves_group_members() {
    let (mut doc, a, b, g) = grouped_pair();
    assert!(doc.update_element_position(&g, 10.0, 5.0));
    assert_rect(rect_of(&doc, &a), Rect::new(10.0, 5.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &b), Rect::new(210.0, 5.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &g), Rect::new(10.0, 5.0, 300.0, 100.0));
}

#[test]
fn moving_a_member_refreshes_group_bounds() {
    let (mut doc, a, _b, g) = grouped_pair();
    assert!(doc.update_element_position(&a, -50.0, 0.0));
    assert_rect(rect_of(&doc, &g), Rect::new(-50.0, 0.0, 350.0, 100.0));
}

#[test]
fn resize_element_west_keeps_east_edge() {
    let mut doc = ElementDocument::new();
    let id = rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.resize_element(&id, ResizeHandle::W, -10.0, 0.0));
    assert_rect(rect_of(&doc, &id), Rect::new(-10.0, 0.0, 110.0, 100.0));
}

// =============================================================
// History
// =============================================================

#[test]
fn undo_redo_round_trip() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.update_element_position(&a, 30.0, 0.0));
    doc.save_snapshot();
    let after = doc.elements().to_vec();

    assert!(doc.undo());
    assert_eq!(doc.element(&a).map(|e| e.x), Some(0.0));
    assert!(doc.redo());
    assert_eq!(doc.elements(), after.as_slice());
    assert!(!doc.redo());
}

#[test]
fn new_action_after_undo_discards_redo() {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 0.0, 0.0);
    rectangle(&mut doc, 10.0, 0.0);
    assert!(doc.undo());
    assert!(doc.can_redo());
    rectangle(&mut doc, 20.0, 0.0);
    assert!(!doc.can_redo());
    assert_eq!(doc.len(), 2);
}

#[test]
fn undo_keeps_id_counter_and_clears_dangling_selection() {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 10.0, 0.0);
    assert_eq!(doc.selection(), [b.clone()]);
    assert!(doc.undo());
    assert!(doc.selection().is_empty());
    let c = rectangle(&mut doc, 20.0, 0.0);
    assert_eq!(c, "element-3");
}

#[test]
fn undo_at_base_is_noop() {
    let mut doc = ElementDocument::new();
    assert!(!doc.undo());
    assert!(!doc.can_undo());
}

#[test]
fn history_limit_from_config() {
    let config = EngineConfig { history_limit: 3, ..EngineConfig::default() };
    let mut doc = ElementDocument::with_config(config);
    for i in 0..5 {
        rectangle(&mut doc, f64::from(i) * 10.0, 0.0);
    }
    assert_eq!(doc.history().len(), 3);
    assert!(doc.undo());
    assert!(doc.undo());
    assert!(!doc.undo());
    assert_eq!(doc.len(), 3);
}

// =============================================================
// Delete
// =============================================================

#[test]
fn delete_element_clears_selection_and_commits() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 10.0, 0.0);
    let before = doc.history().len();
    assert!(doc.delete_element(&b));
    assert!(doc.element(&b).is_none());
    assert!(doc.selection().is_empty());
    assert_eq!(doc.history().len(), before + 1);
    assert!(doc.element(&a).is_some());
    assert!(!doc.delete_element("missing"));
    assert_dense_z(&doc);
}

#[test]
fn deleting_group_cascades() {
    let (mut doc, a, b, g) = grouped_pair();
    let c = rectangle(&mut doc, 500.0, 0.0);
    assert!(doc.delete_element(&g));
    assert!(doc.element(&a).is_none());
    assert!(doc.element(&b).is_none());
    assert_eq!(doc.len(), 1);
    assert!(doc.element(&c).is_some());
    assert_dense_z(&doc);
}

#[test]
fn deleting_member_of_pair_dissolves_group() {
    let (mut doc, a, b, g) = grouped_pair();
    assert!(doc.delete_element(&a));
    assert!(doc.element(&g).is_none());
    assert_eq!(doc.element(&b).and_then(|e| e.group_id.clone()), None);
    assert_eq!(doc.len(), 1);
}

#[test]
fn deleting_member_of_larger_group_refreshes_bounds() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 200.0, 0.0);
    let c = rectangle(&mut doc, 400.0, 0.0);
    select_many(&mut doc, &[&a, &b, &c]);
    let g = doc.group_selected_elements().unwrap_or_default();
    assert!(doc.delete_element(&c));
    assert_eq!(doc.element(&g).map(|e| e.child_ids().to_vec()), Some(vec![a, b]));
    assert_rect(rect_of(&doc, &g), Rect::new(0.0, 0.0, 300.0, 100.0));
}

#[test]
fn dissolving_nested_group_hands_member_to_outer_group() {
    let (mut doc, a, b, g1) = grouped_pair();
    let c = rectangle(&mut doc, 0.0, 300.0);
    select_many(&mut doc, &[&g1, &c]);
    let g2 = doc.group_selected_elements().unwrap_or_default();

    assert!(doc.delete_element(&a));
    assert!(doc.element(&g1).is_none());
    assert_eq!(doc.element(&b).and_then(|e| e.group_id.clone()), Some(g2.clone()));
    assert_eq!(doc.element(&g2).map(|e| e.child_ids().to_vec()), Some(vec![b, c]));
    assert_rect(rect_of(&doc, &g2), Rect::new(0.0, 0.0, 300.0, 400.0));
}

#[test]
fn delete_selected_removes_all_in_one_step() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 10.0, 0.0);
    rectangle(&mut doc, 20.0, 0.0);
    select_many(&mut doc, &[&a, &b]);
    let before = doc.history().len();
    assert!(doc.delete_selected());
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.history().len(), before + 1);
}

// =============================================================
// Group / ungroup
// =============================================================

#[test]
fn group_needs_two_elements() {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.group_selected_elements().is_none());
}

#[test]
fn group_wires_membership_and_bounds() {
    let (doc, a, b, g) = grouped_pair();
    let group_el = doc.element(&g);
    assert!(group_el.is_some_and(Element::is_group));
    assert_eq!(group_el.map(|e| e.child_ids().to_vec()), Some(vec![a.clone(), b.clone()]));
    assert_eq!(doc.element(&a).and_then(|e| e.group_id.clone()), Some(g.clone()));
    assert_eq!(doc.element(&b).and_then(|e| e.group_id.clone()), Some(g.clone()));
    assert_rect(rect_of(&doc, &g), Rect::new(0.0, 0.0, 300.0, 100.0));
    assert_eq!(doc.selection(), [g.clone()]);
    // Two adds plus one group action.
    assert_eq!(doc.history().len(), 4);
    assert_dense_z(&doc);
}

#[test]
fn group_then_ungroup_restores_members() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 200.0, 50.0);
    assert!(doc.update_element(&b, &ElementPatch { rotation: Some(90.0), ..Default::default() }));
    let before: Vec<Element> = doc.elements().to_vec();

    select_many(&mut doc, &[&a, &b]);
    assert!(doc.group_selected_elements().is_some());
    let freed = doc.ungroup_selected_elements();

    assert_eq!(freed, vec![a.clone(), b.clone()]);
    assert!(doc.elements().iter().all(|e| !e.is_group()));
    for original in &before {
        let now = doc.element(&original.id);
        assert_eq!(now.map(Element::local_rect), Some(original.local_rect()));
        assert_eq!(now.map(|e| e.rotation), Some(original.rotation));
        assert_eq!(now.and_then(|e| e.group_id.clone()), None);
    }
    assert_eq!(doc.selection(), freed.as_slice());
}

#[test]
fn group_of_siblings_stays_nested() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 200.0, 0.0);
    let c = rectangle(&mut doc, 400.0, 0.0);
    select_many(&mut doc, &[&a, &b, &c]);
    let outer = doc.group_selected_elements().unwrap_or_default();

    select_many(&mut doc, &[&a, &b]);
    let inner = doc.group_selected_elements().unwrap_or_default();
    assert_eq!(doc.element(&inner).and_then(|e| e.group_id.clone()), Some(outer.clone()));
    assert_eq!(doc.element(&outer).map(|e| e.child_ids().to_vec()), Some(vec![inner.clone(), c]));
    assert!(doc.export_snapshot().validate().is_ok());
}

#[test]
fn ungroup_nested_reparents_to_outer() {
    let (mut doc, a, b, g1) = grouped_pair();
    let c = rectangle(&mut doc, 0.0, 300.0);
    select_many(&mut doc, &[&g1, &c]);
    let g2 = doc.group_selected_elements().unwrap_or_default();

    assert!(doc.select(&g1));
    assert_eq!(doc.ungroup_selected_elements(), vec![a.clone(), b.clone()]);
    assert_eq!(doc.element(&a).and_then(|e| e.group_id.clone()), Some(g2.clone()));
    assert_eq!(doc.element(&g2).map(|e| e.child_ids().to_vec()), Some(vec![a, b, c]));
    assert!(doc.export_snapshot().validate().is_ok());
}

#[test]
fn ungroup_without_group_selected_is_noop() {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 0.0, 0.0);
    let before = doc.history().len();
    assert!(doc.ungroup_selected_elements().is_empty());
    assert_eq!(doc.history().len(), before);
}

// =============================================================
// Clipboard
// =============================================================

#[test]
fn repeated_paste_steps_forward() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 100.0, 100.0);
    assert!(doc.copy_selected_element());
    let p1 = doc.paste_element().unwrap_or_default();
    let p2 = doc.paste_element().unwrap_or_default();
    assert_ne!(p1, a);
    assert_ne!(p1, p2);
    assert_rect(rect_of(&doc, &p1), Rect::new(120.0, 120.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &p2), Rect::new(140.0, 140.0, 100.0, 100.0));
    assert_eq!(doc.selection(), [p2.clone()]);
    assert_eq!(doc.element(&p2).map(|e| e.z_index), Some(2));
}

#[test]
fn paste_without_copy_is_none() {
    let mut doc = ElementDocument::new();
    assert!(doc.paste_element().is_none());
    assert!(!doc.has_clipboard());
}

#[test]
fn clipboard_survives_deleting_the_source() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.copy_selected_element());
    assert!(doc.delete_element(&a));
    assert!(doc.paste_element().is_some());
    assert_eq!(doc.len(), 1);
}

#[test]
fn pasting_a_group_remaps_members() {
    let (mut doc, a, _b, g) = grouped_pair();
    assert!(doc.copy_selected_element());
    let pasted = doc.paste_element().unwrap_or_default();
    assert_ne!(pasted, g);
    assert_eq!(doc.len(), 6);

    let members = doc.element(&pasted).map(|e| e.child_ids().to_vec()).unwrap_or_default();
    assert_eq!(members.len(), 2);
    assert!(!members.contains(&a));
    for m in &members {
        assert_eq!(doc.element(m).and_then(|e| e.group_id.clone()), Some(pasted.clone()));
    }
    assert_rect(rect_of(&doc, &pasted), Rect::new(20.0, 20.0, 300.0, 100.0));
    assert!(doc.export_snapshot().validate().is_ok());
}

#[test]
fn pasting_a_member_detaches_the_copy() {
    let (mut doc, a, _b, g) = grouped_pair();
    assert!(doc.select(&a));
    assert!(doc.copy_selected_element());
    let pasted = doc.paste_element().unwrap_or_default();
    assert_eq!(doc.element(&pasted).and_then(|e| e.group_id.clone()), None);
    assert_eq!(doc.element(&g).map(|e| e.child_ids().len()), Some(2));
}

#[test]
fn duplicate_offsets_from_live_element() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let d1 = doc.duplicate_selected_element().unwrap_or_default();
    let d2 = doc.duplicate_selected_element().unwrap_or_default();
    assert_rect(rect_of(&doc, &d1), Rect::new(20.0, 20.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &d2), Rect::new(40.0, 40.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &a), Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(!doc.has_clipboard());
}

// =============================================================
// Z-order
// =============================================================

#[test]
fn bring_to_front_and_back() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 0.0, 0.0);
    let c = rectangle(&mut doc, 0.0, 0.0);

    assert!(doc.select(&a));
    assert!(doc.bring_to_front());
    let order: Vec<&str> = doc.elements().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, [b.as_str(), c.as_str(), a.as_str()]);
    assert_dense_z(&doc);

    assert!(doc.select(&c));
    assert!(doc.bring_to_back());
    let order: Vec<&str> = doc.elements().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, [c.as_str(), b.as_str(), a.as_str()]);
    assert_dense_z(&doc);
}

#[test]
fn reorder_at_extreme_commits_nothing() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let b = rectangle(&mut doc, 0.0, 0.0);
    let before = doc.history().len();
    assert!(doc.select(&b));
    assert!(!doc.bring_to_front());
    assert!(doc.select(&a));
    assert!(!doc.bring_to_back());
    assert_eq!(doc.history().len(), before);
}

#[test]
fn reorder_moves_group_block() {
    let (mut doc, a, b, g) = grouped_pair();
    let c = rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.select(&g));
    assert!(doc.bring_to_front());
    assert_eq!(doc.elements().first().map(|e| e.id.clone()), Some(c));
    let tail: Vec<&str> = doc.elements().iter().skip(1).map(|e| e.id.as_str()).collect();
    assert_eq!(tail, [a.as_str(), b.as_str(), g.as_str()]);
    assert_dense_z(&doc);
}

// =============================================================
// Rotate / nudge
// =============================================================

#[test]
fn rotate_selected_single_element() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    for expected in [90.0, 180.0, 270.0, 0.0] {
        assert!(doc.rotate_selected());
        assert_eq!(doc.element(&a).map(|e| e.rotation), Some(expected));
    }
}

#[test]
fn rotate_selected_group_turns_about_center() {
    let (mut doc, a, b, g) = grouped_pair();
    assert!(doc.rotate_selected());
    assert_rect(rect_of(&doc, &a), Rect::new(100.0, 100.0, 100.0, 100.0));
    assert_rect(rect_of(&doc, &b), Rect::new(100.0, -100.0, 100.0, 100.0));
    assert_eq!(doc.element(&a).map(|e| e.rotation), Some(90.0));
    assert_rect(rect_of(&doc, &g), Rect::new(100.0, -100.0, 100.0, 300.0));
    assert_eq!(doc.element(&g).map(|e| e.rotation), Some(0.0));
}

#[test]
fn nudge_moves_and_commits() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let before = doc.history().len();
    assert!(doc.nudge_selected(1.0, -1.0));
    assert_rect(rect_of(&doc, &a), Rect::new(1.0, -1.0, 100.0, 100.0));
    assert_eq!(doc.history().len(), before + 1);
    assert!(!doc.nudge_selected(0.0, 0.0));
    assert_eq!(doc.history().len(), before + 1);
}

// =============================================================
// Drag gesture
// =============================================================

/// Target at x=200 and a dragged element far below it, selected.
fn snap_setup() -> (ElementDocument, ElementId) {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 200.0, 0.0);
    let dragged = rectangle(&mut doc, 0.0, 300.0);
    (doc, dragged)
}

#[test]
fn drag_commits_once_per_gesture() {
    let (mut doc, id) = snap_setup();
    let before = doc.history().len();
    assert!(doc.start_drag(Modifiers::default()));
    for step in 1..=10 {
        assert!(doc.drag_to(f64::from(step) * 3.0, 0.0));
    }
    assert_eq!(doc.history().len(), before);
    assert!(doc.end_drag());
    assert_eq!(doc.history().len(), before + 1);
    assert_eq!(doc.element(&id).map(|e| e.x), Some(30.0));
    assert!(!doc.is_gesture_active());
}

#[test]
fn non_finite_deltas_are_ignored() {
    let (mut doc, id) = snap_setup();
    let before = doc.history().len();

    assert!(doc.start_drag(Modifiers { shift: true, ..Modifiers::default() }));
    assert!(!doc.drag_to(f64::NAN, 0.0));
    assert!(!doc.drag_to(0.0, f64::INFINITY));
    assert!(doc.is_gesture_active());
    assert!(!doc.end_drag());

    assert!(doc.start_resize(&id, ResizeHandle::Se));
    assert!(!doc.resize_to(f64::NEG_INFINITY, 0.0));
    assert!(!doc.end_resize());

    assert!(!doc.update_element_position(&id, f64::NAN, 1.0));
    assert!(!doc.resize_element(&id, ResizeHandle::E, f64::INFINITY, 0.0));
    assert!(!doc.nudge_selected(f64::NAN, 0.0));

    assert_rect(rect_of(&doc, &id), Rect::new(0.0, 300.0, 100.0, 100.0));
    assert_eq!(doc.history().len(), before);

    let mut reopened = ElementDocument::new();
    assert!(reopened.load_json(&doc.save_json().unwrap_or_default()).is_ok());
}

#[test]
fn drag_snaps_within_threshold() {
    let (mut doc, id) = snap_setup();
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.drag_to(198.0, 0.0));
    assert_eq!(doc.element(&id).map(|e| (e.x, e.y)), Some((200.0, 300.0)));
    assert_eq!(doc.snap_lines().len(), 1);
    assert_eq!(doc.snap_lines().first().map(|l| (l.axis, l.position)), Some((SnapAxis::Vertical, 200.0)));

    assert!(doc.end_drag());
    assert!(doc.snap_lines().is_empty());
}

#[test]
fn drag_outside_threshold_keeps_raw_position() {
    let (mut doc, id) = snap_setup();
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.drag_to(190.0, 0.0));
    assert_eq!(doc.element(&id).map(|e| e.x), Some(190.0));
    assert!(doc.snap_lines().is_empty());
}

#[test]
fn shift_disables_snapping() {
    let (mut doc, id) = snap_setup();
    assert!(doc.start_drag(Modifiers { shift: true, ..Default::default() }));
    assert!(doc.drag_to(198.0, 0.0));
    assert_eq!(doc.element(&id).map(|e| e.x), Some(198.0));
}

#[test]
fn snap_threshold_scales_with_zoom() {
    let (mut doc, id) = snap_setup();
    doc.set_camera(Camera::new(0.0, 0.0, 2.0));
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.drag_to(197.0, 0.0));
    assert_eq!(doc.element(&id).map(|e| e.x), Some(197.0));
    assert!(doc.drag_to(198.0, 0.0));
    assert_eq!(doc.element(&id).map(|e| e.x), Some(200.0));
}

#[test]
fn multi_selection_drag_does_not_snap() {
    let mut doc = ElementDocument::new();
    rectangle(&mut doc, 200.0, 0.0);
    let a = rectangle(&mut doc, 0.0, 300.0);
    let b = rectangle(&mut doc, 0.0, 600.0);
    select_many(&mut doc, &[&a, &b]);
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.drag_to(198.0, 0.0));
    assert_eq!(doc.element(&a).map(|e| e.x), Some(198.0));
    assert_eq!(doc.element(&b).map(|e| e.x), Some(198.0));
}

#[test]
fn drag_without_movement_commits_nothing() {
    let (mut doc, _id) = snap_setup();
    let before = doc.history().len();
    assert!(doc.start_drag(Modifiers::default()));
    assert!(!doc.end_drag());
    assert_eq!(doc.history().len(), before);
}

#[test]
fn drag_requires_selection() {
    let (mut doc, _id) = snap_setup();
    doc.clear_selection();
    assert!(!doc.start_drag(Modifiers::default()));
    assert!(!doc.drag_to(5.0, 5.0));
}

#[test]
fn cancel_gesture_restores_start_state() {
    let (mut doc, id) = snap_setup();
    let before = doc.elements().to_vec();
    let history = doc.history().len();
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.drag_to(50.0, 50.0));
    assert!(doc.cancel_gesture());
    assert_eq!(doc.elements(), before.as_slice());
    assert_eq!(doc.history().len(), history);
    assert_eq!(doc.element(&id).map(|e| e.x), Some(0.0));
    assert!(!doc.cancel_gesture());
}

#[test]
fn dragging_a_group_member_updates_group_bounds() {
    let (mut doc, a, _b, g) = grouped_pair();
    assert!(doc.select(&a));
    assert!(doc.start_drag(Modifiers { shift: true, ..Default::default() }));
    assert!(doc.drag_to(0.0, 50.0));
    assert_rect(rect_of(&doc, &g), Rect::new(0.0, 0.0, 300.0, 150.0));
}

// =============================================================
// Resize gesture
// =============================================================

#[test]
fn resize_gesture_is_relative_to_start() {
    let mut doc = ElementDocument::new();
    let id = rectangle(&mut doc, 0.0, 0.0);
    let before = doc.history().len();
    assert!(doc.start_resize(&id, ResizeHandle::Se));
    assert!(doc.resize_to(10.0, 10.0));
    assert!(doc.resize_to(20.0, 20.0));
    assert_rect(rect_of(&doc, &id), Rect::new(0.0, 0.0, 120.0, 120.0));
    assert!(doc.end_resize());
    assert_eq!(doc.history().len(), before + 1);
}

#[test]
fn resize_clamps_and_anchors_opposite_edge() {
    let mut doc = ElementDocument::new();
    let id = rectangle(&mut doc, 0.0, 0.0);
    assert!(doc.start_resize(&id, ResizeHandle::Nw));
    assert!(doc.resize_to(500.0, 500.0));
    assert_rect(rect_of(&doc, &id), Rect::new(80.0, 80.0, 20.0, 20.0));
}

#[test]
fn resizing_group_scales_members() {
    let (mut doc, a, b, g) = grouped_pair();
    assert!(doc.start_resize(&g, ResizeHandle::E));
    assert!(doc.resize_to(300.0, 0.0));
    assert!(doc.end_resize());
    assert_rect(rect_of(&doc, &g), Rect::new(0.0, 0.0, 600.0, 100.0));
    assert_rect(rect_of(&doc, &a), Rect::new(0.0, 0.0, 200.0, 100.0));
    assert_rect(rect_of(&doc, &b), Rect::new(400.0, 0.0, 200.0, 100.0));
}

#[test]
fn starting_a_new_gesture_ends_the_old_one() {
    let (mut doc, id) = snap_setup();
    let before = doc.history().len();
    assert!(doc.start_drag(Modifiers { shift: true, ..Default::default() }));
    assert!(doc.drag_to(10.0, 0.0));
    assert!(doc.start_resize(&id, ResizeHandle::E));
    assert_eq!(doc.history().len(), before + 1);
    assert!(matches!(doc.input(), InputState::Resizing(_)));
    assert!(!doc.end_drag());
}

#[test]
fn start_resize_unknown_id_fails() {
    let mut doc = ElementDocument::new();
    assert!(!doc.start_resize("nope", ResizeHandle::E));
    assert!(!doc.resize_to(1.0, 1.0));
    assert!(!doc.end_resize());
}

// =============================================================
// Import / export
// =============================================================

#[test]
fn export_import_round_trip() {
    let (doc, _a, _b, _g) = grouped_pair();
    let json = doc.save_json().unwrap_or_default();

    let mut other = ElementDocument::new();
    assert!(other.load_json(&json).is_ok());
    assert_eq!(other.elements(), doc.elements());
    assert_eq!(other.next_id(), doc.next_id());
    assert!(!other.can_undo());
    assert!(other.selection().is_empty());
}

#[test]
fn import_sorts_by_z_and_repacks() {
    let mut doc = ElementDocument::new();
    let mut snapshot = Snapshot::empty();
    for (id, z) in [("x", 7), ("y", 2), ("z", 5)] {
        let mut el = Element::new(
            id.to_owned(),
            ElementKind::Icon(IconProps::new("star")),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        el.z_index = z;
        snapshot.elements.push(el);
    }
    snapshot.next_id = 4;
    assert!(doc.import_snapshot(snapshot).is_ok());
    let order: Vec<&str> = doc.elements().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, ["y", "z", "x"]);
    assert_dense_z(&doc);
}

#[test]
fn import_reduces_rotation() {
    let text = r##"{
        "version": 1, "timestamp": 0, "nextId": 3,
        "elements": [
            {"id": "a", "x": 0, "y": 0, "width": 40, "height": 20, "rotation": -90, "zIndex": 0,
             "type": "text", "content": "hi", "fontSize": 16, "fontFamily": "sans-serif", "color": "#000000"},
            {"id": "b", "x": 0, "y": 0, "width": 10, "height": 10, "rotation": 450, "zIndex": 1,
             "type": "icon", "iconType": "star", "color": "#000000", "strokeWeight": 2}
        ]
    }"##;
    let mut doc = ElementDocument::new();
    assert!(doc.load_json(text).is_ok());
    assert_eq!(doc.element("a").map(|e| e.rotation), Some(270.0));
    assert_eq!(doc.element("b").map(|e| e.rotation), Some(90.0));
    assert!(doc.export_snapshot().elements.iter().all(|e| (0.0..360.0).contains(&e.rotation)));
}

#[test]
fn minted_ids_skip_imported_collisions() {
    let mut doc = ElementDocument::new();
    let mut snapshot = Snapshot::empty();
    snapshot.elements.push(Element::new(
        "element-1".to_owned(),
        ElementKind::Icon(IconProps::new("star")),
        Rect::new(0.0, 0.0, 10.0, 10.0),
    ));
    assert!(doc.import_snapshot(snapshot).is_ok());
    assert_eq!(rectangle(&mut doc, 0.0, 0.0), "element-2");
}

#[test]
fn rejected_import_leaves_document_untouched() {
    let mut doc = ElementDocument::new();
    let a = rectangle(&mut doc, 0.0, 0.0);
    let mut snapshot = Snapshot::empty();
    snapshot.version = 99;
    assert!(matches!(doc.import_snapshot(snapshot), Err(ImportError::UnsupportedVersion { found: 99, .. })));
    assert!(doc.element(&a).is_some());
    assert!(doc.can_undo());

    assert!(matches!(doc.load_json("{not json"), Err(ImportError::Malformed(_))));
    assert_eq!(doc.len(), 1);
}

#[test]
fn import_cancels_active_gesture() {
    let (mut doc, _id) = snap_setup();
    assert!(doc.start_drag(Modifiers::default()));
    assert!(doc.import_snapshot(Snapshot::empty()).is_ok());
    assert!(!doc.is_gesture_active());
    assert!(doc.is_empty());
}

// =============================================================
// Selection
// =============================================================

#[test]
fn selection_operations() {
    let (mut doc, a, b, g) = grouped_pair();
    let c = rectangle(&mut doc, 0.0, 300.0);

    doc.select_all();
    assert_eq!(doc.selection(), [g.clone(), c.clone()]);

    assert!(doc.toggle_selection(&c));
    assert_eq!(doc.selection(), [g.clone()]);
    assert!(doc.toggle_selection(&c));
    assert_eq!(doc.selection(), [g.clone(), c.clone()]);

    assert!(!doc.add_to_selection(&c));
    assert!(doc.add_to_selection(&a));
    assert!(!doc.select("missing"));
    assert_eq!(doc.primary_element().map(|e| e.id.clone()), Some(g));

    doc.clear_selection();
    assert!(doc.selection().is_empty());
    assert!(doc.element(&b).is_some());
}

// =============================================================
// Observers
// =============================================================

#[test]
fn subscribers_receive_changes_until_removed() {
    let mut doc = ElementDocument::new();
    let seen: Rc<RefCell<Vec<Change>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = doc.subscribe(move |change| sink.borrow_mut().push(change));

    rectangle(&mut doc, 0.0, 0.0);
    assert_eq!(*seen.borrow(), vec![Change::Elements, Change::Selection, Change::History]);

    assert!(doc.unsubscribe(sub));
    assert!(!doc.unsubscribe(sub));
    rectangle(&mut doc, 0.0, 0.0);
    assert_eq!(seen.borrow().len(), 3);
}

// =============================================================
// Hit testing
// =============================================================

#[test]
fn element_and_handle_lookup() {
    let (mut doc, a, _b, g) = grouped_pair();
    assert_eq!(doc.element_at(pt(50.0, 50.0)).map(|e| e.id.clone()), Some(g.clone()));
    assert!(doc.element_at(pt(150.0, 50.0)).is_none());

    assert!(doc.select(&a));
    assert_eq!(doc.handle_at(pt(100.0, 100.0)), Some(ResizeHandle::Se));
    let hit = doc.hit_test(pt(100.0, 100.0));
    assert_eq!(hit.map(|h| h.part), Some(hit::HitPart::ResizeHandle(ResizeHandle::Se)));
    doc.clear_selection();
    assert!(doc.handle_at(pt(100.0, 100.0)).is_none());
}

#[test]
fn visible_rect_follows_camera_and_viewport() {
    let mut doc = ElementDocument::new();
    doc.set_viewport(800.0, 600.0);
    doc.set_camera(Camera::new(-100.0, 0.0, 2.0));
    assert_rect(doc.visible_rect(), Rect::new(50.0, 0.0, 400.0, 300.0));
    doc.set_camera(Camera::new(0.0, 0.0, 50.0));
    assert_eq!(doc.camera().zoom, 3.0);
}
