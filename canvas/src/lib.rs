//! Element document and geometry engine for the browser whiteboard.
//!
//! This crate is compiled to WebAssembly for the browser and natively for the
//! command-line tool and tests. It owns the canonical element list, undo
//! history, grouping, the rotation-aware geometry, and drag snapping. The host
//! page renders elements and forwards pointer/keyboard intents; it never edits
//! elements directly.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::ElementDocument`], the store and all user actions |
//! | [`doc`] | Element data model, sparse patches, and snapshot files |
//! | [`geometry`] | Rectangles, rotation-aware bounds, and resize handles |
//! | [`snap`] | Snap points and drag snapping with guide lines |
//! | [`group`] | Group expansion, id remapping, and group resize/rotate |
//! | [`history`] | Linear undo/redo stack |
//! | [`input`] | Modifier keys and the gesture state machine |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`hit`] | Hit-testing elements and resize handles |
//! | [`config`] | Engine tunables and environment overrides |
//! | [`error`] | Import and parse errors |
//! | [`wasm`] | `wasm-bindgen` surface for the browser host |
//! | [`consts`] | Shared numeric constants (sizes, thresholds, zoom limits) |

pub mod camera;
pub mod config;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod group;
pub mod history;
pub mod hit;
pub mod input;
pub mod snap;
pub mod wasm;

pub use doc::{Element, ElementId, ElementKind, ElementPatch, Snapshot};
pub use engine::{Change, ElementDocument};
pub use error::{ImportError, ParseError};
