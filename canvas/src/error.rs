//! Error types for the document import boundary and host-facing parsing.
//!
//! In-document mutations never fail: a stale or unknown id is a silent no-op.
//! Only loading a snapshot and parsing host-supplied names can surface errors.

/// Why a snapshot could not be imported.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid format: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("duplicate element id: {0}")]
    DuplicateId(String),
    #[error("element {id} has invalid {field}")]
    InvalidGeometry { id: String, field: &'static str },
    #[error("element {id} has a broken group reference to {reference}")]
    BrokenGroupReference { id: String, reference: String },
}

/// Unknown name supplied by the host for an enum-valued field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown shape type: {0}")]
    UnknownShape(String),
    #[error("unknown resize handle: {0}")]
    UnknownHandle(String),
}
