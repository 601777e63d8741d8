//! Engine tunables, with defaults and optional environment overrides.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::str::FromStr;

use crate::consts::{
    DEFAULT_ELEMENT_SIZE, DEFAULT_HISTORY_LIMIT, MIN_CHILD_SIZE, MIN_ELEMENT_SIZE, PASTE_OFFSET, SNAP_THRESHOLD_PX,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Maximum snapshots kept for undo/redo (at least 2).
    pub history_limit: usize,
    /// Snap distance in screen pixels.
    pub snap_threshold: f64,
    /// Size floor for direct resizes.
    pub min_element_size: f64,
    /// Size floor for members rescaled through a group.
    pub min_child_size: f64,
    /// Offset per paste/duplicate.
    pub paste_offset: f64,
    /// Side length of newly added shapes and icons.
    pub default_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            snap_threshold: SNAP_THRESHOLD_PX,
            min_element_size: MIN_ELEMENT_SIZE,
            min_child_size: MIN_CHILD_SIZE,
            paste_offset: PASTE_OFFSET,
            default_size: DEFAULT_ELEMENT_SIZE,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `SKETCH_HISTORY_LIMIT`: default 50, at least 2
    /// - `SKETCH_SNAP_THRESHOLD`: default 5 (screen pixels)
    /// - `SKETCH_MIN_ELEMENT_SIZE`: default 20
    /// - `SKETCH_MIN_CHILD_SIZE`: default 10
    /// - `SKETCH_PASTE_OFFSET`: default 20
    /// - `SKETCH_DEFAULT_SIZE`: default 100
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(v) => Some(v),
            Err(_) => None,
        })
    }

    /// Build config from an arbitrary key lookup. Unparseable or out-of-range
    /// values fall back to the default for that key.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let positive = |key: &str, default: f64| {
            let v = parse_or(lookup(key), default);
            if v.is_finite() && v > 0.0 { v } else { default }
        };

        Self {
            history_limit: parse_or(lookup("SKETCH_HISTORY_LIMIT"), d.history_limit).max(2),
            snap_threshold: positive("SKETCH_SNAP_THRESHOLD", d.snap_threshold),
            min_element_size: positive("SKETCH_MIN_ELEMENT_SIZE", d.min_element_size),
            min_child_size: positive("SKETCH_MIN_CHILD_SIZE", d.min_child_size),
            paste_offset: positive("SKETCH_PASTE_OFFSET", d.paste_offset),
            default_size: positive("SKETCH_DEFAULT_SIZE", d.default_size),
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    match raw.map(|v| v.trim().parse::<T>()) {
        Some(Ok(v)) => v,
        _ => default,
    }
}

