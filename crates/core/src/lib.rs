//! alertslice-core
//!
//! Core library for building a slice-augmented vulnerability dataset out of
//! static-analysis alerts.
//!
//! This crate defines the row model, the best-effort loaders for the input tables,
//! the three pipeline stages (assemble, reconcile, augment), and the adapters that
//! drive the external slicer, line differ and git.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends.

pub mod fetch;
pub mod loader;
pub mod model;
pub mod process;
pub mod project;
pub mod services;
pub mod table;
pub mod vcs;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
