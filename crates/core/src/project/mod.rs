//! Project configuration and on-disk layout.
//!
//! - `PipelineConfig`: serializable settings for inputs, outputs and external tools.
//! - `ProjectLayout`: computed paths for metadata, caches and outputs.
//! - `ProjectContext`: layout + loaded config, the handle every stage runs against.

pub mod config;
pub mod context;
pub mod layout;

pub use config::*;
pub use context::*;
pub use layout::*;
