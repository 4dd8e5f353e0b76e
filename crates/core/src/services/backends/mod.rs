pub mod external;
pub mod line_differ;
pub mod slicer;

pub use external::ExternalOracles;
