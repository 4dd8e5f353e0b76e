pub mod project;
pub mod stages;
pub mod util;

pub use project::*;
pub use stages::*;
pub use util::*;
