pub mod analysis;
pub mod scan;
pub mod stats;

pub use analysis::*;
pub use scan::*;
pub use stats::*;
