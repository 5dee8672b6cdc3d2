pub mod output;
pub mod scan;

pub use output::*;
pub use scan::*;
