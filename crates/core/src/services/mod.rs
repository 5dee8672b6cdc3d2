//! Analysis services: capability traits, their backends, and the pipeline
//! stages built on top of them.

pub mod backends;
pub mod orchestrator;
pub mod process;
pub mod providers;
pub mod scanner;
pub mod strings;
pub mod symbols;

pub use orchestrator::ScanOrchestrator;
pub use process::{CallContext, CancelToken};
pub use providers::Backends;
pub use scanner::FileScanner;
