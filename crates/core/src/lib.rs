//! argscan-core
//!
//! Core library for static reconnaissance of ELF executables and libraries.
//!
//! Given a set of function names and the argument position that carries a
//! string, this crate locates every call to those functions whose argument
//! register is loaded with the address of a string constant, resolves the
//! constant to its text, and attributes the call to the enclosing function.
//!
//! Disassembly, symbol listing and string extraction are consumed through the
//! capability traits in [`services::providers`], so the whole pipeline can be
//! driven by external tools (objdump, readelf, strings), by the native goblin
//! backends, or by fixtures in tests.

pub mod arch;
pub mod config;
pub mod error;
pub mod model;
pub mod services;

pub use arch::{registers_for, Architecture};
pub use error::ScanError;
pub use model::{FuncCallRecord, ScanSummary, ScanTarget};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
