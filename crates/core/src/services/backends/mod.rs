//! Provider implementations.
//!
//! - `objdump`, `readelf`, `strings`: shell out to binutils and parse their text.
//! - `elf`: in-process goblin readers used for file gating and as native
//!   symbol / string-table backends.

pub mod elf;
pub mod objdump;
pub mod readelf;
pub mod strings;

pub use elf::{ElfGate, NativeStrings, NativeSymbols};
pub use objdump::ObjdumpDisassembler;
pub use readelf::ReadelfSymbols;
pub use strings::StringsTable;
