use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{BackendKind, ScanConfig};
use crate::error::ScanError;
use crate::services::backends::{
    ElfGate, NativeStrings, NativeSymbols, ObjdumpDisassembler, ReadelfSymbols, StringsTable,
};
use crate::services::process::CallContext;

/// Eligibility checks applied to every walked file.
pub trait FileGate: Send + Sync {
    fn is_elf(&self, path: &Path) -> bool;
    fn has_executable_code(&self, path: &Path) -> bool;
}

/// Supplies the disassembly lines around references to each requested function.
pub trait DisassemblyProvider: Send + Sync {
    /// Names with no occurrence are absent from the returned map.
    fn function_contexts(
        &self,
        path: &Path,
        names: &[String],
        ctx: &CallContext,
    ) -> Result<HashMap<String, Vec<String>>, ScanError>;

    fn name(&self) -> &'static str;
}

/// One symbol-table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub value: u64,
    pub size: u64,
    /// Symbol type as printed by readelf, e.g. `FUNC` or `OBJECT`.
    pub kind: String,
    pub name: String,
}

impl SymbolEntry {
    pub const FUNC: &'static str = "FUNC";

    pub fn function(value: u64, size: u64, name: impl Into<String>) -> Self {
        Self { value, size, kind: Self::FUNC.to_string(), name: name.into() }
    }

    pub fn is_function(&self) -> bool {
        self.kind == Self::FUNC
    }
}

/// Supplies symbol-table rows in emission order.
pub trait SymbolProvider: Send + Sync {
    fn symbols(&self, path: &Path, ctx: &CallContext) -> Result<Vec<SymbolEntry>, ScanError>;

    fn name(&self) -> &'static str;
}

/// A printable string and the virtual address it starts at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    pub address: u64,
    pub text: String,
}

/// Entries in backend order. A trailing `Err` reports a failure after
/// partial output; entries before it stay valid.
pub type StringStream = Box<dyn Iterator<Item = Result<StringEntry, ScanError>> + Send>;

/// Supplies every printable string of a file.
pub trait StringTableProvider: Send + Sync {
    fn strings(&self, path: &Path, ctx: &CallContext) -> Result<StringStream, ScanError>;

    fn name(&self) -> &'static str;
}

/// The full set of capabilities one scan needs.
#[derive(Clone)]
pub struct Backends {
    pub gate: Arc<dyn FileGate>,
    pub disassembly: Arc<dyn DisassemblyProvider>,
    pub symbols: Arc<dyn SymbolProvider>,
    pub strings: Arc<dyn StringTableProvider>,
}

impl Backends {
    pub fn from_config(config: &ScanConfig) -> Self {
        let symbols: Arc<dyn SymbolProvider> = match config.symbol_backend {
            BackendKind::External => Arc::new(ReadelfSymbols::new(&config.tools.readelf)),
            BackendKind::Native => Arc::new(NativeSymbols),
        };
        let strings: Arc<dyn StringTableProvider> = match config.string_backend {
            BackendKind::External => Arc::new(StringsTable::new(&config.tools.strings)),
            BackendKind::Native => Arc::new(NativeStrings::default()),
        };
        Self {
            gate: Arc::new(ElfGate),
            disassembly: Arc::new(ObjdumpDisassembler::new(&config.tools.objdump)),
            symbols,
            strings,
        }
    }

    /// `name` of each provider, for logs.
    pub fn describe(&self) -> String {
        format!(
            "disassembly={} symbols={} strings={}",
            self.disassembly.name(),
            self.symbols.name(),
            self.strings.name()
        )
    }
}
