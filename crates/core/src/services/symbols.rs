//! Address-to-function attribution over a file's symbol table.

use crate::model::{parse_hex, FunctionSymbol};
use crate::services::providers::SymbolEntry;

/// Function symbols of one file, in symbol-table emission order.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    functions: Vec<FunctionSymbol>,
}

impl SymbolIndex {
    /// Keeps only `FUNC` entries.
    pub fn from_entries(entries: impl IntoIterator<Item = SymbolEntry>) -> Self {
        let functions = entries
            .into_iter()
            .filter(SymbolEntry::is_function)
            .map(|e| FunctionSymbol::new(e.value, e.size, e.name))
            .collect();
        Self { functions }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// First function whose `[start, end)` range contains `address`.
    pub fn caller_of(&self, address: u64) -> Option<&str> {
        self.functions.iter().find(|f| f.contains(address)).map(|f| f.name.as_str())
    }

    /// Caller name for each hex address, aligned with the input. Addresses
    /// that do not parse or fall outside every function map to `""`.
    pub fn callers_of(&self, addresses: &[String]) -> Vec<String> {
        addresses
            .iter()
            .map(|text| {
                parse_hex(text)
                    .and_then(|address| self.caller_of(address))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }
}
