//! Core data model for a scan run.
//!
//! `ScanTarget` lives for the whole run and is shared read-only by workers.
//! `FunctionSymbol` and `CallSiteCandidate` are per-file scratch data.
//! `FuncCallRecord` is the unit of output.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::arch::{registers_for, Architecture};
use crate::error::ScanError;

/// One function to look for together with the register carrying its string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub function: String,
    pub argument_index: usize,
    pub register: &'static str,
}

/// Validated description of what to scan for.
///
/// `function_names[i]` is paired with `argument_indices[i]`; the lists always
/// have the same length and every index is valid for `architecture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    function_names: Vec<String>,
    argument_indices: Vec<usize>,
    architecture: Architecture,
    registers: Vec<&'static str>,
}

impl ScanTarget {
    pub fn new(
        function_names: Vec<String>,
        argument_indices: Vec<usize>,
        architecture: Architecture,
    ) -> Result<Self, ScanError> {
        if function_names.is_empty() || argument_indices.is_empty() {
            return Err(ScanError::Config("at least one function and argument are required".into()));
        }
        if function_names.len() != argument_indices.len() {
            return Err(ScanError::Config(format!(
                "number of functions ({}) and arguments ({}) must match",
                function_names.len(),
                argument_indices.len()
            )));
        }
        if function_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ScanError::Config("function names must not be empty".into()));
        }
        let registers = registers_for(architecture, &argument_indices)?;
        Ok(Self { function_names, argument_indices, architecture, registers })
    }

    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Probes in declaration order.
    pub fn probes(&self) -> impl Iterator<Item = Probe> + '_ {
        self.function_names
            .iter()
            .zip(&self.argument_indices)
            .zip(&self.registers)
            .map(|((function, &argument_index), &register)| Probe {
                function: function.clone(),
                argument_index,
                register,
            })
    }
}

/// A function-typed symbol covering `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSymbol {
    pub start: u64,
    pub end: u64,
    pub name: String,
}

impl FunctionSymbol {
    pub fn new(start: u64, size: u64, name: impl Into<String>) -> Self {
        Self { start, end: start.saturating_add(size), name: name.into() }
    }

    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }
}

/// A call site whose argument register was loaded with a constant address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteCandidate {
    /// Hex address text exactly as printed by the disassembler (no `0x`).
    pub instruction_address: String,
    pub referenced_address: u64,
}

impl CallSiteCandidate {
    pub fn new(instruction_address: impl Into<String>, referenced_address: u64) -> Self {
        Self { instruction_address: instruction_address.into(), referenced_address }
    }
}

/// One resolved call: `caller` invokes `callee` with the literal `argument`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncCallRecord {
    pub caller: String,
    pub callee: String,
    pub argument: String,
    pub file_path: PathBuf,
    pub instruction_offset: String,
}

/// Counters reported once a run has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub files_dispatched: usize,
    pub files_scanned: usize,
    pub files_failed: usize,
    pub records: usize,
}

/// Parse hex text with or without a `0x` prefix.
pub fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
