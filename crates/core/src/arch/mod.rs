//! Architecture model: calling-convention register tables and the
//! instruction-pattern extractor each architecture uses.
//!
//! `Architecture` is a closed set chosen once from configuration; callers ask
//! it for registers and for its extractor instead of branching on the
//! architecture themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::model::CallSiteCandidate;

pub mod amd64;
pub mod arm64;
pub mod line;

pub use amd64::LeaExtractor;
pub use arm64::AdrpAddExtractor;

/// System V AMD64 integer argument registers.
const AMD64_ARGUMENT_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// AAPCS64 integer argument registers.
const ARM64_ARGUMENT_REGISTERS: [&str; 8] = ["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7"];

/// Target architecture of the scanned binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

/// Finds call sites whose argument register is loaded with a constant address.
///
/// `lines` is the disassembly context of one function (top to bottom);
/// candidates are returned in the order their lines were scanned.
pub trait CallSiteExtractor: Send + Sync {
    fn extract(&self, lines: &[String], register: &str) -> Vec<CallSiteCandidate>;
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// Argument registers in calling-convention order.
    pub fn argument_registers(&self) -> &'static [&'static str] {
        match self {
            Architecture::Amd64 => &AMD64_ARGUMENT_REGISTERS,
            Architecture::Arm64 => &ARM64_ARGUMENT_REGISTERS,
        }
    }

    pub fn register(&self, index: usize) -> Result<&'static str, ScanError> {
        let table = self.argument_registers();
        table.get(index).copied().ok_or(ScanError::IndexOutOfRange {
            arch: *self,
            index,
            max: table.len() - 1,
        })
    }

    pub fn extractor(&self) -> &'static dyn CallSiteExtractor {
        match self {
            Architecture::Amd64 => &LeaExtractor,
            Architecture::Arm64 => &AdrpAddExtractor,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x86-64" => Ok(Architecture::Amd64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            _ => Err(ScanError::UnsupportedArchitecture(s.to_string())),
        }
    }
}

/// Map argument indices to register names for `arch`.
///
/// Fails on the first index past the end of the register table.
pub fn registers_for(
    arch: Architecture,
    indices: &[usize],
) -> Result<Vec<&'static str>, ScanError> {
    indices.iter().map(|&index| arch.register(index)).collect()
}
