use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Which implementation serves a provider: an external tool or the in-process goblin reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    External,
    Native,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::External => "external",
            BackendKind::Native => "native",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(BackendKind::External),
            "native" => Ok(BackendKind::Native),
            other => Err(ScanError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Locations of the external analysis tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub objdump: PathBuf,
    pub readelf: PathBuf,
    pub strings: PathBuf,
}

impl ToolPaths {
    /// Resolve each tool from `ARGSCAN_OBJDUMP`, `ARGSCAN_READELF` and
    /// `ARGSCAN_STRINGS`, falling back to the bare name on `PATH`.
    pub fn from_env() -> Self {
        Self {
            objdump: tool_from_env("ARGSCAN_OBJDUMP", "objdump"),
            readelf: tool_from_env("ARGSCAN_READELF", "readelf"),
            strings: tool_from_env("ARGSCAN_STRINGS", "strings"),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::from_env()
    }
}

fn tool_from_env(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// Run-wide settings. Every field has a default so partial JSON files load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of worker threads scanning files in parallel.
    pub workers: usize,
    /// Per tool invocation limit in seconds; `0` disables the limit.
    pub timeout_secs: u64,
    pub tools: ToolPaths,
    pub symbol_backend: BackendKind,
    pub string_backend: BackendKind,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tools: ToolPaths::default(),
            symbol_backend: BackendKind::default(),
            string_backend: BackendKind::default(),
        }
    }
}

impl ScanConfig {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan config at {}", path.display()))?;
        serde_json::from_str(&body).context("Failed to parse scan config JSON")
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.workers == 0 {
            return Err(ScanError::Config("worker count must be at least 1".into()));
        }
        Ok(())
    }
}
