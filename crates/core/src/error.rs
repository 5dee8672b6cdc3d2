use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::arch::Architecture;

/// Errors raised while configuring or running a scan.
///
/// Run-scoped variants (`Config`, `UnsupportedArchitecture`, `IndexOutOfRange`,
/// `Walk`) abort the orchestrator. File-scoped variants are logged by the
/// worker that hit them and the file contributes no records.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported architecture '{0}' (expected amd64 or arm64)")]
    UnsupportedArchitecture(String),
    #[error("argument index {index} out of range for {arch} (max {max})")]
    IndexOutOfRange { arch: Architecture, index: usize, max: usize },
    #[error("{tool} failed on {}: {message}", path.display())]
    ProviderExecution { tool: String, path: PathBuf, message: String },
    #[error("{tool} timed out after {after:?} on {}", path.display())]
    Timeout { tool: String, path: PathBuf, after: Duration },
    #[error("{tool} cancelled")]
    Cancelled { tool: String },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
}

impl ScanError {
    pub(crate) fn provider(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        ScanError::ProviderExecution {
            tool: tool.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}
