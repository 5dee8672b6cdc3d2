use std::path::PathBuf;

use anyhow::Result;
use argscan::commands::{build_target, scan_command, OutputFormat, ScanArgs};
use argscan::init_tracing;
use argscan_core::config::BackendKind;
use argscan_core::Architecture;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

/// Find calls to chosen functions in ELF binaries and recover the constant
/// string passed in a given argument register.
///
/// Each `--func` pairs with the `--arg` at the same position, e.g.
/// `--func open --arg 0 --func execve --arg 1`.
#[derive(Parser, Debug)]
#[command(name = "argscan", version, about, long_about = None)]
struct Cli {
    /// Directory or single file to scan.
    #[arg(long)]
    path: PathBuf,

    /// Target architecture: amd64 (x86_64) or arm64 (aarch64).
    #[arg(long)]
    arch: Architecture,

    /// Function name to look for (repeatable).
    #[arg(long = "func", required = true)]
    functions: Vec<String>,

    /// Zero-based argument index for the `--func` at the same position (repeatable).
    #[arg(long = "arg", required = true)]
    arguments: Vec<usize>,

    /// Write results to this file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output format; defaults to csv with --out and text otherwise.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Number of worker threads [default: 4].
    #[arg(long = "worker")]
    workers: Option<usize>,

    /// Per tool invocation timeout in seconds, 0 to disable [default: 120].
    #[arg(long = "timeout")]
    timeout_secs: Option<u64>,

    /// Symbol table backend: external (readelf) or native.
    #[arg(long)]
    symbols: Option<BackendKind>,

    /// String table backend: external (strings) or native.
    #[arg(long)]
    strings: Option<BackendKind>,

    /// JSON scan config; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_scan_args(self) -> ScanArgs {
        ScanArgs {
            path: self.path,
            arch: self.arch,
            functions: self.functions,
            arguments: self.arguments,
            out: self.out,
            format: self.format,
            workers: self.workers,
            timeout_secs: self.timeout_secs,
            symbols: self.symbols,
            strings: self.strings,
            config: self.config,
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse().into_scan_args();
    init_tracing();

    if args.functions.len() != args.arguments.len() {
        Cli::command()
            .error(
                ErrorKind::WrongNumberOfValues,
                format!(
                    "number of --func ({}) and --arg ({}) must match",
                    args.functions.len(),
                    args.arguments.len()
                ),
            )
            .exit();
    }
    if let Err(err) = build_target(&args) {
        Cli::command().error(ErrorKind::ValueValidation, format!("{err:#}")).exit();
    }

    let summary = scan_command(&args)?;
    if summary.files_dispatched == 0 {
        tracing::warn!(path = %args.path.display(), "no eligible ELF files found");
    }
    Ok(())
}
