use std::path::PathBuf;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use argscan_core::config::{BackendKind, ScanConfig};
use argscan_core::services::{Backends, ScanOrchestrator};
use argscan_core::{Architecture, ScanSummary, ScanTarget};
use tracing::info;

use super::output::{open_sink, OutputFormat};

/// Batches buffered between the collector and the sink.
const OUTPUT_QUEUE: usize = 16;

/// Options of one scan invocation, already split from clap.
#[derive(Debug, Clone)]
pub struct ScanArgs {
    pub path: PathBuf,
    pub arch: Architecture,
    pub functions: Vec<String>,
    pub arguments: Vec<usize>,
    pub out: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub symbols: Option<BackendKind>,
    pub strings: Option<BackendKind>,
    pub config: Option<PathBuf>,
}

impl ScanArgs {
    /// Required options only; everything else falls back to config defaults.
    pub fn new(
        path: impl Into<PathBuf>,
        arch: Architecture,
        functions: Vec<String>,
        arguments: Vec<usize>,
    ) -> Self {
        Self {
            path: path.into(),
            arch,
            functions,
            arguments,
            out: None,
            format: None,
            workers: None,
            timeout_secs: None,
            symbols: None,
            strings: None,
            config: None,
        }
    }
}

/// Validate the function/argument pairing against the architecture's registers.
pub fn build_target(args: &ScanArgs) -> Result<ScanTarget> {
    ScanTarget::new(args.functions.clone(), args.arguments.clone(), args.arch)
        .context("Invalid scan target")
}

/// Config file (if any) with flag overrides applied on top.
pub fn build_config(args: &ScanArgs) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    if let Some(kind) = args.symbols {
        config.symbol_backend = kind;
    }
    if let Some(kind) = args.strings {
        config.string_backend = kind;
    }
    config.validate()?;
    Ok(config)
}

/// Log the effective invocation before scanning.
pub fn log_arguments(args: &ScanArgs, target: &ScanTarget, config: &ScanConfig) {
    let probes: Vec<String> =
        target.probes().map(|p| format!("{}[{}]={}", p.function, p.argument_index, p.register)).collect();
    info!(
        version = argscan_core::version(),
        path = %args.path.display(),
        arch = %target.architecture(),
        probes = %probes.join(","),
        out = %args.out.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()),
        workers = config.workers,
        timeout_secs = config.timeout_secs,
        symbols = %config.symbol_backend,
        strings = %config.string_backend,
        "scan arguments"
    );
}

/// Run a full scan, streaming records into the selected sink.
pub fn scan_command(args: &ScanArgs) -> Result<ScanSummary> {
    if !args.path.exists() {
        bail!("Scan path does not exist: {}", args.path.display());
    }
    let target = Arc::new(build_target(args)?);
    let config = build_config(args)?;
    log_arguments(args, &target, &config);

    let format = args.format.unwrap_or_else(|| OutputFormat::default_for(args.out.as_deref()));
    let mut sink = open_sink(format, args.out.as_deref())?;

    let backends = Backends::from_config(&config);
    info!(backends = %backends.describe(), "backends selected");
    let orchestrator = ScanOrchestrator::new(target, backends, config);
    let cancel = orchestrator.cancel_token();

    let (tx, rx) = sync_channel(OUTPUT_QUEUE);
    let root = args.path.clone();
    let handle = thread::Builder::new()
        .name("argscan-orchestrator".into())
        .spawn(move || orchestrator.run(&root, tx))
        .context("Failed to start scan thread")?;

    let mut sink_error = None;
    for batch in rx {
        if let Err(err) = sink.write_batch(&batch) {
            cancel.cancel();
            sink_error = Some(err);
            break;
        }
    }
    let summary = handle.join().map_err(|_| anyhow!("scan thread panicked"))?;

    if let Some(err) = sink_error {
        return Err(err.context("Failed to write results"));
    }
    sink.finish().context("Failed to flush results")?;
    let summary = summary.with_context(|| format!("Scan of {} failed", args.path.display()))?;
    if let Some(out) = &args.out {
        info!(out = %out.display(), records = summary.records, "results written");
    }
    Ok(summary)
}
