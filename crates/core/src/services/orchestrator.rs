//! Directory walk, worker pool and result aggregation for a whole run.
//!
//! One walker thread feeds eligible paths into a bounded queue, `workers`
//! threads scan them, and the calling thread collects per-file reports until
//! every dispatched file has reported back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::model::{FuncCallRecord, ScanSummary, ScanTarget};
use crate::services::process::{CallContext, CancelToken};
use crate::services::providers::{Backends, FileGate};
use crate::services::scanner::FileScanner;

/// Capacity of the per-file report channel.
pub const REPORT_QUEUE: usize = 100;

/// Outcome of scanning one file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Result<Vec<FuncCallRecord>, ScanError>,
}

enum Event {
    Report(FileReport),
    WalkDone { dispatched: usize, error: Option<ScanError> },
}

pub struct ScanOrchestrator {
    scanner: FileScanner,
    gate: Arc<dyn FileGate>,
    config: ScanConfig,
    cancel: CancelToken,
    completed: Arc<AtomicUsize>,
}

impl ScanOrchestrator {
    pub fn new(target: Arc<ScanTarget>, backends: Backends, config: ScanConfig) -> Self {
        let gate = Arc::clone(&backends.gate);
        Self {
            scanner: FileScanner::new(target, backends),
            gate,
            config,
            cancel: CancelToken::new(),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Token that stops the run and kills in-flight tools when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Scan every eligible file under `root` (or `root` itself when it is a
    /// file), forwarding non-empty record batches to `output`. `output` is
    /// dropped on return, which closes the channel for the sink.
    pub fn run(
        &self,
        root: &Path,
        output: SyncSender<Vec<FuncCallRecord>>,
    ) -> Result<ScanSummary, ScanError> {
        self.config.validate()?;
        let workers = self.config.workers;
        self.completed.store(0, Ordering::SeqCst);
        let ctx = CallContext::new(self.cancel.clone(), self.config.timeout());
        info!(root = %root.display(), workers, "scan started");

        let (path_tx, path_rx) = sync_channel::<PathBuf>(2 * workers);
        let path_rx = Arc::new(Mutex::new(path_rx));
        let (event_tx, event_rx) = sync_channel::<Event>(REPORT_QUEUE);

        let mut handles = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            let handle = spawn_worker(
                id,
                self.scanner.clone(),
                Arc::clone(&path_rx),
                event_tx.clone(),
                ctx.clone(),
            )
            .map_err(|source| ScanError::Io { path: root.to_path_buf(), source })?;
            handles.push(handle);
        }
        let walker = spawn_walker(
            root.to_path_buf(),
            Arc::clone(&self.gate),
            path_tx,
            event_tx,
            self.cancel.clone(),
        );
        match walker {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                self.cancel.cancel();
                join_all(handles);
                return Err(ScanError::Io { path: root.to_path_buf(), source });
            }
        }

        let result = self.collect(event_rx, output);
        join_all(handles);
        if let Ok(summary) = &result {
            info!(
                dispatched = summary.files_dispatched,
                scanned = summary.files_scanned,
                failed = summary.files_failed,
                records = summary.records,
                "scan finished"
            );
        }
        result
    }

    fn collect(
        &self,
        events: Receiver<Event>,
        output: SyncSender<Vec<FuncCallRecord>>,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();
        let mut dispatched: Option<usize> = None;
        let mut walk_error = None;
        let mut output = Some(output);

        loop {
            if dispatched == Some(self.completed()) {
                break;
            }
            let Ok(event) = events.recv() else {
                warn!(completed = self.completed(), "workers exited before reporting every file");
                break;
            };
            match event {
                Event::WalkDone { dispatched: count, error } => {
                    dispatched = Some(count);
                    walk_error = error;
                }
                Event::Report(report) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    match report.outcome {
                        Ok(records) => {
                            summary.files_scanned += 1;
                            if records.is_empty() {
                                continue;
                            }
                            summary.records += records.len();
                            let sent = output.as_ref().map(|tx| tx.send(records).is_ok());
                            if sent == Some(false) {
                                debug!("output receiver dropped, cancelling remaining work");
                                self.cancel.cancel();
                                output = None;
                            }
                        }
                        Err(_) => summary.files_failed += 1,
                    }
                }
            }
        }

        summary.files_dispatched = dispatched.unwrap_or(summary.files_scanned + summary.files_failed);
        match walk_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

fn spawn_worker(
    id: usize,
    scanner: FileScanner,
    paths: Arc<Mutex<Receiver<PathBuf>>>,
    events: SyncSender<Event>,
    ctx: CallContext,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(format!("argscan-worker-{id}")).spawn(move || loop {
        let next = match paths.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(path) = next else { break };

        let outcome = scanner.scan(&path, &ctx);
        match &outcome {
            Ok(records) => debug!(path = %path.display(), records = records.len(), "file done"),
            Err(err @ ScanError::Cancelled { .. }) => {
                debug!(path = %path.display(), error = %err, "file skipped")
            }
            Err(err) => warn!(path = %path.display(), error = %err, "file scan failed"),
        }
        if events.send(Event::Report(FileReport { path, outcome })).is_err() {
            break;
        }
    })
}

fn spawn_walker(
    root: PathBuf,
    gate: Arc<dyn FileGate>,
    paths: SyncSender<PathBuf>,
    events: SyncSender<Event>,
    cancel: CancelToken,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("argscan-walker".into()).spawn(move || {
        let (dispatched, error) = walk(&root, gate.as_ref(), &paths, &cancel);
        if error.is_some() {
            cancel.cancel();
        }
        drop(paths);
        let _ = events.send(Event::WalkDone { dispatched, error });
    })
}

/// Feeds eligible files into `paths`. Returns how many were sent and the walk
/// error that stopped it, if any.
fn walk(
    root: &Path,
    gate: &dyn FileGate,
    paths: &SyncSender<PathBuf>,
    cancel: &CancelToken,
) -> (usize, Option<ScanError>) {
    let mut dispatched = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return (dispatched, Some(ScanError::Walk(err))),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if !gate.is_elf(&path) {
            continue;
        }
        if !gate.has_executable_code(&path) {
            info!(path = %path.display(), "skipped, .text section not found");
            continue;
        }
        if paths.send(path).is_err() {
            break;
        }
        dispatched += 1;
    }
    (dispatched, None)
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("scan thread panicked");
        }
    }
}
