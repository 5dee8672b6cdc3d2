//! Running external analysis tools with a deadline and cooperative cancellation.
//!
//! Each spawned tool gets a watchdog thread that owns the child, polls it for
//! exit and kills it once the deadline passes, the run is cancelled or the
//! caller abandons the output. Stdout is handed to the caller line by line.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ScanError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared flag that stops every in-flight tool when set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call limits handed to every provider operation.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub cancel: CancelToken,
    /// Wall-clock limit for a single tool invocation; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl CallContext {
    pub fn new(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self { cancel, timeout }
    }

    /// Fail fast before doing work for a cancelled run.
    pub fn check(&self, tool: &str) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            Err(ScanError::Cancelled { tool: tool.to_string() })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
enum Watch {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
    Failed(std::io::Error),
}

/// Exit information of a finished tool.
#[derive(Debug)]
pub struct ToolExit {
    pub status: ExitStatus,
    pub stderr: String,
}

/// A running tool whose stdout is consumed incrementally.
pub struct ToolProcess {
    tool: String,
    path: PathBuf,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    watchdog: Option<JoinHandle<Watch>>,
    abandoned: Arc<AtomicBool>,
}

impl ToolProcess {
    /// Spawn `command` for the file at `path`; `tool` names it in errors and logs.
    pub fn spawn(
        mut command: Command,
        tool: &str,
        path: &Path,
        ctx: &CallContext,
    ) -> Result<Self, ScanError> {
        ctx.check(tool)?;
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScanError::provider(tool, path, format!("failed to spawn: {e}")))?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let abandoned = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let cancel = ctx.cancel.clone();
            let timeout = ctx.timeout;
            let abandoned = abandoned.clone();
            thread::spawn(move || watch(child, cancel, timeout, abandoned))
        };

        Ok(Self {
            tool: tool.to_string(),
            path: path.to_path_buf(),
            stdout,
            stderr,
            watchdog: Some(watchdog),
            abandoned,
        })
    }

    /// Next stdout line without its line terminator; `None` at end of output.
    pub fn next_line(&mut self) -> Option<Result<String, ScanError>> {
        let reader = self.stdout.as_mut()?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(e) => Some(Err(ScanError::provider(
                &self.tool,
                &self.path,
                format!("failed to read output: {e}"),
            ))),
        }
    }

    /// Read the remaining stdout into one string.
    pub fn read_to_end(&mut self) -> Result<String, ScanError> {
        let mut out = String::new();
        while let Some(line) = self.next_line() {
            out.push_str(&line?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Wait for the tool to exit. Deadline and cancellation surface here.
    pub fn finish(mut self) -> Result<ToolExit, ScanError> {
        self.stdout = None;
        let watch = self
            .watchdog
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_else(|| Watch::Failed(std::io::Error::other("watchdog panicked")));
        let stderr = self.stderr.take().and_then(|h| h.join().ok()).unwrap_or_default();

        match watch {
            Watch::Exited(status) => Ok(ToolExit { status, stderr }),
            Watch::TimedOut(after) => Err(ScanError::Timeout {
                tool: self.tool.clone(),
                path: self.path.clone(),
                after,
            }),
            Watch::Cancelled => Err(ScanError::Cancelled { tool: self.tool.clone() }),
            Watch::Failed(e) => {
                Err(ScanError::provider(&self.tool, &self.path, format!("wait failed: {e}")))
            }
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        if self.watchdog.is_some() {
            self.abandoned.store(true, Ordering::SeqCst);
        }
    }
}

fn watch(
    mut child: Child,
    cancel: CancelToken,
    timeout: Option<Duration>,
    abandoned: Arc<AtomicBool>,
) -> Watch {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Watch::Exited(status),
            Ok(None) => {}
            Err(e) => return Watch::Failed(e),
        }
        let verdict = if cancel.is_cancelled() || abandoned.load(Ordering::SeqCst) {
            Some(Watch::Cancelled)
        } else {
            timeout.filter(|limit| started.elapsed() >= *limit).map(Watch::TimedOut)
        };
        if let Some(verdict) = verdict {
            let _ = child.kill();
            let _ = child.wait();
            return verdict;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run a tool to completion and return its stdout; non-zero exit is an error.
pub fn run_tool(
    command: Command,
    tool: &str,
    path: &Path,
    ctx: &CallContext,
) -> Result<String, ScanError> {
    let mut process = ToolProcess::spawn(command, tool, path, ctx)?;
    let stdout = process.read_to_end();
    let exit = process.finish()?;
    let stdout = stdout?;
    if !exit.status.success() {
        return Err(ScanError::provider(
            tool,
            path,
            format!("exited with {}: {}", exit.status, exit.stderr.trim()),
        ));
    }
    Ok(stdout)
}
