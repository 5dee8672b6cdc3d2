use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::ScanError;
use crate::services::backends::elf::{read_load_segments, LoadSegment};
use crate::services::process::{CallContext, ToolProcess};
use crate::services::providers::{StringEntry, StringStream, StringTableProvider};

/// String-table provider streaming `strings -a -td` output.
///
/// `strings` reports file offsets; they are translated to virtual addresses
/// through the file's `PT_LOAD` segments so they compare against addresses
/// taken from the disassembly.
pub struct StringsTable {
    strings: PathBuf,
}

impl StringsTable {
    pub fn new(strings: impl Into<PathBuf>) -> Self {
        Self { strings: strings.into() }
    }
}

impl StringTableProvider for StringsTable {
    fn strings(&self, path: &Path, ctx: &CallContext) -> Result<StringStream, ScanError> {
        let segments = read_load_segments(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "no load segments, using raw offsets");
            Vec::new()
        });
        let mut command = Command::new(&self.strings);
        command.args(["-a", "-td"]).arg(path);
        let process = ToolProcess::spawn(command, "strings", path, ctx)?;
        Ok(Box::new(StringsStream { process: Some(process), segments, path: path.to_path_buf() }))
    }

    fn name(&self) -> &'static str {
        "strings"
    }
}

struct StringsStream {
    process: Option<ToolProcess>,
    segments: Vec<LoadSegment>,
    path: PathBuf,
}

impl Iterator for StringsStream {
    type Item = Result<StringEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let process = self.process.as_mut()?;
            match process.next_line() {
                Some(Ok(line)) => {
                    if let Some((offset, text)) = parse_strings_line(&line) {
                        let address = LoadSegment::address_of(&self.segments, offset);
                        return Some(Ok(StringEntry { address, text: text.to_string() }));
                    }
                }
                Some(Err(e)) => {
                    self.process = None;
                    return Some(Err(e));
                }
                None => {
                    let process = self.process.take()?;
                    let tool = process.tool().to_string();
                    return match process.finish() {
                        Ok(exit) if exit.status.success() => None,
                        Ok(exit) => Some(Err(ScanError::provider(
                            tool,
                            &self.path,
                            format!("exited with {}: {}", exit.status, exit.stderr.trim()),
                        ))),
                        Err(e) => Some(Err(e)),
                    };
                }
            }
        }
    }
}

/// `   4004 some text` → `(4004, "some text")`. Text after the single
/// separating space is kept verbatim.
pub fn parse_strings_line(line: &str) -> Option<(u64, &str)> {
    let (offset, text) = line.trim_start().split_once(' ')?;
    Some((offset.parse().ok()?, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_offsets() {
        assert_eq!(parse_strings_line("   4004 /etc/passwd"), Some((4004, "/etc/passwd")));
        assert_eq!(parse_strings_line("12345678 two  spaces"), Some((12345678, "two  spaces")));
        assert_eq!(parse_strings_line("   8200  leading"), Some((8200, " leading")));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_strings_line("garbage"), None);
        assert_eq!(parse_strings_line("0x10 hex"), None);
    }
}
