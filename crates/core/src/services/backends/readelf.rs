use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ScanError;
use crate::model::parse_hex;
use crate::services::process::{run_tool, CallContext};
use crate::services::providers::{SymbolEntry, SymbolProvider};

/// Symbol provider backed by `readelf -sW`.
pub struct ReadelfSymbols {
    readelf: PathBuf,
}

impl ReadelfSymbols {
    pub fn new(readelf: impl Into<PathBuf>) -> Self {
        Self { readelf: readelf.into() }
    }
}

impl SymbolProvider for ReadelfSymbols {
    fn symbols(&self, path: &Path, ctx: &CallContext) -> Result<Vec<SymbolEntry>, ScanError> {
        let mut command = Command::new(&self.readelf);
        command.arg("-sW").arg(path);
        let listing = run_tool(command, "readelf", path, ctx)?;
        Ok(parse_symbol_table(&listing))
    }

    fn name(&self) -> &'static str {
        "readelf"
    }
}

/// Parse readelf symbol rows:
/// `Num: Value Size Type Bind Vis Ndx Name`. Headers and malformed rows are skipped.
pub fn parse_symbol_table(listing: &str) -> Vec<SymbolEntry> {
    listing.lines().filter_map(parse_symbol_row).collect()
}

fn parse_symbol_row(line: &str) -> Option<SymbolEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 8 || !fields[0].ends_with(':') {
        return None;
    }
    let value = parse_hex(fields[1])?;
    let size = parse_size(fields[2])?;
    Some(SymbolEntry {
        value,
        size,
        kind: fields[3].to_string(),
        name: fields[7].to_string(),
    })
}

/// readelf prints sizes in decimal, switching to `0x` hex for large values.
fn parse_size(text: &str) -> Option<u64> {
    if text.starts_with("0x") {
        parse_hex(text)
    } else {
        text.parse().ok()
    }
}
