//! Per-file pipeline: disassembly context, call-site extraction, string and
//! caller resolution.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ScanError;
use crate::model::{FuncCallRecord, ScanTarget};
use crate::services::process::CallContext;
use crate::services::providers::Backends;
use crate::services::strings::StringResolver;
use crate::services::symbols::SymbolIndex;

/// Scans single files for one [`ScanTarget`]. Cheap to clone; shared by workers.
#[derive(Clone)]
pub struct FileScanner {
    target: Arc<ScanTarget>,
    backends: Backends,
}

impl FileScanner {
    pub fn new(target: Arc<ScanTarget>, backends: Backends) -> Self {
        Self { target, backends }
    }

    /// Records for every probe of the target, probes in declaration order and
    /// records of one probe in disassembly order.
    ///
    /// Any provider failure other than a trailing string-table error fails the
    /// whole file.
    pub fn scan(&self, path: &Path, ctx: &CallContext) -> Result<Vec<FuncCallRecord>, ScanError> {
        ctx.check(self.backends.disassembly.name())?;
        let contexts =
            self.backends.disassembly.function_contexts(path, self.target.function_names(), ctx)?;
        let extractor = self.target.architecture().extractor();
        let resolver = StringResolver::new(self.backends.strings.as_ref());
        let mut symbols: Option<SymbolIndex> = None;
        let mut records = Vec::new();

        for probe in self.target.probes() {
            let Some(lines) = contexts.get(&probe.function) else {
                debug!(path = %path.display(), function = %probe.function, "function not referenced");
                continue;
            };
            let candidates = extractor.extract(lines, probe.register);
            if candidates.is_empty() {
                debug!(
                    path = %path.display(),
                    function = %probe.function,
                    register = probe.register,
                    "no constant argument found"
                );
                continue;
            }

            let targets: HashSet<u64> = candidates.iter().map(|c| c.referenced_address).collect();
            let resolved = resolver.resolve(path, &targets, ctx)?;
            if let Some(err) = &resolved.trailing_error {
                warn!(path = %path.display(), function = %probe.function, error = %err, "string table incomplete");
            }
            if resolved.by_address.is_empty() {
                debug!(path = %path.display(), function = %probe.function, "no referenced strings resolved");
                continue;
            }

            if symbols.is_none() {
                let entries = self.backends.symbols.symbols(path, ctx)?;
                let index = SymbolIndex::from_entries(entries);
                debug!(path = %path.display(), functions = index.len(), "symbol table loaded");
                symbols = Some(index);
            }
            let Some(index) = symbols.as_ref() else { continue };

            let addresses: Vec<String> =
                candidates.iter().map(|c| c.instruction_address.clone()).collect();
            let callers = index.callers_of(&addresses);
            for (candidate, caller) in candidates.into_iter().zip(callers) {
                let Some(argument) = resolved.by_address.get(&candidate.referenced_address) else {
                    continue;
                };
                records.push(FuncCallRecord {
                    caller,
                    callee: probe.function.clone(),
                    argument: argument.clone(),
                    file_path: path.to_path_buf(),
                    instruction_offset: candidate.instruction_address,
                });
            }
        }

        debug!(path = %path.display(), records = records.len(), "file scanned");
        Ok(records)
    }
}
