//! Address-to-literal resolution over a streaming string table.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ScanError;
use crate::services::process::CallContext;
use crate::services::providers::{StringEntry, StringTableProvider};

/// Strings found at the requested addresses.
#[derive(Debug, Default)]
pub struct ResolvedStrings {
    pub by_address: HashMap<u64, String>,
    /// Set when the backend failed after some output; `by_address` still holds
    /// everything matched before the failure.
    pub trailing_error: Option<ScanError>,
}

pub struct StringResolver<'a> {
    provider: &'a dyn StringTableProvider,
}

impl<'a> StringResolver<'a> {
    pub fn new(provider: &'a dyn StringTableProvider) -> Self {
        Self { provider }
    }

    /// Lazily yields the entries whose address is in `targets`, in backend
    /// order. An `Err` element ends the sequence.
    pub fn matches<'t>(
        &self,
        path: &Path,
        targets: &'t HashSet<u64>,
        ctx: &CallContext,
    ) -> Result<impl Iterator<Item = Result<StringEntry, ScanError>> + 't, ScanError> {
        let stream = self.provider.strings(path, ctx)?;
        Ok(stream.filter(move |item| match item {
            Ok(entry) => targets.contains(&entry.address),
            Err(_) => true,
        }))
    }

    /// Collects `matches` into an address map. When a backend emits the same
    /// address twice the first text wins.
    pub fn resolve(
        &self,
        path: &Path,
        targets: &HashSet<u64>,
        ctx: &CallContext,
    ) -> Result<ResolvedStrings, ScanError> {
        let mut resolved = ResolvedStrings::default();
        if targets.is_empty() {
            return Ok(resolved);
        }
        for item in self.matches(path, targets, ctx)? {
            match item {
                Ok(entry) => {
                    resolved.by_address.entry(entry.address).or_insert(entry.text);
                    if resolved.by_address.len() == targets.len() {
                        break;
                    }
                }
                Err(e) => {
                    resolved.trailing_error = Some(e);
                    break;
                }
            }
        }
        Ok(resolved)
    }
}
