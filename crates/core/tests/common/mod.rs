#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};

use argscan_core::config::ScanConfig;
use argscan_core::services::backends::ElfGate;
use argscan_core::services::providers::{
    Backends, DisassemblyProvider, StringEntry, StringStream, StringTableProvider, SymbolEntry,
    SymbolProvider,
};
use argscan_core::services::{CallContext, ScanOrchestrator};
use argscan_core::{FuncCallRecord, ScanError, ScanSummary, ScanTarget};
use object::write::{Object, Symbol, SymbolSection};
use object::{BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};

/// `open("/etc/passwd")` from `main` and `open("/tmp/log")` from `helper`.
pub const AMD64_OPEN_CONTEXT: &[&str] = &[
    "1135:\t55                   \tpush   %rbp",
    "1139:\t48 8d 3d c4 0e 00 00 \tlea    0xec4(%rip),%rdi        # 2004 <_IO_stdin_used+0x4>",
    "1140:\te8 eb fe ff ff       \tcall   1030 <open@plt>",
    "--",
    "1160:\t48 8d 3d b1 0e 00 00 \tlea    0xeb1(%rip),%rdi        # 2010 <_IO_stdin_used+0x10>",
    "1167:\te8 c4 fe ff ff       \tcall   1030 <open@plt>",
];

pub fn amd64_symbols() -> Vec<SymbolEntry> {
    vec![
        SymbolEntry::function(0x1129, 0x30, "main"),
        SymbolEntry { value: 0x4010, size: 8, kind: "OBJECT".into(), name: "counter".into() },
        SymbolEntry::function(0x1159, 0x20, "helper"),
    ]
}

pub fn amd64_strings() -> Vec<StringEntry> {
    vec![
        StringEntry { address: 0x2004, text: "/etc/passwd".into() },
        StringEntry { address: 0x2010, text: "/tmp/log".into() },
        StringEntry { address: 0x2020, text: "unused".into() },
    ]
}

/// Disassembly provider returning the same canned contexts for every file.
/// Files whose name starts with `broken` fail.
#[derive(Default)]
pub struct FixtureDisassembly {
    pub contexts: HashMap<String, Vec<String>>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FixtureDisassembly {
    pub fn new(entries: &[(&str, &[&str])]) -> Self {
        let contexts = entries
            .iter()
            .map(|(name, lines)| (name.to_string(), lines.iter().map(|l| l.to_string()).collect()))
            .collect();
        Self { contexts, calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl DisassemblyProvider for FixtureDisassembly {
    fn function_contexts(
        &self,
        path: &Path,
        names: &[String],
        _ctx: &CallContext,
    ) -> Result<HashMap<String, Vec<String>>, ScanError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let broken = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("broken"));
        if broken {
            return Err(ScanError::ProviderExecution {
                tool: "fixture".into(),
                path: path.to_path_buf(),
                message: "exit status 1".into(),
            });
        }
        Ok(names
            .iter()
            .filter_map(|n| self.contexts.get(n).map(|lines| (n.clone(), lines.clone())))
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

pub struct FixtureSymbols(pub Vec<SymbolEntry>);

impl SymbolProvider for FixtureSymbols {
    fn symbols(&self, _path: &Path, _ctx: &CallContext) -> Result<Vec<SymbolEntry>, ScanError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// String provider emitting `entries` in the given order, optionally ending
/// with a failure after the last entry.
pub struct FixtureStrings {
    pub entries: Vec<StringEntry>,
    pub fail_after: bool,
}

impl FixtureStrings {
    pub fn new(entries: Vec<StringEntry>) -> Self {
        Self { entries, fail_after: false }
    }
}

impl StringTableProvider for FixtureStrings {
    fn strings(&self, path: &Path, _ctx: &CallContext) -> Result<StringStream, ScanError> {
        let mut items: Vec<Result<StringEntry, ScanError>> =
            self.entries.iter().cloned().map(Ok).collect();
        if self.fail_after {
            items.push(Err(ScanError::ProviderExecution {
                tool: "fixture".into(),
                path: path.to_path_buf(),
                message: "exit status 1".into(),
            }));
        }
        Ok(Box::new(items.into_iter()))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

pub fn fixture_backends(
    disassembly: Arc<FixtureDisassembly>,
    symbols: Vec<SymbolEntry>,
    strings: FixtureStrings,
) -> Backends {
    Backends {
        gate: Arc::new(ElfGate),
        disassembly,
        symbols: Arc::new(FixtureSymbols(symbols)),
        strings: Arc::new(strings),
    }
}

/// Minimal relocatable x86-64 ELF with a `.text` section holding `main` at
/// 0x10 and a `.rodata` string at offset 0.
pub fn elf_with_text() -> Vec<u8> {
    let mut obj =
        Object::new(BinaryFormat::Elf, object::Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.append_section_data(text, &[0x90; 0x10], 16);
    obj.append_section_data(text, &[0x55, 0x48, 0x89, 0xe5, 0x5d, 0xc3, 0x90, 0x90], 1);
    let rodata = obj.add_section(Vec::new(), b".rodata".to_vec(), SectionKind::ReadOnlyData);
    obj.append_section_data(rodata, b"/etc/passwd\0ab\0", 1);
    obj.add_symbol(Symbol {
        name: b"main".to_vec(),
        value: 0x10,
        size: 8,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });
    obj.write().unwrap()
}

/// ELF object without any executable section.
pub fn elf_without_text() -> Vec<u8> {
    let mut obj =
        Object::new(BinaryFormat::Elf, object::Architecture::X86_64, Endianness::Little);
    let data = obj.add_section(Vec::new(), b".data".to_vec(), SectionKind::Data);
    obj.append_section_data(data, &[1, 2, 3, 4], 1);
    obj.write().unwrap()
}

/// Writes `count` ELF files named `bin_<n>` under `dir`, returning their paths sorted.
pub fn write_elf_tree(dir: &Path, count: usize) -> Vec<PathBuf> {
    let bytes = elf_with_text();
    let mut paths: Vec<PathBuf> = (0..count)
        .map(|n| {
            let sub = dir.join(format!("d{}", n % 3));
            std::fs::create_dir_all(&sub).unwrap();
            let path = sub.join(format!("bin_{n}"));
            std::fs::write(&path, &bytes).unwrap();
            path
        })
        .collect();
    paths.sort();
    paths
}

pub fn run_scan(
    root: &Path,
    target: ScanTarget,
    backends: Backends,
    workers: usize,
) -> (Result<ScanSummary, ScanError>, Vec<FuncCallRecord>) {
    let config = ScanConfig { workers, ..ScanConfig::default() };
    let orchestrator = ScanOrchestrator::new(Arc::new(target), backends, config);
    let (tx, rx) = sync_channel(4);
    let root = root.to_path_buf();
    let handle = std::thread::spawn(move || orchestrator.run(&root, tx));
    let mut records: Vec<FuncCallRecord> = rx.into_iter().flatten().collect();
    let summary = handle.join().unwrap();
    records.sort();
    (summary, records)
}
