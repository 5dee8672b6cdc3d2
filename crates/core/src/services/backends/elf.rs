use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use goblin::elf::header::ELFMAG;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{SHF_ALLOC, SHN_UNDEF, SHT_NOBITS};
use goblin::elf::Elf;

use crate::error::ScanError;
use crate::services::process::CallContext;
use crate::services::providers::{
    FileGate, StringEntry, StringStream, StringTableProvider, SymbolEntry, SymbolProvider,
};

const TOOL: &str = "goblin";

fn read_file(path: &Path) -> Result<Vec<u8>, ScanError> {
    fs::read(path).map_err(|source| ScanError::Io { path: path.to_path_buf(), source })
}

fn parse_elf<'a>(path: &Path, bytes: &'a [u8]) -> Result<Elf<'a>, ScanError> {
    Elf::parse(bytes).map_err(|e| ScanError::provider(TOOL, path, format!("invalid ELF: {e}")))
}

/// ELF magic and `.text` presence checks.
pub struct ElfGate;

impl FileGate for ElfGate {
    fn is_elf(&self, path: &Path) -> bool {
        let mut magic = [0u8; 4];
        File::open(path).and_then(|mut f| f.read_exact(&mut magic)).is_ok() && &magic == ELFMAG
    }

    fn has_executable_code(&self, path: &Path) -> bool {
        let Ok(bytes) = fs::read(path) else { return false };
        let Ok(elf) = Elf::parse(&bytes) else { return false };
        elf.section_headers
            .iter()
            .any(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(".text"))
    }
}

/// Function symbols read in-process from `.symtab`, then `.dynsym`.
pub struct NativeSymbols;

impl SymbolProvider for NativeSymbols {
    fn symbols(&self, path: &Path, ctx: &CallContext) -> Result<Vec<SymbolEntry>, ScanError> {
        ctx.check(TOOL)?;
        let bytes = read_file(path)?;
        let elf = parse_elf(path, &bytes)?;
        Ok(elf_function_symbols(&elf))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

fn elf_function_symbols(elf: &Elf) -> Vec<SymbolEntry> {
    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    let mut symbols: Vec<SymbolEntry> = Vec::new();
    for (syms, strtab) in tables {
        for sym in syms.iter() {
            if !sym.is_function() || sym.st_value == 0 || sym.st_shndx == SHN_UNDEF as usize {
                continue;
            }
            let name = strtab.get_at(sym.st_name).unwrap_or("");
            if name.is_empty() {
                continue;
            }
            if symbols.iter().any(|s| s.value == sym.st_value && s.name == name) {
                continue;
            }
            symbols.push(SymbolEntry::function(sym.st_value, sym.st_size, name));
        }
    }
    symbols
}

/// Printable runs in allocated sections, in ascending address order.
pub struct NativeStrings {
    min_len: usize,
}

impl NativeStrings {
    pub fn new(min_len: usize) -> Self {
        Self { min_len: min_len.max(1) }
    }
}

impl Default for NativeStrings {
    /// Same minimum as `strings(1)`.
    fn default() -> Self {
        Self::new(4)
    }
}

impl StringTableProvider for NativeStrings {
    fn strings(&self, path: &Path, ctx: &CallContext) -> Result<StringStream, ScanError> {
        ctx.check(TOOL)?;
        let bytes = read_file(path)?;
        let elf = parse_elf(path, &bytes)?;
        let entries = allocated_strings(&elf, &bytes, self.min_len);
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

fn is_printable(byte: u8) -> bool {
    byte == b'\t' || (0x20..0x7f).contains(&byte)
}

fn allocated_strings(elf: &Elf, bytes: &[u8], min_len: usize) -> Vec<StringEntry> {
    let mut entries = Vec::new();
    for sh in &elf.section_headers {
        if sh.sh_flags & u64::from(SHF_ALLOC) == 0 || sh.sh_type == SHT_NOBITS {
            continue;
        }
        let start = sh.sh_offset as usize;
        let Some(data) = start
            .checked_add(sh.sh_size as usize)
            .and_then(|end| bytes.get(start..end))
        else {
            continue;
        };

        let mut run_start: Option<usize> = None;
        for (i, &byte) in data.iter().chain(std::iter::once(&0u8)).enumerate() {
            if is_printable(byte) {
                run_start.get_or_insert(i);
                continue;
            }
            if let Some(begin) = run_start.take() {
                if i - begin >= min_len {
                    entries.push(StringEntry {
                        address: sh.sh_addr + begin as u64,
                        text: String::from_utf8_lossy(&data[begin..i]).into_owned(),
                    });
                }
            }
        }
    }
    entries.sort_by_key(|e| e.address);
    entries
}

/// File-backed part of a `PT_LOAD` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub offset: u64,
    pub file_size: u64,
    pub vaddr: u64,
}

impl LoadSegment {
    /// Virtual address of a file offset; offsets outside every segment map to themselves.
    pub fn address_of(segments: &[LoadSegment], offset: u64) -> u64 {
        segments
            .iter()
            .find(|s| s.offset <= offset && offset < s.offset.saturating_add(s.file_size))
            .map(|s| s.vaddr + (offset - s.offset))
            .unwrap_or(offset)
    }
}

pub fn read_load_segments(path: &Path) -> Result<Vec<LoadSegment>, ScanError> {
    let bytes = read_file(path)?;
    let elf = parse_elf(path, &bytes)?;
    Ok(elf
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD)
        .map(|ph| LoadSegment { offset: ph.p_offset, file_size: ph.p_filesz, vaddr: ph.p_vaddr })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_through_segments() {
        let segments = [
            LoadSegment { offset: 0, file_size: 0x1000, vaddr: 0x400000 },
            LoadSegment { offset: 0x1000, file_size: 0x200, vaddr: 0x601000 },
        ];
        assert_eq!(LoadSegment::address_of(&segments, 0x10), 0x400010);
        assert_eq!(LoadSegment::address_of(&segments, 0x1010), 0x601010);
        assert_eq!(LoadSegment::address_of(&segments, 0x5000), 0x5000);
        assert_eq!(LoadSegment::address_of(&[], 0x42), 0x42);
    }

    #[test]
    fn gate_rejects_non_elf_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, b"#!/bin/sh\necho hi\n").unwrap();
        assert!(!ElfGate.is_elf(&path));
        assert!(!ElfGate.has_executable_code(&path));
        assert!(!ElfGate.is_elf(&dir.path().join("missing")));
    }
}
