#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};

/// Smallest ELF the scanner accepts: magic bytes plus a `.text` section.
pub fn write_elf(path: &Path) {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.append_section_data(text, &[0x55, 0xc3], 1);
    fs::write(path, obj.write().unwrap()).unwrap();
}

pub const OBJDUMP_LISTING: &str = "
fixture:     file format elf64-x86-64


Disassembly of section .text:

0000000000001129 <main>:
    1129:\t55                   \tpush   %rbp
    112a:\t48 89 e5             \tmov    %rsp,%rbp
    1139:\t48 8d 3d c4 0e 00 00 \tlea    0xec4(%rip),%rdi        # 2004 <_IO_stdin_used+0x4>
    1140:\te8 eb fe ff ff       \tcall   1030 <open@plt>
    1145:\t90                   \tnop

0000000000001159 <helper>:
    1159:\t55                   \tpush   %rbp
    1160:\t48 8d 3d b1 0e 00 00 \tlea    0xeb1(%rip),%rdi        # 2010 <_IO_stdin_used+0x10>
    1167:\te8 c4 fe ff ff       \tcall   1030 <open@plt>
    116c:\tc3                   \tret
";

pub const READELF_LISTING: &str = "
Symbol table '.symtab' contains 4 entries:
   Num:    Value          Size Type    Bind   Vis      Ndx Name
     0: 0000000000000000     0 NOTYPE  LOCAL  DEFAULT  UND 
     1: 0000000000004010     8 OBJECT  GLOBAL DEFAULT   24 counter
     2: 0000000000001129    48 FUNC    GLOBAL DEFAULT   14 main
     3: 0000000000001159    32 FUNC    GLOBAL DEFAULT   14 helper
";

/// Offsets are decimal: 8196 = 0x2004, 8208 = 0x2010.
pub const STRINGS_LISTING: &str = "   8196 /etc/passwd
   8208 /tmp/log
   8224 unused literal
";

/// Stand-ins for objdump, readelf and strings that print fixed listings.
pub struct FakeTools {
    pub objdump: PathBuf,
    pub readelf: PathBuf,
    pub strings: PathBuf,
}

#[cfg(unix)]
pub fn write_fake_tools(dir: &Path) -> FakeTools {
    FakeTools {
        objdump: write_script(dir, "objdump", OBJDUMP_LISTING),
        readelf: write_script(dir, "readelf", READELF_LISTING),
        strings: write_script(dir, "strings", STRINGS_LISTING),
    }
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, output: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let listing = dir.join(format!("{name}.out"));
    fs::write(&listing, output).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\ncat '{}'\n", listing.display())).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
