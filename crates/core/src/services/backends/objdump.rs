use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::arch::line::{DisasmLine, GROUP_SEPARATOR};
use crate::error::ScanError;
use crate::services::process::{run_tool, CallContext};
use crate::services::providers::DisassemblyProvider;

/// Lines of context kept before each reference to a function.
pub const CONTEXT_LINES: usize = 10;

/// Disassembles `.text` with objdump once per file and cuts out the lines
/// leading up to each reference to a requested function.
pub struct ObjdumpDisassembler {
    objdump: PathBuf,
    context_lines: usize,
}

impl ObjdumpDisassembler {
    pub fn new(objdump: impl Into<PathBuf>) -> Self {
        Self { objdump: objdump.into(), context_lines: CONTEXT_LINES }
    }
}

impl DisassemblyProvider for ObjdumpDisassembler {
    fn function_contexts(
        &self,
        path: &Path,
        names: &[String],
        ctx: &CallContext,
    ) -> Result<HashMap<String, Vec<String>>, ScanError> {
        let mut command = Command::new(&self.objdump);
        command.args(["-d", "-j", ".text"]).arg(path);
        let listing = run_tool(command, "objdump", path, ctx)?;
        let lines: Vec<&str> = listing.lines().collect();
        Ok(contexts_for(&lines, names, self.context_lines))
    }

    fn name(&self) -> &'static str {
        "objdump"
    }
}

/// For every name, the lines referencing it plus up to `before` lines of
/// leading context. A window never reaches back past an earlier call, since
/// argument registers loaded before it belong to that call. Overlapping
/// windows merge; disjoint ones are split by `--`.
pub fn contexts_for(
    lines: &[&str],
    names: &[String],
    before: usize,
) -> HashMap<String, Vec<String>> {
    let mut out = HashMap::new();
    for name in names {
        if out.contains_key(name) {
            continue;
        }
        let block = context_block(lines, name, before);
        if !block.is_empty() {
            out.insert(name.clone(), block);
        }
    }
    out
}

fn context_block(lines: &[&str], name: &str, before: usize) -> Vec<String> {
    let mut block = Vec::new();
    let mut next_unemitted = 0usize;
    for (idx, line) in lines.iter().enumerate() {
        if !references(line, name) {
            continue;
        }
        let start = (idx.saturating_sub(before)..idx)
            .rev()
            .find(|&i| is_call(lines[i]))
            .map_or(idx.saturating_sub(before), |call| call + 1);
        if !block.is_empty() && start > next_unemitted {
            block.push(GROUP_SEPARATOR.to_string());
        }
        for context in &lines[start.max(next_unemitted)..=idx] {
            block.push(context.trim().to_string());
        }
        next_unemitted = idx + 1;
    }
    block
}

fn is_call(line: &str) -> bool {
    DisasmLine::parse(line)
        .is_some_and(|insn| matches!(insn.mnemonic, "call" | "callq" | "bl" | "blr"))
}

/// True when a `<symbol>` annotation on the line names `name`, either exactly
/// (`<open@plt>`) or by its base (`<open>`, `<open@plt>`, `<open+0x10>`).
pub fn references(line: &str, name: &str) -> bool {
    let mut rest = line;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else { break };
        let symbol = &after[..close];
        let base = symbol.split(['@', '+']).next().unwrap_or(symbol);
        if symbol == name || base == name {
            return true;
        }
        rest = &after[close + 1..];
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
0000000000001139 <main>:
    1139:\t55                   \tpush   %rbp
    113a:\t48 89 e5             \tmov    %rsp,%rbp
    113d:\t48 8d 3d c0 0e 00 00 \tlea    0xec0(%rip),%rdi        # 2004 <_IO_stdin_used+0x4>
    1144:\tbe 00 00 00 00       \tmov    $0x0,%esi
    1149:\te8 e2 fe ff ff       \tcall   1030 <open@plt>
    114e:\t48 8d 3d bb 0e 00 00 \tlea    0xebb(%rip),%rdi        # 2010 <_IO_stdin_used+0x10>
    1155:\te8 d6 fe ff ff       \tcall   1040 <fopen@plt>
    115a:\t5d                   \tpop    %rbp
    115b:\tc3                   \tret";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn context_includes_leading_lines_and_reference() {
        let lines: Vec<&str> = LISTING.lines().collect();
        let ctx = contexts_for(&lines, &names(&["open"]), 2);
        let block = &ctx["open"];
        assert_eq!(block.len(), 3);
        assert!(block[0].starts_with("113d:"));
        assert!(block[2].contains("<open@plt>"));
    }

    #[test]
    fn substring_names_do_not_match() {
        let lines: Vec<&str> = LISTING.lines().collect();
        let ctx = contexts_for(&lines, &names(&["open", "fopen", "close"]), 1);
        assert_eq!(ctx["open"].len(), 2);
        assert_eq!(ctx["fopen"].len(), 2);
        assert!(ctx["fopen"][1].contains("<fopen@plt>"));
        assert!(!ctx.contains_key("close"));
    }

    #[test]
    fn disjoint_windows_are_separated() {
        let lines = vec!["1: <f>", "2: x", "3: y", "4: z", "5: <f>"];
        let block = context_block(&lines, "f", 1);
        assert_eq!(block, vec!["1: <f>", "--", "4: z", "5: <f>"]);
    }

    #[test]
    fn overlapping_windows_merge() {
        let lines = vec!["1: a", "2: <f>", "3: b", "4: <f>"];
        let block = context_block(&lines, "f", 2);
        assert_eq!(block, vec!["1: a", "2: <f>", "3: b", "4: <f>"]);
    }

    #[test]
    fn window_stops_at_earlier_call() {
        let lines: Vec<&str> = LISTING.lines().collect();
        let ctx = contexts_for(&lines, &names(&["fopen"]), 10);
        let block = &ctx["fopen"];
        assert_eq!(block.len(), 2);
        assert!(block[0].starts_with("114e:"));
        assert!(block.iter().all(|l| !l.contains("# 2004")));
    }

    #[test]
    fn arm64_window_stops_at_earlier_bl() {
        let lines = vec![
            "  7a0:\t90000000 \tadrp\tx0, 1000 <x>",
            "  7a4:\t91008000 \tadd\tx0, x0, #0x20",
            "  7a8:\t97ffffaa \tbl\t650 <system@plt>",
            "  7ac:\t52800001 \tmov\tw1, #0x0",
            "  7b0:\t97ffffa0 \tbl\t630 <open@plt>",
        ];
        let block = context_block(&lines, "open", 10);
        assert_eq!(block.len(), 2);
        assert!(block[0].starts_with("7ac:"));
    }

    #[test]
    fn references_accepts_offsets_and_full_names() {
        assert!(references("jmp 1150 <main+0x17>", "main"));
        assert!(references("call 1030 <open@plt>", "open@plt"));
        assert!(!references("call 1030 <open64@plt>", "open"));
        assert!(!references("no annotation", "open"));
    }
}
