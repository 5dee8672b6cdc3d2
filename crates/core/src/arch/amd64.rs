//! AMD64: `lea <rip-relative>, %reg` with objdump's `# <addr>` annotation.

use std::sync::OnceLock;

use regex::Regex;

use super::line::{mentions_register, DisasmLine};
use super::CallSiteExtractor;
use crate::model::CallSiteCandidate;

/// Extracts `lea` loads of a constant address into the argument register.
pub struct LeaExtractor;

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s*(?:0x)?([0-9a-fA-F]+)").expect("static regex"))
}

impl CallSiteExtractor for LeaExtractor {
    fn extract(&self, lines: &[String], register: &str) -> Vec<CallSiteCandidate> {
        lines.iter().filter_map(|line| lea_candidate(line, register)).collect()
    }
}

fn lea_candidate(line: &str, register: &str) -> Option<CallSiteCandidate> {
    let insn = DisasmLine::parse(line)?;
    if !matches!(insn.mnemonic, "lea" | "leaq") {
        return None;
    }
    let (operands, comment) = match insn.operands.find('#') {
        Some(idx) => insn.operands.split_at(idx),
        None => return None,
    };
    if !mentions_register(destination(operands), register) {
        return None;
    }
    let captures = annotation_re().captures(comment)?;
    let referenced = u64::from_str_radix(&captures[1], 16).ok()?;
    Some(CallSiteCandidate::new(insn.address, referenced))
}

/// AT&T syntax (`%` registers) writes the last operand, Intel the first.
fn destination(operands: &str) -> &str {
    let operands = operands.trim();
    if operands.contains('%') {
        operands.rsplit(',').next().unwrap_or(operands)
    } else {
        operands.split(',').next().unwrap_or(operands)
    }
}
