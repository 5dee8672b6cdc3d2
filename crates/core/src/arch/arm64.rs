//! ARM64: `adrp xN, page` followed by `add xN, xN, #off`.
//!
//! A pending page base is dropped when the register is rewritten by anything
//! other than the completing `add`, when a new `adrp` replaces it, at a context
//! group boundary, or once more than [`ARM64_LOOKAHEAD`] unrelated instructions
//! pass without the completing `add`.

use super::line::{is_separator, split_operands, DisasmLine};
use super::CallSiteExtractor;
use crate::model::{parse_hex, CallSiteCandidate};

/// Intervening instructions an `adrp` base may wait for its `add`.
pub const ARM64_LOOKAHEAD: usize = 10;

/// Extracts `adrp`/`add` address materialisation into the argument register.
pub struct AdrpAddExtractor;

#[derive(Debug)]
enum State {
    SeekingBase,
    SeekingOffset { base: u64, address: String, waited: usize },
}

impl CallSiteExtractor for AdrpAddExtractor {
    fn extract(&self, lines: &[String], register: &str) -> Vec<CallSiteCandidate> {
        let mut found = Vec::new();
        let mut state = State::SeekingBase;

        for line in lines {
            if is_separator(line) {
                state = State::SeekingBase;
                continue;
            }
            let Some(insn) = DisasmLine::parse(line) else { continue };
            let operands = split_operands(insn.operands);
            let writes_register =
                operands.first().is_some_and(|dest| is_register(dest, register));

            if insn.mnemonic == "adrp" && writes_register {
                state = match operands.get(1).and_then(|page| parse_page(page)) {
                    Some(base) => State::SeekingOffset {
                        base,
                        address: insn.address.to_string(),
                        waited: 0,
                    },
                    None => State::SeekingBase,
                };
                continue;
            }

            state = match state {
                State::SeekingBase => State::SeekingBase,
                State::SeekingOffset { base, address, waited } => {
                    if insn.mnemonic == "add" && writes_register {
                        match add_offset(&operands, register) {
                            Some(offset) => {
                                found.push(CallSiteCandidate::new(
                                    address,
                                    base.wrapping_add(offset),
                                ));
                                State::SeekingBase
                            }
                            None => State::SeekingBase,
                        }
                    } else if writes_register && clobbers(insn.mnemonic) {
                        State::SeekingBase
                    } else if waited + 1 > ARM64_LOOKAHEAD {
                        State::SeekingBase
                    } else {
                        State::SeekingOffset { base, address, waited: waited + 1 }
                    }
                }
            };
        }

        found
    }
}

/// `x0` also matches its 32-bit view `w0`.
fn is_register(operand: &str, register: &str) -> bool {
    let operand = operand.trim();
    if operand.eq_ignore_ascii_case(register) {
        return true;
    }
    match (operand.get(..1), register.get(..1)) {
        (Some(o), Some("x")) if o.eq_ignore_ascii_case("w") => operand[1..] == register[1..],
        _ => false,
    }
}

/// Branches, stores, compares and system instructions leave their first operand alone.
fn clobbers(mnemonic: &str) -> bool {
    let non_writing = matches!(
        mnemonic,
        "b" | "bl" | "br" | "blr" | "ret" | "cbz" | "cbnz" | "tbz" | "tbnz"
            | "cmp" | "cmn" | "tst" | "ccmp" | "ccmn"
            | "nop" | "dmb" | "dsb" | "isb" | "svc" | "prfm"
    );
    !(non_writing || mnemonic.starts_with("b.") || mnemonic.starts_with("st"))
}

/// Page operand: hex, optionally prefixed with `#` and/or `0x`.
fn parse_page(operand: &str) -> Option<u64> {
    let text = operand.split_whitespace().next()?;
    parse_hex(text.trim_start_matches('#'))
}

/// `add xN, xN, #imm[, lsl #12]`; the source must be the tracked register.
fn add_offset(operands: &[&str], register: &str) -> Option<u64> {
    let [_, source, immediate, rest @ ..] = operands else { return None };
    if !is_register(source, register) {
        return None;
    }
    let mut offset = parse_immediate(immediate)?;
    if let Some(shift) = rest.first() {
        let amount = shift.trim().strip_prefix("lsl")?.trim();
        offset = offset.checked_shl(parse_immediate(amount)? as u32)?;
    }
    Some(offset)
}

/// `#0x20` is hex, `#32` decimal.
fn parse_immediate(text: &str) -> Option<u64> {
    let text = text.trim().trim_start_matches('#');
    if text.starts_with("0x") || text.starts_with("0X") {
        parse_hex(text)
    } else {
        text.parse().ok()
    }
}
