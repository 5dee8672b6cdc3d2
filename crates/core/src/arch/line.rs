//! Parsing of single objdump `-d` text lines.
//!
//! Expected shape (after trimming):
//! `1139:\t48 8d 3d c4 0e 00 00 \tlea    0xec4(%rip),%rdi        # 2004 <msg>`
//! or, on aarch64, `400580:\t90000000 \tadrp\tx0, 400000 <_init-0x3e8>`.

/// Separator objdump context groups are joined with.
pub const GROUP_SEPARATOR: &str = "--";

/// One decoded instruction line. Borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisasmLine<'a> {
    /// Address text before the first colon, e.g. `1139`.
    pub address: &'a str,
    pub mnemonic: &'a str,
    /// Everything after the mnemonic, comments included.
    pub operands: &'a str,
}

impl<'a> DisasmLine<'a> {
    /// Parse an instruction line; labels, headers and byte-only
    /// continuation lines return `None`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        let (address, rest) = line.split_once(':')?;
        let address = address.trim();
        if address.is_empty() || !address.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let mut fields = rest.split('\t').map(str::trim).filter(|f| !f.is_empty()).peekable();
        if let Some(first) = fields.peek() {
            if is_raw_bytes(first) {
                fields.next();
            }
        }
        let instruction = fields.next()?;
        let (mnemonic, inline_operands) = match instruction.split_once(char::is_whitespace) {
            Some((m, ops)) => (m, ops.trim()),
            None => (instruction, ""),
        };
        // aarch64 objdump separates mnemonic and operands with a tab.
        let operands = match fields.next() {
            Some(ops) if inline_operands.is_empty() => ops,
            _ => inline_operands,
        };
        Some(Self { address, mnemonic, operands })
    }
}

pub fn is_separator(line: &str) -> bool {
    line.trim() == GROUP_SEPARATOR
}

/// Raw encoding column: whitespace separated, even-length hex groups.
fn is_raw_bytes(field: &str) -> bool {
    let mut groups = field.split_whitespace().peekable();
    groups.peek().is_some()
        && groups.all(|g| g.len() % 2 == 0 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Split operand text into identifier-like tokens (`%rdi` → `rdi`).
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).filter(|t| !t.is_empty())
}

pub fn mentions_register(text: &str, register: &str) -> bool {
    tokens(text).any(|t| t.eq_ignore_ascii_case(register))
}

/// Comma separated operands with trailing `<symbol>` and `//` annotations removed.
pub fn split_operands(operands: &str) -> Vec<&str> {
    let operands = operands.split("//").next().unwrap_or("");
    let operands = operands.split('<').next().unwrap_or("");
    operands.split(',').map(str::trim).filter(|o| !o.is_empty()).collect()
}
