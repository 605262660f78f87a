//! The decoded changeset type and its structural checks.

use crate::assembler::OpAssembler;
use crate::builder::Builder;
use crate::error::{ChangesetError, Result};
use crate::op::{Op, OpCode};
use crate::pool::AttribNum;
use serde::{Deserialize, Serialize};

/// An edit that turns a document of `old_len` chars into one of `new_len`
/// chars.
///
/// Ops are applied left to right; whatever they do not consume is kept
/// unchanged (the implicit trailing keep). Inserted text is read in order
/// from `char_bank`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Changeset {
    pub old_len: usize,
    pub new_len: usize,
    pub ops: Vec<Op>,
    pub char_bank: String,
}

impl Changeset {
    /// The changeset that leaves a document of length `len` untouched.
    pub fn identity(len: usize) -> Self {
        Self {
            old_len: len,
            new_len: len,
            ops: Vec::new(),
            char_bank: String::new(),
        }
    }

    /// True if applying this changeset changes neither text nor attributes.
    pub fn is_identity(&self) -> bool {
        self.old_len == self.new_len
            && self
                .ops
                .iter()
                .all(|op| op.opcode == OpCode::Keep && op.attribs.is_empty())
    }

    /// Build a changeset that replaces `remove` chars at `start` of
    /// `old_text` with `insert`. Out-of-range arguments are clamped so the
    /// final newline is never touched.
    pub fn make_splice(
        old_text: &str,
        start: usize,
        remove: usize,
        insert: &str,
        attribs: &[AttribNum],
    ) -> Result<Self> {
        let chars: Vec<char> = old_text.chars().collect();
        let old_len = chars.len();
        let start = start.min(old_len.saturating_sub(1));
        let remove = remove.min(old_len.saturating_sub(start + 1));

        let prefix: String = chars[..start].iter().collect();
        let removed: String = chars[start..start + remove].iter().collect();

        let mut builder = Builder::new(old_len);
        builder.keep_text(&prefix, &[]);
        builder.remove_text(&removed);
        builder.insert(insert, attribs);
        builder.build()
    }

    /// Every attribute number referenced by an op, in op order.
    pub fn attrib_numbers(&self) -> impl Iterator<Item = AttribNum> + '_ {
        self.ops.iter().flat_map(|op| op.attribs.iter().copied())
    }

    /// Structural validation. Every changeset that arrives from outside must
    /// pass this before anything else touches it.
    pub fn check_rep(&self) -> Result<()> {
        let mut old_pos: usize = 0;
        let mut new_pos: usize = 0;
        let mut bank = self.char_bank.chars();

        for op in &self.ops {
            if op.chars == 0 {
                return Err(ChangesetError::malformed("zero-length op"));
            }
            match op.opcode {
                OpCode::Keep => {
                    old_pos = old_pos.saturating_add(op.chars);
                    new_pos = new_pos.saturating_add(op.chars);
                    if old_pos > self.old_len {
                        return Err(ChangesetError::malformed("keep runs past the document end"));
                    }
                }
                OpCode::Remove => {
                    old_pos = old_pos.saturating_add(op.chars);
                    if old_pos >= self.old_len {
                        return Err(ChangesetError::malformed("remove reaches the final newline"));
                    }
                }
                OpCode::Insert => {
                    new_pos = new_pos.saturating_add(op.chars);
                    if new_pos >= self.new_len {
                        return Err(ChangesetError::malformed("insert after the final newline"));
                    }
                    let text: String = bank.by_ref().take(op.chars).collect();
                    if text.chars().count() != op.chars {
                        return Err(ChangesetError::malformed("char bank is too short"));
                    }
                    if text.matches('\n').count() != op.lines
                        || (op.lines > 0 && !text.ends_with('\n'))
                    {
                        return Err(ChangesetError::malformed("insert line count disagrees with its text"));
                    }
                }
            }
        }

        if bank.next().is_some() {
            return Err(ChangesetError::malformed("char bank is too long"));
        }
        if new_pos + (self.old_len - old_pos) != self.new_len {
            return Err(ChangesetError::malformed(format!(
                "declared new length {} but ops produce {}",
                self.new_len,
                new_pos + (self.old_len - old_pos)
            )));
        }

        let mut assem = OpAssembler::new();
        for op in &self.ops {
            assem.append(op.clone());
        }
        if assem.finish() != self.ops {
            return Err(ChangesetError::malformed("op stream is not canonical"));
        }

        Ok(())
    }

    /// Apply to plain text. Fails with `LengthMismatch` unless the text has
    /// exactly `old_len` chars, and with `Malformed` when a keep or remove
    /// declares a line count the text it covers does not have.
    pub fn apply_to_text(&self, text: &str) -> Result<String> {
        let actual = text.chars().count();
        if actual != self.old_len {
            return Err(ChangesetError::LengthMismatch {
                expected: self.old_len,
                actual,
            });
        }

        let mut out = String::with_capacity(text.len() + self.char_bank.len());
        let mut source = text.chars();
        let mut bank = self.char_bank.chars();

        for op in &self.ops {
            match op.opcode {
                OpCode::Keep => out.push_str(&covered_span(&mut source, op)?),
                OpCode::Remove => {
                    covered_span(&mut source, op)?;
                }
                OpCode::Insert => out.extend(bank.by_ref().take(op.chars)),
            }
        }
        out.extend(source);

        Ok(out)
    }
}

/// Take the chars a keep or remove covers, checking them against the op's
/// declared length and line count.
fn covered_span(source: &mut std::str::Chars<'_>, op: &Op) -> Result<String> {
    let span: String = source.by_ref().take(op.chars).collect();
    if span.chars().count() != op.chars {
        return Err(ChangesetError::malformed("op runs past the document end"));
    }
    if span.matches('\n').count() != op.lines || (op.lines > 0 && !span.ends_with('\n')) {
        return Err(ChangesetError::malformed(format!(
            "{} of {} chars declares {} lines the text does not have",
            op.opcode.symbol(),
            op.chars,
            op.lines
        )));
    }
    Ok(span)
}
