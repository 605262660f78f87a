//! Op stream canonicalization.
//!
//! Every op stream produced by this crate goes through [`OpAssembler`], which
//! guarantees a canonical form:
//! - adjacent ops with the same opcode and attributes are merged
//! - a multi-line op never carries a trailing partial line (that part is
//!   split into its own op)
//! - between two keeps, removes come before inserts
//! - a trailing keep without attributes is left implicit

use crate::op::{Op, OpCode};
use crate::pool::AttribNum;

/// Merges runs of compatible ops.
#[derive(Debug, Default)]
struct MergingAssembler {
    buf: Option<Op>,
    /// Chars buffered after the last newline of a multi-line `buf`.
    extra_chars: usize,
    out: Vec<Op>,
}

impl MergingAssembler {
    fn append(&mut self, op: Op) {
        if op.chars == 0 {
            return;
        }

        if let Some(buf) = &mut self.buf {
            if buf.opcode == op.opcode && buf.attribs == op.attribs {
                if op.lines > 0 {
                    buf.chars += self.extra_chars + op.chars;
                    buf.lines += op.lines;
                    self.extra_chars = 0;
                } else if buf.lines == 0 {
                    buf.chars += op.chars;
                } else {
                    self.extra_chars += op.chars;
                }
                return;
            }
        }

        self.flush(false);
        self.buf = Some(op);
    }

    fn flush(&mut self, end_document: bool) {
        let Some(buf) = self.buf.take() else {
            return;
        };
        let extra = std::mem::take(&mut self.extra_chars);

        if end_document && buf.opcode == OpCode::Keep && buf.attribs.is_empty() {
            return;
        }

        let tail = (extra > 0).then(|| Op {
            opcode: buf.opcode,
            chars: extra,
            lines: 0,
            attribs: buf.attribs.clone(),
        });
        self.out.push(buf);
        self.out.extend(tail);
    }

    fn drain_into(&mut self, out: &mut Vec<Op>) {
        self.flush(false);
        out.append(&mut self.out);
    }
}

/// Canonicalizing assembler for changeset and attribution op streams.
#[derive(Debug, Default)]
pub struct OpAssembler {
    minus: MergingAssembler,
    plus: MergingAssembler,
    keep: MergingAssembler,
    last: Option<OpCode>,
    out: Vec<Op>,
    length_change: isize,
}

impl OpAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, op: Op) {
        if op.chars == 0 {
            return;
        }

        let opcode = op.opcode;
        match opcode {
            OpCode::Remove => {
                if self.last == Some(OpCode::Keep) {
                    self.keep.drain_into(&mut self.out);
                }
                self.length_change -= op.chars as isize;
                self.minus.append(op);
            }
            OpCode::Insert => {
                if self.last == Some(OpCode::Keep) {
                    self.keep.drain_into(&mut self.out);
                }
                self.length_change += op.chars as isize;
                self.plus.append(op);
            }
            OpCode::Keep => {
                if self.last != Some(OpCode::Keep) {
                    self.flush_plus_minus();
                }
                self.keep.append(op);
            }
        }
        self.last = Some(opcode);
    }

    /// Append `text` as one or two ops of `opcode`: everything up to and
    /// including the last newline, then the trailing partial line.
    pub fn append_op_with_text(&mut self, opcode: OpCode, text: &str, attribs: &[AttribNum]) {
        let total = text.chars().count();
        let lines = text.matches('\n').count();

        if lines == 0 {
            self.append(Op::new(opcode, total, 0).with_attribs(attribs.to_vec()));
            return;
        }

        let tail = text
            .rfind('\n')
            .map_or(0, |pos| text[pos + 1..].chars().count());
        self.append(Op::new(opcode, total - tail, lines).with_attribs(attribs.to_vec()));
        self.append(Op::new(opcode, tail, 0).with_attribs(attribs.to_vec()));
    }

    /// Net change in length produced by the appended ops.
    pub fn length_change(&self) -> isize {
        self.length_change
    }

    /// Finish the stream, leaving a trailing plain keep implicit.
    pub fn finish(mut self) -> Vec<Op> {
        self.keep.flush(true);
        self.flush_plus_minus();
        self.keep.drain_into(&mut self.out);
        self.out
    }

    fn flush_plus_minus(&mut self) {
        self.minus.drain_into(&mut self.out);
        self.plus.drain_into(&mut self.out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(ops: Vec<Op>) -> Vec<Op> {
        let mut assem = OpAssembler::new();
        for op in ops {
            assem.append(op);
        }
        assem.finish()
    }

    #[test]
    fn test_merges_compatible_ops() {
        let ops = assemble(vec![Op::insert(2, 0), Op::insert(3, 0), Op::keep(1, 0)]);
        assert_eq!(ops, vec![Op::insert(5, 0)]);
    }

    #[test]
    fn test_keeps_attribute_boundaries() {
        let ops = assemble(vec![
            Op::insert(2, 0).with_attribs(vec![0]),
            Op::insert(3, 0).with_attribs(vec![1]),
        ]);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_removes_before_inserts() {
        let ops = assemble(vec![
            Op::keep(1, 0),
            Op::insert(2, 0),
            Op::remove(3, 0),
            Op::insert(1, 0),
            Op::keep(4, 1),
        ]);
        assert_eq!(
            ops,
            vec![Op::keep(1, 0), Op::remove(3, 0), Op::insert(3, 0)]
        );
    }

    #[test]
    fn test_trailing_keep_with_attribs_survives() {
        let ops = assemble(vec![Op::keep(3, 0).with_attribs(vec![2])]);
        assert_eq!(ops, vec![Op::keep(3, 0).with_attribs(vec![2])]);
    }

    #[test]
    fn test_multiline_split() {
        // "ab\ncd\nef" as three inserts: the partial last line stays separate.
        let ops = assemble(vec![Op::insert(3, 1), Op::insert(3, 1), Op::insert(2, 0)]);
        assert_eq!(ops, vec![Op::insert(6, 2), Op::insert(2, 0)]);

        // A partial line followed by a completed line is folded back in.
        let ops = assemble(vec![Op::insert(3, 1), Op::insert(2, 0), Op::insert(1, 1)]);
        assert_eq!(ops, vec![Op::insert(6, 2)]);
    }

    #[test]
    fn test_append_op_with_text() {
        let mut assem = OpAssembler::new();
        assem.append_op_with_text(OpCode::Insert, "one\ntwo\nthr", &[]);
        assert_eq!(assem.length_change(), 11);
        assert_eq!(assem.finish(), vec![Op::insert(8, 2), Op::insert(3, 0)]);
    }
}
