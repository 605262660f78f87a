//! Changeset operations.

use crate::pool::AttribNum;

/// What an op does to the characters it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Retain characters of the old document, optionally changing attributes.
    Keep,
    /// Insert characters drawn from the char bank.
    Insert,
    /// Remove characters of the old document.
    Remove,
}

impl OpCode {
    /// Wire symbol for this opcode.
    pub fn symbol(self) -> char {
        match self {
            OpCode::Keep => '=',
            OpCode::Insert => '+',
            OpCode::Remove => '-',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '=' => Some(OpCode::Keep),
            '+' => Some(OpCode::Insert),
            '-' => Some(OpCode::Remove),
            _ => None,
        }
    }

    /// Whether the op consumes characters of the old document.
    pub fn consumes(self) -> bool {
        matches!(self, OpCode::Keep | OpCode::Remove)
    }

    /// Whether the op produces characters of the new document.
    pub fn produces(self) -> bool {
        matches!(self, OpCode::Keep | OpCode::Insert)
    }
}

/// A single run of `chars` characters, `lines` of which are newlines.
///
/// An op with `lines > 0` always ends with a newline; the assembler splits
/// trailing partial lines into their own op.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Op {
    pub opcode: OpCode,
    pub chars: usize,
    pub lines: usize,
    pub attribs: Vec<AttribNum>,
}

impl Op {
    pub fn new(opcode: OpCode, chars: usize, lines: usize) -> Self {
        Self {
            opcode,
            chars,
            lines,
            attribs: Vec::new(),
        }
    }

    pub fn keep(chars: usize, lines: usize) -> Self {
        Self::new(OpCode::Keep, chars, lines)
    }

    pub fn insert(chars: usize, lines: usize) -> Self {
        Self::new(OpCode::Insert, chars, lines)
    }

    pub fn remove(chars: usize, lines: usize) -> Self {
        Self::new(OpCode::Remove, chars, lines)
    }

    pub fn with_attribs(mut self, attribs: Vec<AttribNum>) -> Self {
        self.attribs = attribs;
        self
    }

    /// Split off the first `chars` characters (containing `lines` newlines)
    /// as a new op, leaving the remainder in `self`.
    pub fn split_off(&mut self, chars: usize, lines: usize) -> Op {
        let head = Op {
            opcode: self.opcode,
            chars: chars.min(self.chars),
            lines: lines.min(self.lines),
            attribs: self.attribs.clone(),
        };
        self.chars -= head.chars;
        self.lines -= head.lines;
        head
    }
}

/// Chars and lines of whichever op is shorter. When two ops are walked
/// together, this is the span both of them cover.
pub(crate) fn shorter(a: &Op, b: &Op) -> (usize, usize) {
    if a.chars <= b.chars {
        (a.chars, a.lines)
    } else {
        (b.chars, b.lines)
    }
}

/// Consume `chars`/`lines` from the op in `slot`, clearing the slot once the
/// op is exhausted. This is the partial-consumption primitive used when two
/// differently chunked op streams are walked in lockstep.
pub(crate) fn consume(slot: &mut Option<Op>, chars: usize, lines: usize) {
    if let Some(op) = slot {
        op.chars = op.chars.saturating_sub(chars);
        op.lines = op.lines.saturating_sub(lines);
        if op.chars == 0 {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_roundtrip() {
        for code in [OpCode::Keep, OpCode::Insert, OpCode::Remove] {
            assert_eq!(OpCode::from_symbol(code.symbol()), Some(code));
        }
        assert_eq!(OpCode::from_symbol('*'), None);
    }

    #[test]
    fn test_split_off() {
        let mut op = Op::keep(10, 2).with_attribs(vec![3]);
        let head = op.split_off(4, 1);

        assert_eq!(head, Op::keep(4, 1).with_attribs(vec![3]));
        assert_eq!(op, Op::keep(6, 1).with_attribs(vec![3]));
    }

    #[test]
    fn test_consume_clears_slot() {
        let mut slot = Some(Op::remove(3, 0));
        consume(&mut slot, 2, 0);
        assert_eq!(slot.as_ref().map(|op| op.chars), Some(1));
        consume(&mut slot, 1, 0);
        assert!(slot.is_none());
    }
}
