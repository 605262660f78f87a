//! Incremental changeset construction.

use crate::assembler::OpAssembler;
use crate::changeset::Changeset;
use crate::error::{ChangesetError, Result};
use crate::op::{Op, OpCode};
use crate::pool::AttribNum;

/// Builds a changeset against a document of known length.
///
/// Calls describe the edit left to right; anything not consumed by the time
/// [`build`](Builder::build) is called is kept.
#[derive(Debug)]
pub struct Builder {
    old_len: usize,
    consumed: usize,
    assem: OpAssembler,
    char_bank: String,
}

impl Builder {
    pub fn new(old_len: usize) -> Self {
        Self {
            old_len,
            consumed: 0,
            assem: OpAssembler::new(),
            char_bank: String::new(),
        }
    }

    /// Keep `chars` chars spanning `lines` newlines, applying `attribs`.
    pub fn keep(&mut self, chars: usize, lines: usize, attribs: &[AttribNum]) -> &mut Self {
        self.consumed += chars;
        self.assem
            .append(Op::keep(chars, lines).with_attribs(attribs.to_vec()));
        self
    }

    /// Keep exactly the chars of `text`, which must match the document.
    pub fn keep_text(&mut self, text: &str, attribs: &[AttribNum]) -> &mut Self {
        self.consumed += text.chars().count();
        self.assem.append_op_with_text(OpCode::Keep, text, attribs);
        self
    }

    pub fn insert(&mut self, text: &str, attribs: &[AttribNum]) -> &mut Self {
        self.assem.append_op_with_text(OpCode::Insert, text, attribs);
        self.char_bank.push_str(text);
        self
    }

    pub fn remove(&mut self, chars: usize, lines: usize) -> &mut Self {
        self.consumed += chars;
        self.assem.append(Op::remove(chars, lines));
        self
    }

    /// Remove exactly the chars of `text`, which must match the document.
    pub fn remove_text(&mut self, text: &str) -> &mut Self {
        self.consumed += text.chars().count();
        self.assem.append_op_with_text(OpCode::Remove, text, &[]);
        self
    }

    pub fn build(self) -> Result<Changeset> {
        if self.consumed > self.old_len {
            return Err(ChangesetError::BuilderOverrun {
                consumed: self.consumed,
                old_len: self.old_len,
            });
        }
        let new_len = (self.old_len as isize + self.assem.length_change()) as usize;

        Ok(Changeset {
            old_len: self.old_len,
            new_len,
            ops: self.assem.finish(),
            char_bank: self.char_bank,
        })
    }
}
