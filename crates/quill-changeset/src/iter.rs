//! Lazy op decoding and lockstep walking of two op streams.

use crate::assembler::OpAssembler;
use crate::codec::parse_num;
use crate::error::{ChangesetError, Result};
use crate::op::{Op, OpCode};

/// Lazily decodes an encoded op string (`*0|1+5=3-2`) one op at a time.
#[derive(Clone, Debug)]
pub struct OpIter<'a> {
    rest: &'a str,
    failed: bool,
}

impl<'a> OpIter<'a> {
    pub fn new(encoded: &'a str) -> Self {
        Self {
            rest: encoded,
            failed: false,
        }
    }

    /// Read a run of base-36 digits from the front of `rest`.
    fn take_number(&mut self) -> Result<usize> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(self.rest.len());
        // Opcode and marker symbols are never alphanumeric, so a run of
        // alphanumerics is exactly one number.
        let (digits, rest) = self.rest.split_at(end);
        self.rest = rest;
        parse_num(digits)
    }

    fn decode_next(&mut self) -> Result<Op> {
        let mut attribs = Vec::new();
        let mut lines = 0;

        loop {
            let mut chars = self.rest.chars();
            let Some(symbol) = chars.next() else {
                return Err(ChangesetError::malformed("op stream ends inside an op"));
            };
            self.rest = chars.as_str();

            match symbol {
                '*' => {
                    let num = self.take_number()?;
                    let num = u32::try_from(num)
                        .map_err(|_| ChangesetError::malformed("attribute number too large"))?;
                    attribs.push(num);
                }
                '|' => lines = self.take_number()?,
                other => {
                    let opcode = OpCode::from_symbol(other).ok_or_else(|| {
                        ChangesetError::malformed(format!("unexpected character {:?}", other))
                    })?;
                    let chars = self.take_number()?;
                    return Ok(Op {
                        opcode,
                        chars,
                        lines,
                        attribs,
                    });
                }
            }
        }
    }
}

impl Iterator for OpIter<'_> {
    type Item = Result<Op>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        let op = self.decode_next();
        self.failed = op.is_err();
        Some(op)
    }
}

/// Walk two op streams in lockstep.
///
/// `step` receives the current (possibly partially consumed) op of each
/// stream, `None` meaning that stream is exhausted, and must consume from at
/// least one of them. Whatever it emits is canonicalized by an
/// [`OpAssembler`].
pub(crate) fn zip<F>(ops1: &[Op], ops2: &[Op], mut step: F) -> Result<Vec<Op>>
where
    F: FnMut(&mut Option<Op>, &mut Option<Op>) -> Result<Option<Op>>,
{
    let mut iter1 = ops1.iter().filter(|op| op.chars > 0).cloned();
    let mut iter2 = ops2.iter().filter(|op| op.chars > 0).cloned();
    let mut op1 = None;
    let mut op2 = None;
    let mut assem = OpAssembler::new();

    loop {
        if op1.is_none() {
            op1 = iter1.next();
        }
        if op2.is_none() {
            op2 = iter2.next();
        }
        if op1.is_none() && op2.is_none() {
            break;
        }
        if let Some(out) = step(&mut op1, &mut op2)? {
            assem.append(out);
        }
    }

    Ok(assem.finish())
}
