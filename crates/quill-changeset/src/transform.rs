//! Rebasing one changeset over another concurrent one.

use crate::attributes::follow_attributes;
use crate::changeset::Changeset;
use crate::error::{ChangesetError, Result};
use crate::iter::zip;
use crate::op::{consume, shorter, Op, OpCode};
use crate::pool::AttributePool;

/// Rebase `a` over `b`, where both were made against the same document.
///
/// The result applies to the output of `b` and preserves the intent of `a`.
/// `a_is_applied` breaks ties: when both sides insert at the same offset, the
/// side that is *not* already applied goes first, and when both set the same
/// attribute key on the same chars, the applied side's value wins.
///
/// For any concurrent `A` and `B`, applying `B` then `transform(A, B, false)`
/// yields the same document as applying `A` then `transform(B, A, true)`.
pub fn transform(
    a: &Changeset,
    b: &Changeset,
    a_is_applied: bool,
    pool: &AttributePool,
) -> Result<Changeset> {
    if a.old_len != b.old_len {
        return Err(ChangesetError::LengthMismatch {
            expected: b.old_len,
            actual: a.old_len,
        });
    }

    let mut bank = a.char_bank.chars();
    let mut char_bank = String::new();

    let ops = zip(&b.ops, &a.ops, |b_slot, a_slot| {
        let (out, b_used, a_used) = match (b_slot.as_ref(), a_slot.as_ref()) {
            (b_op, Some(a_op))
                if a_op.opcode == OpCode::Insert
                    && (b_op.map_or(true, |b_op| b_op.opcode != OpCode::Insert) || !a_is_applied) =>
            {
                (Some(a_op.clone()), (0, 0), (a_op.chars, a_op.lines))
            }
            (Some(b_op), _) if b_op.opcode == OpCode::Insert => (
                Some(Op::keep(b_op.chars, b_op.lines)),
                (b_op.chars, b_op.lines),
                (0, 0),
            ),
            // Whatever `a` wanted to do with chars `b` removed is moot.
            (Some(b_op), Some(a_op)) if b_op.opcode == OpCode::Remove => {
                let span = shorter(b_op, a_op);
                (None, span, span)
            }
            (Some(b_op), None) if b_op.opcode == OpCode::Remove => {
                (None, (b_op.chars, b_op.lines), (0, 0))
            }
            (Some(b_op), Some(a_op)) if a_op.opcode == OpCode::Remove => {
                let span = shorter(b_op, a_op);
                (Some(Op::remove(span.0, span.1)), span, span)
            }
            (Some(b_op), Some(a_op)) => {
                let span = shorter(b_op, a_op);
                let attribs = follow_attributes(&a_op.attribs, &b_op.attribs, a_is_applied, pool)?;
                (
                    Some(Op::keep(span.0, span.1).with_attribs(attribs)),
                    span,
                    span,
                )
            }
            (Some(b_op), None) => (
                Some(Op::keep(b_op.chars, b_op.lines)),
                (b_op.chars, b_op.lines),
                (0, 0),
            ),
            (None, Some(a_op)) => (Some(a_op.clone()), (0, 0), (a_op.chars, a_op.lines)),
            (None, None) => (None, (0, 0), (0, 0)),
        };

        if let Some(op) = &out {
            if op.opcode == OpCode::Insert {
                char_bank.extend(bank.by_ref().take(op.chars));
            }
        }
        consume(b_slot, b_used.0, b_used.1);
        consume(a_slot, a_used.0, a_used.1);
        Ok(out)
    })?;

    // Chars of `b`'s output not covered by an op are kept implicitly.
    let consumed: usize = ops
        .iter()
        .filter(|op| op.opcode.consumes())
        .map(|op| op.chars)
        .sum();
    let produced: usize = ops
        .iter()
        .filter(|op| op.opcode.produces())
        .map(|op| op.chars)
        .sum();

    Ok(Changeset {
        old_len: b.new_len,
        new_len: produced + (b.new_len - consumed),
        ops,
        char_bank,
    })
}

/// Rebase a submitted `edit` over an already `committed` revision.
pub fn follow(edit: &Changeset, committed: &Changeset, pool: &AttributePool) -> Result<Changeset> {
    transform(edit, committed, false, pool)
}
