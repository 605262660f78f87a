//! Sequential composition.

use crate::attributes::compose_attributes;
use crate::changeset::Changeset;
use crate::error::{ChangesetError, Result};
use crate::iter::zip;
use crate::op::{consume, shorter, Op, OpCode};
use crate::pool::AttributePool;

/// One step of walking `first` against `second`, where `second` is applied
/// after `first`. Used both for composing changesets and for applying a
/// changeset to an attribution.
pub(crate) fn slice(
    first: &mut Option<Op>,
    second: &mut Option<Op>,
    pool: &mut AttributePool,
) -> Result<Option<Op>> {
    let (Some(a), Some(b)) = (first.as_ref(), second.as_ref()) else {
        return Ok(first.take().or_else(|| second.take()));
    };
    // Removals of the first side and insertions of the second side touch
    // nothing on the other side.
    if a.opcode == OpCode::Remove {
        return Ok(first.take());
    }
    if b.opcode == OpCode::Insert {
        return Ok(second.take());
    }

    let opcode = match (a.opcode, b.opcode) {
        (OpCode::Insert, OpCode::Remove) => None,
        (_, OpCode::Remove) => Some(OpCode::Remove),
        (opcode, _) => Some(opcode),
    };
    let (chars, lines) = shorter(a, b);
    let attribs = if b.opcode == OpCode::Remove {
        a.attribs.clone()
    } else {
        compose_attributes(&a.attribs, &b.attribs, a.opcode == OpCode::Keep, pool)?
    };

    consume(first, chars, lines);
    consume(second, chars, lines);

    Ok(opcode.map(|opcode| Op {
        opcode,
        chars,
        lines,
        attribs,
    }))
}

/// Compose `cs1` followed by `cs2` into a single changeset.
///
/// Applying the result equals applying `cs1` then `cs2`. Attribute numbers of
/// both sides refer to `pool`; composed attribute sets are interned into it.
pub fn compose(cs1: &Changeset, cs2: &Changeset, pool: &mut AttributePool) -> Result<Changeset> {
    if cs1.new_len != cs2.old_len {
        return Err(ChangesetError::LengthMismatch {
            expected: cs1.new_len,
            actual: cs2.old_len,
        });
    }

    let mut bank1 = cs1.char_bank.chars();
    let mut bank2 = cs2.char_bank.chars();
    let mut char_bank = String::new();

    let ops = zip(&cs1.ops, &cs2.ops, |op1, op2| {
        let code1 = op1.as_ref().map(|op| op.opcode);
        let code2 = op2.as_ref().map(|op| op.opcode);

        // Text inserted by cs1 and removed again by cs2 never reaches the
        // result.
        if let (Some(OpCode::Insert), Some(OpCode::Remove)) = (code1, code2) {
            if let (Some(a), Some(b)) = (op1.as_ref(), op2.as_ref()) {
                let (skipped, _) = shorter(a, b);
                if skipped > 0 {
                    bank1.nth(skipped - 1);
                }
            }
        }

        let out = slice(op1, op2, pool)?;
        if let Some(op) = &out {
            if op.opcode == OpCode::Insert {
                let bank = if code2 == Some(OpCode::Insert) {
                    &mut bank2
                } else {
                    &mut bank1
                };
                char_bank.extend(bank.by_ref().take(op.chars));
            }
        }
        Ok(out)
    })?;

    Ok(Changeset {
        old_len: cs1.old_len,
        new_len: cs2.new_len,
        ops,
        char_bank,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Attribute;

    fn cs(s: &str) -> Changeset {
        s.parse().unwrap()
    }

    #[test]
    fn test_compose_inserts() {
        let mut pool = AttributePool::new();
        // "\n" -> "Hello\n" -> "Hello world\n"
        let a = cs("Z:1>5+5$Hello");
        let b = cs("Z:6>6=5+6$ world");
        let ab = compose(&a, &b, &mut pool).unwrap();

        assert_eq!(ab.to_string(), "Z:1>b+b$Hello world");
        assert!(ab.check_rep().is_ok());
    }

    #[test]
    fn test_insert_then_remove_cancels() {
        let mut pool = AttributePool::new();
        // "ab\n" -> "aXYb\n" -> "aYb\n"
        let a = cs("Z:3>2=1+2$XY");
        let b = cs("Z:5<1=1-1$");
        let ab = compose(&a, &b, &mut pool).unwrap();

        assert_eq!(ab.apply_to_text("ab\n").unwrap(), "aYb\n");
        assert_eq!(ab.char_bank, "Y");
        assert!(ab.check_rep().is_ok());
    }

    #[test]
    fn test_compose_matches_sequential_apply() {
        let mut pool = AttributePool::new();
        let text = "one\ntwo\nthree\n";
        let a = Changeset::make_splice(text, 4, 3, "2\n2", &[]).unwrap();
        let mid = a.apply_to_text(text).unwrap();
        let b = Changeset::make_splice(&mid, 0, 5, "", &[]).unwrap();
        let end = b.apply_to_text(&mid).unwrap();

        let ab = compose(&a, &b, &mut pool).unwrap();
        assert_eq!(ab.apply_to_text(text).unwrap(), end);
        assert!(ab.check_rep().is_ok());
    }

    #[test]
    fn test_compose_keeps_unset_marker() {
        let mut pool = AttributePool::new();
        let bold = pool.intern(Attribute::new("bold", "true"));
        let unbold = pool.intern(Attribute::new("bold", ""));

        let a = cs(&format!("Z:4>0*{}=3$", bold));
        let b = cs(&format!("Z:4>0*{}=3$", unbold));
        let ab = compose(&a, &b, &mut pool).unwrap();

        assert_eq!(ab.ops[0].attribs, vec![unbold]);
    }

    #[test]
    fn test_length_mismatch() {
        let mut pool = AttributePool::new();
        let err = compose(&cs("Z:1>1+1$a"), &cs("Z:5>0$"), &mut pool).unwrap_err();
        assert_eq!(
            err,
            ChangesetError::LengthMismatch {
                expected: 2,
                actual: 5
            }
        );
    }
}
