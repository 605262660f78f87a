//! Corrective changesets run after every committed edit.
//!
//! Each repair returns `None` when the document is already in shape, so
//! running a repair over its own output yields nothing.

use quill_changeset::{op_attribute_value, AText, AttributePool, Builder, Changeset, Result};

/// Attribute marking a line-marker char (a list bullet).
pub const LIST_KEY: &str = "list";

/// Remove line-marker chars that no longer sit at the start of a line.
///
/// Concurrent edits can leave a bullet in the middle of a line, e.g. when
/// the newline in front of it is deleted. Newlines are never treated as
/// markers.
pub fn list_marker_repair(atext: &AText, pool: &AttributePool) -> Result<Option<Changeset>> {
    let chars: Vec<char> = atext.text.chars().collect();
    let mut bad = Vec::new();
    let mut offset = 0;

    for op in &atext.attribs {
        let is_marker = op_attribute_value(op, LIST_KEY, pool).map_or(false, |v| !v.is_empty());
        if is_marker {
            for pos in offset..offset + op.chars {
                let misplaced = pos > 0
                    && chars.get(pos - 1).map_or(false, |c| *c != '\n')
                    && chars.get(pos).map_or(false, |c| *c != '\n');
                if misplaced {
                    bad.push(pos);
                }
            }
        }
        offset += op.chars;
    }

    if bad.is_empty() {
        return Ok(None);
    }

    let mut builder = Builder::new(chars.len());
    let mut cursor = 0;
    for pos in bad {
        let kept: String = chars[cursor..pos].iter().collect();
        builder.keep_text(&kept, &[]);
        builder.remove(1, 0);
        cursor = pos + 1;
    }
    builder.build().map(Some)
}

/// Make sure the document ends with a blank line.
pub fn blank_line_repair(text: &str) -> Result<Option<Changeset>> {
    if text.ends_with("\n\n") {
        return Ok(None);
    }
    let len = text.chars().count();
    Changeset::make_splice(text, len.saturating_sub(1), 0, "\n", &[]).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_changeset::{apply_to_atext, Attribute};

    /// "ab\n" followed by a bullet "*" and "c\n", with the bullet optionally
    /// pulled into the previous line.
    fn bulleted(pool: &mut AttributePool, at_line_start: bool) -> AText {
        let list = pool.intern(Attribute::new(LIST_KEY, "bullet1"));
        let text = if at_line_start { "ab\n" } else { "ab" };

        let mut builder = Builder::new(1);
        builder.insert(text, &[]).insert("*", &[list]).insert("c", &[]);
        let cs = builder.build().unwrap();
        apply_to_atext(&cs, &AText::default(), pool).unwrap()
    }

    #[test]
    fn test_marker_at_line_start_is_kept() {
        let mut pool = AttributePool::new();
        let atext = bulleted(&mut pool, true);
        assert_eq!(atext.text, "ab\n*c\n");
        assert_eq!(list_marker_repair(&atext, &pool).unwrap(), None);
    }

    #[test]
    fn test_misplaced_marker_is_removed_once() {
        let mut pool = AttributePool::new();
        let atext = bulleted(&mut pool, false);
        assert_eq!(atext.text, "ab*c\n");

        let fix = list_marker_repair(&atext, &pool).unwrap().unwrap();
        assert!(fix.check_rep().is_ok());
        let fixed = apply_to_atext(&fix, &atext, &mut pool).unwrap();
        assert_eq!(fixed.text, "abc\n");

        assert_eq!(list_marker_repair(&fixed, &pool).unwrap(), None);
    }

    #[test]
    fn test_blank_line_repair_is_idempotent() {
        let fix = blank_line_repair("Hello\n").unwrap().unwrap();
        let fixed = fix.apply_to_text("Hello\n").unwrap();
        assert_eq!(fixed, "Hello\n\n");
        assert_eq!(blank_line_repair(&fixed).unwrap(), None);

        let fix = blank_line_repair("\n").unwrap().unwrap();
        assert_eq!(fix.apply_to_text("\n").unwrap(), "\n\n");
    }
}
