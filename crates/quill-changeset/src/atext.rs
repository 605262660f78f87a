//! Attributed text: a document's text together with its attribution.

use crate::assembler::OpAssembler;
use crate::builder::Builder;
use crate::changeset::Changeset;
use crate::compose::slice;
use crate::error::{ChangesetError, Result};
use crate::iter::zip;
use crate::op::{Op, OpCode};
use crate::pool::AttributePool;
use serde::{Deserialize, Serialize};

/// Document text plus an attribution: a run of insert ops that covers the
/// text exactly and records which attributes each char carries.
///
/// The text always ends with `"\n"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AText {
    pub text: String,
    #[serde(with = "crate::codec::attribution_serde")]
    pub attribs: Vec<Op>,
}

impl AText {
    /// Plain text with no attributes, given a trailing newline if it lacks one.
    pub fn new(text: &str) -> Self {
        let mut text = text.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        let mut assem = OpAssembler::new();
        assem.append_op_with_text(OpCode::Insert, &text, &[]);

        Self {
            text,
            attribs: assem.finish(),
        }
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The changeset that turns an empty document into this text, inserting
    /// every char with its attributes. Applied to [`AText::default`] it
    /// yields `self`.
    pub fn to_changeset(&self) -> Result<Changeset> {
        self.check()?;
        let total = self.len();
        let mut builder = Builder::new(1);
        let mut chars = self.text.chars();
        let mut pos = 0;

        for op in &self.attribs {
            pos += op.chars;
            // The final newline is already part of the empty document.
            let at_end = pos == total;
            let body: String = chars.by_ref().take(op.chars - usize::from(at_end)).collect();
            if !body.is_empty() {
                builder.insert(&body, &op.attribs);
            }
            if at_end && !op.attribs.is_empty() {
                builder.keep(1, 1, &op.attribs);
            }
        }
        builder.build()
    }

    /// Check that the attribution covers the text and the text is terminated.
    pub fn check(&self) -> Result<()> {
        if !self.text.ends_with('\n') {
            return Err(ChangesetError::malformed("text lacks its final newline"));
        }
        let covered: usize = self.attribs.iter().map(|op| op.chars).sum();
        if covered != self.len() {
            return Err(ChangesetError::LengthMismatch {
                expected: self.len(),
                actual: covered,
            });
        }
        if self.attribs.iter().any(|op| op.opcode != OpCode::Insert) {
            return Err(ChangesetError::malformed("attribution contains non-insert ops"));
        }
        Ok(())
    }
}

impl Default for AText {
    fn default() -> Self {
        Self::new("\n")
    }
}

/// Apply `cs` to both the text and the attribution of `atext`.
///
/// Attribute changes on keeps are layered onto the existing attribution; an
/// empty value removes the key.
pub fn apply_to_atext(cs: &Changeset, atext: &AText, pool: &mut AttributePool) -> Result<AText> {
    let text = cs.apply_to_text(&atext.text)?;
    if !text.ends_with('\n') {
        return Err(ChangesetError::malformed("changeset removes the final newline"));
    }
    let attribs = zip(&atext.attribs, &cs.ops, |att, op| slice(att, op, pool))?;

    Ok(AText { text, attribs })
}

/// Value of `key` on `op`, if the op carries that attribute.
pub fn op_attribute_value<'p>(op: &Op, key: &str, pool: &'p AttributePool) -> Option<&'p str> {
    op.attribs
        .iter()
        .filter_map(|num| pool.get_attrib(*num))
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.as_str())
}
