//! Attribute pool: a bijection between `(key, value)` pairs and small integers.
//!
//! Ops never carry attribute strings directly; they reference pool numbers.
//! Pools are append-only, so numbers stored in old revisions stay valid
//! after a reload.

use crate::assembler::OpAssembler;
use crate::atext::AText;
use crate::changeset::Changeset;
use crate::error::{ChangesetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pool-local number of an attribute.
pub type AttribNum = u32;

/// Key used to record authorship on inserted text.
pub const AUTHOR_KEY: &str = "author";

/// A `(key, value)` attribute pair. An empty value means "unset this key"
/// when used inside a changeset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Authorship attribute for the given author id.
    pub fn author(author_id: impl Into<String>) -> Self {
        Self::new(AUTHOR_KEY, author_id)
    }
}

impl From<(String, String)> for Attribute {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

impl From<Attribute> for (String, String) {
    fn from(attr: Attribute) -> Self {
        (attr.key, attr.value)
    }
}

/// Serialized shape of a pool (`{"numToAttrib": {...}, "nextNum": n}`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct PoolRepr {
    #[serde(rename = "numToAttrib")]
    num_to_attrib: BTreeMap<AttribNum, Attribute>,
    #[serde(rename = "nextNum")]
    next_num: AttribNum,
}

/// Interns attribute pairs for one document (or one wire message).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PoolRepr", into = "PoolRepr")]
pub struct AttributePool {
    num_to_attrib: BTreeMap<AttribNum, Attribute>,
    attrib_to_num: HashMap<Attribute, AttribNum>,
    next_num: AttribNum,
}

impl From<PoolRepr> for AttributePool {
    fn from(repr: PoolRepr) -> Self {
        let attrib_to_num = repr
            .num_to_attrib
            .iter()
            .map(|(num, attr)| (attr.clone(), *num))
            .collect();
        // Never hand out a number that is already taken, even if the
        // serialized counter lags behind.
        let next_num = repr
            .num_to_attrib
            .keys()
            .next_back()
            .map_or(repr.next_num, |max| repr.next_num.max(max + 1));

        AttributePool {
            num_to_attrib: repr.num_to_attrib,
            attrib_to_num,
            next_num,
        }
    }
}

impl From<AttributePool> for PoolRepr {
    fn from(pool: AttributePool) -> Self {
        PoolRepr {
            num_to_attrib: pool.num_to_attrib,
            next_num: pool.next_num,
        }
    }
}

impl AttributePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of `attr`, allocating the next free number unless
    /// `dont_create` is set (in which case unknown pairs yield `None`).
    pub fn put_attrib(&mut self, attr: Attribute, dont_create: bool) -> Option<AttribNum> {
        if dont_create {
            return self.find(&attr);
        }
        Some(self.intern(attr))
    }

    /// Intern `attr`, allocating a number if needed.
    pub fn intern(&mut self, attr: Attribute) -> AttribNum {
        if let Some(num) = self.attrib_to_num.get(&attr) {
            return *num;
        }
        let num = self.next_num;
        self.next_num += 1;
        self.attrib_to_num.insert(attr.clone(), num);
        self.num_to_attrib.insert(num, attr);
        num
    }

    /// Look up a pair without allocating.
    pub fn find(&self, attr: &Attribute) -> Option<AttribNum> {
        self.attrib_to_num.get(attr).copied()
    }

    pub fn get_attrib(&self, num: AttribNum) -> Option<&Attribute> {
        self.num_to_attrib.get(&num)
    }

    /// Like [`get_attrib`](Self::get_attrib) but an unknown number is an error.
    pub fn try_get(&self, num: AttribNum) -> Result<&Attribute> {
        self.get_attrib(num)
            .ok_or(ChangesetError::UnknownAttribute(num))
    }

    pub fn len(&self) -> usize {
        self.num_to_attrib.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_to_attrib.is_empty()
    }

    /// Iterate over all `(number, attribute)` entries in number order.
    pub fn iter(&self) -> impl Iterator<Item = (AttribNum, &Attribute)> {
        self.num_to_attrib.iter().map(|(num, attr)| (*num, attr))
    }

    /// All non-empty author ids ever interned.
    pub fn authors(&self) -> Vec<String> {
        self.num_to_attrib
            .values()
            .filter(|attr| attr.key == AUTHOR_KEY && !attr.value.is_empty())
            .map(|attr| attr.value.clone())
            .collect()
    }

    /// Rewrite the attribute numbers of `changeset`, which refer to `foreign`,
    /// into numbers of this pool, interning new pairs as needed.
    ///
    /// A foreign pool may list one pair under several numbers, so neighbours
    /// that differed before can become equal here. The result is
    /// reassembled to stay canonical.
    pub fn remap(&mut self, foreign: &AttributePool, changeset: &Changeset) -> Result<Changeset> {
        let mut assem = OpAssembler::new();
        for op in &changeset.ops {
            let mut attribs: Vec<AttribNum> = Vec::with_capacity(op.attribs.len());
            for num in &op.attribs {
                let local = self.intern(foreign.try_get(*num)?.clone());
                if !attribs.contains(&local) {
                    attribs.push(local);
                }
            }
            assem.append(op.clone().with_attribs(attribs));
        }

        let mut remapped = changeset.clone();
        remapped.ops = assem.finish();
        Ok(remapped)
    }

    /// Re-encode `changeset` against a fresh pool holding only the
    /// attributes it uses. This is the per-recipient wire form.
    pub fn prepare_for_wire(&self, changeset: &Changeset) -> Result<(Changeset, AttributePool)> {
        let mut wire_pool = AttributePool::new();
        let translated = wire_pool.remap(self, changeset)?;
        Ok((translated, wire_pool))
    }

    /// Wire form of a whole document: its attribution re-encoded against a
    /// fresh pool holding only the attributes the text carries.
    pub fn prepare_atext_for_wire(&self, atext: &AText) -> Result<(AText, AttributePool)> {
        let mut wire_pool = AttributePool::new();
        let mut wire = atext.clone();
        for op in &mut wire.attribs {
            for num in &mut op.attribs {
                *num = wire_pool.intern(self.try_get(*num)?.clone());
            }
        }
        Ok((wire, wire_pool))
    }
}
