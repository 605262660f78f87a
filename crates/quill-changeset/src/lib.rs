//! # quill-changeset
//!
//! Changeset encoding and Operational Transformation algebra for Quill.
//!
//! This crate provides:
//! - [`AttributePool`]: interning of `(key, value)` attribute pairs as small integers
//! - [`Changeset`]: a structured edit (`keep` / `insert` / `remove` ops plus a char bank)
//! - The compact textual wire format (`Z:5>3|1=2*0+3$abc`) via [`codec`]
//! - [`Builder`] for constructing changesets incrementally
//! - The algebra: [`compose`], [`apply_to_atext`], [`transform`] and [`follow`]
//!
//! ## Example
//!
//! ```rust
//! use quill_changeset::{AText, AttributePool, Builder, follow, apply_to_atext};
//!
//! let mut pool = AttributePool::new();
//! let base = AText::new("\n");
//!
//! // Two clients edit the same base concurrently.
//! let mut a = Builder::new(1);
//! a.insert("Hello", &[]);
//! let a = a.build().unwrap();
//!
//! let mut b = Builder::new(1);
//! b.insert("Hi ", &[]);
//! let b = b.build().unwrap();
//!
//! // The server commits `a` first and rebases `b` on top of it.
//! let after_a = apply_to_atext(&a, &base, &mut pool).unwrap();
//! let b_prime = follow(&b, &a, &pool).unwrap();
//! let merged = apply_to_atext(&b_prime, &after_a, &mut pool).unwrap();
//! assert_eq!(merged.text, "Hi Hello\n");
//! ```

pub mod assembler;
pub mod atext;
pub mod attributes;
pub mod builder;
pub mod changeset;
pub mod codec;
pub mod compose;
pub mod error;
pub mod iter;
pub mod op;
pub mod pool;
pub mod transform;

pub use assembler::OpAssembler;
pub use atext::{apply_to_atext, op_attribute_value, AText};
pub use builder::Builder;
pub use changeset::Changeset;
pub use compose::compose;
pub use error::{ChangesetError, Result};
pub use iter::OpIter;
pub use op::{Op, OpCode};
pub use pool::{AttribNum, Attribute, AttributePool};
pub use transform::{follow, transform};
