//! Textual encoding of changesets and attributions.
//!
//! ```text
//! Z:<oldLen>(>|<)<|newLen - oldLen|><ops>$<charBank>
//! op := (*<attrib>)* (|<lines>)? (=|+|-) <chars>
//! ```
//!
//! All numbers are lowercase base 36. The encoding only exists at the
//! boundary (wire messages and storage); everything else works on the
//! decoded [`Changeset`].

use crate::changeset::Changeset;
use crate::error::{ChangesetError, Result};
use crate::iter::OpIter;
use crate::op::Op;
use std::fmt::{self, Write};
use std::str::FromStr;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Format `n` in base 36.
pub fn num_to_string(mut n: usize) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[n % 36]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Parse a base-36 number.
pub fn parse_num(s: &str) -> Result<usize> {
    usize::from_str_radix(s, 36)
        .map_err(|_| ChangesetError::malformed(format!("invalid number {:?}", s)))
}

fn write_op(out: &mut String, op: &Op) {
    for num in &op.attribs {
        out.push('*');
        out.push_str(&num_to_string(*num as usize));
    }
    if op.lines > 0 {
        out.push('|');
        out.push_str(&num_to_string(op.lines));
    }
    out.push(op.opcode.symbol());
    out.push_str(&num_to_string(op.chars));
}

/// Encode an op stream without header or char bank (the attribution form).
pub fn encode_ops(ops: &[Op]) -> String {
    let mut out = String::new();
    for op in ops {
        write_op(&mut out, op);
    }
    out
}

/// Decode an op stream produced by [`encode_ops`].
pub fn decode_ops(encoded: &str) -> Result<Vec<Op>> {
    OpIter::new(encoded).collect()
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, delta) = if self.new_len >= self.old_len {
            ('>', self.new_len - self.old_len)
        } else {
            ('<', self.old_len - self.new_len)
        };
        write!(
            f,
            "Z:{}{}{}",
            num_to_string(self.old_len),
            sign,
            num_to_string(delta)
        )?;
        f.write_str(&encode_ops(&self.ops))?;
        f.write_char('$')?;
        f.write_str(&self.char_bank)
    }
}

impl FromStr for Changeset {
    type Err = ChangesetError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix("Z:")
            .ok_or_else(|| ChangesetError::malformed("missing Z: header"))?;

        let sign_pos = body
            .find(|c: char| c == '>' || c == '<')
            .ok_or_else(|| ChangesetError::malformed("missing length delta"))?;
        let old_len = parse_num(&body[..sign_pos])?;
        let shrinks = body[sign_pos..].starts_with('<');

        let after_sign = &body[sign_pos + 1..];
        let delta_end = after_sign
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after_sign.len());
        let delta = parse_num(&after_sign[..delta_end])?;

        let new_len = if shrinks {
            old_len
                .checked_sub(delta)
                .ok_or_else(|| ChangesetError::malformed("negative new length"))?
        } else {
            old_len
                .checked_add(delta)
                .ok_or_else(|| ChangesetError::malformed("length overflow"))?
        };

        let rest = &after_sign[delta_end..];
        let bank_pos = rest
            .find('$')
            .ok_or_else(|| ChangesetError::malformed("missing char bank"))?;

        Ok(Changeset {
            old_len,
            new_len,
            ops: decode_ops(&rest[..bank_pos])?,
            char_bank: rest[bank_pos + 1..].to_string(),
        })
    }
}

impl TryFrom<String> for Changeset {
    type Error = ChangesetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Changeset> for String {
    fn from(cs: Changeset) -> Self {
        cs.to_string()
    }
}

/// Serde adapter storing an op stream as its encoded attribution string.
pub mod attribution_serde {
    use super::{decode_ops, encode_ops};
    use crate::op::Op;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ops: &[Op], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_ops(ops))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Op>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode_ops(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(num_to_string(0), "0");
        assert_eq!(num_to_string(35), "z");
        assert_eq!(num_to_string(36), "10");
        assert_eq!(parse_num("10").unwrap(), 36);
        assert_eq!(parse_num("zz").unwrap(), 36 * 36 - 1);
        assert!(parse_num("").is_err());
    }

    #[test]
    fn test_decode_header() {
        let cs: Changeset = "Z:5>3|1=2*0+3$abc".parse().unwrap();
        assert_eq!(cs.old_len, 5);
        assert_eq!(cs.new_len, 8);
        assert_eq!(
            cs.ops,
            vec![Op::keep(2, 1), Op::insert(3, 0).with_attribs(vec![0])]
        );
        assert_eq!(cs.char_bank, "abc");
    }

    #[test]
    fn test_shrinking_header() {
        let cs: Changeset = "Z:a<3-3$".parse().unwrap();
        assert_eq!(cs.old_len, 10);
        assert_eq!(cs.new_len, 7);
        assert_eq!(cs.to_string(), "Z:a<3-3$");
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let huge = num_to_string(usize::MAX);
        let res = format!("Z:{}>1$", huge).parse::<Changeset>();
        assert!(matches!(res, Err(ChangesetError::Malformed(_))));

        let res = format!("Z:1>{}$", huge).parse::<Changeset>();
        assert!(matches!(res, Err(ChangesetError::Malformed(_))));
    }

    #[test]
    fn test_char_bank_may_contain_dollar() {
        let cs: Changeset = "Z:1>2+2$$$".parse().unwrap();
        assert_eq!(cs.char_bank, "$$");
        assert_eq!(cs.to_string(), "Z:1>2+2$$$");
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in ["", "Z:", "Z:1", "X:1>0$", "Z:1>0+1", "Z:1<2$", "Z:1>1?1$a"] {
            assert!(bad.parse::<Changeset>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_attribution_roundtrip() {
        let ops = vec![Op::insert(5, 1).with_attribs(vec![1, 12]), Op::insert(2, 0)];
        let encoded = encode_ops(&ops);
        assert_eq!(encoded, "*1*c|1+5+2");
        assert_eq!(decode_ops(&encoded).unwrap(), ops);
    }
}
