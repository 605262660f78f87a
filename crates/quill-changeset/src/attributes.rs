//! Attribute list arithmetic used by compose and transform.

use crate::error::Result;
use crate::pool::{AttribNum, Attribute, AttributePool};

/// Layer `att2` over `att1`.
///
/// With `result_is_mutation` (composing two changesets) an empty value is
/// kept, because it still means "unset" to whatever the result is applied
/// to. Otherwise (applying to an attribution) an empty value deletes the
/// key. The result is sorted by `(key, value)`.
pub fn compose_attributes(
    att1: &[AttribNum],
    att2: &[AttribNum],
    result_is_mutation: bool,
    pool: &mut AttributePool,
) -> Result<Vec<AttribNum>> {
    if att1.is_empty() && result_is_mutation {
        return Ok(att2.to_vec());
    }
    if att2.is_empty() {
        return Ok(att1.to_vec());
    }

    let mut attrs: Vec<Attribute> = att1
        .iter()
        .map(|num| pool.try_get(*num).cloned())
        .collect::<Result<_>>()?;

    for num in att2 {
        let incoming = pool.try_get(*num)?.clone();
        let keep = !incoming.value.is_empty() || result_is_mutation;
        match attrs.iter().position(|attr| attr.key == incoming.key) {
            Some(i) if keep => attrs[i] = incoming,
            Some(i) => {
                attrs.remove(i);
            }
            None if keep => attrs.push(incoming),
            None => {}
        }
    }

    attrs.sort();
    Ok(attrs.into_iter().map(|attr| pool.intern(attr)).collect())
}

/// Attributes of a keep in `a` after rebasing over a keep in `b` covering the
/// same chars. When `a` does not win, any key `b` also sets is dropped from
/// `a` so that `b`'s value survives in both application orders.
pub fn follow_attributes(
    a: &[AttribNum],
    b: &[AttribNum],
    a_wins: bool,
    pool: &AttributePool,
) -> Result<Vec<AttribNum>> {
    if a_wins || a.is_empty() || b.is_empty() {
        return Ok(a.to_vec());
    }

    let b_keys = b
        .iter()
        .map(|num| pool.try_get(*num).map(|attr| attr.key.as_str()))
        .collect::<Result<Vec<_>>>()?;

    let mut kept = Vec::with_capacity(a.len());
    for num in a {
        if !b_keys.contains(&pool.try_get(*num)?.key.as_str()) {
            kept.push(*num);
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(pairs: &[(&str, &str)]) -> (AttributePool, Vec<AttribNum>) {
        let mut pool = AttributePool::new();
        let nums = pairs
            .iter()
            .map(|(k, v)| pool.intern(Attribute::new(*k, *v)))
            .collect();
        (pool, nums)
    }

    #[test]
    fn test_compose_overrides_and_sorts() {
        let (mut pool, n) = pool_with(&[("italic", "true"), ("bold", "true"), ("italic", "false")]);
        let out = compose_attributes(&[n[0], n[1]], &[n[2]], false, &mut pool).unwrap();
        assert_eq!(out, vec![n[1], n[2]]);
    }

    #[test]
    fn test_empty_value_deletes_when_applying() {
        let (mut pool, n) = pool_with(&[("bold", "true"), ("bold", "")]);
        let applied = compose_attributes(&[n[0]], &[n[1]], false, &mut pool).unwrap();
        assert!(applied.is_empty());

        let composed = compose_attributes(&[n[0]], &[n[1]], true, &mut pool).unwrap();
        assert_eq!(composed, vec![n[1]]);
    }

    #[test]
    fn test_follow_drops_contested_keys() {
        let (pool, n) = pool_with(&[("bold", "true"), ("bold", ""), ("italic", "true")]);
        let out = follow_attributes(&[n[0], n[2]], &[n[1]], false, &pool).unwrap();
        assert_eq!(out, vec![n[2]]);

        let out = follow_attributes(&[n[0], n[2]], &[n[1]], true, &pool).unwrap();
        assert_eq!(out, vec![n[0], n[2]]);
    }

    #[test]
    fn test_unknown_number_is_an_error() {
        let (mut pool, n) = pool_with(&[("bold", "true")]);
        assert!(compose_attributes(&[n[0]], &[42], false, &mut pool).is_err());
    }
}
