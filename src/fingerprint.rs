//! Stable 64-bit hash of a sorted label set.
//!
//! FNV-1a over each label's name and value, sorted by name, each string
//! terminated by a sentinel byte so that `{"a": "bc"}` and `{"ab": "c"}`
//! never collide on the concatenation alone.

use crate::labels::Label;

/// FNV-1a 64-bit offset basis.
pub const OFFSET64: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64-bit prime.
const PRIME64: u64 = 0x0000_0100_0000_01B3;
/// Terminates every label name and value before hashing the next field.
const SEPARATOR: u8 = 0xFF;

/// A 64-bit identifier of a label-set.
///
/// Two label-sets produce the same fingerprint iff they are equal after
/// sorting by name; collisions across distinct label-sets are ignored by
/// design, as in the reference implementation.
pub type Fingerprint = u64;

fn fnv1a_step(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME64);
    }
    hash
}

/// Computes the fingerprint of a label set. `labels` need not be
/// pre-sorted; this function sorts a local copy by name.
///
/// An empty label-set yields [`OFFSET64`].
pub fn compute(labels: &[Label]) -> Fingerprint {
    let mut sorted: Vec<&Label> = labels.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hash = OFFSET64;
    for label in sorted {
        hash = fnv1a_step(hash, label.name.as_bytes());
        hash = fnv1a_step(hash, &[SEPARATOR]);
        hash = fnv1a_step(hash, label.value.as_bytes());
        hash = fnv1a_step(hash, &[SEPARATOR]);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_label_set_is_offset_basis() {
        assert_eq!(compute(&[]), OFFSET64);
        assert_eq!(OFFSET64, 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn deterministic_under_permutation() {
        let a = vec![
            Label::new("__name__", "up"),
            Label::new("job", "api"),
            Label::new("instance", "a:9090"),
        ];
        let b = vec![
            Label::new("instance", "a:9090"),
            Label::new("__name__", "up"),
            Label::new("job", "api"),
        ];
        assert_eq!(compute(&a), compute(&b));
    }

    #[test]
    fn distinct_label_sets_usually_differ() {
        let a = vec![Label::new("job", "api")];
        let b = vec![Label::new("job", "web")];
        assert_ne!(compute(&a), compute(&b));
    }

    #[test]
    fn name_value_boundary_does_not_collide_via_separator() {
        // Without a separator, "ab"="c" and "a"="bc" would hash identically.
        let a = vec![Label::new("ab", "c")];
        let b = vec![Label::new("a", "bc")];
        assert_ne!(compute(&a), compute(&b));
    }
}
