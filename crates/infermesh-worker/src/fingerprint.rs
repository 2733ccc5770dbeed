use std::hash::{Hash, Hasher};

/// Cache key derived from a float input payload.
///
/// Floats are stored as raw bit patterns so the key has lawful `Eq` and
/// `Hash` (NaNs compare by representation, `0.0` and `-0.0` differ).
/// Equality covers the full vector; hashing samples only the first,
/// middle, and last elements plus the length. A hash collision therefore
/// costs a bucket probe, never a wrong answer: equal inputs always map
/// to the same cache entry, unequal inputs merely may share a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(Vec<u32>);

impl Fingerprint {
    pub fn of(values: &[f32]) -> Self {
        Self(values.iter().map(|v| v.to_bits()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        if let (Some(first), Some(last)) = (self.0.first(), self.0.last()) {
            state.write_u32(*first);
            state.write_u32(self.0[self.0.len() / 2]);
            state.write_u32(*last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(fp: &Fingerprint) -> u64 {
        let mut hasher = DefaultHasher::new();
        fp.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_inputs_equal_fingerprints() {
        let a = Fingerprint::of(&[0.1, 0.2, 0.3]);
        let b = Fingerprint::of(&[0.1, 0.2, 0.3]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_unequal_inputs_unequal_fingerprints() {
        let a = Fingerprint::of(&[0.1, 0.2, 0.3]);
        let b = Fingerprint::of(&[0.1, 0.2, 0.4]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_middle_difference_unequal_even_if_hash_collides() {
        // Only positions 0, mid, and last feed the hash. These two differ
        // at position 1 of 5 (not sampled), so the hashes collide by
        // construction; equality must still separate them.
        let a = Fingerprint::of(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = Fingerprint::of(&[1.0, 9.0, 3.0, 4.0, 5.0]);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_payload() {
        let a = Fingerprint::of(&[]);
        let b = Fingerprint::of(&[]);
        assert_eq!(a, b);
        assert!(a.is_empty());
        assert_ne!(a, Fingerprint::of(&[0.0]));
    }

    #[test]
    fn test_nan_payloads_are_stable_keys() {
        let a = Fingerprint::of(&[f32::NAN, 1.0]);
        let b = Fingerprint::of(&[f32::NAN, 1.0]);
        // Same NaN bit pattern, same key.
        assert_eq!(a, b);
    }

    #[test]
    fn test_length_feeds_the_hash() {
        let short = Fingerprint::of(&[1.0]);
        let long = Fingerprint::of(&[1.0, 1.0]);
        assert_ne!(short, long);
    }

    #[test]
    fn test_works_as_hashmap_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Fingerprint::of(&[1.0, 2.0]), "first");
        map.insert(Fingerprint::of(&[1.0, 2.5]), "second");
        assert_eq!(map[&Fingerprint::of(&[1.0, 2.0])], "first");
        assert_eq!(map[&Fingerprint::of(&[1.0, 2.5])], "second");
    }
}
