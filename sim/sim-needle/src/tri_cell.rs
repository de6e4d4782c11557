//! Order-independent triangle keys.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of a triangular face by its three vertex indices.
///
/// Indices are stored sorted, so every permutation of the same three
/// indices compares and hashes identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriCell([usize; 3]);

impl TriCell {
    /// Key for the face `(a, b, c)` in any order.
    #[must_use]
    pub fn new(a: usize, b: usize, c: usize) -> Self {
        let mut v = [a, b, c];
        v.sort_unstable();
        Self(v)
    }

    /// Sorted vertex indices.
    #[must_use]
    pub const fn vertices(&self) -> [usize; 3] {
        self.0
    }
}

impl From<[usize; 3]> for TriCell {
    fn from(v: [usize; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl fmt::Display for TriCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tri({}, {}, {})", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use hashbrown::HashMap;
    use proptest::prelude::*;
    use std::hash::BuildHasher;

    #[test]
    fn test_display_sorted() {
        assert_eq!(TriCell::new(9, 2, 5).to_string(), "Tri(2, 5, 9)");
        assert_eq!(TriCell::from([9, 2, 5]).vertices(), [2, 5, 9]);
    }

    #[test]
    fn test_map_lookup_any_order() {
        let mut map = HashMap::new();
        map.insert(TriCell::new(1, 2, 3), "face");
        assert_eq!(map.get(&TriCell::new(3, 1, 2)), Some(&"face"));
        assert_eq!(map.get(&TriCell::new(2, 3, 1)), Some(&"face"));
        assert!(map.get(&TriCell::new(1, 2, 4)).is_none());
    }

    proptest! {
        #[test]
        fn prop_permutations_equal(a in 0usize..10_000, b in 0usize..10_000, c in 0usize..10_000) {
            let key = TriCell::new(a, b, c);
            let state = hashbrown::DefaultHashBuilder::default();
            for perm in [[a, b, c], [a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
                let other = TriCell::from(perm);
                prop_assert_eq!(key, other);
                prop_assert_eq!(state.hash_one(key), state.hash_one(other));
            }
        }

        #[test]
        fn prop_distinct_faces_differ(a in 0usize..100, b in 100usize..200, c in 200usize..300, d in 300usize..400) {
            prop_assert_ne!(TriCell::new(a, b, c), TriCell::new(a, b, d));
        }
    }
}
