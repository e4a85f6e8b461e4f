// Grow-only set of spent nullifiers
use std::collections::HashSet;

use crate::primitives::Nullifier;

#[derive(Debug, Clone, Default)]
pub struct NullifierSet {
    spent: HashSet<Nullifier>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    /// First nullifier of `nullifiers` that is already spent or repeated within the slice
    pub fn first_conflict<'a>(&self, nullifiers: &'a [Nullifier]) -> Option<&'a Nullifier> {
        let mut seen = HashSet::with_capacity(nullifiers.len());
        nullifiers
            .iter()
            .find(|nullifier| self.is_spent(nullifier) || !seen.insert(**nullifier))
    }

    /// Mark nullifiers spent. Callers check `first_conflict` beforehand.
    pub fn insert_all(&mut self, nullifiers: &[Nullifier]) {
        self.spent.extend(nullifiers.iter().copied());
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn test_conflicts() {
        let a = Nullifier(Fr::from(1u64));
        let b = Nullifier(Fr::from(2u64));
        let c = Nullifier(Fr::from(3u64));

        let mut set = NullifierSet::new();
        assert_eq!(set.first_conflict(&[a, b]), None);
        assert_eq!(set.first_conflict(&[a, a]), Some(&a));

        set.insert_all(&[a, b]);
        assert!(set.is_spent(&a));
        assert_eq!(set.first_conflict(&[c, b]), Some(&b));
        assert_eq!(set.len(), 2);
    }
}
