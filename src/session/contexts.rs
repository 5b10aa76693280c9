//! Team context catalog.
//!
//! Each team is given a flavor tag when teams are formed. Tags are drawn
//! without replacement; when more teams are requested than the catalog
//! holds, the drawn sample is cycled.

use rand::Rng;
use rand::seq::IndexedRandom;

/// Built-in catalog used when the configuration does not supply one.
pub const DEFAULT_CONTEXTS: [&str; 12] = [
    "Rural healthcare clinic",
    "Public library of the future",
    "Urban bike-sharing network",
    "Neighborhood food bank",
    "Secondary school science lab",
    "Small-town newspaper",
    "Community energy cooperative",
    "Museum for young visitors",
    "Regional airport",
    "Zero-waste grocery store",
    "Volunteer fire brigade",
    "Coworking space for makers",
];

/// Fixed catalog of team contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPool {
    contexts: Vec<String>,
}

impl ContextPool {
    /// Creates a pool from the given catalog.
    ///
    /// An empty catalog falls back to [`DEFAULT_CONTEXTS`].
    #[must_use]
    pub fn new(contexts: Vec<String>) -> Self {
        if contexts.is_empty() {
            return Self::default();
        }
        Self { contexts }
    }

    /// Returns the catalog entries.
    #[must_use]
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// Number of entries in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the catalog is empty. Never true for a constructed pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Draws `count` contexts.
    ///
    /// The first `min(count, len)` entries are distinct; further entries
    /// repeat that sample in order.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<String> {
        let distinct: Vec<&String> = self
            .contexts
            .choose_multiple(rng, count.min(self.contexts.len()))
            .collect();
        if distinct.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|i| distinct[i % distinct.len()].clone())
            .collect()
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self {
            contexts: DEFAULT_CONTEXTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn sample_within_catalog_is_distinct() {
        let pool = ContextPool::default();
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = pool.sample(5, &mut rng);
        assert_eq!(drawn.len(), 5);
        let unique: HashSet<_> = drawn.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(drawn.iter().all(|c| pool.contexts().contains(c)));
    }

    #[test]
    fn sample_beyond_catalog_cycles() {
        let pool = ContextPool::new(vec!["a".into(), "b".into()]);
        let mut rng = StdRng::seed_from_u64(1);
        let drawn = pool.sample(5, &mut rng);
        assert_eq!(drawn.len(), 5);
        assert_ne!(drawn[0], drawn[1]);
        assert_eq!(drawn[0], drawn[2]);
        assert_eq!(drawn[1], drawn[3]);
        assert_eq!(drawn[0], drawn[4]);
    }

    #[test]
    fn empty_catalog_falls_back_to_default() {
        let pool = ContextPool::new(Vec::new());
        assert_eq!(pool.len(), DEFAULT_CONTEXTS.len());
        assert!(!pool.is_empty());
    }

    #[test]
    fn sample_zero_is_empty() {
        let pool = ContextPool::default();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(pool.sample(0, &mut rng).is_empty());
    }
}
