//! Negative cache shared between recursion workers. Remembers
//! (separator-vertices, component) pairs that already failed so repeated
//! descents into the same dead subproblem are pruned. Purely a hint: a
//! miss costs time, never correctness, so concurrent lost updates are
//! acceptable.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use fnv::{FnvHashMap, FnvHashSet, FnvHasher};

use crate::graph::{Graph, Vertex};

/// Failed component hashes, keyed by the hash of the separator vertex set.
/// The two-level map disambiguates the component within the separator's
/// entry, keeping accidental cross-separator collisions out of the lookup.
#[derive(Clone, Default)]
pub struct Cache {
    inner: Arc<RwLock<FnvHashMap<u64, FnvHashSet<u64>>>>,
}

fn sep_key(sep_verts: &[Vertex]) -> u64 {
    let mut hasher = FnvHasher::default();
    sep_verts.hash(&mut hasher);
    hasher.finish()
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    /// Number of separators with at least one recorded failure.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all recorded failures. Called when the width parameter
    /// changes, since old verdicts no longer apply.
    pub fn reset(&self) {
        self.inner.write().unwrap().clear();
    }

    /// Hand `other` a reference to the same underlying map, so negative
    /// facts learned by one solver prune the other.
    pub fn copy_ref(&self, other: &mut Cache) {
        other.inner = Arc::clone(&self.inner);
    }

    /// Record that decomposing `comp` under a separator with vertex set
    /// `sep_verts` failed.
    pub fn add_negative(&self, sep_verts: &[Vertex], comp: &Graph) {
        self.inner
            .write()
            .unwrap()
            .entry(sep_key(sep_verts))
            .or_default()
            .insert(comp.hash());
    }

    /// True iff any of `comps` is recorded as failed under `sep_verts`.
    pub fn check_negative(&self, sep_verts: &[Vertex], comps: &[Graph]) -> bool {
        let map = self.inner.read().unwrap();
        match map.get(&sep_key(sep_verts)) {
            Some(failed) => comps.iter().any(|c| failed.contains(&c.hash())),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{path, triangle};

    #[test]
    fn test_add_then_check() {
        let cache = Cache::new();
        let comp = triangle();
        let sep = vec![1, 2];
        assert!(!cache.check_negative(&sep, &[comp.clone()]));
        cache.add_negative(&sep, &comp);
        assert!(cache.check_negative(&sep, &[comp.clone()]));
        // a different separator does not see the failure
        assert!(!cache.check_negative(&[1, 3], &[comp]));
    }

    #[test]
    fn test_list_form_any_match() {
        let cache = Cache::new();
        let a = triangle();
        let b = path(2);
        cache.add_negative(&[4], &b);
        assert!(cache.check_negative(&[4], &[a, b]));
    }

    #[test]
    fn test_monotone_within_run() {
        let cache = Cache::new();
        let comp = path(3);
        cache.add_negative(&[2], &comp);
        for _ in 0..3 {
            assert!(cache.check_negative(&[2], &[comp.clone()]));
        }
        cache.add_negative(&[2], &triangle());
        assert!(cache.check_negative(&[2], &[comp]));
    }

    #[test]
    fn test_reset_clears() {
        let cache = Cache::new();
        let comp = path(2);
        cache.add_negative(&[1], &comp);
        cache.reset();
        assert!(!cache.check_negative(&[1], &[comp]));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_copy_ref_shares_map() {
        let cache = Cache::new();
        let mut other = Cache::new();
        cache.copy_ref(&mut other);
        let comp = path(2);
        other.add_negative(&[9], &comp);
        assert!(cache.check_negative(&[9], &[comp]));
    }
}
