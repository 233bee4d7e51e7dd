//! Predicates over separator candidates and the parallel search that
//! drives the enumerator streams through them.

use log::trace;
use rayon::prelude::*;

use crate::combin::CombinIterator;
use crate::graph::{inter, subset, Edges, Graph, Vertex};

/// Largest number of vertices a component may span for a separator to
/// count as balanced: `H.len() · (balFactor − 1) / balFactor`, where
/// `H.len()` is the distinct-vertex count of the subproblem.
pub(crate) fn balancedness_limit(h: &Graph, bal_factor: usize) -> usize {
    h.len() * (bal_factor - 1) / bal_factor
}

/// A pure decision over a candidate separator. Implementations must be
/// side-effect free; the search evaluates them concurrently on the same
/// graph.
pub trait SepPredicate: Sync {
    fn check(&self, h: &Graph, sep: &Edges, bal_factor: usize) -> bool;
}

/// Accepts a separator iff every component of `H \ sep` has vertex count
/// within the balancedness limit. Components retain their edges in full,
/// so separator vertices count towards a component's size. This is what
/// forces the recursion depth to be logarithmic in the size of the input.
pub struct BalancedCheck;

impl SepPredicate for BalancedCheck {
    fn check(&self, h: &Graph, sep: &Edges, bal_factor: usize) -> bool {
        let (comps, _) = h.components(sep);
        let limit = balancedness_limit(h, bal_factor);
        comps.iter().all(|c| c.len() <= limit)
    }
}

/// Accepts a separator that could act as the direct ancestor ("parent") of
/// a chosen child cover: exactly one oversized component may remain (the
/// one the recursion descends into), the inherited connection vertices
/// inside it must be covered by the separator, and the separator may only
/// touch it through the child's vertices.
pub struct ParentCheck {
    pub conn: Vec<Vertex>,
    pub child: Vec<Vertex>,
}

impl SepPredicate for ParentCheck {
    fn check(&self, h: &Graph, sep: &Edges, bal_factor: usize) -> bool {
        let (comps, _) = h.components(sep);
        let limit = balancedness_limit(h, bal_factor);

        let mut comp_low = None;
        for c in &comps {
            if c.len() > limit {
                comp_low = Some(c);
            }
        }
        let comp_low = match comp_low {
            Some(c) => c,
            None => return false,
        };

        let vert_low = comp_low.vertices();
        let child_bag = inter(&self.child, vert_low);

        if !subset(&inter(vert_low, &self.conn), sep.vertices()) {
            return false;
        }
        // the separator may reach into the low component only through the child
        if !subset(&inter(vert_low, sep.vertices()), &child_bag) {
            return false;
        }
        true
    }
}

/// Cover predicate for the linear-depth solver: the separator's vertices
/// must cover the inherited connection set, and removing it must strictly
/// shrink every remaining component, which is what bounds the recursion.
pub struct CoverCheck {
    pub conn: Vec<Vertex>,
}

impl SepPredicate for CoverCheck {
    fn check(&self, h: &Graph, sep: &Edges, _bal_factor: usize) -> bool {
        if sep.is_empty() || !subset(&self.conn, sep.vertices()) {
            return false;
        }
        let (comps, _) = h.components(sep);
        comps.iter().all(|c| c.len() < h.len())
    }
}

/// Parallel search over the enumerator streams. Each stream caches at most
/// one accepted pending candidate; `find_next` refills the empty slots in
/// parallel and surfaces the lowest-indexed pending, so each accepted
/// subset is returned exactly once across the whole search and the
/// multiset of results does not depend on the number of streams.
pub struct Search<'a> {
    h: &'a Graph,
    edges: &'a Edges,
    bal_factor: usize,
    generators: Vec<CombinIterator>,
    pending: Vec<Option<Vec<usize>>>,
    pub result: Vec<usize>,
    pub exhausted: bool,
}

impl<'a> Search<'a> {
    pub fn new(
        h: &'a Graph,
        edges: &'a Edges,
        bal_factor: usize,
        generators: Vec<CombinIterator>,
    ) -> Self {
        let pending = generators.iter().map(|_| None).collect();
        Search {
            h,
            edges,
            bal_factor,
            generators,
            pending,
            result: Vec::new(),
            exhausted: false,
        }
    }

    pub fn find_next(&mut self, pred: &dyn SepPredicate) {
        if self.exhausted {
            return;
        }
        let h = self.h;
        let edges = self.edges;
        let bal_factor = self.bal_factor;

        self.generators
            .par_iter_mut()
            .zip(self.pending.par_iter_mut())
            .for_each(|(gen, slot)| {
                if slot.is_some() {
                    return;
                }
                while gen.has_next() {
                    let candidate = gen.get_next().to_vec();
                    gen.confirm();
                    let sep = edges.get_subset(&candidate);
                    if pred.check(h, &sep, bal_factor) {
                        trace!("accepted separator {}", sep);
                        *slot = Some(candidate);
                        return;
                    }
                }
            });

        for slot in self.pending.iter_mut() {
            if let Some(candidate) = slot.take() {
                self.result = candidate;
                return;
            }
        }
        self.exhausted = true;
    }
}
