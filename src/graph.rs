use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use fnv::{FnvHashMap, FnvHasher};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Vertex identifiers are dense integers assigned by the parser (or the
/// random generator). The solver treats them opaquely; all vertex lists it
/// manipulates are kept sorted and deduplicated so that set operations stay
/// linear merges.
pub type Vertex = usize;

/// `a ⊆ b` over sorted vertex lists.
pub fn subset(a: &[Vertex], b: &[Vertex]) -> bool {
    let mut it = b.iter();
    'outer: for &x in a {
        for &y in &mut it {
            if y == x {
                continue 'outer;
            }
            if y > x {
                return false;
            }
        }
        return false;
    }
    true
}

/// Sorted intersection of two sorted vertex lists.
pub fn inter(a: &[Vertex], b: &[Vertex]) -> Vec<Vertex> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(a[i]);
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Sorted union of two sorted vertex lists.
pub fn union(a: &[Vertex], b: &[Vertex]) -> Vec<Vertex> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out.sort_unstable();
    out.dedup();
    out
}

pub(crate) fn intersects(a: &[Vertex], b: &[Vertex]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            return true;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

pub(crate) fn contains_sorted(s: &[Vertex], v: Vertex) -> bool {
    s.binary_search(&v).is_ok()
}

static NEXT_SPECIAL: AtomicUsize = AtomicUsize::new(1);

/// Mint a virtual edge representing the interface of a pending child
/// subtree. Names count down from `usize::MAX`, so they never collide with
/// parser-assigned identifiers and the minted edge can later be located by
/// identity when the subtrees are stitched back together.
pub fn fresh_special(vertices: Vec<Vertex>) -> Edges {
    let name = usize::MAX - NEXT_SPECIAL.fetch_add(1, Ordering::Relaxed);
    Edges::new(vec![Edge::new(name, vertices)])
}

/// A hyperedge. The `name` is a stable identifier used for membership and
/// set-difference; equality and hashing go over the vertex set only, so two
/// edges with the same vertices compare equal regardless of name.
#[derive(Clone, Debug, Serialize)]
pub struct Edge {
    pub name: usize,
    pub vertices: Vec<Vertex>,
}

impl Edge {
    pub fn new(name: usize, mut vertices: Vec<Vertex>) -> Self {
        vertices.sort_unstable();
        vertices.dedup();
        Edge { name, vertices }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.vertices.hash(state);
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name > usize::MAX / 2 {
            write!(f, "S{}", usize::MAX - self.name)
        } else {
            write!(f, "E{}", self.name)
        }
    }
}

/// An ordered edge set. Kept sorted by name so membership is a binary
/// search; the sorted vertex union and its 64-bit FNV hash are computed at
/// construction and cached, since edge sets are immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct Edges {
    slice: Vec<Edge>,
    #[serde(skip)]
    vertices: Vec<Vertex>,
    #[serde(skip)]
    hash: u64,
}

impl Edges {
    pub fn new(mut slice: Vec<Edge>) -> Self {
        slice.sort_unstable_by_key(|e| e.name);
        let mut vertices: Vec<Vertex> = slice
            .iter()
            .flat_map(|e| e.vertices.iter().copied())
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        let mut hasher = FnvHasher::default();
        vertices.hash(&mut hasher);
        Edges {
            slice,
            hash: hasher.finish(),
            vertices,
        }
    }

    pub fn empty() -> Self {
        Edges::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slice.is_empty()
    }

    pub fn slice(&self) -> &[Edge] {
        &self.slice
    }

    /// Sorted union of all member vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Cached hash over the sorted vertex union.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn contains_name(&self, name: usize) -> bool {
        self.slice.binary_search_by_key(&name, |e| e.name).is_ok()
    }

    /// Set difference by edge name.
    pub fn diff(&self, other: &Edges) -> Edges {
        Edges::new(
            self.slice
                .iter()
                .filter(|e| !other.contains_name(e.name))
                .cloned()
                .collect(),
        )
    }

    /// Materialize the subset selected by an index vector produced by the
    /// combination enumerator.
    pub fn get_subset(&self, indices: &[usize]) -> Edges {
        Edges::new(indices.iter().map(|&i| self.slice[i].clone()).collect())
    }
}

impl fmt::Display for Edges {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, e) in self.slice.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "}}")
    }
}

/// Drop the edges whose vertices are disjoint from `vertices`.
pub fn filter_vertices(edges: &Edges, vertices: &[Vertex]) -> Edges {
    Edges::new(
        edges
            .slice()
            .iter()
            .filter(|e| intersects(&e.vertices, vertices))
            .cloned()
            .collect(),
    )
}

#[derive(Default)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub(crate) fn push(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        id
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Parameters for the seeded random hypergraph generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphSpec {
    pub edges: usize,
    pub vertices: usize,
    pub max_arity: usize,
    pub seed: [u8; 32],
}

/// A hypergraph, possibly carrying virtual "special" edges introduced
/// during recursion to stand in for a child subtree's interface. Special
/// edges carry vertices only and are never eligible as cover members.
#[derive(Clone, Debug, Serialize)]
pub struct Graph {
    pub edges: Edges,
    pub special: Vec<Edges>,
    #[serde(skip)]
    vertices: Vec<Vertex>,
}

impl Graph {
    pub fn new(edges: Edges, special: Vec<Edges>) -> Self {
        let mut vertices: Vec<Vertex> = edges.vertices().to_vec();
        for sp in &special {
            vertices.extend_from_slice(sp.vertices());
        }
        vertices.sort_unstable();
        vertices.dedup();
        Graph {
            edges,
            special,
            vertices,
        }
    }

    pub fn random(spec: GraphSpec) -> Graph {
        let mut rng = ChaCha20Rng::from_seed(spec.seed);
        Graph::new_from_rng(spec, &mut rng)
    }

    pub fn new_from_rng<R: Rng>(spec: GraphSpec, rng: &mut R) -> Graph {
        assert!(spec.vertices >= 1 && spec.max_arity >= 1);
        let mut edges = Vec::with_capacity(spec.edges);
        for name in 1..=spec.edges {
            let arity = rng.gen_range(1, spec.max_arity.min(spec.vertices) + 1);
            let vertices = rand::seq::index::sample(rng, spec.vertices, arity)
                .into_iter()
                .map(|v| v + 1)
                .collect();
            edges.push(Edge::new(name, vertices));
        }
        Graph::new(Edges::new(edges), Vec::new())
    }

    /// Sorted union of all vertices in edges ∪ special.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Number of distinct vertices in edges ∪ special. The balancedness
    /// limit is computed over this measure; the edge count of the
    /// subproblem is `self.edges.len()`.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity hash over edges and specials, used as the component key of
    /// the negative cache.
    pub fn hash(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        for e in self.edges.slice() {
            e.name.hash(&mut hasher);
            e.vertices.hash(&mut hasher);
        }
        for sp in &self.special {
            sp.vertices().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Connected components of `H \ sep`, plus the isolated edges (edges
    /// not in `sep` whose vertices are all covered by it).
    ///
    /// Components retain their edges in full, separator vertices included.
    /// Special edge sets are assigned to the component of their first
    /// uncovered vertex; a fully covered special forms its own edgeless
    /// singleton component, which keeps its leaf reachable for stitching.
    pub fn components(&self, sep: &Edges) -> (Vec<Graph>, Vec<Edge>) {
        let covered = sep.vertices();

        let mut slot: FnvHashMap<Vertex, usize> = FnvHashMap::default();
        let mut dsu = DisjointSet::default();
        {
            let connect = |dsu: &mut DisjointSet,
                               slot: &mut FnvHashMap<Vertex, usize>,
                               verts: &[Vertex]| {
                let mut prev: Option<usize> = None;
                for &v in verts {
                    if contains_sorted(covered, v) {
                        continue;
                    }
                    let s = match slot.get(&v) {
                        Some(&s) => s,
                        None => {
                            let s = dsu.push();
                            slot.insert(v, s);
                            s
                        }
                    };
                    if let Some(p) = prev {
                        dsu.union(p, s);
                    }
                    prev = Some(s);
                }
            };
            for e in self.edges.slice() {
                if sep.contains_name(e.name) {
                    continue;
                }
                connect(&mut dsu, &mut slot, &e.vertices);
            }
            for sp in &self.special {
                connect(&mut dsu, &mut slot, sp.vertices());
            }
        }

        let mut index_of: FnvHashMap<usize, usize> = FnvHashMap::default();
        let mut comp_edges: Vec<Vec<Edge>> = Vec::new();
        let mut comp_special: Vec<Vec<Edges>> = Vec::new();
        let mut isolated: Vec<Edge> = Vec::new();

        for e in self.edges.slice() {
            if sep.contains_name(e.name) {
                continue;
            }
            match e.vertices.iter().find(|&&v| !contains_sorted(covered, v)) {
                Some(&v) => {
                    let root = dsu.find(slot[&v]);
                    let next = comp_edges.len();
                    let idx = *index_of.entry(root).or_insert(next);
                    if idx == next {
                        comp_edges.push(Vec::new());
                        comp_special.push(Vec::new());
                    }
                    comp_edges[idx].push(e.clone());
                }
                None => isolated.push(e.clone()),
            }
        }

        let mut singletons: Vec<Graph> = Vec::new();
        for sp in &self.special {
            match sp.vertices().iter().find(|&&v| !contains_sorted(covered, v)) {
                Some(&v) => {
                    let root = dsu.find(slot[&v]);
                    let next = comp_edges.len();
                    let idx = *index_of.entry(root).or_insert(next);
                    if idx == next {
                        comp_edges.push(Vec::new());
                        comp_special.push(Vec::new());
                    }
                    comp_special[idx].push(sp.clone());
                }
                None => singletons.push(Graph::new(Edges::empty(), vec![sp.clone()])),
            }
        }

        let mut comps: Vec<Graph> = comp_edges
            .into_iter()
            .zip(comp_special)
            .map(|(es, sps)| Graph::new(Edges::new(es), sps))
            .collect();
        comps.extend(singletons);
        (comps, isolated)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.edges)?;
        for sp in &self.special {
            write!(f, " +{}", sp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn path(n: usize) -> Graph {
        let edges = (1..=n).map(|i| Edge::new(i, vec![i, i + 1])).collect();
        Graph::new(Edges::new(edges), Vec::new())
    }

    pub(crate) fn triangle() -> Graph {
        let edges = vec![
            Edge::new(1, vec![1, 2]),
            Edge::new(2, vec![2, 3]),
            Edge::new(3, vec![1, 3]),
        ];
        Graph::new(Edges::new(edges), Vec::new())
    }

    #[test]
    fn test_sorted_set_ops() {
        assert!(subset(&[2, 4], &[1, 2, 3, 4]));
        assert!(!subset(&[2, 5], &[1, 2, 3, 4]));
        assert!(subset(&[], &[1]));
        assert_eq!(inter(&[1, 2, 4], &[2, 3, 4]), vec![2, 4]);
        assert_eq!(union(&[1, 4], &[2, 4]), vec![1, 2, 4]);
        assert!(intersects(&[1, 5], &[5, 9]));
        assert!(!intersects(&[1, 5], &[2, 4]));
    }

    #[test]
    fn test_edges_cached_union() {
        let g = triangle();
        assert_eq!(g.edges.vertices(), &[1, 2, 3]);
        assert_eq!(g.len(), 3);
        assert_eq!(g.edges.len(), 3);
    }

    #[test]
    fn test_diff_by_name() {
        let g = path(4);
        let sub = g.edges.get_subset(&[1, 2]);
        let rest = g.edges.diff(&sub);
        assert_eq!(rest.len(), 2);
        assert!(rest.contains_name(1));
        assert!(rest.contains_name(4));
    }

    #[test]
    fn test_components_split_path() {
        // removing the middle edge of a 4-path leaves two components
        let g = path(4);
        let sep = g.edges.get_subset(&[1]); // E2 = {2, 3}
        let (comps, isolated) = g.components(&sep);
        assert!(isolated.is_empty());
        assert_eq!(comps.len(), 2);
        let mut sizes: Vec<usize> = comps.iter().map(|c| c.len()).collect();
        sizes.sort_unstable();
        // components keep their edges in full, so the separator vertices
        // count towards their size
        assert_eq!(sizes, vec![2, 3]);
        let small = comps.iter().find(|c| c.len() == 2).unwrap();
        assert_eq!(small.vertices(), &[1, 2]);
    }

    #[test]
    fn test_components_isolated_edge() {
        // K3 minus two edges covers all vertices; the third edge is isolated
        let g = triangle();
        let sep = g.edges.get_subset(&[0, 1]);
        let (comps, isolated) = g.components(&sep);
        assert!(comps.is_empty());
        assert_eq!(isolated.len(), 1);
        assert_eq!(isolated[0].name, 3);
    }

    #[test]
    fn test_components_covered_special_is_singleton() {
        let sp = fresh_special(vec![1, 2]);
        let g = Graph::new(path(2).edges, vec![sp.clone()]);
        let sep = g.edges.get_subset(&[0, 1]); // covers {1, 2, 3}
        let (comps, _) = g.components(&sep);
        assert_eq!(comps.len(), 1);
        assert!(comps[0].edges.is_empty());
        assert_eq!(comps[0].special.len(), 1);
        assert_eq!(comps[0].special[0].vertices(), sp.vertices());
    }

    #[test]
    fn test_filter_vertices() {
        let g = path(5);
        let filtered = filter_vertices(&g.edges, &[1, 2]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains_name(1));
        assert!(filtered.contains_name(2));
    }

    #[test]
    fn test_random_graph_deterministic_under_seed() {
        let spec = GraphSpec {
            edges: 12,
            vertices: 10,
            max_arity: 3,
            seed: [7u8; 32],
        };
        let a = Graph::random(spec);
        let b = Graph::random(spec);
        assert_eq!(a.edges.hash(), b.edges.hash());
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.edges.len(), 12);
    }

    #[test]
    fn test_fresh_special_names_unique() {
        let a = fresh_special(vec![1]);
        let b = fresh_special(vec![1]);
        assert_ne!(a.slice()[0].name, b.slice()[0].name);
        assert!(a.slice()[0].name > usize::MAX / 2);
    }
}
