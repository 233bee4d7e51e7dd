//! Parallel divide-and-conquer GHD solver with log-depth recursion.
//!
//! Each recursion frame searches for a balanced child cover, pairs it with
//! a parent cover when the child alone cannot serve as the subtree root,
//! and recurses concurrently into the resulting subproblems: one "upper"
//! problem holding the parent side and one problem per component below the
//! child. Failed subproblems are remembered in a shared negative cache.

use crossbeam_channel::unbounded;
use log::{debug, trace};

use crate::cache::Cache;
use crate::combin::split_combin;
use crate::decomp::{attach_subtrees, base_case, base_case_check, Decomp, Node};
use crate::graph::{
    filter_vertices, fresh_special, inter, subset, union, Edge, Edges, Graph, Vertex,
};
use crate::search::{balancedness_limit, BalancedCheck, ParentCheck, Search};

/// Tags a subtask result with the component it belongs to, so results can
/// be correlated no matter in which order the workers finish.
pub(crate) enum SubResult {
    Comp { index: usize, decomp: Option<Decomp> },
    Up(Option<Decomp>),
}

pub struct LogKDecomp {
    pub graph: Graph,
    k: usize,
    bal_factor: usize,
    cache: Cache,
}

impl LogKDecomp {
    pub fn new(graph: Graph, k: usize, bal_factor: usize) -> Self {
        assert!(k >= 1, "width must be positive");
        assert!(bal_factor >= 2, "balance factor must be at least 2");
        LogKDecomp {
            graph,
            k,
            bal_factor,
            cache: Cache::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "LogKDecomp"
    }

    /// Change the width parameter. The cache is cleared since old negative
    /// verdicts were relative to the previous width.
    pub fn set_width(&mut self, k: usize) {
        self.cache.reset();
        self.k = k;
    }

    pub fn find_decomp(&self) -> Option<Decomp> {
        self.find_decomp_rec(&self.graph, &[], &self.graph.edges)
    }

    pub fn find_decomp_graph(&mut self, graph: Graph) -> Option<Decomp> {
        self.graph = graph;
        self.find_decomp()
    }

    pub(crate) fn find_decomp_rec(
        &self,
        h: &Graph,
        conn: &[Vertex],
        allowed_full: &Edges,
    ) -> Option<Decomp> {
        if !subset(conn, h.vertices()) {
            panic!(
                "connection vertices {:?} not contained in subgraph {}",
                conn, h
            );
        }

        if base_case_check(self.k, h.edges.len(), h.special.len(), allowed_full.len()) {
            return base_case(h, self.k);
        }

        let vertices_h = h.vertices();
        let allowed = filter_vertices(allowed_full, vertices_h);

        let gen_child = split_combin(allowed.len(), self.k, rayon::current_num_threads());
        let mut child_search = Search::new(h, &allowed, self.bal_factor, gen_child);
        let pred = BalancedCheck;
        child_search.find_next(&pred);

        // together with the parent loop below this covers every
        // parent/child pairing of separators over H
        while !child_search.exhausted {
            let child_cov = allowed.get_subset(&child_search.result);
            child_search.find_next(&pred);
            let (comps_c, _) = h.components(&child_cov);
            trace!("balanced child {} of {}", child_cov, h);

            // child may serve as the root of this subtree
            if subset(conn, child_cov.vertices()) {
                let child_vert = inter(child_cov.vertices(), vertices_h);

                if self.cache.check_negative(&child_vert, &comps_c) {
                    trace!("skipping cached child sep {}", child_cov);
                    continue;
                }

                if let Some(root) = self.decompose_below(&child_vert, &child_cov, &comps_c, allowed_full)
                {
                    return Some(Decomp {
                        graph: h.clone(),
                        root,
                    });
                }
                continue;
            }

            // otherwise pair the child with a parent cover
            let allowed_parent =
                filter_vertices(&allowed, &union(conn, child_cov.vertices()));
            let gen_parent =
                split_combin(allowed_parent.len(), self.k, rayon::current_num_threads());
            let mut parent_search = Search::new(h, &allowed_parent, self.bal_factor, gen_parent);
            let pred_par = ParentCheck {
                conn: conn.to_vec(),
                child: child_cov.vertices().to_vec(),
            };
            parent_search.find_next(&pred_par);

            while !parent_search.exhausted {
                let par_cov = allowed_parent.get_subset(&parent_search.result);
                parent_search.find_next(&pred_par);

                if let Some(decomp) = self.pair_with_parent(
                    h,
                    conn,
                    allowed_full,
                    &allowed,
                    &child_cov,
                    &par_cov,
                ) {
                    return Some(decomp);
                }
            }
        }

        // exhausted the search space
        None
    }

    /// Child-root branch: decompose every component below the chosen cover
    /// sequentially, recording failures in the cache.
    fn decompose_below(
        &self,
        child_vert: &[Vertex],
        child_cov: &Edges,
        comps: &[Graph],
        allowed_full: &Edges,
    ) -> Option<Node> {
        let mut subtrees = Vec::with_capacity(comps.len());
        for comp in comps {
            let conn_y = inter(comp.vertices(), child_vert);
            match self.find_decomp_rec(comp, &conn_y, allowed_full) {
                Some(decomp) => subtrees.push(decomp.root),
                None => {
                    debug!("rejecting child-root {}", child_cov);
                    self.cache.add_negative(child_vert, comp);
                    return None;
                }
            }
        }
        Some(Node {
            bag: child_vert.to_vec(),
            cover: child_cov.clone(),
            children: subtrees,
        })
    }

    /// Parent branch for one accepted (child, parent) pairing. Builds the
    /// upper subproblem, fans out the recursive calls, joins, and stitches
    /// the child subtree into the upper decomposition.
    fn pair_with_parent(
        &self,
        h: &Graph,
        conn: &[Vertex],
        allowed_full: &Edges,
        allowed: &Edges,
        child_cov: &Edges,
        par_cov: &Edges,
    ) -> Option<Decomp> {
        let vertices_h = h.vertices();
        let (comps_p, isolated) = h.components(par_cov);

        let limit = balancedness_limit(h, self.bal_factor);
        let mut low_index = None;
        for (i, comp) in comps_p.iter().enumerate() {
            if comp.len() > limit {
                low_index = Some(i);
            }
        }
        let low_index = match low_index {
            Some(i) => i,
            None => panic!(
                "parent search accepted {} without a low component; H {}, conn {:?}, allowed {}",
                par_cov, h, conn, allowed
            ),
        };
        let comp_low = &comps_p[low_index];
        let vert_low = comp_low.vertices();

        // restrict the child to the low component
        let child_vert = inter(child_cov.vertices(), vert_low);
        let (comps_c, _) = comp_low.components(child_cov);

        if self.cache.check_negative(&child_vert, &comps_c) {
            trace!("skipping cached child sep {}", child_cov);
            return None;
        }

        debug!(
            "parent {} chosen for child {} of {}",
            par_cov, child_cov, h
        );

        // upper subproblem: the parent cover itself, the isolated edges,
        // and everything outside the low component
        let mut up_edges: Vec<Edge> = par_cov.slice().to_vec();
        up_edges.extend(isolated.iter().cloned());
        let mut up_special: Vec<Edges> = Vec::new();
        for (i, comp) in comps_p.iter().enumerate() {
            if i != low_index {
                up_edges.extend(comp.edges.slice().iter().cloned());
                up_special.extend(comp.special.iter().cloned());
            }
        }
        let special_child = fresh_special(child_vert.clone());
        up_special.push(special_child.clone());

        // with a single parent component the upper decomposition is just
        // the parent node over the pending interface; no recursion needed
        let prebuilt_up = if comps_p.len() == 1 {
            let comp_up = Graph::new(par_cov.clone(), vec![special_child.clone()]);
            Some(Decomp {
                root: Node {
                    bag: inter(par_cov.vertices(), vertices_h),
                    cover: par_cov.clone(),
                    children: vec![Node {
                        bag: special_child.vertices().to_vec(),
                        cover: special_child.clone(),
                        children: Vec::new(),
                    }],
                },
                graph: comp_up,
            })
        } else {
            None
        };
        let comp_up = if prebuilt_up.is_none() {
            Some(Graph::new(Edges::new(up_edges), up_special))
        } else {
            None
        };
        let allowed_reduced = allowed_full.diff(&comp_low.edges);

        // fan out: one task for the upper subproblem, one per component
        let (tx, rx) = unbounded();
        rayon::scope(|scope| {
            if let Some(up) = comp_up.as_ref() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _ = tx.send(SubResult::Up(
                        self.find_decomp_rec(up, conn, &allowed_reduced),
                    ));
                });
            }
            for (index, comp) in comps_c.iter().enumerate() {
                let tx = tx.clone();
                let conn_x = inter(comp.vertices(), &child_vert);
                scope.spawn(move |_| {
                    let _ = tx.send(SubResult::Comp {
                        index,
                        decomp: self.find_decomp_rec(comp, &conn_x, allowed_full),
                    });
                });
            }
        });
        drop(tx);

        // join: correlate results by index; losers of an abandoned pairing
        // are left to finish and their results discarded
        let mut decomp_up = prebuilt_up;
        let mut comp_roots: Vec<(usize, Node)> = Vec::with_capacity(comps_c.len());
        let mut rejected = false;
        for msg in rx {
            match msg {
                SubResult::Comp { index, decomp } => match decomp {
                    Some(d) => comp_roots.push((index, d.root)),
                    None => {
                        self.cache.add_negative(&child_vert, &comps_c[index]);
                        debug!("rejecting child {} below parent {}", child_cov, par_cov);
                        rejected = true;
                    }
                },
                SubResult::Up(result) => match result {
                    // a failed upper problem indicts the parent cover, not
                    // the child separator; it never poisons the cache
                    Some(d) => decomp_up = Some(d),
                    None => {
                        debug!("rejecting upper subproblem of parent {}", par_cov);
                        rejected = true;
                    }
                },
            }
        }
        if rejected {
            return None;
        }

        let decomp_up = match decomp_up {
            Some(d) => d,
            None => panic!("upper subproblem of {} produced no result", par_cov),
        };
        if !subset(conn, &decomp_up.root.bag) {
            panic!(
                "upper decomposition does not cover the connection vertices: conn {:?}, root bag {:?}, H {}, parent {}",
                conn, decomp_up.root.bag, h, par_cov
            );
        }

        comp_roots.sort_by_key(|(index, _)| *index);
        let root_child = Node {
            bag: child_vert,
            cover: child_cov.clone(),
            children: comp_roots.into_iter().map(|(_, node)| node).collect(),
        };
        let final_root = attach_subtrees(decomp_up.root, root_child, &special_child);
        Some(Decomp {
            graph: h.clone(),
            root: final_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{path, triangle};
    use crate::graph::GraphSpec;

    lazy_static! {
        static ref SQUARE: Graph = Graph::new(
            Edges::new(vec![
                Edge::new(1, vec![1, 2]),
                Edge::new(2, vec![2, 3]),
                Edge::new(3, vec![3, 4]),
                Edge::new(4, vec![4, 1]),
            ]),
            Vec::new(),
        );
    }

    fn collect_cover_names(node: &Node, out: &mut Vec<usize>) {
        out.extend(node.cover.slice().iter().map(|e| e.name));
        for c in &node.children {
            collect_cover_names(c, out);
        }
    }

    #[test]
    fn test_single_edge_width_one() {
        let g = path(1);
        let alg = LogKDecomp::new(g.clone(), 1, 3);
        let decomp = alg.find_decomp().expect("single edge must decompose");
        assert_eq!(decomp.root.bag, vec![1, 2]);
        assert_eq!(decomp.root.cover.len(), 1);
        assert!(decomp.root.children.is_empty());
        assert!(decomp.check(&g, 1));
    }

    #[test]
    fn test_two_edge_path_width_one() {
        let g = path(2);
        let alg = LogKDecomp::new(g.clone(), 1, 3);
        let decomp = alg.find_decomp().expect("path must decompose at width 1");
        assert!(decomp.check(&g, 1));
        // two nodes, one per edge, sharing vertex 2
        assert_eq!(decomp.root.children.len(), 1);
        assert!(decomp.root.bag.contains(&2));
        assert!(decomp.root.children[0].bag.contains(&2));
    }

    #[test]
    fn test_triangle_width_two() {
        let g = triangle();
        let alg = LogKDecomp::new(g.clone(), 2, 3);
        let decomp = alg.find_decomp().expect("K3 must decompose at width 2");
        assert!(decomp.check(&g, 2));
        // all three edges fit under a single node
        assert!(decomp.root.children.is_empty());
        assert_eq!(decomp.root.bag, vec![1, 2, 3]);
    }

    #[test]
    fn test_square_width_two() {
        let g = SQUARE.clone();
        let alg = LogKDecomp::new(g.clone(), 2, 3);
        let decomp = alg.find_decomp().expect("4-cycle must decompose at width 2");
        assert!(decomp.check(&g, 2));
    }

    #[test]
    fn test_triangle_width_one_fails() {
        let g = triangle();
        let alg = LogKDecomp::new(g, 1, 3);
        assert!(alg.find_decomp().is_none());
    }

    #[test]
    fn test_parent_branch_with_upper_subproblem() {
        // a long path forced through the parent branch by connection
        // vertices at both ends; the stitched tree must cover them at the
        // root and contain no minted interface edge
        let g = path(7);
        let alg = LogKDecomp::new(g.clone(), 2, 3);
        let conn = vec![1, 8];
        let decomp = alg
            .find_decomp_rec(&g, &conn, &g.edges)
            .expect("7-path with end connections must decompose at width 2");
        assert!(subset(&conn, &decomp.root.bag));
        assert!(decomp.check(&g, 2));
        let mut names = Vec::new();
        collect_cover_names(&decomp.root, &mut names);
        assert!(
            names.iter().all(|&n| n <= 7),
            "interface edge leaked into the final tree: {:?}",
            names
        );
    }

    #[test]
    fn test_longer_paths() {
        for n in 3..9 {
            let g = path(n);
            let alg = LogKDecomp::new(g.clone(), 2, 3);
            let decomp = alg.find_decomp().expect("paths decompose at width 2");
            assert!(decomp.check(&g, 2));
        }
    }

    #[test]
    fn test_random_graphs_validate() {
        for seed in 0..6u8 {
            let spec = GraphSpec {
                edges: 8,
                vertices: 8,
                max_arity: 3,
                seed: [seed; 32],
            };
            let g = Graph::random(spec);
            for k in 2..4 {
                let alg = LogKDecomp::new(g.clone(), k, 3);
                if let Some(decomp) = alg.find_decomp() {
                    assert!(decomp.check(&g, k), "seed={} k={}", seed, k);
                    assert!(decomp.root.cover.len() <= k);
                }
            }
        }
    }

    #[test]
    fn test_verdict_stable_across_runs() {
        let spec = GraphSpec {
            edges: 7,
            vertices: 7,
            max_arity: 3,
            seed: [3u8; 32],
        };
        let g = Graph::random(spec);
        let alg = LogKDecomp::new(g, 2, 3);
        let first = alg.find_decomp().is_some();
        let second = alg.find_decomp().is_some();
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_width_resets_verdict() {
        let g = triangle();
        let mut alg = LogKDecomp::new(g.clone(), 1, 3);
        assert!(alg.find_decomp().is_none());
        alg.set_width(2);
        let decomp = alg.find_decomp().expect("K3 decomposes after widening");
        assert!(decomp.check(&g, 2));
    }

    #[test]
    #[should_panic]
    fn test_conn_outside_subgraph_panics() {
        let g = path(2);
        let alg = LogKDecomp::new(g.clone(), 1, 3);
        alg.find_decomp_rec(&g, &[99], &g.edges);
    }
}
