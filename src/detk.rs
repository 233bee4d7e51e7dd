//! Linear-depth GHD solver. The hybrid dispatcher falls through to this
//! algorithm once a subproblem is small enough that the log-depth
//! machinery no longer pays off. It honours the same contract as the
//! log-depth engine: identical base cases, the returned root covers the
//! inherited connection vertices, and negative verdicts go through the
//! (shared) cache.

use log::{debug, trace};

use crate::cache::Cache;
use crate::combin::split_combin;
use crate::decomp::{base_case, base_case_check, Decomp, Node};
use crate::graph::{filter_vertices, inter, subset, Edges, Graph, Vertex};
use crate::search::{CoverCheck, Search};

pub struct DetKDecomp {
    /// The pool of edges this instance may use as covers.
    pub graph: Graph,
    k: usize,
    bal_factor: usize,
    pub(crate) cache: Cache,
}

impl DetKDecomp {
    pub fn new(graph: Graph, k: usize, bal_factor: usize) -> Self {
        assert!(k >= 1, "width must be positive");
        assert!(bal_factor >= 2, "balance factor must be at least 2");
        DetKDecomp {
            graph,
            k,
            bal_factor,
            cache: Cache::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "DetKDecomp"
    }

    pub fn set_width(&mut self, k: usize) {
        self.cache.reset();
        self.k = k;
    }

    pub fn find_decomp(&self) -> Option<Decomp> {
        self.find_decomp_from(&self.graph, &[], 0)
    }

    /// Decompose `h` so that the root bag covers `conn`, drawing covers
    /// from this instance's edge pool. `rec_depth` only feeds diagnostics.
    pub fn find_decomp_from(
        &self,
        h: &Graph,
        conn: &[Vertex],
        rec_depth: usize,
    ) -> Option<Decomp> {
        if !subset(conn, h.vertices()) {
            panic!(
                "connection vertices {:?} not contained in subgraph {}",
                conn, h
            );
        }

        let allowed = filter_vertices(&self.graph.edges, h.vertices());
        if base_case_check(self.k, h.edges.len(), h.special.len(), allowed.len()) {
            return base_case(h, self.k);
        }
        trace!("depth {}: covering {:?} in {}", rec_depth, conn, h);

        let gens = split_combin(allowed.len(), self.k, rayon::current_num_threads());
        let mut search = Search::new(h, &allowed, self.bal_factor, gens);
        let pred = CoverCheck {
            conn: conn.to_vec(),
        };
        search.find_next(&pred);

        'sep: while !search.exhausted {
            let sep = allowed.get_subset(&search.result);
            search.find_next(&pred);

            let bag = inter(sep.vertices(), h.vertices());
            let (comps, _) = h.components(&sep);

            if self.cache.check_negative(&bag, &comps) {
                trace!("depth {}: skipping cached cover {}", rec_depth, sep);
                continue;
            }

            let mut subtrees = Vec::with_capacity(comps.len());
            for comp in &comps {
                let conn_c = inter(comp.vertices(), &bag);
                match self.find_decomp_from(comp, &conn_c, rec_depth + 1) {
                    Some(decomp) => subtrees.push(decomp.root),
                    None => {
                        debug!("depth {}: rejecting cover {}", rec_depth, sep);
                        self.cache.add_negative(&bag, comp);
                        continue 'sep;
                    }
                }
            }

            return Some(Decomp {
                graph: h.clone(),
                root: Node {
                    bag,
                    cover: sep,
                    children: subtrees,
                },
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{path, triangle};
    use crate::graph::GraphSpec;

    #[test]
    fn test_single_edge() {
        let g = path(1);
        let alg = DetKDecomp::new(g.clone(), 1, 3);
        let decomp = alg.find_decomp().expect("single edge must decompose");
        assert_eq!(decomp.root.bag, vec![1, 2]);
        assert!(decomp.check(&g, 1));
    }

    #[test]
    fn test_path_width_one() {
        for n in 2..7 {
            let g = path(n);
            let alg = DetKDecomp::new(g.clone(), 1, 3);
            let decomp = alg.find_decomp().expect("paths decompose at width 1");
            assert!(decomp.check(&g, 1));
        }
    }

    #[test]
    fn test_triangle_verdicts() {
        let g = triangle();
        assert!(DetKDecomp::new(g.clone(), 1, 3).find_decomp().is_none());
        let decomp = DetKDecomp::new(g.clone(), 2, 3)
            .find_decomp()
            .expect("K3 decomposes at width 2");
        assert!(decomp.check(&g, 2));
    }

    #[test]
    fn test_conn_covered_at_root() {
        let g = path(4);
        let alg = DetKDecomp::new(g.clone(), 2, 3);
        let conn = vec![2, 3];
        let decomp = alg
            .find_decomp_from(&g, &conn, 0)
            .expect("4-path with inner connection decomposes");
        assert!(subset(&conn, &decomp.root.bag));
        assert!(decomp.check(&g, 2));
    }

    #[test]
    fn test_random_graphs_validate() {
        for seed in 0..4u8 {
            let spec = GraphSpec {
                edges: 7,
                vertices: 7,
                max_arity: 3,
                seed: [seed.wrapping_mul(31); 32],
            };
            let g = Graph::random(spec);
            for k in 2..4 {
                let alg = DetKDecomp::new(g.clone(), k, 3);
                if let Some(decomp) = alg.find_decomp() {
                    assert!(decomp.check(&g, k), "seed={} k={}", seed, k);
                }
            }
        }
    }
}
