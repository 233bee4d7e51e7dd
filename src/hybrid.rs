//! Hybrid solver: the same recursion as the log-depth engine, but at every
//! entry a switching predicate decides whether the recursive subcalls of
//! the current frame run through the log-depth machinery again or fall
//! through to the linear-depth solver. The negative cache is shared
//! between both, so pruning facts learned on one side benefit the other.

use std::fmt;

use crossbeam_channel::unbounded;
use log::{debug, trace};

use crate::cache::Cache;
use crate::combin::split_combin;
use crate::decomp::{attach_subtrees, base_case, base_case_check, Decomp, Node};
use crate::detk::DetKDecomp;
use crate::graph::{
    filter_vertices, fresh_special, inter, subset, union, Edge, Edges, Graph, Vertex,
};
use crate::logk::SubResult;
use crate::search::{balancedness_limit, BalancedCheck, ParentCheck, Search};

/// Decides, per recursion entry, whether the current frame's subcalls are
/// routed to the linear-depth solver. Any `(H, k) → bool` shape fits via
/// the `Custom` variant.
pub enum SwitchPredicate {
    /// Never switch; behaves exactly like the pure log-depth engine.
    Never,
    /// Switch unconditionally: one round of log-depth splitting, then
    /// linear-depth for everything below.
    Always,
    /// Switch once the subgraph has fewer than the given number of edges.
    EdgeCount(usize),
    /// Switch once the summed arity over all edges falls below the bound.
    EdgeSum(usize),
    /// Switch once `(|E| · k) / avgArity` falls below the bound.
    Weighted(usize),
    Custom(Box<dyn Fn(&Graph, usize) -> bool + Send + Sync>),
}

fn edge_sum(h: &Graph) -> usize {
    h.edges.slice().iter().map(|e| e.vertices.len()).sum()
}

impl SwitchPredicate {
    pub fn check(&self, h: &Graph, k: usize) -> bool {
        match self {
            SwitchPredicate::Never => false,
            SwitchPredicate::Always => true,
            SwitchPredicate::EdgeCount(size) => h.edges.len() < *size,
            SwitchPredicate::EdgeSum(size) => edge_sum(h) < *size,
            SwitchPredicate::Weighted(size) => {
                let avg_arity = edge_sum(h) / h.edges.len();
                (h.edges.len() * k) / avg_arity < *size
            }
            SwitchPredicate::Custom(f) => f(h, k),
        }
    }

    /// Resolve a predicate by its configuration name.
    pub fn from_name(name: &str, size: usize) -> Option<SwitchPredicate> {
        match name {
            "never" => Some(SwitchPredicate::Never),
            "always" => Some(SwitchPredicate::Always),
            "edge-count" => Some(SwitchPredicate::EdgeCount(size)),
            "edge-sum" => Some(SwitchPredicate::EdgeSum(size)),
            "weighted" => Some(SwitchPredicate::Weighted(size)),
            _ => None,
        }
    }
}

impl fmt::Debug for SwitchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SwitchPredicate::Never => write!(f, "Never"),
            SwitchPredicate::Always => write!(f, "Always"),
            SwitchPredicate::EdgeCount(s) => write!(f, "EdgeCount({})", s),
            SwitchPredicate::EdgeSum(s) => write!(f, "EdgeSum({})", s),
            SwitchPredicate::Weighted(s) => write!(f, "Weighted({})", s),
            SwitchPredicate::Custom(_) => write!(f, "Custom"),
        }
    }
}

pub struct LogKHybrid {
    pub graph: Graph,
    k: usize,
    bal_factor: usize,
    cache: Cache,
    pub predicate: SwitchPredicate,
}

impl LogKHybrid {
    pub fn new(graph: Graph, k: usize, bal_factor: usize, predicate: SwitchPredicate) -> Self {
        assert!(k >= 1, "width must be positive");
        assert!(bal_factor >= 2, "balance factor must be at least 2");
        LogKHybrid {
            graph,
            k,
            bal_factor,
            cache: Cache::new(),
            predicate,
        }
    }

    pub fn name(&self) -> &'static str {
        "LogKHybrid"
    }

    pub fn set_width(&mut self, k: usize) {
        self.cache.reset();
        self.k = k;
    }

    pub fn find_decomp(&self) -> Option<Decomp> {
        self.find_decomp_rec(&self.graph, &[], &self.graph.edges, 0)
    }

    pub fn find_decomp_graph(&mut self, graph: Graph) -> Option<Decomp> {
        self.graph = graph;
        self.find_decomp()
    }

    /// Route one recursive subcall according to the frame's switch verdict.
    fn subcall(
        &self,
        use_det: bool,
        h: &Graph,
        conn: &[Vertex],
        allowed: &Edges,
        rec_depth: usize,
    ) -> Option<Decomp> {
        if use_det {
            self.detk_call(h, conn, allowed, rec_depth)
        } else {
            self.find_decomp_rec(h, conn, allowed, rec_depth)
        }
    }

    /// Instantiate the linear-depth solver over the current allowed pool,
    /// sharing our negative cache with it.
    fn detk_call(
        &self,
        h: &Graph,
        conn: &[Vertex],
        allowed: &Edges,
        rec_depth: usize,
    ) -> Option<Decomp> {
        let mut det = DetKDecomp::new(
            Graph::new(allowed.clone(), Vec::new()),
            self.k,
            self.bal_factor,
        );
        self.cache.copy_ref(&mut det.cache);
        det.find_decomp_from(h, conn, rec_depth)
    }

    fn find_decomp_rec(
        &self,
        h: &Graph,
        conn: &[Vertex],
        allowed_full: &Edges,
        rec_depth: usize,
    ) -> Option<Decomp> {
        let rec_depth = rec_depth + 1;

        if !subset(conn, h.vertices()) {
            panic!(
                "connection vertices {:?} not contained in subgraph {}",
                conn, h
            );
        }

        if base_case_check(self.k, h.edges.len(), h.special.len(), allowed_full.len()) {
            return base_case(h, self.k);
        }

        // the switch verdict holds for all subcalls of this frame and is
        // re-evaluated on every recursion entry
        let use_det = self.predicate.check(h, self.k);
        if use_det {
            trace!("depth {}: routing subcalls to the linear-depth solver", rec_depth);
        }

        let vertices_h = h.vertices();
        let allowed = filter_vertices(allowed_full, vertices_h);

        let gen_child = split_combin(allowed.len(), self.k, rayon::current_num_threads());
        let mut child_search = Search::new(h, &allowed, self.bal_factor, gen_child);
        let pred = BalancedCheck;
        child_search.find_next(&pred);

        while !child_search.exhausted {
            let child_cov = allowed.get_subset(&child_search.result);
            child_search.find_next(&pred);
            let (comps_c, _) = h.components(&child_cov);

            if subset(conn, child_cov.vertices()) {
                let child_vert = inter(child_cov.vertices(), vertices_h);

                if self.cache.check_negative(&child_vert, &comps_c) {
                    trace!("skipping cached child sep {}", child_cov);
                    continue;
                }

                let mut subtrees = Vec::with_capacity(comps_c.len());
                let mut failed = false;
                for comp in &comps_c {
                    let conn_y = inter(comp.vertices(), &child_vert);
                    match self.subcall(use_det, comp, &conn_y, allowed_full, rec_depth) {
                        Some(decomp) => subtrees.push(decomp.root),
                        None => {
                            debug!("rejecting child-root {}", child_cov);
                            self.cache.add_negative(&child_vert, comp);
                            failed = true;
                            break;
                        }
                    }
                }
                if failed {
                    continue;
                }

                let root = Node {
                    bag: child_vert,
                    cover: child_cov,
                    children: subtrees,
                };
                return Some(Decomp {
                    graph: h.clone(),
                    root,
                });
            }

            let allowed_parent = filter_vertices(&allowed, &union(conn, child_cov.vertices()));
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
                    use_det,
                    rec_depth,
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

        None
    }

    fn pair_with_parent(
        &self,
        use_det: bool,
        rec_depth: usize,
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

        let child_vert = inter(child_cov.vertices(), vert_low);
        let (comps_c, _) = comp_low.components(child_cov);

        if self.cache.check_negative(&child_vert, &comps_c) {
            trace!("skipping cached child sep {}", child_cov);
            return None;
        }

        debug!("parent {} chosen for child {} of {}", par_cov, child_cov, h);

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

        let (tx, rx) = unbounded();
        rayon::scope(|scope| {
            if let Some(up) = comp_up.as_ref() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _ = tx.send(SubResult::Up(self.subcall(
                        use_det,
                        up,
                        conn,
                        &allowed_reduced,
                        rec_depth,
                    )));
                });
            }
            for (index, comp) in comps_c.iter().enumerate() {
                let tx = tx.clone();
                let conn_x = inter(comp.vertices(), &child_vert);
                scope.spawn(move |_| {
                    let _ = tx.send(SubResult::Comp {
                        index,
                        decomp: self.subcall(use_det, comp, &conn_x, allowed_full, rec_depth),
                    });
                });
            }
        });
        drop(tx);

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
