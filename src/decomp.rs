//! Decomposition trees, the splice operation that reconnects a child
//! subtree into the upper decomposition, and an independent validity
//! check used by tests and the CLI.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::graph::{subset, DisjointSet, Edges, Graph, Vertex};

#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub bag: Vec<Vertex>,
    pub cover: Edges,
    pub children: Vec<Node>,
}

impl Node {
    fn find_interface_leaf(&mut self, name: usize) -> Option<&mut Node> {
        if self.children.is_empty() && self.cover.len() == 1 && self.cover.slice()[0].name == name
        {
            return Some(self);
        }
        for child in self.children.iter_mut() {
            if let Some(found) = child.find_interface_leaf(name) {
                return Some(found);
            }
        }
        None
    }

    fn fmt_indent(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}Bag: {:?}, Cover: {}",
            "",
            self.bag,
            self.cover,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.fmt_indent(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}

/// Splice `below` into `above`: the unique leaf whose cover is the minted
/// interface edge `connecting` is replaced by `below`. The interface edge
/// is identified by name, never by pointer or structural equality.
///
/// Absence of the leaf means the upper recursion lost track of a pending
/// child interface, which is a bug, not a search failure.
pub fn attach_subtrees(mut above: Node, below: Node, connecting: &Edges) -> Node {
    let name = connecting.slice()[0].name;
    match above.find_interface_leaf(name) {
        Some(leaf) => *leaf = below,
        None => panic!(
            "upper subtree {} has no leaf covering the interface {:?}",
            above,
            connecting.vertices()
        ),
    }
    above
}

/// A decomposition of `graph`. "No decomposition found" is expressed as
/// `Option::<Decomp>::None` by the solvers, never as a zeroed-out value.
#[derive(Clone, Debug, Serialize)]
pub struct Decomp {
    pub graph: Graph,
    pub root: Node,
}

impl fmt::Display for Decomp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl Decomp {
    /// Independent validity check: every edge of `original` is contained in
    /// some bag, every bag is covered by its ≤k cover edges, and for every
    /// vertex the nodes holding it form a connected subtree.
    pub fn check(&self, original: &Graph, k: usize) -> bool {
        let mut nodes: Vec<(&Node, Option<usize>)> = Vec::new();
        flatten(&self.root, None, &mut nodes);

        for (node, _) in &nodes {
            if node.cover.len() > k {
                warn!("node cover {} exceeds width {}", node.cover, k);
                return false;
            }
            if !subset(&node.bag, node.cover.vertices()) {
                warn!(
                    "bag {:?} not covered by its cover {}",
                    node.bag, node.cover
                );
                return false;
            }
        }

        for edge in original.edges.slice() {
            if !nodes.iter().any(|(n, _)| subset(&edge.vertices, &n.bag)) {
                warn!("edge {} is contained in no bag", edge);
                return false;
            }
        }

        for &v in original.vertices() {
            let mut dsu = DisjointSet::default();
            let slots: Vec<usize> = nodes.iter().map(|_| dsu.push()).collect();
            let mut occurrences = 0;
            for (id, (node, parent)) in nodes.iter().enumerate() {
                if !node.bag.contains(&v) {
                    continue;
                }
                occurrences += 1;
                if let Some(p) = parent {
                    if nodes[*p].0.bag.contains(&v) {
                        dsu.union(slots[id], slots[*p]);
                    }
                }
            }
            if occurrences == 0 {
                continue;
            }
            let mut root = None;
            for (id, (node, _)) in nodes.iter().enumerate() {
                if !node.bag.contains(&v) {
                    continue;
                }
                let r = dsu.find(slots[id]);
                match root {
                    None => root = Some(r),
                    Some(prev) if prev != r => {
                        warn!("vertex {} appears in disconnected bags", v);
                        return false;
                    }
                    _ => {}
                }
            }
        }

        true
    }
}

fn flatten<'a>(
    node: &'a Node,
    parent: Option<usize>,
    out: &mut Vec<(&'a Node, Option<usize>)>,
) {
    let id = out.len();
    out.push((node, parent));
    for child in &node.children {
        flatten(child, Some(id), out);
    }
}

/// Shared base-case test over the subproblem's edge count, special count
/// and remaining allowed-pool size.
pub(crate) fn base_case_check(k: usize, len_e: usize, len_sp: usize, len_ae: usize) -> bool {
    if len_e <= k && len_sp == 0 {
        return true;
    }
    if len_e == 0 && len_sp == 1 {
        return true;
    }
    if len_e == 0 && len_sp > 1 {
        return true;
    }
    if len_ae == 0 {
        return true;
    }
    false
}

/// Resolve a base case into a decomposition or a failure. The positive
/// cases take precedence: a subproblem small enough to sit in one node
/// succeeds even when the allowed pool has run dry.
pub(crate) fn base_case(h: &Graph, k: usize) -> Option<Decomp> {
    if h.edges.len() <= k && h.special.is_empty() {
        return Some(Decomp {
            graph: h.clone(),
            root: Node {
                bag: h.vertices().to_vec(),
                cover: h.edges.clone(),
                children: Vec::new(),
            },
        });
    }
    if h.edges.is_empty() && h.special.len() == 1 {
        let sp = h.special[0].clone();
        return Some(Decomp {
            graph: h.clone(),
            root: Node {
                bag: sp.vertices().to_vec(),
                cover: sp,
                children: Vec::new(),
            },
        });
    }
    // several disjoint pending interfaces, or no allowed edges left
    None
}
