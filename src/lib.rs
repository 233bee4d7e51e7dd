//! Parallel computation of generalized hypertree decompositions (GHDs) of
//! bounded width. The core is a log-depth divide-and-conquer engine
//! ([`LogKDecomp`]) that searches for balanced separators, pairs them into
//! parent/child covers and recurses concurrently into the induced
//! subproblems; a hybrid variant ([`LogKHybrid`]) falls through to a
//! linear-depth solver ([`DetKDecomp`]) once a switching predicate fires.

pub mod cache;
pub mod combin;
pub mod decomp;
pub mod detk;
pub mod graph;
pub mod hybrid;
pub mod logk;
pub mod parse;
pub mod search;

#[macro_use]
#[cfg(test)]
extern crate lazy_static;

pub use crate::cache::Cache;
pub use crate::decomp::{Decomp, Node};
pub use crate::detk::DetKDecomp;
pub use crate::graph::{Edge, Edges, Graph, GraphSpec, Vertex};
pub use crate::hybrid::{LogKHybrid, SwitchPredicate};
pub use crate::logk::LogKDecomp;
pub use crate::parse::{parse_graph, ParseError, ParsedGraph};
