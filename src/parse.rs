//! Textual hypergraph format:
//!
//! ```text
//! % lines after a percent sign are comments
//! e1(a, b, c),
//! e2(c, d).
//! ```
//!
//! Edge and vertex names are arbitrary identifiers; the parser maps both
//! to dense integer ids (starting at 1) and keeps the original spellings
//! around for display.

use fnv::FnvHashMap;
use thiserror::Error;

use crate::graph::{Edge, Edges, Graph};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("hypergraph is empty")]
    Empty,
    #[error("edge `{0}` is missing a closing parenthesis")]
    Unbalanced(String),
    #[error("found a vertex list with no edge name")]
    MissingName,
    #[error("edge `{0}` has an empty vertex list")]
    NoVertices(String),
    #[error("edge `{0}` is declared twice")]
    Duplicate(String),
}

#[derive(Debug)]
pub struct ParsedGraph {
    pub graph: Graph,
    /// Original edge spellings, indexed by `name - 1`.
    pub edge_names: Vec<String>,
    /// Original vertex spellings, indexed by `id - 1`.
    pub vertex_names: Vec<String>,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == '.'
}

pub fn parse_graph(input: &str) -> Result<ParsedGraph, ParseError> {
    let mut text = String::with_capacity(input.len());
    for line in input.lines() {
        match line.find('%') {
            Some(i) => text.push_str(&line[..i]),
            None => text.push_str(line),
        }
        text.push('\n');
    }

    let mut vertex_ids: FnvHashMap<String, usize> = FnvHashMap::default();
    let mut vertex_names: Vec<String> = Vec::new();
    let mut edge_names: Vec<String> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();

    let mut rest = text.trim_matches(is_separator);
    while !rest.is_empty() {
        let open = match rest.find('(') {
            Some(i) => i,
            None => return Err(ParseError::Unbalanced(rest.trim().to_string())),
        };
        let name = rest[..open].trim_matches(is_separator).to_string();
        if name.is_empty() {
            return Err(ParseError::MissingName);
        }
        if edge_names.contains(&name) {
            return Err(ParseError::Duplicate(name));
        }
        let close = match rest[open..].find(')') {
            Some(i) => open + i,
            None => return Err(ParseError::Unbalanced(name)),
        };

        let mut vertices = Vec::new();
        for token in rest[open + 1..close].split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let next_id = vertex_ids.len() + 1;
            let id = *vertex_ids.entry(token.to_string()).or_insert(next_id);
            if id == next_id {
                vertex_names.push(token.to_string());
            }
            vertices.push(id);
        }
        if vertices.is_empty() {
            return Err(ParseError::NoVertices(name));
        }

        edge_names.push(name);
        edges.push(Edge::new(edge_names.len(), vertices));
        rest = rest[close + 1..].trim_matches(is_separator);
    }

    if edges.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(ParsedGraph {
        graph: Graph::new(Edges::new(edges), Vec::new()),
        edge_names,
        vertex_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_small_graph() {
        let input = "e1(a, b, c),\ne2(c, d).\n";
        let parsed = parse_graph(input).unwrap();
        assert_eq!(parsed.graph.edges.len(), 2);
        assert_eq!(parsed.graph.len(), 4);
        assert_eq!(parsed.edge_names, vec!["e1", "e2"]);
        assert_eq!(parsed.vertex_names, vec!["a", "b", "c", "d"]);
        // shared vertex `c` maps to the same id in both edges
        let e1 = &parsed.graph.edges.slice()[0];
        let e2 = &parsed.graph.edges.slice()[1];
        assert!(e1.vertices.contains(&3));
        assert!(e2.vertices.contains(&3));
    }

    #[test]
    fn test_parse_comments_and_whitespace() {
        let input = "% a triangle\n E1 (x,y) , E2(y ,z),\n% middle comment\nE3(z,x).";
        let parsed = parse_graph(input).unwrap();
        assert_eq!(parsed.graph.edges.len(), 3);
        assert_eq!(parsed.graph.len(), 3);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_graph("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_graph("% nothing\n").unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse_graph("e1(a").unwrap_err(),
            ParseError::Unbalanced("e1".to_string())
        );
        assert_eq!(parse_graph("(a, b)").unwrap_err(), ParseError::MissingName);
        assert_eq!(
            parse_graph("e1()").unwrap_err(),
            ParseError::NoVertices("e1".to_string())
        );
        assert_eq!(
            parse_graph("e1(a), e1(b)").unwrap_err(),
            ParseError::Duplicate("e1".to_string())
        );
    }

    #[test]
    fn test_parsed_graph_decomposes() {
        let input = "e1(a, b), e2(b, c), e3(c, d), e4(d, a).";
        let parsed = parse_graph(input).unwrap();
        let alg = crate::logk::LogKDecomp::new(parsed.graph.clone(), 2, 3);
        let decomp = alg.find_decomp().expect("4-cycle decomposes at width 2");
        assert!(decomp.check(&parsed.graph, 2));
    }
}
