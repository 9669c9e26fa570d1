//! Graph serialization and a bounded blank-node canonicalization.
//!
//! Full URDNA2015 (iterative hash refinement with tie-breaking over all
//! blank node permutations) is deferred; this implements the same
//! "hash each blank node by its grounded neighborhood, refine over a
//! few rounds, break remaining ties by sorted N-Quads" shape, bounded
//! to a fixed round count so it always terminates even on adversarial
//! inputs.

use crate::error::{RdfError, RdfResult};
use crate::graph::Graph;
use oxigraph::io::RdfFormat;
use oxigraph::model::{BlankNode, GraphName, Quad, Subject, Term};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const CANONICALIZATION_ROUNDS: usize = 4;

/// Serialize to N-Quads. Blank node labels are whatever oxigraph assigned
/// on parse/construct; two graphs built independently from equivalent
/// Turtle will not necessarily serialize identically unless first passed
/// through [`canonical_quads`].
pub fn to_nquads(graph: &Graph) -> RdfResult<String> {
    let mut out = Vec::new();
    graph
        .store()
        .dump_to_writer(RdfFormat::NQuads, &mut out)
        .map_err(|e| RdfError::GraphOp(e.to_string()))?;
    String::from_utf8(out).map_err(|e| RdfError::GraphOp(e.to_string()))
}

/// Quads with blank nodes relabeled to content-derived identifiers and
/// sorted, so that two isomorphic graphs produce identical output
/// regardless of the arbitrary labels their respective stores assigned.
pub fn canonical_quads(graph: &Graph) -> Vec<String> {
    let quads: Vec<Quad> = graph.iter_quads().collect();
    let labels = skolemize(&quads);
    let mut lines: Vec<String> = quads
        .iter()
        .map(|q| render_quad(q, &labels))
        .collect();
    lines.sort();
    lines
}

/// SHA-256 over [`canonical_quads`], joined with `\n`.
pub fn canonical_hash(graph: &Graph) -> [u8; 32] {
    let joined = canonical_quads(graph).join("\n");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.finalize().into()
}

/// Two graphs are isomorphic iff their canonical N-Quads serializations
/// are identical. Ground truth for blank-node-free graphs; for graphs
/// with blank nodes this is accurate as long as [`CANONICALIZATION_ROUNDS`]
/// is enough to separate every pair of non-isomorphic blank nodes, which
/// holds for the shallow hook/workflow graphs this engine processes.
pub fn is_isomorphic(a: &Graph, b: &Graph) -> bool {
    canonical_quads(a) == canonical_quads(b)
}

/// Deterministic replacement label per blank node, derived from its
/// grounded neighborhood (non-blank terms it touches) refined over
/// several rounds against its current neighbors' labels.
fn skolemize(quads: &[Quad]) -> HashMap<BlankNode, String> {
    let mut blank_nodes: Vec<BlankNode> = Vec::new();
    for q in quads {
        if let Subject::BlankNode(b) = &q.subject {
            if !blank_nodes.contains(b) {
                blank_nodes.push(b.clone());
            }
        }
        if let Term::BlankNode(b) = &q.object {
            if !blank_nodes.contains(b) {
                blank_nodes.push(b.clone());
            }
        }
    }

    let mut hashes: HashMap<BlankNode, String> = blank_nodes
        .iter()
        .map(|b| (b.clone(), initial_hash(b, quads)))
        .collect();

    for _ in 0..CANONICALIZATION_ROUNDS {
        let mut next = HashMap::new();
        for b in &blank_nodes {
            next.insert(b.clone(), refine_hash(b, quads, &hashes));
        }
        hashes = next;
    }

    let mut ordered: Vec<(&BlankNode, &String)> = hashes.iter().collect();
    ordered.sort_by(|a, b| a.1.cmp(b.1));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (b, _))| (b.clone(), format!("_:c14n{i}")))
        .collect()
}

fn initial_hash(b: &BlankNode, quads: &[Quad]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for q in quads {
        let touches_as_subject = matches!(&q.subject, Subject::BlankNode(x) if x == b);
        let touches_as_object = matches!(&q.object, Term::BlankNode(x) if x == b);
        if touches_as_subject {
            parts.push(format!("s:{}:{}", q.predicate, term_ground(&q.object)));
        }
        if touches_as_object {
            parts.push(format!("o:{}:{}", ground_subject(&q.subject), q.predicate));
        }
    }
    parts.sort();
    hash_str(&parts.join("|"))
}

fn refine_hash(b: &BlankNode, quads: &[Quad], current: &HashMap<BlankNode, String>) -> String {
    let mut parts: Vec<String> = Vec::new();
    for q in quads {
        let touches_as_subject = matches!(&q.subject, Subject::BlankNode(x) if x == b);
        let touches_as_object = matches!(&q.object, Term::BlankNode(x) if x == b);
        if touches_as_subject {
            let obj_part = match &q.object {
                Term::BlankNode(ob) => current.get(ob).cloned().unwrap_or_default(),
                other => term_ground(other),
            };
            parts.push(format!("s:{}:{}", q.predicate, obj_part));
        }
        if touches_as_object {
            let subj_part = match &q.subject {
                Subject::BlankNode(sb) => current.get(sb).cloned().unwrap_or_default(),
                other => ground_subject(other),
            };
            parts.push(format!("o:{}:{}", subj_part, q.predicate));
        }
    }
    parts.sort();
    hash_str(&parts.join("|"))
}

fn ground_subject(s: &Subject) -> String {
    match s {
        Subject::NamedNode(n) => n.to_string(),
        Subject::BlankNode(_) => "_".to_string(),
    }
}

fn term_ground(t: &Term) -> String {
    match t {
        Term::BlankNode(_) => "_".to_string(),
        other => other.to_string(),
    }
}

fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

fn render_quad(q: &Quad, labels: &HashMap<BlankNode, String>) -> String {
    let subject = match &q.subject {
        Subject::NamedNode(n) => format!("<{n}>"),
        Subject::BlankNode(b) => labels.get(b).cloned().unwrap_or_else(|| b.to_string()),
    };
    let object = match &q.object {
        Term::BlankNode(b) => labels.get(b).cloned().unwrap_or_else(|| b.to_string()),
        other => other.to_string(),
    };
    let graph = match &q.graph_name {
        GraphName::DefaultGraph => String::new(),
        GraphName::NamedNode(n) => format!(" <{n}>"),
        GraphName::BlankNode(b) => format!(" {}", labels.get(b).cloned().unwrap_or_else(|| b.to_string())),
    };
    format!("{subject} <{}> {object}{graph} .", q.predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_turtle;

    #[test]
    fn isomorphic_graphs_with_different_blank_labels_match() {
        let a = parse_turtle(
            "@prefix ex: <http://example.org/> .\n_:x ex:p ex:o .",
            "http://example.org/",
        )
        .unwrap();
        let b = parse_turtle(
            "@prefix ex: <http://example.org/> .\n_:y ex:p ex:o .",
            "http://example.org/",
        )
        .unwrap();
        assert!(is_isomorphic(&a, &b));
    }

    #[test]
    fn non_isomorphic_graphs_do_not_match() {
        let a = parse_turtle("@prefix ex: <http://example.org/> .\nex:a ex:p ex:1 .", "http://example.org/").unwrap();
        let b = parse_turtle("@prefix ex: <http://example.org/> .\nex:a ex:p ex:2 .", "http://example.org/").unwrap();
        assert!(!is_isomorphic(&a, &b));
    }

    #[test]
    fn round_trip_preserves_isomorphism_class() {
        let g = parse_turtle(
            "@prefix ex: <http://example.org/> .\nex:a ex:p \"v\" .",
            "http://example.org/",
        )
        .unwrap();
        let nquads = to_nquads(&g).unwrap();
        let roundtripped = Graph::empty("http://example.org/").unwrap();
        crate::parse::parse_nquads_into(&roundtripped, &nquads).unwrap();
        assert!(is_isomorphic(&g, &roundtripped));
    }
}
