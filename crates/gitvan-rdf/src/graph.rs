//! The immutable Graph type: a multiset of RDF quads plus a base IRI.
//!
//! Backed by an in-memory `oxigraph::store::Store`. Once returned from
//! [`Graph::from_quads`] or a parse/query operation, a `Graph` is never
//! mutated in place; set operations always build a fresh store.

use crate::error::{RdfError, RdfResult};
use oxigraph::model::{GraphNameRef, NamedNode, Quad, QuadRef};
use oxigraph::store::Store;
use std::collections::HashSet;

/// Derived, cheap-to-compute attributes of a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub quads: usize,
    pub distinct_subjects: usize,
    pub distinct_predicates: usize,
    pub distinct_objects: usize,
}

/// An immutable multiset of RDF quads with a base IRI.
///
/// Treated as read-only once constructed: set operations (union,
/// difference, intersection) return new `Graph`s rather than mutating
/// `self`.
#[derive(Clone)]
pub struct Graph {
    store: Store,
    base_iri: String,
}

impl Graph {
    /// An empty graph with the given base IRI.
    pub fn empty(base_iri: impl Into<String>) -> RdfResult<Self> {
        Ok(Self {
            store: Store::new()?,
            base_iri: base_iri.into(),
        })
    }

    /// Build a graph from an explicit set of quads (used by CONSTRUCT
    /// results and set operations).
    pub fn from_quads(base_iri: impl Into<String>, quads: impl IntoIterator<Item = Quad>) -> RdfResult<Self> {
        let store = Store::new()?;
        for quad in quads {
            store.insert(&quad)?;
        }
        Ok(Self {
            store,
            base_iri: base_iri.into(),
        })
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn from_store(store: Store, base_iri: impl Into<String>) -> Self {
        Self {
            store,
            base_iri: base_iri.into(),
        }
    }

    pub fn base_iri(&self) -> &str {
        &self.base_iri
    }

    pub fn is_empty(&self) -> bool {
        self.store.len().unwrap_or(0) == 0
    }

    pub fn len(&self) -> usize {
        self.store.len().unwrap_or(0)
    }

    pub fn iter_quads(&self) -> impl Iterator<Item = Quad> + '_ {
        self.store.iter().filter_map(|q| q.ok())
    }

    pub fn stats(&self) -> GraphStats {
        let mut subjects = HashSet::new();
        let mut predicates = HashSet::new();
        let mut objects = HashSet::new();
        let mut quads = 0usize;
        for quad in self.iter_quads() {
            quads += 1;
            subjects.insert(quad.subject.to_string());
            predicates.insert(quad.predicate.to_string());
            objects.insert(quad.object.to_string());
        }
        GraphStats {
            quads,
            distinct_subjects: subjects.len(),
            distinct_predicates: predicates.len(),
            distinct_objects: objects.len(),
        }
    }

    /// Insert a single quad into a private, not-yet-published store.
    /// Only used while building a graph (e.g. during Turtle parsing);
    /// never exposed on a `Graph` once it has left [`crate::parse`].
    pub(crate) fn insert_building(&self, quad: QuadRef<'_>) -> RdfResult<()> {
        self.store.insert(quad)?;
        Ok(())
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &Graph) -> RdfResult<Graph> {
        let out = Graph::empty(self.base_iri.clone())?;
        for quad in self.iter_quads().chain(other.iter_quads()) {
            out.store.insert(&quad)?;
        }
        Ok(out)
    }

    /// `self \ other` (quads in `self` not present in `other`).
    pub fn difference(&self, other: &Graph) -> RdfResult<Graph> {
        let other_set: HashSet<String> = other.iter_quads().map(|q| q.to_string()).collect();
        let out = Graph::empty(self.base_iri.clone())?;
        for quad in self.iter_quads() {
            if !other_set.contains(&quad.to_string()) {
                out.store.insert(&quad)?;
            }
        }
        Ok(out)
    }

    /// `self ∩ other`.
    pub fn intersection(&self, other: &Graph) -> RdfResult<Graph> {
        let other_set: HashSet<String> = other.iter_quads().map(|q| q.to_string()).collect();
        let out = Graph::empty(self.base_iri.clone())?;
        for quad in self.iter_quads() {
            if other_set.contains(&quad.to_string()) {
                out.store.insert(&quad)?;
            }
        }
        Ok(out)
    }

    /// Default graph name helper for constructing quads from triples.
    pub fn default_graph_name() -> GraphNameRef<'static> {
        GraphNameRef::DefaultGraph
    }

    pub fn named(base_iri: impl Into<String>) -> RdfResult<NamedNode> {
        let base_iri = base_iri.into();
        NamedNode::new(base_iri).map_err(|e| RdfError::GraphOp(e.to_string()))
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("base_iri", &self.base_iri)
            .field("quads", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_turtle;

    #[test]
    fn stats_count_distinct_components() {
        let g = parse_turtle(
            "@prefix ex: <http://example.org/> .\nex:a ex:type ex:Issue .\nex:b ex:type ex:Issue .",
            "http://example.org/",
        )
        .unwrap();
        let stats = g.stats();
        assert_eq!(stats.quads, 2);
        assert_eq!(stats.distinct_subjects, 2);
        assert_eq!(stats.distinct_predicates, 1);
        assert_eq!(stats.distinct_objects, 1);
    }

    #[test]
    fn union_is_commutative_in_size() {
        let a = parse_turtle("@prefix ex: <http://example.org/> .\nex:a ex:p ex:1 .", "http://example.org/").unwrap();
        let b = parse_turtle("@prefix ex: <http://example.org/> .\nex:a ex:p ex:2 .", "http://example.org/").unwrap();
        let u1 = a.union(&b).unwrap();
        let u2 = b.union(&a).unwrap();
        assert_eq!(u1.len(), u2.len());
        assert_eq!(u1.len(), 2);
    }

    #[test]
    fn difference_removes_shared_quads() {
        let a = parse_turtle(
            "@prefix ex: <http://example.org/> .\nex:a ex:p ex:1 .\nex:a ex:p ex:2 .",
            "http://example.org/",
        )
        .unwrap();
        let b = parse_turtle("@prefix ex: <http://example.org/> .\nex:a ex:p ex:1 .", "http://example.org/").unwrap();
        let d = a.difference(&b).unwrap();
        assert_eq!(d.len(), 1);
    }
}
