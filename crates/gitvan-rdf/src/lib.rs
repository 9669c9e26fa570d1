//! RDF store and SPARQL/SHACL engine.
//!
//! Everything above this crate (the Knowledge Loader, hook/predicate
//! evaluation, the orchestrator) talks to RDF only through [`Graph`] and
//! the free functions in [`query`], [`shacl`], and [`canonicalize`] —
//! `oxigraph` types never leak past this crate's public API except where
//! a caller genuinely needs the term model ([`Graph::named`]).

pub mod canonicalize;
pub mod error;
pub mod graph;
pub mod parse;
pub mod query;
pub mod shacl;

pub use canonicalize::{canonical_hash, canonical_quads, is_isomorphic, to_nquads};
pub use error::{RdfError, RdfResult};
pub use graph::{Graph, GraphStats};
pub use parse::{parse_nquads_into, parse_turtle, parse_turtle_into};
pub use query::{ask, construct, describe, first_numeric_binding, select, Binding, SelectResult};
pub use shacl::{validate as shacl_validate, ShaclReport, ShaclViolation, Severity as ShaclSeverity};
