//! Turtle parsing into a [`Graph`].

use crate::error::{RdfError, RdfResult};
use crate::graph::Graph;
use oxigraph::io::RdfFormat;

/// Parse a Turtle document into a fresh [`Graph`] with the given base IRI.
///
/// Malformed input fails with [`RdfError::Parse`]; when the underlying
/// loader reports a position, `line`/`column` are populated, otherwise
/// they default to `0` and the full detail is carried in `message`.
pub fn parse_turtle(text: &str, base_iri: &str) -> RdfResult<Graph> {
    let graph = Graph::empty(base_iri)?;
    graph
        .store()
        .load_from_reader(RdfFormat::Turtle, text.as_bytes())
        .map_err(|e| to_parse_error(&e.to_string()))?;
    Ok(graph)
}

/// Parse a Turtle document directly into an existing, still-being-built
/// graph (used by the Knowledge Loader to union many files without an
/// intermediate `Graph` per file).
pub fn parse_turtle_into(graph: &Graph, text: &str) -> RdfResult<()> {
    graph
        .store()
        .load_from_reader(RdfFormat::Turtle, text.as_bytes())
        .map_err(|e| to_parse_error(&e.to_string()))?;
    Ok(())
}

/// Parse N-Quads into an existing graph. Used for round-tripping a
/// canonicalized serialization back into a `Graph` for isomorphism checks.
pub fn parse_nquads_into(graph: &Graph, text: &str) -> RdfResult<()> {
    graph
        .store()
        .load_from_reader(RdfFormat::NQuads, text.as_bytes())
        .map_err(|e| to_parse_error(&e.to_string()))?;
    Ok(())
}

/// Best-effort extraction of `line`/`column` from the loader's message.
/// The underlying parser's error `Display` typically reads like
/// `"... at line 3 column 12"`; when that shape isn't present we fall
/// back to `(0, 0)` and keep the full message.
fn to_parse_error(message: &str) -> RdfError {
    let (mut line, mut column) = (0usize, 0usize);
    let lower = message.to_ascii_lowercase();
    if let Some(idx) = lower.find("line ") {
        if let Some(n) = lower[idx + 5..].split(|c: char| !c.is_ascii_digit()).next() {
            line = n.parse().unwrap_or(0);
        }
    }
    if let Some(idx) = lower.find("column ") {
        if let Some(n) = lower[idx + 7..].split(|c: char| !c.is_ascii_digit()).next() {
            column = n.parse().unwrap_or(0);
        }
    }
    RdfError::Parse {
        line,
        column,
        message: message.to_string(),
    }
}
