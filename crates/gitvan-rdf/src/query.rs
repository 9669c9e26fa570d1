//! SPARQL 1.1 execution: SELECT, ASK, CONSTRUCT, DESCRIBE.
//!
//! Every query runs on a blocking thread bounded by a timeout (SPARQL
//! evaluation is CPU-bound and oxigraph's evaluator is synchronous), so
//! the async orchestrator never blocks its own executor on a runaway
//! query.

use crate::error::{RdfError, RdfResult};
use crate::graph::Graph;
use oxigraph::model::Quad;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

/// One result row: variable name -> the term's canonical string form
/// (`NamedNode`/`Literal`/`BlankNode` `Display`, which includes datatype
/// and language tag where present).
pub type Binding = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SelectResult {
    pub variables: Vec<String>,
    pub rows: Vec<Binding>,
}

impl SelectResult {
    /// Rows sorted lexicographically by (column name, value) pairs, as
    /// required for `ResultDelta` hashing: two result sets that differ
    /// only in the order the engine happened to emit rows must hash the
    /// same way.
    pub fn canonical_result_set(&self) -> Vec<Vec<(String, String)>> {
        let mut rows: Vec<Vec<(String, String)>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .collect();
        for row in &mut rows {
            row.sort();
        }
        rows.sort();
        rows
    }

    /// SHA-256 over the canonical JSON form of [`Self::canonical_result_set`].
    pub fn result_hash(&self) -> [u8; 32] {
        let canonical = self.canonical_result_set();
        let json = serde_json::to_vec(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        hasher.finalize().into()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Run `f` against a clone of `graph`'s store on a blocking thread,
/// bounded by `timeout_ms`. `query_excerpt` is carried into the timeout
/// error for diagnostics.
async fn run_bounded<T, F>(store: Store, query: String, timeout_ms: u64, f: F) -> RdfResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Store, &str) -> RdfResult<T> + Send + 'static,
{
    let query_for_blocking = query.clone();
    let handle = tokio::task::spawn_blocking(move || f(&store, &query_for_blocking));
    match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(RdfError::Query(format!("query task panicked: {join_err}"))),
        Err(_) => Err(RdfError::Timeout {
            timeout_ms,
            query_excerpt: query.chars().take(120).collect(),
        }),
    }
}

pub async fn select(graph: &Graph, query: &str, timeout_ms: u64) -> RdfResult<SelectResult> {
    run_bounded(graph.store().clone(), query.to_string(), timeout_ms, select_sync).await
}

fn select_sync(store: &Store, query: &str) -> RdfResult<SelectResult> {
    match store.query(query)? {
        QueryResults::Solutions(solutions) => {
            let variables: Vec<String> = solutions
                .variables()
                .iter()
                .map(|v| v.as_str().to_string())
                .collect();
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|e| RdfError::Query(e.to_string()))?;
                let mut row = Binding::new();
                for (var, term) in solution.iter() {
                    row.insert(var.as_str().to_string(), term.to_string());
                }
                rows.push(row);
            }
            Ok(SelectResult { variables, rows })
        }
        _ => Err(RdfError::Query("expected SELECT solutions".to_string())),
    }
}

pub async fn ask(graph: &Graph, query: &str, timeout_ms: u64) -> RdfResult<bool> {
    run_bounded(graph.store().clone(), query.to_string(), timeout_ms, ask_sync).await
}

fn ask_sync(store: &Store, query: &str) -> RdfResult<bool> {
    match store.query(query)? {
        QueryResults::Boolean(b) => Ok(b),
        _ => Err(RdfError::Query("expected ASK boolean result".to_string())),
    }
}

pub async fn construct(graph: &Graph, query: &str, timeout_ms: u64, base_iri: &str) -> RdfResult<Graph> {
    let base_iri = base_iri.to_string();
    run_bounded(graph.store().clone(), query.to_string(), timeout_ms, move |s, q| {
        construct_sync(s, q, &base_iri)
    })
    .await
}

pub async fn describe(graph: &Graph, query: &str, timeout_ms: u64, base_iri: &str) -> RdfResult<Graph> {
    // DESCRIBE and CONSTRUCT both yield `QueryResults::Graph`; oxigraph
    // dispatches on the query text itself.
    construct(graph, query, timeout_ms, base_iri).await
}

fn construct_sync(store: &Store, query: &str, base_iri: &str) -> RdfResult<Graph> {
    match store.query(query)? {
        QueryResults::Graph(triples) => {
            let mut quads = Vec::new();
            for triple in triples {
                let triple = triple.map_err(|e| RdfError::Query(e.to_string()))?;
                quads.push(Quad::new(
                    triple.subject,
                    triple.predicate,
                    triple.object,
                    oxigraph::model::GraphName::DefaultGraph,
                ));
            }
            Graph::from_quads(base_iri.to_string(), quads)
        }
        _ => Err(RdfError::Query("expected CONSTRUCT/DESCRIBE graph result".to_string())),
    }
}

/// First binding of the first SELECT column, coerced to `f64`.
/// A missing row or an unparseable value coerces to `0.0`, matching the
/// `SelectThreshold` predicate's documented failure mode.
pub fn first_numeric_binding(result: &SelectResult) -> f64 {
    let Some(first_var) = result.variables.first() else {
        return 0.0;
    };
    result
        .rows
        .first()
        .and_then(|row| row.get(first_var))
        .map(|raw| parse_numeric_literal(raw))
        .unwrap_or(0.0)
}

/// oxigraph's `Term::to_string()` for a typed literal renders as
/// `"42"^^<http://www.w3.org/2001/XMLSchema#integer>`; strip the
/// surrounding quotes and datatype suffix before parsing.
fn parse_numeric_literal(raw: &str) -> f64 {
    let trimmed = raw.trim_start_matches('"');
    let value_part = trimmed.split("\"^^").next().unwrap_or(trimmed);
    let value_part = value_part.trim_end_matches('"');
    value_part.parse::<f64>().unwrap_or(0.0)
}
