//! Sparql step: execute a SELECT against the current graph, memoized in
//! the Artifact Cache by `(query text, graph hash)` since a SPARQL
//! evaluation over an unchanged graph is a pure computation.

use crate::error::{StepError, StepExecResult};
use gitvan_cache::{Cache, CacheKey};
use gitvan_context::ExecutionContext;
use gitvan_rdf::{select, SelectResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const CACHE_NAMESPACE: &str = "step_sparql";
const SCHEMA_VERSION: u32 = 1;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, ctx: &ExecutionContext, cache: &Cache, timeout_ms: u64) -> StepExecResult<Map<String, Value>> {
    let query = config
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "query".to_string() })?;

    let graph_hash = gitvan_rdf::canonical_hash(&ctx.current_graph);
    let key = CacheKey::derive(CACHE_NAMESPACE, &[graph_hash.as_slice(), query.as_bytes()]);

    if let Ok(Some(cached)) = cache.get(CACHE_NAMESPACE, &key, SCHEMA_VERSION) {
        if let Ok(outputs) = serde_json::from_slice::<Map<String, Value>>(&cached) {
            return Ok(outputs);
        }
    }

    let result = select(&ctx.current_graph, query, timeout_ms).await.map_err(StepError::Rdf)?;
    let outputs = outputs_of(result);
    if let Ok(bytes) = serde_json::to_vec(&outputs) {
        let _ = cache.put(CACHE_NAMESPACE, key, &bytes, SCHEMA_VERSION, None);
    }
    Ok(outputs)
}

fn outputs_of(result: SelectResult) -> Map<String, Value> {
    let mut outputs = Map::new();
    outputs.insert("variables".to_string(), serde_json::json!(result.variables));
    outputs.insert("results".to_string(), serde_json::json!(result.rows));
    outputs.insert("count".to_string(), serde_json::json!(result.len()));
    outputs
}
