//! Predicate Evaluator: decides whether a hook fires against the
//! current (and, where relevant, previous) knowledge graph.

pub mod error;

pub use error::{PredicateError, PredicateResult};

use gitvan_hooks::{ComparisonOp, Hook, PredicateDef};
use gitvan_rdf::{ask, first_numeric_binding, parse_turtle, select, shacl_validate, Graph, RdfError};
use serde_json::{json, Map, Value};

const SHAPES_BASE_IRI: &str = "http://gitvan.dev/ns/hooks#shapes";

#[derive(Debug, Clone)]
pub struct PredicateOutcome {
    pub fired: bool,
    pub context: Map<String, Value>,
}

/// Evaluate `hook`'s predicate. `previous` is `None` when there is no
/// parseable parent Graph, which the `ResultDelta` kind treats as "first
/// observation" (fired iff the current result set is non-empty).
///
/// A query timeout does not propagate: it resolves the hook to
/// `fired = false` with a `"timeout"` entry under `context.error`, per
/// the bounded-evaluation contract every predicate kind shares.
pub async fn evaluate(
    hook: &Hook,
    current: &Graph,
    previous: Option<&Graph>,
    timeout_ms: u64,
    max_shacl_violations: usize,
) -> PredicateResult<PredicateOutcome> {
    match &hook.predicate {
        PredicateDef::ResultDelta { query } => evaluate_result_delta(query, current, previous, timeout_ms).await,
        PredicateDef::Ask { query } => evaluate_ask(query, current, timeout_ms).await,
        PredicateDef::SelectThreshold { query, threshold, op } => {
            evaluate_select_threshold(query, *threshold, op, current, timeout_ms).await
        }
        PredicateDef::ShaclAllConform { shapes_text } => {
            evaluate_shacl(shapes_text, current, timeout_ms, max_shacl_violations).await
        }
    }
}

async fn evaluate_result_delta(
    query: &str,
    current: &Graph,
    previous: Option<&Graph>,
    timeout_ms: u64,
) -> PredicateResult<PredicateOutcome> {
    let current_result = match select(current, query, timeout_ms).await {
        Ok(r) => r,
        Err(RdfError::Timeout { .. }) => return Ok(timed_out()),
        Err(e) => return Err(e.into()),
    };
    let current_hash = hex::encode(current_result.result_hash());

    let mut context = Map::new();
    context.insert("current_hash".to_string(), json!(current_hash));

    let fired = match previous {
        Some(previous_graph) => {
            let previous_result = match select(previous_graph, query, timeout_ms).await {
                Ok(r) => r,
                Err(RdfError::Timeout { .. }) => return Ok(timed_out()),
                Err(e) => return Err(e.into()),
            };
            let previous_hash = hex::encode(previous_result.result_hash());
            context.insert("previous_hash".to_string(), json!(previous_hash));
            current_hash != previous_hash
        }
        None => {
            context.insert("first_observation".to_string(), json!(true));
            !current_result.is_empty()
        }
    };

    Ok(PredicateOutcome { fired, context })
}

async fn evaluate_ask(query: &str, current: &Graph, timeout_ms: u64) -> PredicateResult<PredicateOutcome> {
    let fired = match ask(current, query, timeout_ms).await {
        Ok(b) => b,
        Err(RdfError::Timeout { .. }) => return Ok(timed_out()),
        Err(e) => return Err(e.into()),
    };
    let mut context = Map::new();
    context.insert("result".to_string(), json!(fired));
    Ok(PredicateOutcome { fired, context })
}

async fn evaluate_select_threshold(
    query: &str,
    threshold: f64,
    op: &ComparisonOp,
    current: &Graph,
    timeout_ms: u64,
) -> PredicateResult<PredicateOutcome> {
    let result = match select(current, query, timeout_ms).await {
        Ok(r) => r,
        Err(RdfError::Timeout { .. }) => return Ok(timed_out()),
        Err(e) => return Err(e.into()),
    };
    let value = first_numeric_binding(&result);
    let fired = op.apply(value, threshold);

    let mut context = Map::new();
    context.insert("value".to_string(), json!(value));
    context.insert("threshold".to_string(), json!(threshold));
    Ok(PredicateOutcome { fired, context })
}

async fn evaluate_shacl(
    shapes_text: &str,
    current: &Graph,
    timeout_ms: u64,
    max_violations: usize,
) -> PredicateResult<PredicateOutcome> {
    let shapes = match parse_turtle(shapes_text, SHAPES_BASE_IRI) {
        Ok(g) => g,
        Err(e) => return Err(e.into()),
    };
    let report = match shacl_validate(current, &shapes, timeout_ms, max_violations).await {
        Ok(r) => r,
        Err(RdfError::Timeout { .. }) => return Ok(timed_out()),
        Err(e) => return Err(e.into()),
    };

    let fired = !report.conforms;
    let mut context = Map::new();
    context.insert("violations".to_string(), json!(report.violations));
    Ok(PredicateOutcome { fired, context })
}

fn timed_out() -> PredicateOutcome {
    let mut context = Map::new();
    context.insert("error".to_string(), json!("timeout"));
    PredicateOutcome { fired: false, context }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitvan_hooks::{Hook, HookMetadata};
    use chrono::Utc;

    fn hook_with_predicate(predicate: PredicateDef) -> Hook {
        Hook {
            id: "http://example.org/hook1".to_string(),
            title: "t".to_string(),
            predicate,
            workflows: vec![],
            metadata: HookMetadata { parsed_at: Utc::now() },
        }
    }

    fn issues_graph(n: usize) -> Graph {
        let mut ttl = String::from("@prefix ex: <http://example.org/> .\n");
        for i in 0..n {
            ttl.push_str(&format!("ex:i{i} a ex:Issue .\n"));
        }
        gitvan_rdf::parse_turtle(&ttl, "http://example.org/").unwrap()
    }

    #[tokio::test]
    async fn result_delta_fires_on_first_observation_when_nonempty() {
        let hook = hook_with_predicate(PredicateDef::ResultDelta {
            query: "SELECT ?i WHERE { ?i a <http://example.org/Issue> }".to_string(),
        });
        let current = issues_graph(1);
        let outcome = evaluate(&hook, &current, None, 5000, 100).await.unwrap();
        assert!(outcome.fired);
    }

    #[tokio::test]
    async fn result_delta_does_not_fire_when_unchanged() {
        let hook = hook_with_predicate(PredicateDef::ResultDelta {
            query: "SELECT ?i WHERE { ?i a <http://example.org/Issue> }".to_string(),
        });
        let current = issues_graph(2);
        let previous = issues_graph(2);
        let outcome = evaluate(&hook, &current, Some(&previous), 5000, 100).await.unwrap();
        assert!(!outcome.fired);
    }

    #[tokio::test]
    async fn result_delta_fires_when_changed() {
        let hook = hook_with_predicate(PredicateDef::ResultDelta {
            query: "SELECT ?i WHERE { ?i a <http://example.org/Issue> }".to_string(),
        });
        let current = issues_graph(3);
        let previous = issues_graph(2);
        let outcome = evaluate(&hook, &current, Some(&previous), 5000, 100).await.unwrap();
        assert!(outcome.fired);
    }

    #[tokio::test]
    async fn select_threshold_compares_correctly() {
        let hook = hook_with_predicate(PredicateDef::SelectThreshold {
            query: "SELECT (COUNT(?i) AS ?c) WHERE { ?i a <http://example.org/Issue> }".to_string(),
            threshold: 2.0,
            op: ComparisonOp::Ge,
        });
        let current = issues_graph(3);
        let outcome = evaluate(&hook, &current, None, 5000, 100).await.unwrap();
        assert!(outcome.fired);
    }

    #[tokio::test]
    async fn timeout_resolves_to_not_fired() {
        let hook = hook_with_predicate(PredicateDef::Ask {
            query: "ASK { ?s ?p ?o }".to_string(),
        });
        let current = issues_graph(1);
        let outcome = evaluate(&hook, &current, None, 0, 100).await.unwrap();
        assert!(!outcome.fired);
        assert_eq!(outcome.context.get("error").and_then(|v| v.as_str()), Some("timeout"));
    }
}
