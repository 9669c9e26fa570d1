//! Hook Parser: turns `gh:Hook` resources in a knowledge graph into
//! typed, validated [`Hook`] records, cached by `(graph_hash, hook_id)`.

pub mod cycle;
pub mod error;
pub mod parse;
pub mod rdf_list;
pub mod types;
pub mod vocab;

pub use error::{HookError, HookResult};
pub use types::{ComparisonOp, Hook, HookMetadata, PredicateDef, Step, StepConfig, StepKind, Workflow};

use gitvan_cache::{Cache, CacheKey};
use gitvan_rdf::Graph;

const CACHE_NAMESPACE: &str = "hook";
const SCHEMA_VERSION: u32 = 1;

/// Parse every hook in `graph`, serving each one from cache when its
/// `(graph_hash, hook_id)` key is already present and re-parsing (then
/// populating the cache) on a miss.
///
/// `graph` is first hashed once via [`gitvan_rdf::canonical_hash`]; the
/// per-hook cache lookups below use that single hash rather than
/// recomputing it per hook.
pub async fn parse_hooks_cached(graph: &Graph, cache: &Cache) -> HookResult<Vec<Hook>> {
    let graph_hash = gitvan_rdf::canonical_hash(graph);
    let hook_ids = parse::list_hook_ids(graph).await?;

    let mut hooks = Vec::with_capacity(hook_ids.len());
    for hook_id in hook_ids {
        let key = cache_key(&graph_hash, &hook_id);
        if let Some(cached) = cache.get(CACHE_NAMESPACE, &key, SCHEMA_VERSION)? {
            if let Ok(hook) = serde_json::from_slice::<Hook>(&cached) {
                hooks.push(hook);
                continue;
            }
            tracing::warn!(hook_id, "cached hook failed to deserialize, reparsing");
        }

        let hook = parse::parse_hook_by_id(graph, &hook_id).await?;
        if let Ok(bytes) = serde_json::to_vec(&hook) {
            let _ = cache.put(CACHE_NAMESPACE, key, &bytes, SCHEMA_VERSION, None);
        }
        hooks.push(hook);
    }
    Ok(hooks)
}

/// As [`parse_hooks_cached`], but a `ValidationError` on one hook marks
/// only that hook unusable rather than aborting the whole parse — the
/// Orchestrator needs this so a single malformed hook definition never
/// keeps every other hook in the graph from firing (§7). `Err` is still
/// returned for failures that are not about an individual hook (the
/// `gh:Hook` listing query itself erroring out).
pub async fn parse_hooks_tolerant(graph: &Graph, cache: &Cache) -> HookResult<(Vec<Hook>, Vec<(String, HookError)>)> {
    let graph_hash = gitvan_rdf::canonical_hash(graph);
    let hook_ids = parse::list_hook_ids(graph).await?;

    let mut hooks = Vec::with_capacity(hook_ids.len());
    let mut unusable = Vec::new();
    for hook_id in hook_ids {
        let key = cache_key(&graph_hash, &hook_id);
        if let Some(cached) = cache.get(CACHE_NAMESPACE, &key, SCHEMA_VERSION)? {
            if let Ok(hook) = serde_json::from_slice::<Hook>(&cached) {
                hooks.push(hook);
                continue;
            }
            tracing::warn!(hook_id, "cached hook failed to deserialize, reparsing");
        }

        match parse::parse_hook_by_id(graph, &hook_id).await {
            Ok(hook) => {
                if let Ok(bytes) = serde_json::to_vec(&hook) {
                    let _ = cache.put(CACHE_NAMESPACE, key, &bytes, SCHEMA_VERSION, None);
                }
                hooks.push(hook);
            }
            Err(err) => {
                tracing::warn!(hook_id, error = %err, "hook failed validation, excluding from this event");
                unusable.push((hook_id, err));
            }
        }
    }
    Ok((hooks, unusable))
}

fn cache_key(graph_hash: &[u8; 32], hook_id: &str) -> CacheKey {
    CacheKey::derive(CACHE_NAMESPACE, &[graph_hash.as_slice(), hook_id.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitvan_rdf::parse_turtle;

    fn sample_graph() -> Graph {
        parse_turtle(
            r#"
            @prefix gh: <http://gitvan.dev/ns/hooks#> .
            @prefix dct: <http://purl.org/dc/terms/> .
            @prefix ex: <http://example.org/> .

            ex:hook1 a gh:Hook ;
                dct:title "Issue backlog changed" ;
                gh:hasPredicate ex:pred1 ;
                gh:orderedPipelines (ex:wf1) .

            ex:pred1 a gh:AskPredicate ;
                gh:queryText "ASK { ?s ?p ?o }" .

            ex:wf1 gh:orderedSteps (ex:step1) .

            ex:step1 gh:stepId "notify" ;
                gh:stepKind "notify" ;
                gh:configJson "{\"target\": \"slack\", \"payload\": \"done\"}" .
            "#,
            "http://example.org/",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn parses_and_caches_hook() {
        let g = sample_graph();
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);

        let first = parse_hooks_cached(&g, &cache).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = parse_hooks_cached(&g, &cache).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert!(cache.stats().memory_hits + cache.stats().disk_hits >= 1);
    }

    #[tokio::test]
    async fn tolerant_parse_excludes_only_the_broken_hook() {
        let g = parse_turtle(
            r#"
            @prefix gh: <http://gitvan.dev/ns/hooks#> .
            @prefix dct: <http://purl.org/dc/terms/> .
            @prefix ex: <http://example.org/> .

            ex:hook1 a gh:Hook ;
                dct:title "good hook" ;
                gh:hasPredicate ex:pred1 ;
                gh:orderedPipelines (ex:wf1) .
            ex:pred1 a gh:AskPredicate ; gh:queryText "ASK { ?s ?p ?o }" .
            ex:wf1 gh:orderedSteps (ex:step1) .
            ex:step1 gh:stepId "notify" ; gh:stepKind "notify" ;
                gh:configJson "{\"target\": \"slack\", \"payload\": \"done\"}" .

            ex:hook2 a gh:Hook ;
                gh:hasPredicate ex:pred2 ;
                gh:orderedPipelines (ex:wf1) .
            ex:pred2 a gh:AskPredicate ; gh:queryText "ASK { ?s ?p ?o }" .
            "#,
            "http://example.org/",
        )
        .unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);

        let (hooks, unusable) = parse_hooks_tolerant(&g, &cache).await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].title, "good hook");
        assert_eq!(unusable.len(), 1);
        assert_eq!(unusable[0].0, "http://example.org/hook2");
    }
}
