//! Knowledge Loader: turns the Turtle files under a configured directory,
//! as they existed at a commit, into one unioned [`gitvan_rdf::Graph`].

pub mod error;

pub use error::{LoaderError, LoaderResult};

use gitvan_cache::{Cache, CacheKey};
use gitvan_git::GitInterface;
use gitvan_rdf::Graph;
use git2::Oid;

const CACHE_NAMESPACE: &str = "graph";
const SCHEMA_VERSION: u32 = 1;
const TTL_SECS: u64 = 60 * 60 * 24 * 7;

/// Load every `*.ttl` file under `graph_dir` as it existed in `commit`,
/// unioned into a single Graph. Cache key is `(commit, graph_dir, blob
/// shas of every matched file)`, so an unchanged tree is an O(1) cache
/// hit even across different commits (a no-op commit reuses the entry).
pub fn load_graph(git: &GitInterface, cache: &Cache, base_iri: &str, graph_dir: &str, commit: Oid) -> LoaderResult<Graph> {
    let files = git.list_files_with_oid(commit, graph_dir, "ttl")?;
    let key = cache_key(graph_dir, &files);

    if let Some(cached) = cache.get(CACHE_NAMESPACE, &key, SCHEMA_VERSION)? {
        if let Ok(text) = String::from_utf8(cached) {
            let graph = Graph::empty(base_iri)?;
            if gitvan_rdf::parse_nquads_into(&graph, &text).is_ok() {
                return Ok(graph);
            }
            tracing::warn!(graph_dir, "cached graph failed to re-parse, recomputing");
        }
    }

    let graph = Graph::empty(base_iri)?;
    for (path, _oid) in &files {
        let bytes = git.read_blob(commit, path)?;
        let text = String::from_utf8(bytes).map_err(|_| LoaderError::NotUtf8 { path: path.clone() })?;
        gitvan_rdf::parse_turtle_into(&graph, &text)?;
    }

    if let Ok(nquads) = gitvan_rdf::to_nquads(&graph) {
        let _ = cache.put(CACHE_NAMESPACE, key, nquads.as_bytes(), SCHEMA_VERSION, Some(TTL_SECS));
    }

    Ok(graph)
}

/// Load the graph as it existed at `commit`'s parent. `Ok(None)` (not an
/// error) when there is no parent, or when the parent's graph directory
/// fails to parse — a ResultDelta predicate treats an absent previous
/// graph as "first observation".
pub fn load_previous_graph(git: &GitInterface, cache: &Cache, base_iri: &str, graph_dir: &str, commit: Oid) -> Option<Graph> {
    let parent = git.parent(commit).ok().flatten()?;
    load_graph(git, cache, base_iri, graph_dir, parent).ok()
}

fn cache_key(graph_dir: &str, files: &[(String, Oid)]) -> CacheKey {
    let mut components: Vec<Vec<u8>> = vec![graph_dir.as_bytes().to_vec()];
    for (path, oid) in files {
        components.push(path.as_bytes().to_vec());
        components.push(oid.as_bytes().to_vec());
    }
    let refs: Vec<&[u8]> = components.iter().map(|c| c.as_slice()).collect();
    CacheKey::derive(CACHE_NAMESPACE, &refs)
}
