//! Ordered RDF-list (`rdf:first`/`rdf:rest`) resolution.
//!
//! Everything is done in one SPARQL query per list so blank-node list
//! cells never need to be named across separate query executions: a
//! list cell's position is computed in-query as the count of cells that
//! precede it along `rdf:rest+` from the list head.

use crate::vocab::PREFIXES;
use gitvan_rdf::{select, Graph, RdfResult};

/// Ordered item term strings (already rendered, e.g. `<http://...>`)
/// reachable from `<subject> <list_predicate> ?head`, `?head` being the
/// head cons cell of an `rdf:List`. Empty if the property is absent.
pub async fn resolve_ordered_list(
    graph: &Graph,
    subject: &str,
    list_predicate: &str,
    timeout_ms: u64,
) -> RdfResult<Vec<String>> {
    let query = format!(
        r#"{PREFIXES}
SELECT ?item (COUNT(?ancestor) AS ?position) WHERE {{
  <{subject}> <{list_predicate}> ?head .
  ?head rdf:rest* ?node .
  ?node rdf:first ?item .
  ?head rdf:rest* ?ancestor .
  ?ancestor rdf:rest+ ?node .
}}
GROUP BY ?item ?node
ORDER BY ?position
"#
    );
    let result = select(graph, &query, timeout_ms).await?;
    let Some(item_var) = result.variables.iter().find(|v| v.as_str() == "item") else {
        return Ok(Vec::new());
    };

    let mut rows: Vec<(f64, String)> = Vec::new();
    for row in &result.rows {
        let Some(item) = row.get(item_var) else { continue };
        let position = row
            .get("position")
            .map(|p| parse_count(p))
            .unwrap_or(0.0);
        rows.push((position, item.clone()));
    }
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(rows.into_iter().map(|(_, item)| item).collect())
}

/// `COUNT(...)` bindings render as a plain integer literal with an
/// XSD integer datatype suffix, e.g. `"3"^^<http://www.w3.org/2001/XMLSchema#integer>`.
fn parse_count(raw: &str) -> f64 {
    let trimmed = raw.trim_start_matches('"');
    let value_part = trimmed.split("\"^^").next().unwrap_or(trimmed);
    value_part.trim_end_matches('"').parse::<f64>().unwrap_or(0.0)
}
