//! Extracts typed [`Hook`] records out of a knowledge graph.

use crate::cycle::check_acyclic;
use crate::error::{HookError, HookResult};
use crate::rdf_list::resolve_ordered_list;
use crate::types::{ComparisonOp, Hook, HookMetadata, PredicateDef, Step, StepKind, Workflow};
use crate::vocab::{self, PREFIXES};
use chrono::Utc;
use gitvan_rdf::{select, Graph};
use std::collections::BTreeMap;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Find every `gh:Hook` subject in `graph` and parse it into a fully
/// validated [`Hook`]. Order of the returned vector is the lexicographic
/// order of hook IRIs, for deterministic downstream firing order.
pub async fn parse_hooks(graph: &Graph) -> HookResult<Vec<Hook>> {
    let hook_iris = list_hook_ids(graph).await?;
    let mut hooks = Vec::with_capacity(hook_iris.len());
    for hook_iri in hook_iris {
        hooks.push(parse_hook_by_id(graph, &hook_iri).await?);
    }
    Ok(hooks)
}

/// Every `gh:Hook` subject IRI in `graph`, sorted and deduplicated.
pub async fn list_hook_ids(graph: &Graph) -> HookResult<Vec<String>> {
    let rows = select(
        graph,
        &format!("{PREFIXES}\nSELECT ?hook WHERE {{ ?hook a gh:Hook }}"),
        DEFAULT_TIMEOUT_MS,
    )
    .await?;
    let Some(hook_var) = rows.variables.first() else {
        return Ok(Vec::new());
    };

    let mut hook_iris: Vec<String> = rows
        .rows
        .iter()
        .filter_map(|row| row.get(hook_var))
        .map(|raw| strip_iri(raw))
        .collect();
    hook_iris.sort();
    hook_iris.dedup();
    Ok(hook_iris)
}

/// Parse a single hook already known (by [`list_hook_ids`]) to be a
/// `gh:Hook` subject.
pub async fn parse_hook_by_id(graph: &Graph, hook_iri: &str) -> HookResult<Hook> {
    let title = scalar_literal(graph, hook_iri, vocab::TITLE, DEFAULT_TIMEOUT_MS)
        .await?
        .ok_or_else(|| HookError::MissingProperty {
            hook: hook_iri.to_string(),
            property: "dct:title".to_string(),
        })?;

    let predicate_iri = scalar_iri(graph, hook_iri, vocab::HAS_PREDICATE, DEFAULT_TIMEOUT_MS)
        .await?
        .ok_or_else(|| HookError::MissingProperty {
            hook: hook_iri.to_string(),
            property: "gh:hasPredicate".to_string(),
        })?;
    let predicate = parse_predicate(graph, hook_iri, &predicate_iri).await?;

    let workflow_iris = resolve_ordered_list(graph, hook_iri, vocab::ORDERED_PIPELINES, DEFAULT_TIMEOUT_MS).await?;
    if workflow_iris.is_empty() {
        return Err(HookError::MissingProperty {
            hook: hook_iri.to_string(),
            property: "gh:orderedPipelines".to_string(),
        });
    }

    let mut workflows = Vec::with_capacity(workflow_iris.len());
    for workflow_term in &workflow_iris {
        let workflow_iri = strip_iri(workflow_term);
        workflows.push(parse_workflow(graph, hook_iri, &workflow_iri).await?);
    }

    Ok(Hook {
        id: hook_iri.to_string(),
        title,
        predicate,
        workflows,
        metadata: HookMetadata { parsed_at: Utc::now() },
    })
}

async fn parse_predicate(graph: &Graph, hook_iri: &str, predicate_iri: &str) -> HookResult<PredicateDef> {
    let type_iri = rdf_type(graph, predicate_iri, DEFAULT_TIMEOUT_MS)
        .await?
        .ok_or_else(|| HookError::MissingProperty {
            hook: hook_iri.to_string(),
            property: "predicate rdf:type".to_string(),
        })?;

    match type_iri.as_str() {
        vocab::PREDICATE_RESULT_DELTA => {
            let query = require_literal(graph, hook_iri, predicate_iri, vocab::QUERY_TEXT, "gh:queryText").await?;
            Ok(PredicateDef::ResultDelta { query })
        }
        vocab::PREDICATE_ASK => {
            let query = require_literal(graph, hook_iri, predicate_iri, vocab::QUERY_TEXT, "gh:queryText").await?;
            Ok(PredicateDef::Ask { query })
        }
        vocab::PREDICATE_SELECT_THRESHOLD => {
            let query = require_literal(graph, hook_iri, predicate_iri, vocab::QUERY_TEXT, "gh:queryText").await?;
            let threshold_raw =
                require_literal(graph, hook_iri, predicate_iri, vocab::THRESHOLD, "gh:threshold").await?;
            let threshold = threshold_raw.parse::<f64>().map_err(|_| HookError::MissingProperty {
                hook: hook_iri.to_string(),
                property: "gh:threshold (not numeric)".to_string(),
            })?;
            let op_raw = require_literal(graph, hook_iri, predicate_iri, vocab::OPERATOR, "gh:operator").await?;
            let op = ComparisonOp::parse(&op_raw).ok_or_else(|| HookError::InvalidOperator {
                hook: hook_iri.to_string(),
                op: op_raw.clone(),
            })?;
            Ok(PredicateDef::SelectThreshold { query, threshold, op })
        }
        vocab::PREDICATE_SHACL_ALL_CONFORM => {
            let shapes_text =
                require_literal(graph, hook_iri, predicate_iri, vocab::SHAPES_TEXT, "gh:shapesText").await?;
            Ok(PredicateDef::ShaclAllConform { shapes_text })
        }
        other => Err(HookError::UnknownPredicateType {
            hook: hook_iri.to_string(),
            predicate_type: other.to_string(),
        }),
    }
}

async fn parse_workflow(graph: &Graph, hook_iri: &str, workflow_iri: &str) -> HookResult<Workflow> {
    let step_terms = resolve_ordered_list(graph, workflow_iri, vocab::ORDERED_STEPS, DEFAULT_TIMEOUT_MS).await?;

    let mut steps = Vec::with_capacity(step_terms.len());
    let mut seen_ids: BTreeMap<String, ()> = BTreeMap::new();
    for step_term in &step_terms {
        let step_iri = strip_iri(step_term);
        let step = parse_step(graph, hook_iri, &step_iri).await?;
        if seen_ids.insert(step.id.clone(), ()).is_some() {
            return Err(HookError::DuplicateStepId {
                hook: hook_iri.to_string(),
                step: step.id.clone(),
            });
        }
        steps.push(step);
    }

    for step in &steps {
        for target in &step.depends_on {
            if !seen_ids.contains_key(target) {
                return Err(HookError::UnknownDependency {
                    hook: hook_iri.to_string(),
                    step: step.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    check_acyclic(hook_iri, &steps)?;

    Ok(Workflow {
        id: workflow_iri.to_string(),
        steps,
    })
}

async fn parse_step(graph: &Graph, hook_iri: &str, step_iri: &str) -> HookResult<Step> {
    let id = scalar_literal(graph, step_iri, vocab::STEP_ID, DEFAULT_TIMEOUT_MS)
        .await?
        .unwrap_or_else(|| step_iri.to_string());

    let kind_raw = scalar_literal(graph, step_iri, vocab::STEP_KIND, DEFAULT_TIMEOUT_MS)
        .await?
        .ok_or_else(|| HookError::MissingStepField {
            hook: hook_iri.to_string(),
            step: id.clone(),
            field: "gh:stepKind".to_string(),
        })?;
    let kind = StepKind::parse(&kind_raw).ok_or_else(|| HookError::UnknownStepKind {
        hook: hook_iri.to_string(),
        step: id.clone(),
        kind: kind_raw.clone(),
    })?;

    let config_raw = scalar_literal(graph, step_iri, vocab::CONFIG_JSON, DEFAULT_TIMEOUT_MS).await?;
    let config: crate::types::StepConfig = match config_raw {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        None => BTreeMap::new(),
    };
    for field in kind.required_config_fields() {
        if !config.contains_key(*field) {
            return Err(HookError::MissingStepField {
                hook: hook_iri.to_string(),
                step: id.clone(),
                field: field.to_string(),
            });
        }
    }

    let depends_on = multi_literal(graph, step_iri, vocab::DEPENDS_ON, DEFAULT_TIMEOUT_MS).await?;

    let timeout_ms = scalar_literal(graph, step_iri, vocab::TIMEOUT_MS, DEFAULT_TIMEOUT_MS)
        .await?
        .and_then(|raw| raw.parse::<u64>().ok());

    Ok(Step {
        id,
        kind,
        config,
        depends_on,
        timeout_ms,
    })
}

async fn rdf_type(graph: &Graph, subject: &str, timeout_ms: u64) -> HookResult<Option<String>> {
    let query = format!("SELECT ?t WHERE {{ <{subject}> a ?t }}");
    let result = select(graph, &query, timeout_ms).await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.values().next())
        .map(|raw| strip_iri(raw)))
}

async fn scalar_iri(graph: &Graph, subject: &str, predicate: &str, timeout_ms: u64) -> HookResult<Option<String>> {
    let query = format!("SELECT ?v WHERE {{ <{subject}> <{predicate}> ?v }}");
    let result = select(graph, &query, timeout_ms).await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.values().next())
        .map(|raw| strip_iri(raw)))
}

async fn scalar_literal(graph: &Graph, subject: &str, predicate: &str, timeout_ms: u64) -> HookResult<Option<String>> {
    let query = format!("SELECT ?v WHERE {{ <{subject}> <{predicate}> ?v }}");
    let result = select(graph, &query, timeout_ms).await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.values().next())
        .map(|raw| strip_literal(raw)))
}

async fn multi_literal(graph: &Graph, subject: &str, predicate: &str, timeout_ms: u64) -> HookResult<Vec<String>> {
    let query = format!("SELECT ?v WHERE {{ <{subject}> <{predicate}> ?v }}");
    let result = select(graph, &query, timeout_ms).await?;
    let mut values: Vec<String> = result
        .rows
        .iter()
        .filter_map(|row| row.values().next())
        .map(|raw| strip_literal(raw))
        .collect();
    values.sort();
    Ok(values)
}

async fn require_literal(
    graph: &Graph,
    hook_iri: &str,
    subject: &str,
    predicate: &str,
    property_name: &str,
) -> HookResult<String> {
    scalar_literal(graph, subject, predicate, DEFAULT_TIMEOUT_MS)
        .await?
        .ok_or_else(|| HookError::MissingProperty {
            hook: hook_iri.to_string(),
            property: property_name.to_string(),
        })
}

fn strip_iri(term: &str) -> String {
    term.trim_start_matches('<').trim_end_matches('>').to_string()
}

fn strip_literal(term: &str) -> String {
    if !term.starts_with('"') {
        return strip_iri(term);
    }
    let trimmed = term.trim_start_matches('"');
    trimmed.split("\"^^").next().unwrap_or(trimmed).trim_end_matches('"').to_string()
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

            ex:pred1 a gh:ResultDeltaPredicate ;
                gh:queryText "SELECT ?i WHERE { ?i a ex:Issue }" .

            ex:wf1 gh:orderedSteps (ex:step1 ex:step2) .

            ex:step1 gh:stepId "fetch" ;
                gh:stepKind "sparql" ;
                gh:configJson "{\"query\": \"SELECT * WHERE { ?s ?p ?o }\"}" .

            ex:step2 gh:stepId "notify" ;
                gh:stepKind "notify" ;
                gh:dependsOn "fetch" ;
                gh:configJson "{\"target\": \"slack\", \"payload\": \"done\"}" .
            "#,
            "http://example.org/",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn parses_a_well_formed_hook() {
        let g = sample_graph();
        let hooks = parse_hooks(&g).await.unwrap();
        assert_eq!(hooks.len(), 1);
        let hook = &hooks[0];
        assert_eq!(hook.title, "Issue backlog changed");
        assert!(matches!(hook.predicate, PredicateDef::ResultDelta { .. }));
        assert_eq!(hook.workflows.len(), 1);
        let wf = &hook.workflows[0];
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[0].id, "fetch");
        assert_eq!(wf.steps[1].depends_on, vec!["fetch".to_string()]);
    }

    #[tokio::test]
    async fn missing_title_is_an_error() {
        let g = parse_turtle(
            r#"
            @prefix gh: <http://gitvan.dev/ns/hooks#> .
            @prefix ex: <http://example.org/> .
            ex:hook1 a gh:Hook ;
                gh:hasPredicate ex:pred1 ;
                gh:orderedPipelines (ex:wf1) .
            ex:pred1 a gh:AskPredicate ; gh:queryText "ASK { ?s ?p ?o }" .
            ex:wf1 gh:orderedSteps (ex:step1) .
            ex:step1 gh:stepId "s" ; gh:stepKind "notify" ;
                gh:configJson "{\"target\": \"x\", \"payload\": \"y\"}" .
            "#,
            "http://example.org/",
        )
        .unwrap();
        let err = parse_hooks(&g).await.unwrap_err();
        assert!(matches!(err, HookError::MissingProperty { .. }));
    }

    #[tokio::test]
    async fn unknown_dependency_target_is_rejected() {
        let g = parse_turtle(
            r#"
            @prefix gh: <http://gitvan.dev/ns/hooks#> .
            @prefix dct: <http://purl.org/dc/terms/> .
            @prefix ex: <http://example.org/> .
            ex:hook1 a gh:Hook ; dct:title "t" ; gh:hasPredicate ex:pred1 ;
                gh:orderedPipelines (ex:wf1) .
            ex:pred1 a gh:AskPredicate ; gh:queryText "ASK { ?s ?p ?o }" .
            ex:wf1 gh:orderedSteps (ex:step1) .
            ex:step1 gh:stepId "s" ; gh:stepKind "notify" ; gh:dependsOn "ghost" ;
                gh:configJson "{\"target\": \"x\", \"payload\": \"y\"}" .
            "#,
            "http://example.org/",
        )
        .unwrap();
        let err = parse_hooks(&g).await.unwrap_err();
        assert!(matches!(err, HookError::UnknownDependency { .. }));
    }
}
