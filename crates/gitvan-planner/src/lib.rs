//! DAG Planner: turns a [`Workflow`]'s step list into an ordered sequence
//! of [`StepBatch`]es such that every step's dependencies have completed
//! before its batch begins, and steps within a batch have no mutual
//! dependency so the Step Runner may run them concurrently.

pub mod error;

pub use error::{PlannerError, PlannerResult};

use gitvan_hooks::{Step, Workflow};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One step, annotated with whether its config is free of `{{ }}`
/// placeholders — a statically-resolvable step needs no context binding
/// pass before it runs, so the Step Runner can skip straight to
/// execution instead of round-tripping through the Context Manager.
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub step: Step,
    pub is_static: bool,
}

/// A set of steps with no dependency on one another, safe to run
/// concurrently. Batches themselves are ordered: every step in batch
/// `i` has all its dependencies in batches `0..i`.
#[derive(Debug, Clone, Default)]
pub struct StepBatch {
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub batches: Vec<StepBatch>,
}

impl Plan {
    pub fn step_count(&self) -> usize {
        self.batches.iter().map(|b| b.steps.len()).sum()
    }
}

/// Kahn's algorithm: repeatedly peel off the set of steps whose
/// dependencies have all been placed into an earlier batch. Ties within
/// a batch are broken by step ID lexicographic order so two runs of the
/// planner over the same workflow always produce identical batches.
///
/// The workflow is expected to already be acyclic (the Hook Parser
/// rejects cycles at parse time via [`gitvan_hooks::cycle::check_acyclic`]);
/// if Kahn's algorithm nonetheless terminates with unprocessed steps,
/// that is a defensive backstop, not an expected path, and surfaces as
/// [`PlannerError::UnresolvedCycle`].
pub fn plan(workflow: &Workflow) -> PlannerResult<Plan> {
    let by_id: BTreeMap<&str, &Step> = workflow.steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for step in &workflow.steps {
        indegree.entry(step.id.as_str()).or_insert(0);
        for dep in &step.depends_on {
            *indegree.entry(step.id.as_str()).or_insert(0) += 1;
            dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
        }
    }

    let mut remaining: BTreeSet<&str> = by_id.keys().copied().collect();
    let mut batches = Vec::new();

    loop {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|id| indegree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        if ready.is_empty() {
            break;
        }

        let mut batch = StepBatch::default();
        let mut sorted_ready = ready;
        sorted_ready.sort_unstable();
        for id in &sorted_ready {
            let step = (*by_id.get(id).expect("ready step exists in by_id")).clone();
            let is_static = is_static_step(&step);
            batch.steps.push(PlannedStep { step, is_static });
            remaining.remove(id);
        }
        for id in &sorted_ready {
            if let Some(deps) = dependents.get(id) {
                for dependent in deps {
                    if let Some(deg) = indegree.get_mut(dependent) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }
        batches.push(batch);
    }

    if !remaining.is_empty() {
        let mut ids: Vec<String> = remaining.into_iter().map(|s| s.to_string()).collect();
        ids.sort();
        return Err(PlannerError::UnresolvedCycle {
            workflow: workflow.id.clone(),
            remaining: ids,
        });
    }

    Ok(Plan { batches })
}

/// A step's config is "static" when none of its JSON string values
/// contain a `{{ ... }}` placeholder — it needs no value from another
/// step's output or from workflow inputs, so its substituted config is
/// just its config, unchanged, and can be computed once at plan time.
fn is_static_step(step: &Step) -> bool {
    step.config.values().all(value_has_no_placeholder)
}

fn value_has_no_placeholder(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => !s.contains("{{"),
        serde_json::Value::Array(items) => items.iter().all(value_has_no_placeholder),
        serde_json::Value::Object(map) => map.values().all(value_has_no_placeholder),
        _ => true,
    }
}

/// Breadth-first flattening of batches into a single order, useful for
/// diagnostics (not used for execution, which must respect batch
/// boundaries).
pub fn flatten_order(plan: &Plan) -> Vec<String> {
    let mut order = VecDeque::new();
    for batch in &plan.batches {
        for planned in &batch.steps {
            order.push_back(planned.step.id.clone());
        }
    }
    order.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitvan_hooks::StepKind;
    use std::collections::BTreeMap as Map;

    fn step(id: &str, depends_on: &[&str]) -> Step {
        Step {
            id: id.to_string(),
            kind: StepKind::Shell,
            config: Map::new(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            timeout_ms: None,
        }
    }

    fn workflow(steps: Vec<Step>) -> Workflow {
        Workflow { id: "wf".to_string(), steps }
    }

    #[test]
    fn independent_steps_land_in_one_batch() {
        let wf = workflow(vec![step("a", &[]), step("b", &[]), step("c", &[])]);
        let p = plan(&wf).unwrap();
        assert_eq!(p.batches.len(), 1);
        assert_eq!(p.batches[0].steps.len(), 3);
    }

    #[test]
    fn linear_chain_produces_one_batch_per_step() {
        let wf = workflow(vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])]);
        let p = plan(&wf).unwrap();
        assert_eq!(p.batches.len(), 3);
        assert_eq!(flatten_order(&p), vec!["a", "b", "c"]);
    }

    #[test]
    fn fan_in_aggregator_waits_for_all_parents() {
        let wf = workflow(vec![
            step("s1", &[]),
            step("s2", &[]),
            step("s3", &[]),
            step("s4", &["s1", "s2", "s3"]),
        ]);
        let p = plan(&wf).unwrap();
        assert_eq!(p.batches.len(), 2);
        assert_eq!(p.batches[0].steps.len(), 3);
        assert_eq!(p.batches[1].steps[0].step.id, "s4");
    }

    #[test]
    fn ties_within_a_batch_are_lexicographic() {
        let wf = workflow(vec![step("c", &[]), step("a", &[]), step("b", &[])]);
        let p = plan(&wf).unwrap();
        let ids: Vec<&str> = p.batches[0].steps.iter().map(|s| s.step.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn unresolved_cycle_is_reported_defensively() {
        let wf = workflow(vec![step("a", &["b"]), step("b", &["a"])]);
        let err = plan(&wf).unwrap_err();
        match err {
            PlannerError::UnresolvedCycle { remaining, .. } => {
                assert_eq!(remaining, vec!["a".to_string(), "b".to_string()]);
            }
        }
    }

    #[test]
    fn step_with_placeholder_is_not_static() {
        let mut cfg = Map::new();
        cfg.insert("query".to_string(), serde_json::json!("SELECT {{ foo }}"));
        let s = Step {
            id: "a".to_string(),
            kind: StepKind::Sparql,
            config: cfg,
            depends_on: vec![],
            timeout_ms: None,
        };
        let wf = workflow(vec![s]);
        let p = plan(&wf).unwrap();
        assert!(!p.batches[0].steps[0].is_static);
    }
}
