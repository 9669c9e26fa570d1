//! Conditional, Loop, Parallel, and ErrorHandler: the four step kinds
//! whose config embeds a nested list of steps rather than doing work
//! directly. Each nested step is the same [`gitvan_hooks::Step`] shape
//! the top-level workflow uses, so the Planner and Step Runner apply to
//! it unchanged — a branch is just a tiny workflow of its own.
//!
//! Nested step configs are fully resolved by the time they reach here
//! (the parent step's whole config tree, nested arrays and objects
//! included, is interpolated in one pass before dispatch), so a Loop's
//! `body` cannot reference the current item by placeholder — each
//! iteration re-runs the same resolved steps and the per-iteration
//! outputs are collected positionally rather than bound to a variable.

use crate::error::{StepError, StepExecResult};
use crate::StepRunner;
use gitvan_context::ExecutionContext;
use gitvan_hooks::{Step, Workflow};
use serde_json::{Map, Value};

fn parse_steps(step_id: &str, field: &str, value: Option<&Value>) -> StepExecResult<Vec<Step>> {
    let value = value.ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: field.to_string() })?;
    serde_json::from_value(value.clone())
        .map_err(|_| StepError::WrongType { step: step_id.to_string(), field: field.to_string(), expected: "array of steps" })
}

async fn run_branch(runner: &StepRunner, branch_id: &str, steps: Vec<Step>, ctx: &ExecutionContext) -> StepExecResult<Vec<crate::StepOutcome>> {
    let workflow = Workflow { id: branch_id.to_string(), steps };
    let plan = gitvan_planner::plan(&workflow).map_err(StepError::Plan)?;
    let mut outcomes = Vec::new();
    for batch in &plan.batches {
        let batch_steps: Vec<Step> = batch.steps.iter().map(|p| p.step.clone()).collect();
        outcomes.extend(runner.execute_batch(&batch_steps, ctx).await);
    }
    Ok(outcomes)
}

fn summarize(outcomes: &[crate::StepOutcome]) -> Value {
    Value::Array(outcomes.iter().map(|o| serde_json::json!({
        "step_id": o.step_id,
        "ok": o.ok,
        "outputs": o.outputs,
        "error": o.error,
    })).collect())
}

/// §4.8's Conditional predicate is "SPARQL or expression": a `query`
/// field runs a SPARQL ASK against the workflow's current graph (the
/// same evaluation path the Predicate Evaluator and Loop's `each` use);
/// without one, `predicate` is a pre-resolved boolean, already
/// interpolated by the time it reaches here.
async fn evaluate_conditional_predicate(step: &Step, ctx: &ExecutionContext, runner: &StepRunner) -> StepExecResult<bool> {
    if let Some(query) = step.config.get("query").and_then(Value::as_str) {
        let timeout_ms = step.timeout_ms.filter(|&t| t > 0).unwrap_or(runner.config.default_timeout_ms);
        return gitvan_rdf::ask(&ctx.current_graph, query, timeout_ms).await.map_err(StepError::Rdf);
    }
    step.config
        .get("predicate")
        .and_then(Value::as_bool)
        .ok_or_else(|| StepError::MissingField { step: step.id.clone(), field: "predicate".to_string() })
}

pub async fn run(step: &Step, ctx: &ExecutionContext, runner: &StepRunner) -> StepExecResult<Map<String, Value>> {
    let config = &step.config;
    let mut outputs = Map::new();

    match step.kind {
        gitvan_hooks::StepKind::Conditional => {
            let predicate = evaluate_conditional_predicate(step, ctx, runner).await?;
            outputs.insert("predicate".to_string(), Value::Bool(predicate));
            let branch_field = if predicate { "then_branch" } else { "else_branch" };
            match config.get(branch_field) {
                Some(_) => {
                    let steps = parse_steps(&step.id, branch_field, config.get(branch_field))?;
                    let branch_id = format!("{}.{}", step.id, branch_field);
                    let outcomes = run_branch(runner, &branch_id, steps, ctx).await?;
                    outputs.insert("branch".to_string(), Value::String(branch_field.to_string()));
                    outputs.insert("results".to_string(), summarize(&outcomes));
                }
                None => {
                    outputs.insert("branch".to_string(), Value::Null);
                    outputs.insert("results".to_string(), Value::Array(Vec::new()));
                }
            }
        }
        gitvan_hooks::StepKind::Loop => {
            let items = config
                .get("each")
                .and_then(Value::as_array)
                .ok_or_else(|| StepError::MissingField { step: step.id.clone(), field: "each".to_string() })?;
            let body = parse_steps(&step.id, "body", config.get("body"))?;

            let mut iterations = Vec::with_capacity(items.len());
            for (index, _item) in items.iter().enumerate() {
                let branch_id = format!("{}.body[{index}]", step.id);
                let outcomes = run_branch(runner, &branch_id, body.clone(), ctx).await?;
                iterations.push(summarize(&outcomes));
            }
            outputs.insert("iterations".to_string(), Value::Array(iterations));
        }
        gitvan_hooks::StepKind::Parallel => {
            let children = parse_steps(&step.id, "children", config.get("children"))?;
            let branch_id = format!("{}.children", step.id);
            let outcomes = run_branch(runner, &branch_id, children, ctx).await?;
            outputs.insert("results".to_string(), summarize(&outcomes));
        }
        gitvan_hooks::StepKind::ErrorHandler => {
            let try_steps = parse_steps(&step.id, "try", config.get("try"))?;
            let branch_id = format!("{}.try", step.id);
            let try_outcomes = run_branch(runner, &branch_id, try_steps, ctx).await?;
            let try_failed = try_outcomes.iter().any(|o| !o.ok);
            outputs.insert("try_results".to_string(), summarize(&try_outcomes));
            outputs.insert("try_failed".to_string(), Value::Bool(try_failed));

            if try_failed {
                let catch_steps = parse_steps(&step.id, "catch", config.get("catch"))?;
                let catch_branch_id = format!("{}.catch", step.id);
                let catch_outcomes = run_branch(runner, &catch_branch_id, catch_steps, ctx).await?;
                outputs.insert("catch_results".to_string(), summarize(&catch_outcomes));
            }
        }
        _ => unreachable!("control::run is only dispatched for control-flow kinds"),
    }

    Ok(outputs)
}
