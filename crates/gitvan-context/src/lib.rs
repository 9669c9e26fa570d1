//! Context Manager: the single writable variable scope a workflow's
//! steps read from and write to, plus the one-pass `{{ name }}` template
//! substitution every step's string config fields go through before
//! execution.
//!
//! A step's outputs become visible to later steps only once written via
//! [`ExecutionContext::set_output`] — there is no dirty-read of a step
//! still in flight. Substitution is a sealed, single pass: no embedded
//! expression language, matching the re-architecture note in the
//! engine's design notes against ad hoc string-eval template systems.

pub mod error;

pub use error::{ContextError, ContextResult};

use chrono::{DateTime, Utc};
use gitvan_rdf::Graph;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type StepOutputs = Map<String, Value>;

/// Per-workflow execution state: created at workflow start, destroyed
/// after the Receipt Writer serializes it, never shared across
/// workflows (§3 `ExecutionContext`).
pub struct ExecutionContext {
    pub workflow_id: String,
    pub commit_sha: String,
    pub started_at: DateTime<Utc>,
    pub current_graph: Graph,
    pub previous_graph: Option<Graph>,
    inputs: Map<String, Value>,
    outputs: RwLock<BTreeMap<String, StepOutputs>>,
    canceled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>, commit_sha: impl Into<String>, inputs: Map<String, Value>, current_graph: Graph, previous_graph: Option<Graph>) -> Self {
        Self::with_cancellation(workflow_id, commit_sha, inputs, current_graph, previous_graph, Arc::new(AtomicBool::new(false)))
    }

    /// As [`Self::new`], but shares a cancellation flag with other
    /// contexts rather than owning a private one — the Orchestrator uses
    /// this so a single cooperative cancel reaches every workflow of the
    /// current event, not just the one that requested it.
    pub fn with_cancellation(
        workflow_id: impl Into<String>,
        commit_sha: impl Into<String>,
        inputs: Map<String, Value>,
        current_graph: Graph,
        previous_graph: Option<Graph>,
        canceled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            commit_sha: commit_sha.into(),
            started_at: Utc::now(),
            current_graph,
            previous_graph,
            inputs,
            outputs: RwLock::new(BTreeMap::new()),
            canceled,
        }
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.canceled.clone()
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Publish `step_id`'s outputs atomically. Until this call the step
    /// is invisible to `{{ steps.<id>.* }}` placeholders, even if it has
    /// already started.
    pub fn set_output(&self, step_id: impl Into<String>, values: StepOutputs) {
        self.outputs.write().insert(step_id.into(), values);
    }

    pub fn output_of(&self, step_id: &str) -> Option<StepOutputs> {
        self.outputs.read().get(step_id).cloned()
    }

    /// A snapshot of every step's outputs, serialized into the Receipt.
    pub fn all_outputs(&self) -> BTreeMap<String, StepOutputs> {
        self.outputs.read().clone()
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    fn resolve(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        match root {
            "inputs" => {
                if rest.is_empty() {
                    return Some(Value::Object(self.inputs.clone()));
                }
                walk(&Value::Object(self.inputs.clone()), &rest)
            }
            "steps" => {
                let (step_id, field_path) = rest.split_first()?;
                let step_outputs = self.outputs.read().get(*step_id)?.clone();
                if field_path.is_empty() {
                    return Some(Value::Object(step_outputs));
                }
                walk(&Value::Object(step_outputs), field_path)
            }
            _ => None,
        }
    }
}

fn walk(value: &Value, path: &[&str]) -> Option<Value> {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}";

fn placeholder_re() -> Regex {
    Regex::new(PLACEHOLDER_PATTERN).expect("static placeholder pattern is valid regex")
}

const DANGEROUS_SUBSTRINGS: &[&str] = &["${", "`", "__proto__", "constructor", "prototype", ".."];

fn dangerous_construct_in(value: &str) -> Option<&'static str> {
    DANGEROUS_SUBSTRINGS.iter().copied().find(|needle| value.contains(needle))
}

/// Render every `{{ name }}` placeholder in `template` against `ctx`'s
/// scope (`inputs.*`, `steps.<id>.*`). A template that is *exactly* one
/// placeholder resolves to that value's native JSON type; a template
/// with any surrounding text resolves to a string (the resolved value's
/// display form spliced into place).
///
/// Errors if a placeholder cannot be resolved ([`ContextError::Binding`])
/// or if a resolved value contains a disallowed construct
/// ([`ContextError::Security`]) — the latter check runs on the
/// *resolved* value, since the danger is injected content from the
/// knowledge graph or a prior step's output, not the workflow author's
/// own template text.
pub fn interpolate_value(step_id: &str, value: &Value, ctx: &ExecutionContext) -> ContextResult<Value> {
    match value {
        Value::String(s) => interpolate_string(step_id, s, ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate_value(step_id, item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), interpolate_value(step_id, v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn interpolate_string(step_id: &str, template: &str, ctx: &ExecutionContext) -> ContextResult<Value> {
    let re = placeholder_re();
    if let Some(caps) = re.captures(template) {
        if caps.get(0).map(|m| m.as_str()) == Some(template) {
            let name = caps.get(1).unwrap().as_str();
            let resolved = resolve_checked(step_id, name, ctx)?;
            return Ok(resolved);
        }
    }

    let mut binding_error = None;
    let mut security_error = None;
    let rendered = re.replace_all(template, |caps: &regex::Captures| {
        let name = caps.get(1).unwrap().as_str();
        match resolve_checked(step_id, name, ctx) {
            Ok(value) => value_to_display(&value),
            Err(ContextError::Binding { .. }) if binding_error.is_none() => {
                binding_error = Some(name.to_string());
                String::new()
            }
            Err(ContextError::Security { reason, .. }) if security_error.is_none() => {
                security_error = Some((name.to_string(), reason));
                String::new()
            }
            Err(_) => String::new(),
        }
    });

    if let Some(name) = binding_error {
        return Err(ContextError::Binding { step: step_id.to_string(), name });
    }
    if let Some((name, reason)) = security_error {
        return Err(ContextError::Security { step: step_id.to_string(), name, reason });
    }
    Ok(Value::String(rendered.into_owned()))
}

fn resolve_checked(step_id: &str, name: &str, ctx: &ExecutionContext) -> ContextResult<Value> {
    let value = ctx.resolve(name).ok_or_else(|| ContextError::Binding {
        step: step_id.to_string(),
        name: name.to_string(),
    })?;
    let display = value_to_display(&value);
    if let Some(reason) = dangerous_construct_in(&display) {
        return Err(ContextError::Security {
            step: step_id.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(value)
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Substitute every string-valued field of a step's config map in one
/// pass, recursing into nested arrays/objects.
pub fn interpolate_config(step_id: &str, config: &BTreeMap<String, Value>, ctx: &ExecutionContext) -> ContextResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for (k, v) in config {
        out.insert(k.clone(), interpolate_value(step_id, v, ctx)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_inputs(inputs: Map<String, Value>) -> ExecutionContext {
        let graph = Graph::empty("http://example.org/").unwrap();
        ExecutionContext::new("wf1", "deadbeef", inputs, graph, None)
    }

    #[test]
    fn whole_template_placeholder_preserves_type() {
        let mut inputs = Map::new();
        inputs.insert("count".to_string(), Value::Number(3.into()));
        let ctx = ctx_with_inputs(inputs);
        let rendered = interpolate_value("s1", &Value::String("{{ inputs.count }}".to_string()), &ctx).unwrap();
        assert_eq!(rendered, Value::Number(3.into()));
    }

    #[test]
    fn mixed_text_placeholder_stringifies() {
        let mut inputs = Map::new();
        inputs.insert("name".to_string(), Value::String("alice".to_string()));
        let ctx = ctx_with_inputs(inputs);
        let rendered = interpolate_value("s1", &Value::String("hello {{ inputs.name }}!".to_string()), &ctx).unwrap();
        assert_eq!(rendered, Value::String("hello alice!".to_string()));
    }

    #[test]
    fn step_output_is_visible_after_set_output() {
        let ctx = ctx_with_inputs(Map::new());
        let mut outputs = Map::new();
        outputs.insert("status".to_string(), Value::Number(200.into()));
        ctx.set_output("http1", outputs);

        let rendered = interpolate_value("s2", &Value::String("{{ steps.http1.status }}".to_string()), &ctx).unwrap();
        assert_eq!(rendered, Value::Number(200.into()));
    }

    #[test]
    fn unresolved_placeholder_is_a_binding_error() {
        let ctx = ctx_with_inputs(Map::new());
        let err = interpolate_value("s1", &Value::String("{{ inputs.missing }}".to_string()), &ctx).unwrap_err();
        matches!(err, ContextError::Binding { .. });
    }

    #[test]
    fn dangerous_resolved_value_is_a_security_error() {
        let mut inputs = Map::new();
        inputs.insert("evil".to_string(), Value::String("../etc/passwd".to_string()));
        let ctx = ctx_with_inputs(inputs);
        let err = interpolate_value("s1", &Value::String("{{ inputs.evil }}".to_string()), &ctx).unwrap_err();
        match err {
            ContextError::Security { reason, .. } => assert_eq!(reason, ".."),
            other => panic!("expected Security, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_placeholder_inside_mixed_text_is_still_an_error() {
        let ctx = ctx_with_inputs(Map::new());
        let err = interpolate_value("s1", &Value::String("value: {{ inputs.missing }}".to_string()), &ctx).unwrap_err();
        matches!(err, ContextError::Binding { .. });
    }

    #[test]
    fn nested_config_is_interpolated_recursively() {
        let mut inputs = Map::new();
        inputs.insert("host".to_string(), Value::String("example.org".to_string()));
        let ctx = ctx_with_inputs(inputs);

        let mut config = BTreeMap::new();
        config.insert(
            "headers".to_string(),
            serde_json::json!({"Host": "{{ inputs.host }}"}),
        );
        let out = interpolate_config("s1", &config, &ctx).unwrap();
        assert_eq!(out["headers"]["Host"], Value::String("example.org".to_string()));
    }
}
