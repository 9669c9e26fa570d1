//! Filesystem step: a single read-oriented operation against a path
//! under the workspace root — `exists`, `read`, `list`, or `mkdir`. The
//! File step handles copy/merge; this one is for workflows that branch
//! on what's already on disk.

use crate::error::{StepError, StepExecResult};
use crate::{workspace_path, RunnerConfig};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let path = config
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "path".to_string() })?;
    let operation = config.get("operation").and_then(Value::as_str).unwrap_or("exists");
    let resolved = workspace_path(step_id, runner_config, path)?;

    let mut outputs = Map::new();
    match operation {
        "exists" => {
            outputs.insert("exists".to_string(), Value::Bool(tokio::fs::metadata(&resolved).await.is_ok()));
        }
        "read" => {
            let content = tokio::fs::read_to_string(&resolved)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
            outputs.insert("content".to_string(), Value::String(content));
        }
        "list" => {
            let mut entries = Vec::new();
            let mut read_dir = tokio::fs::read_dir(&resolved)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?
            {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
            entries.sort();
            outputs.insert("entries".to_string(), serde_json::json!(entries));
        }
        "mkdir" => {
            tokio::fs::create_dir_all(&resolved)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
            outputs.insert("created".to_string(), Value::Bool(true));
        }
        other => {
            return Err(StepError::WrongType { step: step_id.to_string(), field: "operation".to_string(), expected: "exists|read|list|mkdir" });
        }
    }
    Ok(outputs)
}
