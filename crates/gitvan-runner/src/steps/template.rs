//! Template step: the config is already interpolated by the time it
//! reaches here (every step's string fields pass through the Context
//! Manager before execution), so this step's only job is to optionally
//! write the already-rendered text to a target path under the workspace.

use crate::error::{StepError, StepExecResult};
use crate::RunnerConfig;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let rendered = config
        .get("template")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "template".to_string() })?
        .to_string();

    let mut outputs = Map::new();
    outputs.insert("rendered".to_string(), Value::String(rendered.clone()));

    if let Some(target) = config.get("target").and_then(Value::as_str) {
        let path = crate::workspace_path(step_id, runner_config, target)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
        }
        tokio::fs::write(&path, &rendered)
            .await
            .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
        outputs.insert("written_to".to_string(), Value::String(target.to_string()));
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_without_target() {
        let mut cfg = BTreeMap::new();
        cfg.insert("template".to_string(), Value::String("hello world".to_string()));
        let runner_config = RunnerConfig::default();
        let out = run("s1", &cfg, &runner_config).await.unwrap();
        assert_eq!(out["rendered"], Value::String("hello world".to_string()));
        assert!(!out.contains_key("written_to"));
    }

    #[tokio::test]
    async fn writes_to_target_under_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();

        let mut cfg = BTreeMap::new();
        cfg.insert("template".to_string(), Value::String("hi".to_string()));
        cfg.insert("target".to_string(), Value::String("out.txt".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let content = tokio::fs::read_to_string(tmp.path().join("out.txt")).await.unwrap();
        assert_eq!(content, "hi");
    }

    #[tokio::test]
    async fn path_escape_is_a_security_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();

        let mut cfg = BTreeMap::new();
        cfg.insert("template".to_string(), Value::String("hi".to_string()));
        cfg.insert("target".to_string(), Value::String("../escape.txt".to_string()));
        let err = run("s1", &cfg, &runner_config).await.unwrap_err();
        matches!(err, StepError::Security { .. });
    }
}
