//! File step: materializes `src`'s content under `target`. `mode` is one
//! of `"write"` (overwrite target with src's bytes), `"merge"` (parse
//! both as JSON or YAML by `target`'s extension, shallow-merge src's
//! top-level keys into target, write back — lets a workflow patch a
//! config file without clobbering keys it doesn't own), or `"skip"`
//! (leave an existing target untouched; write if target is absent).

use crate::error::{StepError, StepExecResult};
use crate::{workspace_path, RunnerConfig};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let src = config
        .get("src")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "src".to_string() })?;
    let target = config
        .get("target")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "target".to_string() })?;
    let mode = config
        .get("mode")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "mode".to_string() })?;

    let src_path = workspace_path(step_id, runner_config, src)?;
    let target_path = workspace_path(step_id, runner_config, target)?;

    let src_bytes = tokio::fs::read(&src_path)
        .await
        .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;

    if let Some(parent) = target_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
    }

    match mode {
        "write" => {
            tokio::fs::write(&target_path, &src_bytes)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
        }
        "skip" => {
            if !tokio::fs::try_exists(&target_path).await.unwrap_or(false) {
                tokio::fs::write(&target_path, &src_bytes)
                    .await
                    .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
            }
        }
        "merge" => {
            let existing = tokio::fs::read(&target_path).await.ok();
            let rendered = if is_json_path(&target_path) {
                merge_json(&src_bytes, existing.as_deref(), step_id)?
            } else {
                merge_yaml(&src_bytes, existing.as_deref(), step_id)?
            };
            tokio::fs::write(&target_path, rendered)
                .await
                .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;
        }
        _ => {
            return Err(StepError::WrongType { step: step_id.to_string(), field: "mode".to_string(), expected: "\"write\", \"merge\", or \"skip\"" });
        }
    }

    let mut outputs = Map::new();
    outputs.insert("target".to_string(), Value::String(target.to_string()));
    outputs.insert("bytes_written".to_string(), Value::Number(src_bytes.len().into()));
    Ok(outputs)
}

/// `target`'s extension decides the merge format: `.json` merges as
/// JSON, anything else (including `.yaml`/`.yml` and no extension at
/// all) merges as YAML, a superset of plain JSON-in-YAML config files.
fn is_json_path(target: &std::path::Path) -> bool {
    target.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("json")).unwrap_or(false)
}

fn merge_json(src_bytes: &[u8], existing: Option<&[u8]>, step_id: &str) -> StepExecResult<Vec<u8>> {
    let src_value: Value = serde_json::from_slice(src_bytes)
        .map_err(|e| StepError::Io { step: step_id.to_string(), message: format!("invalid json in src: {e}") })?;
    let mut target_value: Value = match existing {
        Some(bytes) => serde_json::from_slice(bytes)
            .map_err(|e| StepError::Io { step: step_id.to_string(), message: format!("invalid json in target: {e}") })?,
        None => Value::Object(Map::new()),
    };
    merge_top_level_json(&mut target_value, src_value, step_id)?;
    serde_json::to_vec_pretty(&target_value).map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })
}

fn merge_top_level_json(target: &mut Value, src: Value, step_id: &str) -> StepExecResult<()> {
    let (Value::Object(target_map), Value::Object(src_map)) = (target, src) else {
        return Err(StepError::WrongType { step: step_id.to_string(), field: "src".to_string(), expected: "json object" });
    };
    for (key, value) in src_map {
        target_map.insert(key, value);
    }
    Ok(())
}

fn merge_yaml(src_bytes: &[u8], existing: Option<&[u8]>, step_id: &str) -> StepExecResult<String> {
    let src_value: serde_yaml::Value = serde_yaml::from_slice(src_bytes)
        .map_err(|e| StepError::Io { step: step_id.to_string(), message: format!("invalid yaml in src: {e}") })?;
    let mut target_value: serde_yaml::Value = match existing {
        Some(bytes) => serde_yaml::from_slice(bytes)
            .map_err(|e| StepError::Io { step: step_id.to_string(), message: format!("invalid yaml in target: {e}") })?,
        None => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
    };
    merge_top_level_yaml(&mut target_value, src_value, step_id)?;
    serde_yaml::to_string(&target_value).map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })
}

fn merge_top_level_yaml(target: &mut serde_yaml::Value, src: serde_yaml::Value, step_id: &str) -> StepExecResult<()> {
    let (serde_yaml::Value::Mapping(target_map), serde_yaml::Value::Mapping(src_map)) = (target, src) else {
        return Err(StepError::WrongType { step: step_id.to_string(), field: "src".to_string(), expected: "yaml mapping" });
    };
    for (key, value) in src_map {
        target_map.insert(key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_mode_overwrites_target() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();
        tokio::fs::write(tmp.path().join("a.txt"), "content").await.unwrap();
        tokio::fs::write(tmp.path().join("b.txt"), "stale").await.unwrap();

        let mut cfg = BTreeMap::new();
        cfg.insert("src".to_string(), Value::String("a.txt".to_string()));
        cfg.insert("target".to_string(), Value::String("b.txt".to_string()));
        cfg.insert("mode".to_string(), Value::String("write".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join("b.txt")).await.unwrap();
        assert_eq!(written, "content");
    }

    #[tokio::test]
    async fn skip_mode_leaves_existing_target_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();
        tokio::fs::write(tmp.path().join("a.txt"), "new").await.unwrap();
        tokio::fs::write(tmp.path().join("b.txt"), "preserved").await.unwrap();

        let mut cfg = BTreeMap::new();
        cfg.insert("src".to_string(), Value::String("a.txt".to_string()));
        cfg.insert("target".to_string(), Value::String("b.txt".to_string()));
        cfg.insert("mode".to_string(), Value::String("skip".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join("b.txt")).await.unwrap();
        assert_eq!(written, "preserved");
    }

    #[tokio::test]
    async fn skip_mode_writes_when_target_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();
        tokio::fs::write(tmp.path().join("a.txt"), "new").await.unwrap();

        let mut cfg = BTreeMap::new();
        cfg.insert("src".to_string(), Value::String("a.txt".to_string()));
        cfg.insert("target".to_string(), Value::String("b.txt".to_string()));
        cfg.insert("mode".to_string(), Value::String("skip".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join("b.txt")).await.unwrap();
        assert_eq!(written, "new");
    }

    #[tokio::test]
    async fn merge_mode_preserves_untouched_yaml_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();
        tokio::fs::write(tmp.path().join("patch.yaml"), "b: 2").await.unwrap();
        tokio::fs::write(tmp.path().join("base.yaml"), "a: 1").await.unwrap();

        let mut cfg = BTreeMap::new();
        cfg.insert("src".to_string(), Value::String("patch.yaml".to_string()));
        cfg.insert("target".to_string(), Value::String("base.yaml".to_string()));
        cfg.insert("mode".to_string(), Value::String("merge".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let merged = tokio::fs::read_to_string(tmp.path().join("base.yaml")).await.unwrap();
        assert!(merged.contains("a: 1"));
        assert!(merged.contains("b: 2"));
    }

    #[tokio::test]
    async fn merge_mode_preserves_untouched_json_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner_config = RunnerConfig::default();
        runner_config.workspace_root = tmp.path().to_path_buf();
        tokio::fs::write(tmp.path().join("patch.json"), r#"{"b": 2}"#).await.unwrap();
        tokio::fs::write(tmp.path().join("base.json"), r#"{"a": 1}"#).await.unwrap();

        let mut cfg = BTreeMap::new();
        cfg.insert("src".to_string(), Value::String("patch.json".to_string()));
        cfg.insert("target".to_string(), Value::String("base.json".to_string()));
        cfg.insert("mode".to_string(), Value::String("merge".to_string()));
        run("s1", &cfg, &runner_config).await.unwrap();

        let merged: Value = serde_json::from_str(&tokio::fs::read_to_string(tmp.path().join("base.json")).await.unwrap()).unwrap();
        assert_eq!(merged.get("a").and_then(Value::as_i64), Some(1));
        assert_eq!(merged.get("b").and_then(Value::as_i64), Some(2));
    }
}
