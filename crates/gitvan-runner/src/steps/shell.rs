//! Shell step: runs a whitelisted executable with an argv array — never
//! a shell-interpreted string, so there is no quoting layer for an
//! injected `{{ }}` value to escape from. `config.argv[0]` must appear
//! in the runner's `allowed_shell_commands`; an empty allowlist means
//! the kind is disabled outright rather than silently permitting
//! anything.

use crate::error::{StepError, StepExecResult};
use crate::RunnerConfig;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::process::Command;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let argv = config
        .get("argv")
        .and_then(Value::as_array)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "argv".to_string() })?;

    let argv: Vec<String> = argv
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| StepError::WrongType { step: step_id.to_string(), field: "argv".to_string(), expected: "array of strings" })?;

    let program = argv
        .first()
        .ok_or_else(|| StepError::WrongType { step: step_id.to_string(), field: "argv".to_string(), expected: "non-empty array" })?;

    if !runner_config.allowed_shell_commands.contains(program) {
        return Err(StepError::Security {
            step: step_id.to_string(),
            reason: format!("shell command '{program}' is not in the allowed command list"),
        });
    }

    let output = Command::new(program)
        .args(&argv[1..])
        .current_dir(&runner_config.workspace_root)
        .output()
        .await
        .map_err(|e| StepError::Io { step: step_id.to_string(), message: e.to_string() })?;

    let mut outputs = Map::new();
    outputs.insert("exit_code".to_string(), Value::Number(output.status.code().unwrap_or(-1).into()));
    outputs.insert("stdout".to_string(), Value::String(String::from_utf8_lossy(&output.stdout).into_owned()));
    outputs.insert("stderr".to_string(), Value::String(String::from_utf8_lossy(&output.stderr).into_owned()));
    Ok(outputs)
}
