//! Http step: a single outbound request, already-interpolated URL and
//! body. Mirrors the REST connector's request/response shape so a
//! workflow author moving from a Database step to an Http step sees the
//! same `status`/`body`/`headers` output contract.

use crate::error::{StepError, StepExecResult};
use crate::RunnerConfig;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let url = config
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "url".to_string() })?;
    let method = config.get("method").and_then(Value::as_str).unwrap_or("GET").to_uppercase();
    let body = config.get("body").cloned();

    let client = reqwest::Client::new();
    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| StepError::WrongType { step: step_id.to_string(), field: "method".to_string(), expected: "http method" })?;
    let mut request = client.request(method, url);

    if let Some(headers) = config.get("headers").and_then(Value::as_object) {
        for (key, value) in headers {
            if let Some(value) = value.as_str() {
                request = request.header(key.as_str(), value);
            }
        }
    }
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(|e| StepError::Http { step: step_id.to_string(), message: e.to_string() })?;
    let status = response.status();

    if !runner_config.http_allow_non_2xx && !status.is_success() {
        return Err(StepError::Http { step: step_id.to_string(), message: format!("non-2xx response: {status}") });
    }

    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), Value::String(v.to_string()))))
        .collect();

    let text = response.text().await.map_err(|e| StepError::Http { step: step_id.to_string(), message: e.to_string() })?;
    let body_value = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

    let mut outputs = Map::new();
    outputs.insert("status".to_string(), Value::Number(status.as_u16().into()));
    outputs.insert("body".to_string(), body_value);
    outputs.insert("headers".to_string(), Value::Object(headers));
    Ok(outputs)
}
