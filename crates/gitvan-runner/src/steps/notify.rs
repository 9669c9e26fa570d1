//! Notify step: records an outbound notification's target and payload
//! as the step's outputs. The engine does not itself deliver
//! notifications (email, Slack, webhooks) — delivery is the concern of
//! whatever process consumes the receipt this step's output lands in;
//! a workflow that needs delivery in-band should use an Http step
//! instead and treat Notify as a receipt-only marker.

use crate::error::{StepError, StepExecResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>) -> StepExecResult<Map<String, Value>> {
    let target = config
        .get("target")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "target".to_string() })?;
    let payload = config
        .get("payload")
        .cloned()
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "payload".to_string() })?;

    let mut outputs = Map::new();
    outputs.insert("target".to_string(), Value::String(target.to_string()));
    outputs.insert("payload".to_string(), payload);
    outputs.insert("delivered".to_string(), Value::Bool(false));
    Ok(outputs)
}
