//! Database step: delegates to whatever [`DatabaseConnector`] the
//! runner was built with. The default connector refuses every query —
//! a binary that wires in Postgres, SQLite, or similar supplies its own.

use crate::error::{StepError, StepExecResult};
use crate::DatabaseConnector;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, connector: &dyn DatabaseConnector) -> StepExecResult<Map<String, Value>> {
    let query = config
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "query".to_string() })?;
    let params = config.get("params").and_then(Value::as_array).cloned().unwrap_or_default();

    connector.query(query, &params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnconfiguredDatabase;

    #[tokio::test]
    async fn unconfigured_connector_refuses() {
        let connector = UnconfiguredDatabase;
        let mut cfg = BTreeMap::new();
        cfg.insert("query".to_string(), Value::String("SELECT 1".to_string()));
        let err = run("s1", &cfg, &connector).await.unwrap_err();
        matches!(err, StepError::DatabaseNotConfigured { .. });
    }
}
