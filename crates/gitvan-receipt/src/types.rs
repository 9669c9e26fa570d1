//! The receipt record itself (§6.3's JSON schema) plus the conversion
//! from a [`gitvan_runner::StepOutcome`] into its on-disk shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA: &str = "gitvan-receipt-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepErrorInfo {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReceipt {
    pub id: String,
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepErrorInfo>,
    pub outputs: Map<String, Value>,
}

impl From<&gitvan_runner::StepOutcome> for StepReceipt {
    fn from(outcome: &gitvan_runner::StepOutcome) -> Self {
        Self {
            id: outcome.step_id.clone(),
            ok: outcome.ok,
            duration_ms: outcome.duration_ms,
            error: outcome.error.as_ref().map(|message| StepErrorInfo {
                kind: classify_error(message),
                message: message.clone(),
            }),
            outputs: outcome.outputs.clone(),
        }
    }
}

/// The runner reports errors as `Display`-formatted strings; the
/// receipt schema wants a stable `kind` tag alongside the message, so
/// this extracts one from the leading words of known `StepError`
/// messages. A message that matches none of these still gets a
/// receipt entry, just with `kind = "unknown"`.
fn classify_error(message: &str) -> String {
    if message.contains("timed out") {
        "TimeoutError".to_string()
    } else if message.contains("forbidden") {
        "SecurityError".to_string()
    } else if message.contains("missing required config field") || message.contains("has the wrong type") {
        "ValidationError".to_string()
    } else if message.contains("was canceled") {
        "Canceled".to_string()
    } else if message.contains("no database connector configured") {
        "ConfigurationError".to_string()
    } else if message.contains("http request failed") {
        "IoError".to_string()
    } else {
        "QueryError".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookReceipt {
    pub hook_id: String,
    pub predicate_type: String,
    pub fired: bool,
    pub context: Map<String, Value>,
    pub workflow_ok: bool,
    pub steps: Vec<StepReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub schema: String,
    pub commit: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hooks: Vec<HookReceipt>,
}

impl Receipt {
    pub fn new(commit: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            schema: SCHEMA.to_string(),
            commit: commit.into(),
            started_at,
            finished_at: started_at,
            hooks: Vec::new(),
        }
    }

    /// Replace any existing entry for the same `hook_id`, otherwise
    /// append, then keep `hooks` sorted by `hook_id` — sorting is what
    /// makes two independently-constructed receipts for the same
    /// commit serialize byte-identically (§8's idempotence property),
    /// since insertion order would otherwise depend on which
    /// orchestrator run observed which hook first.
    pub fn merge_hook(&mut self, incoming: HookReceipt) {
        self.hooks.retain(|h| h.hook_id != incoming.hook_id);
        self.hooks.push(incoming);
        self.hooks.sort_by(|a, b| a.hook_id.cmp(&b.hook_id));
    }

    pub fn merge_hooks(&mut self, incoming: impl IntoIterator<Item = HookReceipt>) {
        for hook in incoming {
            self.merge_hook(hook);
        }
    }

    /// Canonical form: sorted object keys, stable number formatting,
    /// ISO-8601-UTC timestamps. `serde_json::Map` is a `BTreeMap` in
    /// this workspace (the `preserve_order` feature is never enabled),
    /// so round-tripping the receipt through [`serde_json::Value`]
    /// before printing is sufficient to sort every nested object's
    /// keys, not just the top-level struct fields.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_hook_replaces_same_id() {
        let mut receipt = Receipt::new("deadbeef", Utc::now());
        receipt.merge_hook(HookReceipt {
            hook_id: "h1".to_string(),
            predicate_type: "ask".to_string(),
            fired: true,
            context: Map::new(),
            workflow_ok: true,
            steps: vec![],
        });
        receipt.merge_hook(HookReceipt {
            hook_id: "h1".to_string(),
            predicate_type: "ask".to_string(),
            fired: false,
            context: Map::new(),
            workflow_ok: false,
            steps: vec![],
        });
        assert_eq!(receipt.hooks.len(), 1);
        assert!(!receipt.hooks[0].fired);
    }

    #[test]
    fn merge_hook_keeps_hooks_sorted_by_id() {
        let mut receipt = Receipt::new("deadbeef", Utc::now());
        for id in ["z-hook", "a-hook", "m-hook"] {
            receipt.merge_hook(HookReceipt {
                hook_id: id.to_string(),
                predicate_type: "ask".to_string(),
                fired: true,
                context: Map::new(),
                workflow_ok: true,
                steps: vec![],
            });
        }
        let ids: Vec<&str> = receipt.hooks.iter().map(|h| h.hook_id.as_str()).collect();
        assert_eq!(ids, vec!["a-hook", "m-hook", "z-hook"]);
    }

    #[test]
    fn canonical_json_is_identical_across_equivalent_receipts() {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let mut a = Receipt::new("deadbeef", epoch);
        let mut b = Receipt::new("deadbeef", epoch);
        for receipt in [&mut a, &mut b] {
            receipt.merge_hook(HookReceipt {
                hook_id: "h1".to_string(),
                predicate_type: "ask".to_string(),
                fired: true,
                context: Map::new(),
                workflow_ok: true,
                steps: vec![],
            });
        }
        assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }
}
