//! Typed hook/predicate/workflow/step records, the output of parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            ">" => Some(Self::Gt),
            ">=" | "\u{2265}" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" | "\u{2264}" => Some(Self::Le),
            "=" | "==" => Some(Self::Eq),
            "!=" | "\u{2260}" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Ge => value >= threshold,
            Self::Lt => value < threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
            Self::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateDef {
    ResultDelta { query: String },
    Ask { query: String },
    SelectThreshold { query: String, threshold: f64, op: ComparisonOp },
    ShaclAllConform { shapes_text: String },
}

impl PredicateDef {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ResultDelta { .. } => "resultDelta",
            Self::Ask { .. } => "ask",
            Self::SelectThreshold { .. } => "selectThreshold",
            Self::ShaclAllConform { .. } => "shaclAllConform",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Sparql,
    Template,
    File,
    Http,
    Git,
    Shell,
    Database,
    Filesystem,
    Conditional,
    Loop,
    Parallel,
    ErrorHandler,
    Notify,
}

impl StepKind {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "Sparql" | "sparql" => Self::Sparql,
            "Template" | "template" => Self::Template,
            "File" | "file" => Self::File,
            "Http" | "http" => Self::Http,
            "Git" | "git" => Self::Git,
            "Shell" | "shell" => Self::Shell,
            "Database" | "database" => Self::Database,
            "Filesystem" | "filesystem" => Self::Filesystem,
            "Conditional" | "conditional" => Self::Conditional,
            "Loop" | "loop" => Self::Loop,
            "Parallel" | "parallel" => Self::Parallel,
            "ErrorHandler" | "errorHandler" => Self::ErrorHandler,
            "Notify" | "notify" => Self::Notify,
            _ => return None,
        })
    }

    /// Config keys the step cannot run without, per the kind table in
    /// the Step Runner's contract.
    pub fn required_config_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Sparql => &["query"],
            Self::Template => &["template"],
            Self::File => &["src", "target", "mode"],
            Self::Http => &["url"],
            Self::Git => &["subcommand"],
            Self::Shell => &["argv"],
            Self::Database => &["query"],
            Self::Filesystem => &["path"],
            // `predicate` (a pre-resolved bool) and `query` (a SPARQL ASK
            // against the current graph) are alternative ways to supply
            // the condition; the runner enforces that at least one is
            // present when the step actually executes.
            Self::Conditional => &["then_branch"],
            Self::Loop => &["each", "body"],
            Self::Parallel => &["children"],
            Self::ErrorHandler => &["try", "catch"],
            Self::Notify => &["target", "payload"],
        }
    }
}

pub type StepConfig = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub config: StepConfig,
    pub depends_on: Vec<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookMetadata {
    pub parsed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: String,
    pub title: String,
    pub predicate: PredicateDef,
    pub workflows: Vec<Workflow>,
    pub metadata: HookMetadata,
}

impl Hook {
    pub fn is_fireable(&self) -> bool {
        !self.workflows.is_empty()
    }
}
