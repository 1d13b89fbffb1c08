//! Wire records returned by the run service. Every field is optional or
//! defaulted so partial payloads still decode.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::proposal::proposals_from_value;
use crate::proposal::Proposal;
use crate::risk::TrustState;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Unknown(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRead {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_tier: Option<String>,
    #[serde(default)]
    pub speculative: Option<bool>,
    #[serde(default)]
    pub escalated_from: Option<String>,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub file_reads: Vec<FileRead>,
    #[serde(default)]
    pub why: BTreeMap<String, String>,
}

impl RunRecord {
    pub fn run_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.run_id.as_deref())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_used
            .as_deref()
            .filter(|model| !model.is_empty())
            .or_else(|| self.model.as_deref().filter(|model| !model.is_empty()))
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.output
            .get("proposals")
            .map(proposals_from_value)
            .unwrap_or_default()
    }

    pub fn output_text(&self, key: &str) -> Option<&str> {
        self.output.get(key).and_then(Value::as_str)
    }

    /// String items of an output list such as `assumptions` or `risks`.
    pub fn output_list(&self, key: &str) -> Vec<String> {
        self.output
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Proposed,
    Reviewed,
    Approved,
    Rejected,
    Executed,
}

impl ReviewState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "proposed" => Some(Self::Proposed),
            "reviewed" => Some(Self::Reviewed),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "executed" => Some(Self::Executed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Reviewed => "REVIEWED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Executed => "EXECUTED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<String>,
    #[serde(default)]
    pub trust_satisfied: bool,
}

impl ReviewRecord {
    pub fn review_state(&self) -> Option<ReviewState> {
        self.state_label().and_then(ReviewState::parse)
    }

    /// Raw state as reported, falling back to the last action taken.
    pub fn state_label(&self) -> Option<&str> {
        self.state.as_deref().or(self.action.as_deref())
    }

    pub fn is_approved(&self) -> bool {
        self.review_state() == Some(ReviewState::Approved)
    }

    pub fn reviewer_name(&self) -> Option<&str> {
        self.reviewer.as_deref().or(self.reviewed_by.as_deref())
    }

    pub fn trust(&self) -> TrustState {
        TrustState {
            trust_satisfied: self.trust_satisfied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceError {
    #[serde(default)]
    pub reason: Option<String>,
}

/// One recorded tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub why: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<TraceError>,
}

impl Trace {
    pub fn tool(&self) -> &str {
        self.tool_id.as_deref().unwrap_or("?")
    }

    pub fn duration_ms(&self) -> Option<i64> {
        let started = DateTime::parse_from_rfc3339(self.started_at.as_deref()?).ok()?;
        let finished = DateTime::parse_from_rfc3339(self.finished_at.as_deref()?).ok()?;
        Some((finished - started).num_milliseconds())
    }

    pub fn error_reason(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|error| error.reason.as_deref())
            .unwrap_or("unknown")
    }

    /// First `limit` keys of an object-shaped output.
    pub fn output_fields(&self, limit: usize) -> Vec<(&str, &Value)> {
        self.output
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .take(limit)
                    .map(|(key, value)| (key.as_str(), value))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub recent_errors: Vec<Value>,
    #[serde(default)]
    pub total_runs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub by_intent: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_model: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceStats {
    #[serde(default)]
    pub workspace_count: Option<u64>,
    #[serde(default)]
    pub total_workspaces: Option<u64>,
    #[serde(default)]
    pub total_files: Option<u64>,
    #[serde(default)]
    pub extensions: BTreeMap<String, u64>,
}

impl WorkspaceStats {
    pub fn workspaces(&self) -> Option<u64> {
        self.workspace_count.or(self.total_workspaces)
    }

    /// Most common extensions first; ties by name.
    pub fn top_extensions(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .extensions
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Staleness {
    #[serde(default)]
    pub potentially_stale: bool,
    #[serde(default)]
    pub stale_count: u64,
    #[serde(default)]
    pub fresh_count: u64,
    #[serde(default)]
    pub stale_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFiles {
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Outcome of an optional fetch while assembling a detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Missing,
    Failed(String),
}

impl<T> Availability<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            _ => None,
        }
    }
}

/// Everything fetched for one run's detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct RunBundle {
    pub run_id: String,
    pub run: RunRecord,
    pub review: Availability<ReviewRecord>,
    pub staleness: Availability<Staleness>,
    pub files: Availability<RunFiles>,
    pub job: Option<JobSnapshot>,
    pub traces: Vec<Trace>,
}

impl RunBundle {
    pub fn new(run_id: &str, run: RunRecord) -> Self {
        Self {
            run_id: run_id.to_string(),
            run,
            review: Availability::Missing,
            staleness: Availability::Missing,
            files: Availability::Missing,
            job: None,
            traces: Vec::new(),
        }
    }
}
