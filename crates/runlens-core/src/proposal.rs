use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Action named by a proposal. Parsing is case-insensitive and never fails;
/// anything unrecognized is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProposalAction {
    Write,
    Edit,
    Create,
    Append,
    Delete,
    Rename,
    Other(String),
}

impl ProposalAction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "write" => Self::Write,
            "edit" => Self::Edit,
            "create" => Self::Create,
            "append" => Self::Append,
            "delete" => Self::Delete,
            "rename" => Self::Rename,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Write => "write",
            Self::Edit => "edit",
            Self::Create => "create",
            Self::Append => "append",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Write-class actions modify the workspace.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Only these carry old/new content worth counting or previewing.
    pub fn carries_content(&self) -> bool {
        matches!(self, Self::Write | Self::Edit)
    }
}

impl From<String> for ProposalAction {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ProposalAction> for String {
    fn from(action: ProposalAction) -> Self {
        action.label().to_string()
    }
}

/// One intended change inside a run's output. Every field is optional on
/// the wire; malformed entries degrade to a non-write proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ProposalAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, rename = "proposal", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default)]
    pub trust_required: bool,
}

impl Proposal {
    pub fn new(action: &str, target: &str) -> Self {
        Self {
            action: Some(ProposalAction::parse(action)),
            target: Some(target.to_string()),
            payload: None,
            trust_required: false,
        }
    }

    pub fn with_content(mut self, old: &str, new: &str) -> Self {
        self.payload = Some(serde_json::json!({
            "old_content": old,
            "new_content": new,
        }));
        self
    }

    pub fn with_trust_required(mut self) -> Self {
        self.trust_required = true;
        self
    }

    pub fn is_write(&self) -> bool {
        self.action.as_ref().is_some_and(ProposalAction::is_write)
    }

    pub fn action_label(&self) -> &str {
        self.action.as_ref().map_or("", ProposalAction::label)
    }

    /// Non-empty target, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|target| !target.is_empty())
    }

    /// Old and new text when the action carries content and the payload is
    /// an object with at least one textual side. A missing or non-text side
    /// reads as empty.
    pub fn content(&self) -> Option<ContentPair<'_>> {
        if !self.action.as_ref().is_some_and(ProposalAction::carries_content) {
            return None;
        }
        let payload = self.payload.as_ref()?.as_object()?;
        let old = payload.get("old_content").and_then(Value::as_str);
        let new = payload.get("new_content").and_then(Value::as_str);
        if old.is_none() && new.is_none() {
            return None;
        }
        Some(ContentPair {
            old: old.unwrap_or(""),
            new: new.unwrap_or(""),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentPair<'a> {
    pub old: &'a str,
    pub new: &'a str,
}

/// Parses a proposals array leniently. Anything that is not an array yields
/// nothing; array items that are not objects become empty proposals.
pub fn proposals_from_value(value: &Value) -> Vec<Proposal> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).unwrap_or_else(|_| lenient(item)))
        .collect()
}

fn lenient(item: &Value) -> Proposal {
    let field = |key: &str| item.get(key).and_then(Value::as_str);
    Proposal {
        action: field("action").map(ProposalAction::parse),
        target: field("target").map(str::to_string),
        payload: item.get("proposal").cloned(),
        trust_required: item
            .get("trust_required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub files_changed: usize,
    pub write_operations: bool,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Sorted and de-duplicated.
    pub affected_files: Vec<String>,
}

pub fn summarize(proposals: &[Proposal]) -> ChangeSummary {
    let mut files = BTreeSet::new();
    let mut lines_added = 0;
    let mut lines_removed = 0;
    let mut write_operations = false;

    for proposal in proposals.iter().filter(|p| p.is_write()) {
        write_operations = true;
        if let Some(target) = proposal.target() {
            files.insert(target.to_string());
        }
        if let Some(content) = proposal.content() {
            lines_removed += count_lines(content.old);
            lines_added += count_lines(content.new);
        }
    }

    ChangeSummary {
        files_changed: files.len(),
        write_operations,
        lines_added,
        lines_removed,
        affected_files: files.into_iter().collect(),
    }
}

/// Lines with visible content.
fn count_lines(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}
