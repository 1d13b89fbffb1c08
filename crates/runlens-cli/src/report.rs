//! Plain-text pieces shared by the console views and the `review`/`watch`
//! commands. Styling is left to the caller through [`Tone`].

use runlens_core::proposal::ChangeSummary;
use runlens_core::records::JobStatus;
use runlens_core::records::ReviewState;
use runlens_core::records::RunRecord;
use runlens_core::records::Trace;
use runlens_core::risk::RiskLevel;
use runlens_core::state::RunDetail;
use runlens_core::timeformat::format_timestamp;
use serde_json::Value;

pub const TRACE_OUTPUT_FIELDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Muted,
    Info,
    Good,
    Warn,
    Bad,
}

pub fn risk_tone(level: RiskLevel) -> Tone {
    match level {
        RiskLevel::Low => Tone::Good,
        RiskLevel::Medium => Tone::Warn,
        RiskLevel::High => Tone::Bad,
    }
}

pub fn success_rate_tone(rate: f64) -> Tone {
    if rate >= 0.8 {
        Tone::Good
    } else if rate >= 0.5 {
        Tone::Warn
    } else {
        Tone::Bad
    }
}

pub fn job_tone(status: &JobStatus) -> Tone {
    match status {
        JobStatus::Queued | JobStatus::Running => Tone::Warn,
        JobStatus::Succeeded => Tone::Good,
        JobStatus::Failed => Tone::Bad,
        JobStatus::Unknown(_) => Tone::Muted,
    }
}

/// `OK`, `FAIL` or `?` for a run's recorded outcome.
pub fn run_indicator(run: &RunRecord) -> (&'static str, Tone) {
    match run.success {
        Some(true) => ("OK", Tone::Good),
        Some(false) => ("FAIL", Tone::Bad),
        None => ("?", Tone::Warn),
    }
}

pub fn metrics_line(summary: &ChangeSummary) -> String {
    if !summary.write_operations {
        return "No file modifications proposed".to_string();
    }
    format!(
        "Files: {} | +{} / -{} lines",
        summary.files_changed, summary.lines_added, summary.lines_removed
    )
}

/// The first `limit` items and how many were left out.
pub fn limited<T>(items: &[T], limit: usize) -> (&[T], usize) {
    let shown = &items[..items.len().min(limit)];
    (shown, items.len() - shown.len())
}

/// One line for a health summary's recent error entry.
pub fn error_summary(error: &Value) -> String {
    let Some(fields) = error.as_object() else {
        return match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
    };
    let reason = ["reason", "error", "message"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str));
    let run_id = fields.get("run_id").and_then(Value::as_str);
    match (run_id, reason) {
        (Some(run_id), Some(reason)) => format!("{run_id}: {reason}"),
        (None, Some(reason)) => reason.to_string(),
        _ => error.to_string(),
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `✓  tool_id (Nms)`.
pub fn trace_headline(trace: &Trace) -> (String, Tone) {
    let (badge, tone) = if trace.ok {
        ("✓", Tone::Good)
    } else {
        ("✗", Tone::Bad)
    };
    let duration = trace
        .duration_ms()
        .map(|ms| format!(" ({ms}ms)"))
        .unwrap_or_default();
    (format!("{badge}  {}{duration}", trace.tool()), tone)
}

/// Inputs, then the first output fields of a successful trace or the error
/// reason of a failed one.
pub fn trace_details(trace: &Trace) -> Vec<(String, Tone)> {
    let mut lines: Vec<(String, Tone)> = trace
        .inputs
        .iter()
        .map(|(key, value)| (format!("input.{key}: {}", value_text(value)), Tone::Plain))
        .collect();
    if trace.ok {
        lines.extend(
            trace
                .output_fields(TRACE_OUTPUT_FIELDS)
                .into_iter()
                .map(|(key, value)| (format!("output.{key}: {}", value_text(value)), Tone::Plain)),
        );
    } else {
        lines.push((format!("error: {}", trace.error_reason()), Tone::Bad));
    }
    lines
}

/// `Proposed → <REVIEW> → <JOB STATUS>`, each stage with its tone.
pub fn timeline(detail: &RunDetail) -> Vec<(String, Tone)> {
    let mut stages = vec![("Proposed".to_string(), Tone::Muted)];
    if let Some(review) = detail.review.available() {
        if let Some(label) = review.state_label() {
            let tone = match review.review_state() {
                Some(ReviewState::Approved) => Tone::Info,
                Some(ReviewState::Reviewed) => Tone::Warn,
                Some(ReviewState::Rejected) => Tone::Bad,
                _ => Tone::Muted,
            };
            stages.push((label.to_string(), tone));
        }
    }
    if let Some(status) = detail.job_status() {
        stages.push((status.label().to_ascii_uppercase(), job_tone(status)));
    }
    stages
}

/// Proposed / approved / executed timestamps, outcome and model.
pub fn history(detail: &RunDetail) -> Vec<(&'static str, String, Tone)> {
    let mut rows = Vec::new();
    if let Some(timestamp) = detail.run.timestamp.as_deref().filter(|ts| !ts.is_empty()) {
        rows.push(("Proposed", format_timestamp(Some(timestamp)), Tone::Plain));
    }
    if let Some(review) = detail.review.available().filter(|review| review.is_approved()) {
        if let Some(reviewed_at) = review.reviewed_at.as_deref() {
            rows.push(("Approved", format_timestamp(Some(reviewed_at)), Tone::Plain));
        }
    }
    if let Some(job) = &detail.job {
        if let Some(finished_at) = job.finished_at.as_deref() {
            rows.push(("Executed", format_timestamp(Some(finished_at)), Tone::Plain));
            let tone = match job.status {
                JobStatus::Succeeded => Tone::Good,
                JobStatus::Failed => Tone::Bad,
                _ => Tone::Warn,
            };
            rows.push(("Outcome", job.status.label().to_string(), tone));
        }
    }
    if let Some(model) = detail.run.model_name() {
        rows.push(("Model", model.to_string(), Tone::Plain));
    }
    rows
}
