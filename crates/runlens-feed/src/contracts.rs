use runlens_core::connection::HealthProbe;
use runlens_core::records::Availability;
use runlens_core::records::HealthSummary;
use runlens_core::records::JobSnapshot;
use runlens_core::records::ReviewDecision;
use runlens_core::records::ReviewRecord;
use runlens_core::records::RunBundle;
use runlens_core::records::RunFiles;
use runlens_core::records::RunRecord;
use runlens_core::records::RunStats;
use runlens_core::records::Staleness;
use runlens_core::records::Trace;
use runlens_core::records::WorkspaceStats;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("endpoint not available: {path}")]
    EndpointMissing { path: String },
    #[error("cannot connect to {base_url}")]
    ConnectionRefused { base_url: String },
    #[error("request to {path} timed out after {secs}s")]
    Timeout { path: String, secs: u64 },
    #[error("{status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
}

impl FeedError {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EndpointMissing { .. } => "missing_endpoint",
            Self::ConnectionRefused { .. } => "connection_refused",
            Self::Timeout { .. } => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::Request(_) => "request_error",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::EndpointMissing { .. })
    }
}

/// Filters for the run list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

impl RunQuery {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(intent) = &self.intent {
            pairs.push(("intent", intent.clone()));
        }
        if let Some(workspace) = &self.workspace {
            pairs.push(("workspace", workspace.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteAccepted {
    pub job_id: String,
}

/// The remote run service. Every call is blocking and may fail with any
/// [`FeedError`]; callers decide which failures matter.
pub trait FeedClient: Send + Sync {
    fn health(&self) -> FeedResult<()>;

    fn health_summary(&self) -> FeedResult<HealthSummary>;

    fn runs_list(&self, query: &RunQuery) -> FeedResult<Vec<RunRecord>>;

    fn run_get(&self, run_id: &str) -> FeedResult<RunRecord>;

    fn runs_stats(&self) -> FeedResult<RunStats>;

    fn review_get(&self, run_id: &str) -> FeedResult<ReviewRecord>;

    fn review_submit(
        &self,
        run_id: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> FeedResult<()>;

    fn staleness_get(&self, run_id: &str) -> FeedResult<Staleness>;

    fn run_files(&self, run_id: &str) -> FeedResult<RunFiles>;

    fn workspace_stats(&self) -> FeedResult<WorkspaceStats>;

    fn execute_run(&self, run_id: &str) -> FeedResult<ExecuteAccepted>;

    fn execute_status(&self, run_id: &str) -> FeedResult<JobSnapshot>;

    fn job_get(&self, job_id: &str) -> FeedResult<JobSnapshot>;

    fn tool_traces(&self, run_id: &str) -> FeedResult<Vec<Trace>>;
}

/// Liveness probe for the connection monitor. Only a refused connection
/// counts as lost; other failures carry a detail for the operator log.
pub fn probe_health<C: FeedClient + ?Sized>(client: &C) -> (HealthProbe, Option<String>) {
    match client.health() {
        Ok(()) => (HealthProbe::Healthy, None),
        Err(FeedError::ConnectionRefused { .. }) => (HealthProbe::Refused, None),
        Err(err) => (HealthProbe::Failed, Some(err.to_string())),
    }
}

/// Fetches a run with everything its detail view shows. Only the run record
/// itself is required; the other endpoints degrade to `Missing` or `Failed`.
pub fn load_bundle<C: FeedClient + ?Sized>(client: &C, run_id: &str) -> FeedResult<RunBundle> {
    let run = client.run_get(run_id)?;
    let mut bundle = RunBundle::new(run_id, run);
    bundle.review = availability(client.review_get(run_id));
    bundle.staleness = availability(client.staleness_get(run_id));
    bundle.files = availability(client.run_files(run_id));
    bundle.job = match client.execute_status(run_id) {
        Ok(job) => Some(job),
        Err(err) => {
            if !err.is_missing() {
                tracing::debug!(run_id = %run_id, error = %err, "execution status unavailable");
            }
            None
        }
    };
    bundle.traces = match client.tool_traces(run_id) {
        Ok(traces) => traces,
        Err(err) => {
            if !err.is_missing() {
                tracing::debug!(run_id = %run_id, error = %err, "tool traces unavailable");
            }
            Vec::new()
        }
    };
    Ok(bundle)
}

fn availability<T>(result: FeedResult<T>) -> Availability<T> {
    match result {
        Ok(value) => Availability::Available(value),
        Err(FeedError::EndpointMissing { .. }) => Availability::Missing,
        Err(err) => Availability::Failed(err.to_string()),
    }
}
