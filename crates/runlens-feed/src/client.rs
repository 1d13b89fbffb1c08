use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::StatusCode;
use runlens_core::records::HealthSummary;
use runlens_core::records::JobSnapshot;
use runlens_core::records::ReviewDecision;
use runlens_core::records::ReviewRecord;
use runlens_core::records::RunFiles;
use runlens_core::records::RunRecord;
use runlens_core::records::RunStats;
use runlens_core::records::Staleness;
use runlens_core::records::Trace;
use runlens_core::records::WorkspaceStats;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;

use crate::contracts::ExecuteAccepted;
use crate::contracts::FeedClient;
use crate::contracts::FeedError;
use crate::contracts::FeedResult;
use crate::contracts::RunQuery;

#[derive(Debug, Deserialize)]
struct RunsEnvelope {
    #[serde(default)]
    runs: Vec<RunRecord>,
}

#[derive(Debug, Deserialize)]
struct TracesEnvelope {
    #[serde(default)]
    traces: Vec<Trace>,
}

/// Blocking HTTP client for the run service.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, timeout: Duration) -> FeedResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FeedError::Request(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> FeedResult<T> {
        self.send(path, self.http.get(self.url(path)).query(query))
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> FeedResult<T> {
        self.send(path, self.http.post(self.url(path)).json(body))
    }

    fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> FeedResult<T> {
        let response = request
            .send()
            .map_err(|err| self.transport_error(path, err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FeedError::EndpointMissing {
                path: path.to_string(),
            });
        }

        let body: Value = response
            .json()
            .map_err(|err| FeedError::Request(format!("invalid response from {path}: {err}")))?;
        let ok = body
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or(status.as_u16() < 400);
        if !ok {
            return Err(FeedError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body, status),
            });
        }

        serde_json::from_value(body)
            .map_err(|err| FeedError::Request(format!("unexpected payload from {path}: {err}")))
    }

    fn transport_error(&self, path: &str, err: reqwest::Error) -> FeedError {
        if err.is_timeout() {
            FeedError::Timeout {
                path: path.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else if err.is_connect() {
            FeedError::ConnectionRefused {
                base_url: self.base_url.clone(),
            }
        } else {
            FeedError::Request(err.to_string())
        }
    }
}

fn rejection_message(body: &Value, status: StatusCode) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request rejected").to_string())
}

impl FeedClient for HttpFeedClient {
    fn health(&self) -> FeedResult<()> {
        self.get::<Value>("/health", &[]).map(|_| ())
    }

    fn health_summary(&self) -> FeedResult<HealthSummary> {
        self.get("/health/summary", &[])
    }

    fn runs_list(&self, query: &RunQuery) -> FeedResult<Vec<RunRecord>> {
        let envelope: RunsEnvelope = self.get("/runs", &query.pairs())?;
        Ok(envelope.runs)
    }

    fn run_get(&self, run_id: &str) -> FeedResult<RunRecord> {
        self.get(&format!("/runs/{run_id}"), &[])
    }

    fn runs_stats(&self) -> FeedResult<RunStats> {
        self.get("/runs/stats", &[])
    }

    fn review_get(&self, run_id: &str) -> FeedResult<ReviewRecord> {
        self.get(&format!("/runs/{run_id}/review"), &[])
    }

    fn review_submit(
        &self,
        run_id: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> FeedResult<()> {
        let mut body = json!({
            "run_id": run_id,
            "action": decision.label(),
        });
        if let Some(comment) = comment.filter(|comment| !comment.is_empty()) {
            body["comment"] = json!(comment);
        }
        self.post::<Value>("/review", &body).map(|_| ())
    }

    fn staleness_get(&self, run_id: &str) -> FeedResult<Staleness> {
        self.get(&format!("/runs/{run_id}/staleness"), &[])
    }

    fn run_files(&self, run_id: &str) -> FeedResult<RunFiles> {
        self.get(&format!("/fs/run/{run_id}/files"), &[])
    }

    fn workspace_stats(&self) -> FeedResult<WorkspaceStats> {
        self.get("/workspace/stats", &[])
    }

    fn execute_run(&self, run_id: &str) -> FeedResult<ExecuteAccepted> {
        self.post(&format!("/runs/{run_id}/execute"), &json!({}))
    }

    fn execute_status(&self, run_id: &str) -> FeedResult<JobSnapshot> {
        self.get(&format!("/runs/{run_id}/execute"), &[])
    }

    fn job_get(&self, job_id: &str) -> FeedResult<JobSnapshot> {
        self.get(&format!("/jobs/{job_id}"), &[])
    }

    fn tool_traces(&self, run_id: &str) -> FeedResult<Vec<Trace>> {
        let envelope: TracesEnvelope = self.get(&format!("/runs/{run_id}/tool_traces"), &[])?;
        Ok(envelope.traces)
    }
}
