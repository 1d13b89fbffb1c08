use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use runlens_core::records::HealthSummary;
use runlens_core::records::JobSnapshot;
use runlens_core::records::JobStatus;
use runlens_core::records::ReviewDecision;
use runlens_core::records::ReviewRecord;
use runlens_core::records::RunFiles;
use runlens_core::records::RunRecord;
use runlens_core::records::RunStats;
use runlens_core::records::Staleness;
use runlens_core::records::Trace;
use runlens_core::records::WorkspaceStats;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::contracts::ExecuteAccepted;
use crate::contracts::FeedClient;
use crate::contracts::FeedError;
use crate::contracts::FeedResult;
use crate::contracts::RunQuery;

const SIMULATED_URL: &str = "simulated://runlens";
const TOOL_ROTATION: [&str; 5] = ["read_file", "search", "propose_edit", "write_file", "run_tests"];

#[derive(Debug, Clone)]
struct ScriptedJob {
    job_id: String,
    statuses: Vec<JobStatus>,
    status_reads: usize,
    traces: Vec<Trace>,
    visible: Vec<usize>,
    trace_reads: usize,
}

impl ScriptedJob {
    fn new(job_id: &str, statuses: Vec<JobStatus>, traces: Vec<Trace>) -> Self {
        Self {
            job_id: job_id.to_string(),
            statuses,
            status_reads: 0,
            traces,
            visible: Vec::new(),
            trace_reads: 0,
        }
    }

    /// Status as of the last read, without advancing the script.
    fn current(&self) -> JobStatus {
        let index = self.status_reads.saturating_sub(1);
        scripted(&self.statuses, index).unwrap_or(JobStatus::Queued)
    }

    fn next_status(&mut self) -> JobStatus {
        let status = scripted(&self.statuses, self.status_reads).unwrap_or(JobStatus::Queued);
        self.status_reads += 1;
        status
    }

    fn next_traces(&mut self) -> Vec<Trace> {
        let count = scripted(&self.visible, self.trace_reads)
            .unwrap_or(self.traces.len())
            .min(self.traces.len());
        self.trace_reads += 1;
        self.traces[..count].to_vec()
    }

    fn snapshot(&self, status: JobStatus) -> JobSnapshot {
        JobSnapshot {
            id: Some(self.job_id.clone()),
            error: (status == JobStatus::Failed).then(|| "simulated failure".to_string()),
            status,
            created_at: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Entry `index` of a script, repeating the last entry once exhausted.
fn scripted<T: Clone>(script: &[T], index: usize) -> Option<T> {
    script.get(index.min(script.len().saturating_sub(1))).cloned()
}

#[derive(Debug, Default)]
struct SimulatedInner {
    unreachable: bool,
    runs: Vec<RunRecord>,
    reviews: BTreeMap<String, ReviewRecord>,
    staleness: BTreeMap<String, Staleness>,
    jobs: BTreeMap<String, ScriptedJob>,
    workspace: Option<WorkspaceStats>,
    calls: BTreeMap<&'static str, usize>,
    timeouts: BTreeMap<String, Vec<usize>>,
    next_job: u64,
}

impl SimulatedInner {
    fn enter(&mut self, endpoint: &'static str) -> FeedResult<()> {
        let call = self.calls.entry(endpoint).or_default();
        *call += 1;
        let call = *call;
        if self.unreachable {
            return Err(FeedError::ConnectionRefused {
                base_url: SIMULATED_URL.to_string(),
            });
        }
        if self
            .timeouts
            .get(endpoint)
            .is_some_and(|calls| calls.contains(&call))
        {
            return Err(FeedError::Timeout {
                path: endpoint.to_string(),
                secs: 10,
            });
        }
        Ok(())
    }

    fn run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.iter().find(|run| run.run_id() == Some(run_id))
    }

    fn require_run(&self, run_id: &str, path: String) -> FeedResult<&RunRecord> {
        self.run(run_id)
            .ok_or(FeedError::EndpointMissing { path })
    }
}

/// In-memory run service with scripted job progress. Each status read
/// advances the job's status script and each trace read its visibility script.
#[derive(Debug, Default)]
pub struct SimulatedFeedClient {
    inner: Mutex<SimulatedInner>,
}

impl SimulatedFeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(self, run: RunRecord) -> Self {
        self.lock().runs.push(run);
        self
    }

    pub fn with_review(self, run_id: &str, review: ReviewRecord) -> Self {
        self.lock().reviews.insert(run_id.to_string(), review);
        self
    }

    pub fn with_staleness(self, run_id: &str, staleness: Staleness) -> Self {
        self.lock().staleness.insert(run_id.to_string(), staleness);
        self
    }

    pub fn with_workspace(self, workspace: WorkspaceStats) -> Self {
        self.lock().workspace = Some(workspace);
        self
    }

    /// Attaches a job whose status reads walk `statuses` and whose trace list
    /// holds `trace_count` traces.
    pub fn with_job(self, run_id: &str, job_id: &str, statuses: Vec<JobStatus>, trace_count: usize) -> Self {
        let traces = (0..trace_count).map(sample_trace).collect();
        self.lock()
            .jobs
            .insert(run_id.to_string(), ScriptedJob::new(job_id, statuses, traces));
        self
    }

    /// Number of traces visible on each successive trace read.
    pub fn with_trace_growth(self, run_id: &str, visible: Vec<usize>) -> Self {
        if let Some(job) = self.lock().jobs.get_mut(run_id) {
            job.visible = visible;
        }
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().unreachable = !reachable;
    }

    /// Makes the `call`-th request to `endpoint` (counting from 1) time out.
    pub fn time_out_call(&self, endpoint: &str, call: usize) {
        self.lock()
            .timeouts
            .entry(endpoint.to_string())
            .or_default()
            .push(call);
    }

    /// How often an endpoint was called, reachable or not.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.lock().calls.get(endpoint).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulatedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_run(run_id: &str) -> RunRecord {
        RunRecord {
            id: Some(run_id.to_string()),
            intent: Some("propose".to_string()),
            task: Some("tidy the greeting".to_string()),
            workspace: Some("demo".to_string()),
            timestamp: Some("2026-03-02T09:15:00Z".to_string()),
            success: Some(true),
            model_used: Some("sim-large".to_string()),
            model_tier: Some("standard".to_string()),
            output: json!({
                "proposals": [{
                    "action": "edit",
                    "target": "src/greet.rs",
                    "trust_required": true,
                    "proposal": {
                        "old_content": "fn greet() {\n    println!(\"hi\");\n}",
                        "new_content": "fn greet(name: &str) {\n    println!(\"hi {name}\");\n}",
                    },
                }],
                "classification": "refactor",
                "assumptions": ["callers pass a name"],
            }),
            ..RunRecord::default()
        }
    }

    /// Demo data for `--simulate`.
    pub fn demo() -> Self {
        let failed = RunRecord {
            id: Some("run-1003".to_string()),
            intent: Some("execute".to_string()),
            workspace: Some("billing".to_string()),
            timestamp: Some("2026-03-02T10:02:11Z".to_string()),
            success: Some(false),
            model_used: Some("sim-small".to_string()),
            output: json!({"reason": "validation failed", "details": "target outside workspace"}),
            ..RunRecord::default()
        };
        let multi = RunRecord {
            id: Some("run-1002".to_string()),
            intent: Some("propose".to_string()),
            workspace: Some("billing".to_string()),
            timestamp: Some("2026-03-02T09:48:40Z".to_string()),
            success: Some(true),
            model_used: Some("sim-large".to_string()),
            escalated_from: Some("sim-small".to_string()),
            output: json!({
                "proposals": [
                    {"action": "create", "target": "docs/CHANGELOG.md",
                     "proposal": {"new_content": "# Changelog\n\n- invoices rounded per line"}},
                    {"action": "write", "target": "src/invoice.rs",
                     "proposal": {"old_content": "let total = sum;\n", "new_content": "let total = sum.round();\n"}},
                    {"action": "read", "target": "src/lib.rs"},
                ],
                "risks": ["rounding changes totals"],
            }),
            ..RunRecord::default()
        };
        Self::new()
            .with_run(failed)
            .with_run(multi)
            .with_run(Self::sample_run("run-1001"))
            .with_review(
                "run-1001",
                ReviewRecord {
                    state: Some("APPROVED".to_string()),
                    reviewer: Some("operator".to_string()),
                    trust_satisfied: true,
                    ..ReviewRecord::default()
                },
            )
            .with_review(
                "run-1002",
                ReviewRecord {
                    state: Some("PROPOSED".to_string()),
                    ..ReviewRecord::default()
                },
            )
            .with_staleness(
                "run-1002",
                Staleness {
                    potentially_stale: true,
                    stale_count: 1,
                    fresh_count: 2,
                    stale_files: vec!["src/invoice.rs".to_string()],
                },
            )
            .with_workspace(WorkspaceStats {
                workspace_count: Some(2),
                total_files: Some(184),
                extensions: [(".rs", 96), (".md", 21), (".toml", 9), (".json", 4)]
                    .into_iter()
                    .map(|(ext, count)| (ext.to_string(), count))
                    .collect(),
                ..WorkspaceStats::default()
            })
    }
}

/// A deterministic trace for position `index` of a job's trace list.
pub fn sample_trace(index: usize) -> Trace {
    let mut inputs = Map::new();
    inputs.insert("path".to_string(), json!(format!("src/file_{index}.rs")));
    Trace {
        tool_id: Some(TOOL_ROTATION[index % TOOL_ROTATION.len()].to_string()),
        inputs,
        why: None,
        started_at: Some(format!("2026-03-02T10:00:{:02}.000Z", index % 60)),
        finished_at: Some(format!("2026-03-02T10:00:{:02}.250Z", index % 60)),
        ok: true,
        output: json!({"index": index}),
        error: None,
    }
}

impl FeedClient for SimulatedFeedClient {
    fn health(&self) -> FeedResult<()> {
        self.lock().enter("health")
    }

    fn health_summary(&self) -> FeedResult<HealthSummary> {
        let mut inner = self.lock();
        inner.enter("health_summary")?;
        let judged: Vec<bool> = inner.runs.iter().filter_map(|run| run.success).collect();
        let succeeded = judged.iter().filter(|ok| **ok).count();
        let recent_errors = inner
            .runs
            .iter()
            .filter(|run| run.success == Some(false))
            .map(|run| {
                json!({
                    "run_id": run.run_id(),
                    "reason": run.output_text("reason").unwrap_or("unknown"),
                })
            })
            .collect();
        Ok(HealthSummary {
            success_rate: (!judged.is_empty()).then(|| succeeded as f64 / judged.len() as f64),
            recent_errors,
            total_runs: Some(inner.runs.len() as u64),
        })
    }

    fn runs_list(&self, query: &RunQuery) -> FeedResult<Vec<RunRecord>> {
        let mut inner = self.lock();
        inner.enter("runs_list")?;
        let runs = inner
            .runs
            .iter()
            .filter(|run| query.intent.is_none() || run.intent == query.intent)
            .filter(|run| query.workspace.is_none() || run.workspace == query.workspace)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(runs)
    }

    fn run_get(&self, run_id: &str) -> FeedResult<RunRecord> {
        let mut inner = self.lock();
        inner.enter("run_get")?;
        inner.require_run(run_id, format!("/runs/{run_id}")).cloned()
    }

    fn runs_stats(&self) -> FeedResult<RunStats> {
        let mut inner = self.lock();
        inner.enter("runs_stats")?;
        let mut stats = RunStats {
            total: Some(inner.runs.len() as u64),
            ..RunStats::default()
        };
        for run in &inner.runs {
            if let Some(intent) = &run.intent {
                *stats.by_intent.entry(intent.clone()).or_default() += 1;
            }
            if let Some(model) = run.model_name() {
                *stats.by_model.entry(model.to_string()).or_default() += 1;
            }
        }
        Ok(stats)
    }

    fn review_get(&self, run_id: &str) -> FeedResult<ReviewRecord> {
        let mut inner = self.lock();
        inner.enter("review_get")?;
        inner.require_run(run_id, format!("/runs/{run_id}"))?;
        inner
            .reviews
            .get(run_id)
            .cloned()
            .ok_or(FeedError::EndpointMissing {
                path: format!("/runs/{run_id}/review"),
            })
    }

    fn review_submit(
        &self,
        run_id: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> FeedResult<()> {
        let mut inner = self.lock();
        inner.enter("review_submit")?;
        inner.require_run(run_id, format!("/runs/{run_id}"))?;
        let state = match decision {
            ReviewDecision::Approve => "APPROVED",
            ReviewDecision::Reject => "REJECTED",
        };
        inner.reviews.insert(
            run_id.to_string(),
            ReviewRecord {
                state: Some(state.to_string()),
                action: Some(decision.label().to_string()),
                reviewer: Some("operator".to_string()),
                comment: comment.map(str::to_string),
                trust_satisfied: decision == ReviewDecision::Approve,
                ..ReviewRecord::default()
            },
        );
        Ok(())
    }

    fn staleness_get(&self, run_id: &str) -> FeedResult<Staleness> {
        let mut inner = self.lock();
        inner.enter("staleness_get")?;
        inner.require_run(run_id, format!("/runs/{run_id}"))?;
        Ok(inner.staleness.get(run_id).cloned().unwrap_or_default())
    }

    fn run_files(&self, run_id: &str) -> FeedResult<RunFiles> {
        let mut inner = self.lock();
        inner.enter("run_files")?;
        let run = inner.require_run(run_id, format!("/fs/run/{run_id}/files"))?;
        let mut files: Vec<String> = run
            .proposals()
            .iter()
            .filter_map(|proposal| proposal.target().map(str::to_string))
            .collect();
        files.extend(run.file_reads.iter().map(|read| read.path.clone()));
        files.sort();
        files.dedup();
        Ok(RunFiles { files })
    }

    fn workspace_stats(&self) -> FeedResult<WorkspaceStats> {
        let mut inner = self.lock();
        inner.enter("workspace_stats")?;
        inner.workspace.clone().ok_or(FeedError::EndpointMissing {
            path: "/workspace/stats".to_string(),
        })
    }

    fn execute_run(&self, run_id: &str) -> FeedResult<ExecuteAccepted> {
        let mut inner = self.lock();
        inner.enter("execute_run")?;
        inner.require_run(run_id, format!("/runs/{run_id}/execute"))?;
        let approved = inner
            .reviews
            .get(run_id)
            .is_some_and(ReviewRecord::is_approved);
        if !approved {
            return Err(FeedError::Rejected {
                status: 409,
                message: "run is not approved".to_string(),
            });
        }
        if inner
            .jobs
            .get(run_id)
            .is_some_and(|job| job.status_reads > 0 && !job.current().is_terminal())
        {
            return Err(FeedError::Rejected {
                status: 409,
                message: "a job is already running".to_string(),
            });
        }
        inner.next_job += 1;
        let job_id = format!("job-{}", inner.next_job);
        let statuses = vec![
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Succeeded,
        ];
        let mut job = ScriptedJob::new(&job_id, statuses, (0..4).map(sample_trace).collect());
        job.visible = vec![0, 1, 2, 3, 4];
        inner.jobs.insert(run_id.to_string(), job);
        Ok(ExecuteAccepted { job_id })
    }

    fn execute_status(&self, run_id: &str) -> FeedResult<JobSnapshot> {
        let mut inner = self.lock();
        inner.enter("execute_status")?;
        let job = inner
            .jobs
            .get_mut(run_id)
            .ok_or(FeedError::EndpointMissing {
                path: format!("/runs/{run_id}/execute"),
            })?;
        let status = job.next_status();
        Ok(job.snapshot(status))
    }

    fn job_get(&self, job_id: &str) -> FeedResult<JobSnapshot> {
        let mut inner = self.lock();
        inner.enter("job_get")?;
        inner
            .jobs
            .values()
            .find(|job| job.job_id == job_id)
            .map(|job| job.snapshot(job.current()))
            .ok_or(FeedError::EndpointMissing {
                path: format!("/jobs/{job_id}"),
            })
    }

    fn tool_traces(&self, run_id: &str) -> FeedResult<Vec<Trace>> {
        let mut inner = self.lock();
        inner.enter("tool_traces")?;
        inner
            .jobs
            .get_mut(run_id)
            .map(ScriptedJob::next_traces)
            .ok_or(FeedError::EndpointMissing {
                path: format!("/runs/{run_id}/tool_traces"),
            })
    }
}
