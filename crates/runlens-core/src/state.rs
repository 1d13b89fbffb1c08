use std::collections::VecDeque;

use crate::config::Config;
use crate::config::ReviewConfig;
use crate::connection::ConnectionMonitor;
use crate::diff_preview;
use crate::proposal::summarize;
use crate::proposal::ChangeSummary;
use crate::proposal::Proposal;
use crate::records::Availability;
use crate::records::HealthSummary;
use crate::records::JobSnapshot;
use crate::records::JobStatus;
use crate::records::ReviewRecord;
use crate::records::RunBundle;
use crate::records::RunFiles;
use crate::records::RunRecord;
use crate::records::RunStats;
use crate::records::Staleness;
use crate::records::Trace;
use crate::records::WorkspaceStats;
use crate::risk::assess;
use crate::risk::RiskAssessment;

pub const LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTab {
    Console,
    Replay,
}

impl ConsoleTab {
    pub fn label(self) -> &'static str {
        match self {
            Self::Console => "Console",
            Self::Replay => "Replay",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Console => Self::Replay,
            Self::Replay => Self::Console,
        }
    }
}

/// Which run list a fetch is for; the two views use different limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    Console,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub level: LogLevel,
    pub ts_ms: Option<u64>,
    pub run_id: Option<String>,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            level,
            ts_ms: Some(now_ms()),
            run_id: None,
            message: message.into(),
        }
    }

    pub fn for_run(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Bounded operator log, oldest evicted first.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, mut entry: LogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.buf.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.buf.back()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// A run's detail with its review material derived from the proposals.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDetail {
    pub run_id: String,
    pub run: RunRecord,
    pub review: Availability<ReviewRecord>,
    pub staleness: Availability<Staleness>,
    pub files: Availability<RunFiles>,
    pub job: Option<JobSnapshot>,
    pub traces: Vec<Trace>,
    pub proposals: Vec<Proposal>,
    pub summary: ChangeSummary,
    pub risk: RiskAssessment,
    pub diff: String,
}

impl RunDetail {
    pub fn from_bundle(bundle: RunBundle, review_config: &ReviewConfig) -> Self {
        let proposals = bundle.run.proposals();
        let summary = summarize(&proposals);
        let trust = bundle.review.available().map(ReviewRecord::trust);
        let risk = assess(&proposals, trust.as_ref());
        let diff = diff_preview::preview(&proposals, review_config.diff_max_lines);
        Self {
            run_id: bundle.run_id,
            run: bundle.run,
            review: bundle.review,
            staleness: bundle.staleness,
            files: bundle.files,
            job: bundle.job,
            traces: bundle.traces,
            proposals,
            summary,
            risk,
            diff,
        }
    }

    /// Approve and reject need the review endpoint to exist.
    pub fn can_review(&self) -> bool {
        !matches!(self.review, Availability::Missing)
    }

    /// Execution is only offered once the review approved the run.
    pub fn can_execute(&self) -> bool {
        self.review
            .available()
            .is_some_and(ReviewRecord::is_approved)
    }

    pub fn job_status(&self) -> Option<&JobStatus> {
        self.job.as_ref().map(|job| &job.status)
    }

    /// A job exists that has not reached a terminal status.
    pub fn has_live_job(&self) -> bool {
        self.job_status().is_some_and(|status| !status.is_terminal())
    }

    /// Merges traces that start at index `start` of the server's list.
    /// Indices already held are left alone.
    pub fn merge_traces(&mut self, start: usize, traces: Vec<Trace>) -> usize {
        let mut added = 0;
        for (offset, trace) in traces.into_iter().enumerate() {
            if start + offset == self.traces.len() {
                self.traces.push(trace);
                added += 1;
            }
        }
        added
    }

    pub fn set_job(&mut self, job_id: Option<String>, status: JobStatus) {
        match &mut self.job {
            Some(job) => {
                if job_id.is_some() {
                    job.id = job_id;
                }
                job.status = status;
            }
            None => {
                self.job = Some(JobSnapshot {
                    id: job_id,
                    status,
                    created_at: None,
                    started_at: None,
                    finished_at: None,
                    error: None,
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailPane {
    Empty,
    Loading { run_id: String },
    Failed { run_id: String, message: String },
    Loaded(Box<RunDetail>),
}

impl DetailPane {
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Loading { run_id } | Self::Failed { run_id, .. } => Some(run_id),
            Self::Loaded(detail) => Some(&detail.run_id),
        }
    }

    pub fn loaded(&self) -> Option<&RunDetail> {
        match self {
            Self::Loaded(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut RunDetail> {
        match self {
            Self::Loaded(detail) => Some(detail),
            _ => None,
        }
    }

    /// Loaded detail for exactly this run.
    pub fn loaded_for(&mut self, run_id: &str) -> Option<&mut RunDetail> {
        self.loaded_mut().filter(|detail| detail.run_id == run_id)
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleState {
    pub tab: ConsoleTab,
    pub connection: ConnectionMonitor,
    pub health: Option<HealthSummary>,
    pub recent_runs: Vec<RunRecord>,
    pub recent_runs_error: Option<String>,
    pub replay_runs: Vec<RunRecord>,
    pub replay_runs_error: Option<String>,
    pub run_stats: Option<RunStats>,
    pub workspace_stats: Option<WorkspaceStats>,
    pub selected: usize,
    pub detail: DetailPane,
    /// Run whose job is currently being observed.
    pub observing: Option<String>,
    pub notice: Option<String>,
    pub logs: LogBuffer,
    pub review_config: ReviewConfig,
    pub should_quit: bool,
}

impl ConsoleState {
    pub fn new(config: &Config) -> Self {
        Self {
            tab: ConsoleTab::Console,
            connection: config.connection_monitor(),
            health: None,
            recent_runs: Vec::new(),
            recent_runs_error: None,
            replay_runs: Vec::new(),
            replay_runs_error: None,
            run_stats: None,
            workspace_stats: None,
            selected: 0,
            detail: DetailPane::Empty,
            observing: None,
            notice: None,
            logs: LogBuffer::new(LOG_CAPACITY),
            review_config: config.review.clone(),
            should_quit: false,
        }
    }

    pub fn selected_run_id(&self) -> Option<&str> {
        self.replay_runs
            .get(self.selected)
            .and_then(RunRecord::run_id)
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.logs.append(entry);
    }
}
