use super::connection::HealthProbe;
use super::records::HealthSummary;
use super::records::JobStatus;
use super::records::ReviewDecision;
use super::records::RunBundle;
use super::records::RunRecord;
use super::records::RunStats;
use super::records::Trace;
use super::records::WorkspaceStats;
use super::state::LogLevel;
use super::state::RunScope;

#[derive(Debug, Clone)]
pub enum ConsoleAction {
    User(UserAction),
    Feed(FeedAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    NextTab,
    SelectNext,
    SelectPrev,
    OpenSelected,
    Refresh,
    Approve,
    Reject,
    Execute,
    CopyRunId,
    Quit,
}

/// Results reported back by background fetches and observation workers.
#[derive(Debug, Clone)]
pub enum FeedAction {
    HealthProbed {
        probe: HealthProbe,
        summary: Option<HealthSummary>,
        detail: Option<String>,
    },
    RunsLoaded {
        scope: RunScope,
        runs: Vec<RunRecord>,
    },
    RunsFailed {
        scope: RunScope,
        message: String,
    },
    StatsLoaded {
        runs: Option<RunStats>,
        workspace: Option<WorkspaceStats>,
    },
    DetailLoaded(Box<RunBundle>),
    DetailFailed {
        run_id: String,
        message: String,
    },
    ReviewSubmitted {
        run_id: String,
        decision: ReviewDecision,
    },
    ReviewFailed {
        run_id: String,
        message: String,
    },
    ExecuteAccepted {
        run_id: String,
        job_id: String,
    },
    ExecuteFailed {
        run_id: String,
        message: String,
    },
    /// `traces` continue the server's list at index `start`.
    TracesAppended {
        run_id: String,
        start: usize,
        traces: Vec<Trace>,
    },
    JobStatusChanged {
        run_id: String,
        job_id: Option<String>,
        status: JobStatus,
    },
    ObservationEnded {
        run_id: String,
        status: JobStatus,
    },
    Log {
        level: LogLevel,
        message: String,
    },
}
