#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEffect {
    RequestFrame,
    ProbeHealth,
    FetchRuns(RunScope),
    FetchStats,
    LoadRun(String),
    SubmitReview {
        run_id: String,
        decision: ReviewDecision,
    },
    ExecuteRun(String),
    /// Resume or create the run's controller; the view already holds
    /// `known_traces` traces.
    StartObservation {
        run_id: String,
        known_traces: usize,
    },
    /// Cancel the worker and park its controller.
    StopObservation(String),
    CopyToClipboard(String),
    Quit,
}

use super::actions::ConsoleAction;
use super::actions::FeedAction;
use super::actions::UserAction;
use super::connection::ConnectionTransition;
use super::connection::HealthProbe;
use super::records::JobStatus;
use super::records::ReviewDecision;
use super::state::ConsoleState;
use super::state::ConsoleTab;
use super::state::DetailPane;
use super::state::LogEntry;
use super::state::LogLevel;
use super::state::RunDetail;
use super::state::RunScope;

pub fn reduce(state: &mut ConsoleState, action: ConsoleAction) -> Vec<ConsoleEffect> {
    match action {
        ConsoleAction::User(user) => reduce_user(state, user),
        ConsoleAction::Feed(feed) => reduce_feed(state, feed),
    }
}

fn reduce_user(state: &mut ConsoleState, action: UserAction) -> Vec<ConsoleEffect> {
    match action {
        UserAction::NextTab => {
            let mut effects = Vec::new();
            state.tab = state.tab.next();
            state.notice = None;
            match state.tab {
                ConsoleTab::Console => {
                    if let Some(run_id) = state.observing.take() {
                        effects.push(ConsoleEffect::StopObservation(run_id));
                    }
                }
                ConsoleTab::Replay => {
                    if state.connection.connected() {
                        effects.push(ConsoleEffect::FetchRuns(RunScope::Replay));
                    }
                    if let Some(start) = resume_observation(state) {
                        effects.push(start);
                    }
                }
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        UserAction::SelectNext => {
            if state.tab == ConsoleTab::Replay && state.selected + 1 < state.replay_runs.len() {
                state.selected += 1;
            }
            vec![ConsoleEffect::RequestFrame]
        }
        UserAction::SelectPrev => {
            if state.tab == ConsoleTab::Replay {
                state.selected = state.selected.saturating_sub(1);
            }
            vec![ConsoleEffect::RequestFrame]
        }
        UserAction::OpenSelected => {
            if state.tab != ConsoleTab::Replay {
                return Vec::new();
            }
            let Some(run_id) = state.selected_run_id().map(str::to_string) else {
                return Vec::new();
            };
            let mut effects = Vec::new();
            if let Some(observed) = state.observing.take() {
                effects.push(ConsoleEffect::StopObservation(observed));
            }
            state.notice = None;
            state.detail = DetailPane::Loading {
                run_id: run_id.clone(),
            };
            effects.push(ConsoleEffect::LoadRun(run_id));
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        UserAction::Refresh => {
            let mut effects = vec![ConsoleEffect::ProbeHealth];
            if state.tab == ConsoleTab::Replay {
                effects.push(ConsoleEffect::FetchRuns(RunScope::Replay));
                if let Some(run_id) = state.detail.run_id() {
                    effects.push(ConsoleEffect::LoadRun(run_id.to_string()));
                }
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        UserAction::Approve => submit_review(state, ReviewDecision::Approve),
        UserAction::Reject => submit_review(state, ReviewDecision::Reject),
        UserAction::Execute => {
            let Some(detail) = state.detail.loaded() else {
                return Vec::new();
            };
            if !detail.can_execute() {
                state.notice = Some("Execute requires an approved review".to_string());
                return vec![ConsoleEffect::RequestFrame];
            }
            if detail.has_live_job() {
                state.notice = Some("A job is already in progress".to_string());
                return vec![ConsoleEffect::RequestFrame];
            }
            let run_id = detail.run_id.clone();
            state.notice = Some(format!("Submitting execute for {run_id}"));
            vec![ConsoleEffect::ExecuteRun(run_id), ConsoleEffect::RequestFrame]
        }
        UserAction::CopyRunId => {
            let run_id = match state.tab {
                ConsoleTab::Replay => state
                    .detail
                    .run_id()
                    .or_else(|| state.selected_run_id())
                    .map(str::to_string),
                ConsoleTab::Console => state
                    .recent_runs
                    .first()
                    .and_then(|run| run.run_id())
                    .map(str::to_string),
            };
            match run_id {
                Some(run_id) => {
                    state.notice = Some(format!("Copied {run_id}"));
                    vec![ConsoleEffect::CopyToClipboard(run_id), ConsoleEffect::RequestFrame]
                }
                None => Vec::new(),
            }
        }
        UserAction::Quit => {
            state.should_quit = true;
            let mut effects = Vec::new();
            if let Some(run_id) = state.observing.take() {
                effects.push(ConsoleEffect::StopObservation(run_id));
            }
            effects.push(ConsoleEffect::Quit);
            effects
        }
    }
}

fn submit_review(state: &mut ConsoleState, decision: ReviewDecision) -> Vec<ConsoleEffect> {
    let Some(detail) = state.detail.loaded() else {
        return Vec::new();
    };
    if !detail.can_review() {
        state.notice = Some("Review endpoint not available".to_string());
        return vec![ConsoleEffect::RequestFrame];
    }
    let run_id = detail.run_id.clone();
    state.notice = Some(format!("Submitting {} for {run_id}", decision.label()));
    vec![
        ConsoleEffect::SubmitReview { run_id, decision },
        ConsoleEffect::RequestFrame,
    ]
}

/// Observation restarts only for the replay view's loaded run with a job
/// that has not finished.
fn resume_observation(state: &mut ConsoleState) -> Option<ConsoleEffect> {
    if state.tab != ConsoleTab::Replay || state.observing.is_some() {
        return None;
    }
    let detail = state.detail.loaded().filter(|detail| detail.has_live_job())?;
    let run_id = detail.run_id.clone();
    let known_traces = detail.traces.len();
    state.observing = Some(run_id.clone());
    Some(ConsoleEffect::StartObservation {
        run_id,
        known_traces,
    })
}

fn reduce_feed(state: &mut ConsoleState, action: FeedAction) -> Vec<ConsoleEffect> {
    match action {
        FeedAction::HealthProbed {
            probe,
            summary,
            detail,
        } => {
            let transition = state.connection.record(probe);
            if probe == HealthProbe::Healthy {
                state.health = summary;
            }
            let mut effects = Vec::new();
            match transition {
                ConnectionTransition::Lost { retry_in } => {
                    state.log(LogEntry::new(
                        LogLevel::Warn,
                        format!("Disconnected; retrying every {}s", retry_in.as_secs()),
                    ));
                }
                ConnectionTransition::Retrying { .. } => {}
                ConnectionTransition::Restored => {
                    state.log(LogEntry::new(LogLevel::Info, "Connected"));
                    if state.tab == ConsoleTab::Replay {
                        effects.push(ConsoleEffect::FetchRuns(RunScope::Replay));
                    }
                }
                ConnectionTransition::Unchanged => {
                    if let Some(detail) = detail.filter(|_| probe == HealthProbe::Failed) {
                        state.log(LogEntry::new(
                            LogLevel::Warn,
                            format!("Health check failed: {detail}"),
                        ));
                    }
                }
            }
            if state.connection.connected() {
                effects.push(ConsoleEffect::FetchRuns(RunScope::Console));
                effects.push(ConsoleEffect::FetchStats);
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        FeedAction::RunsLoaded { scope, runs } => {
            match scope {
                RunScope::Console => {
                    state.recent_runs = runs;
                    state.recent_runs_error = None;
                }
                RunScope::Replay => {
                    state.replay_runs = runs;
                    state.replay_runs_error = None;
                    if state.selected >= state.replay_runs.len() {
                        state.selected = state.replay_runs.len().saturating_sub(1);
                    }
                }
            }
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::RunsFailed { scope, message } => {
            match scope {
                RunScope::Console => state.recent_runs_error = Some(message),
                RunScope::Replay => state.replay_runs_error = Some(message),
            }
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::StatsLoaded { runs, workspace } => {
            if runs.is_some() {
                state.run_stats = runs;
            }
            if workspace.is_some() {
                state.workspace_stats = workspace;
            }
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::DetailLoaded(bundle) => {
            if state.detail.run_id() != Some(bundle.run_id.as_str()) {
                return Vec::new();
            }
            let previous = std::mem::replace(&mut state.detail, DetailPane::Empty);
            let mut detail = RunDetail::from_bundle(*bundle, &state.review_config);
            if let DetailPane::Loaded(previous) = previous {
                if previous.traces.len() > detail.traces.len() {
                    detail.traces = previous.traces;
                }
            }
            state.detail = DetailPane::Loaded(Box::new(detail));

            let mut effects = Vec::new();
            if let Some(start) = resume_observation(state) {
                effects.push(start);
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        FeedAction::DetailFailed { run_id, message } => {
            if state.detail.run_id() != Some(run_id.as_str()) {
                return Vec::new();
            }
            state.log(LogEntry::new(LogLevel::Error, format!("Failed to load run: {message}")).for_run(&run_id));
            state.detail = DetailPane::Failed { run_id, message };
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::ReviewSubmitted { run_id, decision } => {
            state.notice = Some(format!("Review {} recorded", decision.label()));
            state.log(
                LogEntry::new(LogLevel::Info, format!("Review {} submitted", decision.label()))
                    .for_run(&run_id),
            );
            let mut effects = Vec::new();
            if state.detail.run_id() == Some(run_id.as_str()) {
                effects.push(ConsoleEffect::LoadRun(run_id));
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        FeedAction::ReviewFailed { run_id, message } => {
            state.notice = Some(format!("Review failed: {message}"));
            state.log(LogEntry::new(LogLevel::Error, format!("Review failed: {message}")).for_run(&run_id));
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::ExecuteAccepted { run_id, job_id } => {
            state.notice = Some(format!("Job {job_id} queued"));
            state.log(LogEntry::new(LogLevel::Info, format!("Execution queued as {job_id}")).for_run(&run_id));
            let mut effects = Vec::new();
            let shown = match state.detail.loaded_for(&run_id) {
                Some(detail) => {
                    detail.set_job(Some(job_id), JobStatus::Queued);
                    true
                }
                None => false,
            };
            if shown && state.observing.as_deref() != Some(run_id.as_str()) {
                if let Some(previous) = state.observing.take() {
                    effects.push(ConsoleEffect::StopObservation(previous));
                }
                if let Some(start) = resume_observation(state) {
                    effects.push(start);
                }
            }
            effects.push(ConsoleEffect::RequestFrame);
            effects
        }
        FeedAction::ExecuteFailed { run_id, message } => {
            state.notice = Some(format!("Execute failed: {message}"));
            state.log(LogEntry::new(LogLevel::Error, format!("Execute failed: {message}")).for_run(&run_id));
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::TracesAppended {
            run_id,
            start,
            traces,
        } => match state.detail.loaded_for(&run_id) {
            Some(detail) => {
                detail.merge_traces(start, traces);
                vec![ConsoleEffect::RequestFrame]
            }
            None => Vec::new(),
        },
        FeedAction::JobStatusChanged {
            run_id,
            job_id,
            status,
        } => match state.detail.loaded_for(&run_id) {
            Some(detail) => {
                detail.set_job(job_id, status);
                vec![ConsoleEffect::RequestFrame]
            }
            None => Vec::new(),
        },
        FeedAction::ObservationEnded { run_id, status } => {
            if state.observing.as_deref() == Some(run_id.as_str()) {
                state.observing = None;
            }
            if let Some(detail) = state.detail.loaded_for(&run_id) {
                detail.set_job(None, status.clone());
            }
            state.log(
                LogEntry::new(LogLevel::Info, format!("Job finished: {}", status.label()))
                    .for_run(&run_id),
            );
            vec![ConsoleEffect::RequestFrame]
        }
        FeedAction::Log { level, message } => {
            state.log(LogEntry::new(level, message));
            vec![ConsoleEffect::RequestFrame]
        }
    }
}

#[cfg(test)]
mod tests;
