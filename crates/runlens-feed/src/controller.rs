use std::time::Instant;

use runlens_core::poll_state::BackoffSchedule;
use runlens_core::poll_state::PollPhase;
use runlens_core::poll_state::PollState;
use runlens_core::records::JobSnapshot;
use runlens_core::records::JobStatus;
use runlens_core::records::Trace;

use crate::contracts::FeedClient;

/// Raw result of one poll cycle, not yet applied to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollFetch {
    pub job: JobSnapshot,
    pub traces: Vec<Trace>,
}

/// What changed for the view after one applied poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub run_id: String,
    /// Set only the first time a job id is seen.
    pub job_id: Option<String>,
    pub status: JobStatus,
    /// Index of `new_traces[0]` in the server's trace list.
    pub start: usize,
    pub new_traces: Vec<Trace>,
    pub terminal: bool,
}

/// Drives one run's job observation against a [`FeedClient`].
#[derive(Debug, Clone)]
pub struct PollingController {
    run_id: String,
    state: PollState,
    schedule: BackoffSchedule,
}

impl PollingController {
    pub fn new(run_id: &str, schedule: BackoffSchedule) -> Self {
        Self::resume(run_id, 0, schedule)
    }

    /// Controller for a view that already shows the first `known_traces`.
    pub fn resume(run_id: &str, known_traces: usize, schedule: BackoffSchedule) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: PollState::with_known_traces(known_traces),
            schedule,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn phase(&self) -> PollPhase {
        self.state.phase()
    }

    pub fn start(&mut self) -> bool {
        let started = self.state.start();
        if started {
            tracing::info!(
                run_id = %self.run_id,
                known_traces = self.state.known_trace_count(),
                "observation started"
            );
        }
        started
    }

    pub fn stop(&mut self) {
        if self.state.phase() == PollPhase::Polling {
            tracing::info!(run_id = %self.run_id, "observation stopped");
        }
        self.state.stop();
    }

    /// Lets a parked controller catch up with a view that gathered traces
    /// elsewhere, such as a detail reload.
    pub fn skip_to(&mut self, known_traces: usize) {
        self.state.skip_to(known_traces);
    }

    /// Fetches status and traces when a poll is due. Either fetch failing
    /// skips the whole cycle, so a terminal status is only applied together
    /// with the traces that preceded it.
    pub fn poll<C: FeedClient + ?Sized>(&mut self, client: &C, now: Instant) -> Option<PollFetch> {
        if !self.state.is_due(now, &self.schedule) {
            return None;
        }
        self.state.begin_poll(now);

        let job = match client.execute_status(&self.run_id) {
            Ok(job) => job,
            Err(err) => {
                tracing::debug!(run_id = %self.run_id, error = %err, "poll skipped");
                return None;
            }
        };
        let traces = match client.tool_traces(&self.run_id) {
            Ok(traces) => traces,
            Err(err) => {
                tracing::debug!(run_id = %self.run_id, error = %err, "poll skipped");
                return None;
            }
        };
        Some(PollFetch { job, traces })
    }

    /// Applies a fetch. Returns `None` once observation was stopped or ended
    /// while the fetch was in flight.
    pub fn apply(&mut self, fetch: PollFetch, now: Instant) -> Option<PollUpdate> {
        if self.state.phase() != PollPhase::Polling {
            return None;
        }
        let PollFetch { job, traces } = fetch;

        let job_id = job
            .id
            .as_deref()
            .filter(|id| self.state.record_job(id))
            .map(str::to_string);

        let start = self.state.known_trace_count();
        let new_traces = self.state.take_new(&traces).to_vec();

        let terminal = self.state.observe_status(&job.status, now, &self.schedule);
        if terminal {
            tracing::info!(run_id = %self.run_id, status = job.status.label(), "observation finished");
        }

        Some(PollUpdate {
            run_id: self.run_id.clone(),
            job_id,
            status: job.status,
            start,
            new_traces,
            terminal,
        })
    }

    pub fn tick<C: FeedClient + ?Sized>(&mut self, client: &C, now: Instant) -> Option<PollUpdate> {
        let fetch = self.poll(client, now)?;
        self.apply(fetch, now)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use runlens_core::poll_state::BackoffLevel;

    use super::*;
    use crate::simulated::SimulatedFeedClient;

    fn tools(update: &PollUpdate) -> Vec<String> {
        update
            .new_traces
            .iter()
            .map(|trace| trace.inputs["path"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn started(run_id: &str) -> PollingController {
        let mut controller = PollingController::new(run_id, BackoffSchedule::default());
        assert!(controller.start());
        controller
    }

    #[test]
    fn growing_trace_feed_emits_only_new_entries() {
        let client = SimulatedFeedClient::new()
            .with_job("r", "job-1", vec![JobStatus::Running], 5)
            .with_trace_growth("r", vec![2, 5]);
        let mut controller = started("r");
        let t0 = Instant::now();

        let first = controller.tick(&client, t0).expect("first poll");
        assert_eq!(first.start, 0);
        assert_eq!(tools(&first), vec!["src/file_0.rs", "src/file_1.rs"]);
        assert_eq!(first.job_id.as_deref(), Some("job-1"));

        let second = controller
            .tick(&client, t0 + Duration::from_millis(500))
            .expect("second poll");
        assert_eq!(second.start, 2);
        assert_eq!(
            tools(&second),
            vec!["src/file_2.rs", "src/file_3.rs", "src/file_4.rs"]
        );
        assert_eq!(second.job_id, None);

        let third = controller
            .tick(&client, t0 + Duration::from_millis(1000))
            .expect("third poll");
        assert!(third.new_traces.is_empty());
    }

    #[test]
    fn polls_wait_for_the_interval() {
        let client = SimulatedFeedClient::new().with_job("r", "job-1", vec![JobStatus::Running], 0);
        let mut controller = started("r");
        let t0 = Instant::now();

        assert!(controller.tick(&client, t0).is_some());
        assert!(controller.tick(&client, t0 + Duration::from_millis(100)).is_none());
        assert!(controller.tick(&client, t0 + Duration::from_millis(400)).is_none());
        assert_eq!(client.calls("execute_status"), 1);
    }

    #[test]
    fn terminal_status_stops_all_fetching() {
        let client = SimulatedFeedClient::new().with_job(
            "r",
            "job-1",
            vec![JobStatus::Running, JobStatus::Succeeded],
            1,
        );
        let mut controller = started("r");
        let t0 = Instant::now();

        assert!(!controller.tick(&client, t0).expect("running").terminal);
        let done = controller
            .tick(&client, t0 + Duration::from_secs(1))
            .expect("succeeded");
        assert!(done.terminal);
        assert_eq!(controller.phase(), PollPhase::Terminal);

        for step in 2..10 {
            assert!(controller
                .tick(&client, t0 + Duration::from_secs(step))
                .is_none());
        }
        assert!(!controller.start());
        assert_eq!(client.calls("execute_status"), 2);
        assert_eq!(client.calls("tool_traces"), 2);
    }

    #[test]
    fn failed_fetch_skips_cycle_silently() {
        let client = SimulatedFeedClient::new().with_job("r", "job-1", vec![JobStatus::Running], 2);
        let mut controller = started("r");
        let t0 = Instant::now();

        client.set_reachable(false);
        assert!(controller.tick(&client, t0).is_none());
        assert_eq!(controller.state().known_trace_count(), 0);
        assert_eq!(controller.phase(), PollPhase::Polling);

        client.set_reachable(true);
        assert!(controller.tick(&client, t0 + Duration::from_millis(100)).is_none());
        let update = controller
            .tick(&client, t0 + Duration::from_millis(500))
            .expect("recovered");
        assert_eq!(update.new_traces.len(), 2);
    }

    #[test]
    fn trace_timeout_defers_terminal_status() {
        let client = SimulatedFeedClient::new()
            .with_job("r", "job-1", vec![JobStatus::Running, JobStatus::Succeeded], 5)
            .with_trace_growth("r", vec![2, 5, 5]);
        client.time_out_call("tool_traces", 2);
        let mut controller = started("r");
        let t0 = Instant::now();

        let mut emitted = Vec::new();
        let mut finished = false;
        for step in 0..10 {
            if let Some(update) = controller.tick(&client, t0 + Duration::from_secs(step)) {
                assert!(!finished);
                emitted.extend(tools(&update));
                finished = update.terminal;
            }
        }

        assert!(finished);
        assert_eq!(emitted.len(), 5);
        assert_eq!(emitted[4], "src/file_4.rs");
        assert_eq!(controller.phase(), PollPhase::Terminal);
        assert_eq!(client.calls("tool_traces"), 3);
    }

    #[test]
    fn stopped_controller_discards_in_flight_fetch() {
        let client = SimulatedFeedClient::new().with_job("r", "job-1", vec![JobStatus::Running], 3);
        let mut controller = started("r");
        let t0 = Instant::now();

        let fetch = controller.poll(&client, t0).expect("fetch");
        controller.stop();

        assert_eq!(controller.apply(fetch, t0), None);
        assert_eq!(controller.state().known_trace_count(), 0);
    }

    #[test]
    fn resumed_controller_skips_known_traces() {
        let client = SimulatedFeedClient::new().with_job("r", "job-1", vec![JobStatus::Running], 4);
        let mut controller = PollingController::resume("r", 3, BackoffSchedule::default());
        controller.start();

        let update = controller.tick(&client, Instant::now()).expect("poll");

        assert_eq!(update.start, 3);
        assert_eq!(tools(&update), vec!["src/file_3.rs"]);
    }

    #[test]
    fn long_queue_slows_the_cadence() {
        let client = SimulatedFeedClient::new().with_job("r", "job-1", vec![JobStatus::Queued], 0);
        let mut controller = started("r");
        let t0 = Instant::now();

        controller.tick(&client, t0);
        controller.tick(&client, t0 + Duration::from_secs(6));
        assert_eq!(controller.state().backoff(), BackoffLevel::Medium);

        assert!(controller.tick(&client, t0 + Duration::from_millis(6500)).is_none());
        controller.tick(&client, t0 + Duration::from_secs(16));
        assert_eq!(controller.state().backoff(), BackoffLevel::Slow);
    }
}
