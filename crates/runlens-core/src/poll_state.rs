use std::time::Duration;
use std::time::Instant;

use crate::records::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Terminal,
}

impl PollPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Terminal => "terminal",
        }
    }
}

/// Poll cadence tiers, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackoffLevel {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub base: Duration,
    pub medium: Duration,
    pub slow: Duration,
    /// Queued longer than this steps to `medium`.
    pub medium_after: Duration,
    /// Queued longer than this steps to `slow`.
    pub slow_after: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            medium: Duration::from_millis(1000),
            slow: Duration::from_millis(2000),
            medium_after: Duration::from_secs(5),
            slow_after: Duration::from_secs(15),
        }
    }
}

impl BackoffSchedule {
    pub fn interval(&self, level: BackoffLevel) -> Duration {
        match level {
            BackoffLevel::Fast => self.base,
            BackoffLevel::Medium => self.medium,
            BackoffLevel::Slow => self.slow,
        }
    }
}

/// Next cadence tier given the latest status and how long the job has been
/// queued. Running always returns to the fast tier; a queued job only ever
/// slows down; anything else keeps the current tier.
pub fn next_backoff(
    current: BackoffLevel,
    status: &JobStatus,
    queued_for: Duration,
    schedule: &BackoffSchedule,
) -> BackoffLevel {
    match status {
        JobStatus::Running => BackoffLevel::Fast,
        JobStatus::Queued => {
            let stepped = if queued_for > schedule.slow_after {
                BackoffLevel::Slow
            } else if queued_for > schedule.medium_after {
                BackoffLevel::Medium
            } else {
                BackoffLevel::Fast
            };
            current.max(stepped)
        }
        _ => current,
    }
}

/// Per-run observation state. Owned by exactly one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    job_id: Option<String>,
    known_trace_count: usize,
    backoff: BackoffLevel,
    last_poll_at: Option<Instant>,
    queued_since: Option<Instant>,
    phase: PollPhase,
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollState {
    pub fn new() -> Self {
        Self::with_known_traces(0)
    }

    /// State for a run whose first `count` traces are already on screen.
    pub fn with_known_traces(count: usize) -> Self {
        Self {
            job_id: None,
            known_trace_count: count,
            backoff: BackoffLevel::Fast,
            last_poll_at: None,
            queued_since: None,
            phase: PollPhase::Idle,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn known_trace_count(&self) -> usize {
        self.known_trace_count
    }

    pub fn backoff(&self) -> BackoffLevel {
        self.backoff
    }

    /// Idle to polling. A terminal state never restarts.
    pub fn start(&mut self) -> bool {
        if self.phase == PollPhase::Idle {
            self.phase = PollPhase::Polling;
        }
        self.phase == PollPhase::Polling
    }

    /// Polling to idle; the trace cursor is kept.
    pub fn stop(&mut self) {
        if self.phase == PollPhase::Polling {
            self.phase = PollPhase::Idle;
        }
    }

    pub fn is_due(&self, now: Instant, schedule: &BackoffSchedule) -> bool {
        if self.phase != PollPhase::Polling {
            return false;
        }
        match self.last_poll_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= schedule.interval(self.backoff),
        }
    }

    /// Marks the start of an actual poll. Recorded before the fetch so a slow
    /// or failing fetch still waits a full interval before the next attempt.
    pub fn begin_poll(&mut self, now: Instant) {
        self.last_poll_at = Some(now);
    }

    /// Returns true when the id was not known before.
    pub fn record_job(&mut self, job_id: &str) -> bool {
        if self.job_id.as_deref() == Some(job_id) {
            return false;
        }
        self.job_id = Some(job_id.to_string());
        true
    }

    /// Slice of `traces` not seen before, advancing the cursor past it.
    /// A shorter list than already seen yields nothing and leaves the cursor.
    pub fn take_new<'a, T>(&mut self, traces: &'a [T]) -> &'a [T] {
        if traces.len() <= self.known_trace_count {
            return &[];
        }
        let fresh = &traces[self.known_trace_count..];
        self.known_trace_count = traces.len();
        fresh
    }

    /// Moves the cursor forward to `count` when the view already holds that
    /// many traces. Never moves it back.
    pub fn skip_to(&mut self, count: usize) {
        self.known_trace_count = self.known_trace_count.max(count);
    }

    /// Applies a fetched status: adjusts cadence and enters `Terminal` on a
    /// terminal status. Returns true when observation has ended.
    pub fn observe_status(
        &mut self,
        status: &JobStatus,
        now: Instant,
        schedule: &BackoffSchedule,
    ) -> bool {
        if status.is_terminal() {
            self.phase = PollPhase::Terminal;
            return true;
        }
        let queued_for = match status {
            JobStatus::Queued => {
                let since = *self.queued_since.get_or_insert(now);
                now.saturating_duration_since(since)
            }
            JobStatus::Running => {
                self.queued_since = None;
                Duration::ZERO
            }
            _ => Duration::ZERO,
        };
        self.backoff = next_backoff(self.backoff, status, queued_for, schedule);
        false
    }

    pub fn interval(&self, schedule: &BackoffSchedule) -> Duration {
        schedule.interval(self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn schedule() -> BackoffSchedule {
        BackoffSchedule::default()
    }

    #[test]
    fn running_resets_to_fast() {
        assert_eq!(
            next_backoff(BackoffLevel::Slow, &JobStatus::Running, Duration::from_secs(60), &schedule()),
            BackoffLevel::Fast
        );
    }

    #[test]
    fn queued_steps_down_with_elapsed_time() {
        let s = schedule();
        let level = |secs| next_backoff(BackoffLevel::Fast, &JobStatus::Queued, Duration::from_secs(secs), &s);
        assert_eq!(level(1), BackoffLevel::Fast);
        assert_eq!(level(5), BackoffLevel::Fast);
        assert_eq!(level(6), BackoffLevel::Medium);
        assert_eq!(level(16), BackoffLevel::Slow);
    }

    #[test]
    fn queued_never_speeds_up() {
        assert_eq!(
            next_backoff(BackoffLevel::Slow, &JobStatus::Queued, Duration::ZERO, &schedule()),
            BackoffLevel::Slow
        );
    }

    #[test]
    fn unknown_and_terminal_keep_level() {
        let s = schedule();
        for status in [
            JobStatus::Unknown("paused".to_string()),
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(
                next_backoff(BackoffLevel::Medium, &status, Duration::from_secs(30), &s),
                BackoffLevel::Medium
            );
        }
    }

    #[test]
    fn due_only_while_polling_and_after_interval() {
        let s = schedule();
        let t0 = Instant::now();
        let mut state = PollState::new();
        assert!(!state.is_due(t0, &s));

        assert!(state.start());
        assert!(state.is_due(t0, &s));
        state.begin_poll(t0);
        assert!(!state.is_due(t0 + Duration::from_millis(100), &s));
        assert!(state.is_due(t0 + Duration::from_millis(500), &s));

        state.stop();
        assert_eq!(state.phase(), PollPhase::Idle);
        assert!(!state.is_due(t0 + Duration::from_secs(10), &s));
    }

    #[test]
    fn trace_cursor_only_moves_forward() {
        let mut state = PollState::new();
        let feed = ["a", "b", "c", "d", "e"];

        assert_eq!(state.take_new(&feed[..2]), &["a", "b"]);
        assert_eq!(state.take_new(&feed[..2]), &[] as &[&str]);
        assert_eq!(state.take_new(&feed), &["c", "d", "e"]);
        assert_eq!(state.take_new(&feed[..1]), &[] as &[&str]);
        assert_eq!(state.known_trace_count(), 5);

        state.skip_to(3);
        assert_eq!(state.known_trace_count(), 5);
        state.skip_to(7);
        assert_eq!(state.known_trace_count(), 7);
    }

    #[test]
    fn long_queue_slows_polling_then_running_restores_it() {
        let s = schedule();
        let t0 = Instant::now();
        let mut state = PollState::new();
        state.start();

        state.observe_status(&JobStatus::Queued, t0, &s);
        assert_eq!(state.backoff(), BackoffLevel::Fast);
        state.observe_status(&JobStatus::Queued, t0 + Duration::from_secs(6), &s);
        assert_eq!(state.backoff(), BackoffLevel::Medium);
        state.observe_status(&JobStatus::Queued, t0 + Duration::from_secs(16), &s);
        assert_eq!(state.interval(&s), Duration::from_secs(2));

        state.observe_status(&JobStatus::Running, t0 + Duration::from_secs(17), &s);
        assert_eq!(state.interval(&s), Duration::from_millis(500));
    }

    #[test]
    fn terminal_status_ends_observation_for_good() {
        let s = schedule();
        let mut state = PollState::new();
        state.start();

        assert!(state.observe_status(&JobStatus::Succeeded, Instant::now(), &s));
        assert_eq!(state.phase(), PollPhase::Terminal);
        assert!(!state.start());
        assert!(!state.is_due(Instant::now() + Duration::from_secs(60), &s));
    }

    #[test]
    fn job_id_recorded_once() {
        let mut state = PollState::new();
        assert!(state.record_job("job-1"));
        assert!(!state.record_job("job-1"));
        assert_eq!(state.job_id(), Some("job-1"));
    }
}
