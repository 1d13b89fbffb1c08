use super::*;
use pretty_assertions::assert_eq;

fn live_bundle(id: &str, traces: usize) -> RunBundle {
    let mut bundle = bundle(id);
    bundle.review = Availability::Available(review("APPROVED", false));
    bundle.job = Some(job(JobStatus::Running));
    bundle.traces = (0..traces).map(|i| trace(&format!("t{i}"))).collect();
    bundle
}

fn tools(state: &ConsoleState) -> Vec<String> {
    state
        .detail
        .loaded()
        .map(|detail| detail.traces.iter().map(|t| t.tool().to_string()).collect())
        .unwrap_or_default()
}

#[test]
fn opening_run_with_live_job_starts_observation() {
    let mut state = replay_state(&["a"]);
    let effects = open_with(&mut state, live_bundle("a", 2));

    assert_eq!(
        effects,
        vec![
            ConsoleEffect::StartObservation {
                run_id: "a".to_string(),
                known_traces: 2,
            },
            ConsoleEffect::RequestFrame,
        ]
    );
    assert_eq!(state.observing.as_deref(), Some("a"));
}

#[test]
fn finished_job_is_not_observed() {
    let mut state = replay_state(&["a"]);
    let mut done = live_bundle("a", 1);
    done.job = Some(job(JobStatus::Succeeded));

    let effects = open_with(&mut state, done);

    assert_eq!(effects, vec![ConsoleEffect::RequestFrame]);
    assert_eq!(state.observing, None);
}

#[test]
fn leaving_replay_parks_and_returning_resumes() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 1));

    let effects = user(&mut state, UserAction::NextTab);
    assert_eq!(
        effects,
        vec![
            ConsoleEffect::StopObservation("a".to_string()),
            ConsoleEffect::RequestFrame,
        ]
    );
    assert_eq!(state.observing, None);

    let effects = user(&mut state, UserAction::NextTab);
    assert!(effects.contains(&ConsoleEffect::StartObservation {
        run_id: "a".to_string(),
        known_traces: 1,
    }));
}

#[test]
fn opening_another_run_stops_current_observation() {
    let mut state = replay_state(&["a", "b"]);
    open_with(&mut state, live_bundle("a", 0));
    user(&mut state, UserAction::SelectNext);

    let effects = user(&mut state, UserAction::OpenSelected);

    assert_eq!(
        effects,
        vec![
            ConsoleEffect::StopObservation("a".to_string()),
            ConsoleEffect::LoadRun("b".to_string()),
            ConsoleEffect::RequestFrame,
        ]
    );
}

#[test]
fn appended_traces_extend_detail_without_duplicates() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 2));

    feed(
        &mut state,
        FeedAction::TracesAppended {
            run_id: "a".to_string(),
            start: 2,
            traces: vec![trace("t2"), trace("t3"), trace("t4")],
        },
    );
    feed(
        &mut state,
        FeedAction::TracesAppended {
            run_id: "a".to_string(),
            start: 2,
            traces: vec![trace("t2")],
        },
    );

    assert_eq!(tools(&state), vec!["t0", "t1", "t2", "t3", "t4"]);
}

#[test]
fn traces_for_other_runs_are_dropped() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 0));

    let effects = feed(
        &mut state,
        FeedAction::TracesAppended {
            run_id: "zzz".to_string(),
            start: 0,
            traces: vec![trace("x")],
        },
    );

    assert!(effects.is_empty());
    assert!(tools(&state).is_empty());
}

#[test]
fn observation_end_records_terminal_status() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 0));

    feed(
        &mut state,
        FeedAction::ObservationEnded {
            run_id: "a".to_string(),
            status: JobStatus::Failed,
        },
    );

    assert_eq!(state.observing, None);
    let detail = state.detail.loaded().expect("loaded");
    assert_eq!(detail.job_status(), Some(&JobStatus::Failed));
    assert!(!detail.has_live_job());
}

#[test]
fn accepted_execution_starts_observation() {
    let mut state = replay_state(&["a"]);
    let mut approved = bundle("a");
    approved.review = Availability::Available(review("APPROVED", false));
    approved.traces = vec![trace("old")];
    open_with(&mut state, approved);

    let effects = feed(
        &mut state,
        FeedAction::ExecuteAccepted {
            run_id: "a".to_string(),
            job_id: "job-2".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![
            ConsoleEffect::StartObservation {
                run_id: "a".to_string(),
                known_traces: 1,
            },
            ConsoleEffect::RequestFrame,
        ]
    );
    let detail = state.detail.loaded().expect("loaded");
    assert_eq!(detail.job_status(), Some(&JobStatus::Queued));
}

#[test]
fn reload_keeps_traces_gathered_by_observation() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 1));
    feed(
        &mut state,
        FeedAction::TracesAppended {
            run_id: "a".to_string(),
            start: 1,
            traces: vec![trace("t1"), trace("t2")],
        },
    );

    let effects = feed(&mut state, FeedAction::DetailLoaded(Box::new(live_bundle("a", 1))));

    assert_eq!(tools(&state), vec!["t0", "t1", "t2"]);
    assert_eq!(effects, vec![ConsoleEffect::RequestFrame]);
}

#[test]
fn live_job_blocks_second_execute() {
    let mut state = replay_state(&["a"]);
    open_with(&mut state, live_bundle("a", 0));

    let effects = user(&mut state, UserAction::Execute);

    assert_eq!(effects, vec![ConsoleEffect::RequestFrame]);
    assert_eq!(state.notice.as_deref(), Some("A job is already in progress"));
}
