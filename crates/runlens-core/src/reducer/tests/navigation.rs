use super::*;
use pretty_assertions::assert_eq;

#[test]
fn entering_replay_fetches_list_only_when_connected() {
    let mut state = state();
    let effects = user(&mut state, UserAction::NextTab);
    assert_eq!(effects, vec![ConsoleEffect::RequestFrame]);

    user(&mut state, UserAction::NextTab);
    feed(
        &mut state,
        FeedAction::HealthProbed {
            probe: HealthProbe::Healthy,
            summary: None,
            detail: None,
        },
    );
    let effects = user(&mut state, UserAction::NextTab);
    assert_eq!(
        effects,
        vec![
            ConsoleEffect::FetchRuns(RunScope::Replay),
            ConsoleEffect::RequestFrame,
        ]
    );
}

#[test]
fn selection_stays_within_list() {
    let mut state = replay_state(&["a", "b"]);
    user(&mut state, UserAction::SelectPrev);
    assert_eq!(state.selected, 0);
    user(&mut state, UserAction::SelectNext);
    user(&mut state, UserAction::SelectNext);
    assert_eq!(state.selected, 1);
    assert_eq!(state.selected_run_id(), Some("b"));
}

#[test]
fn shorter_list_clamps_selection() {
    let mut state = replay_state(&["a", "b", "c"]);
    state.selected = 2;
    feed(
        &mut state,
        FeedAction::RunsLoaded {
            scope: RunScope::Replay,
            runs: vec![run("a")],
        },
    );
    assert_eq!(state.selected, 0);
}

#[test]
fn open_selected_marks_loading_and_requests_run() {
    let mut state = replay_state(&["a", "b"]);
    user(&mut state, UserAction::SelectNext);

    let effects = user(&mut state, UserAction::OpenSelected);

    assert_eq!(
        effects,
        vec![ConsoleEffect::LoadRun("b".to_string()), ConsoleEffect::RequestFrame]
    );
    assert_eq!(
        state.detail,
        DetailPane::Loading {
            run_id: "b".to_string()
        }
    );
}

#[test]
fn stale_detail_for_another_run_is_ignored() {
    let mut state = replay_state(&["a", "b"]);
    user(&mut state, UserAction::OpenSelected);

    let effects = feed(&mut state, FeedAction::DetailLoaded(Box::new(bundle("b"))));

    assert!(effects.is_empty());
    assert_eq!(state.detail.run_id(), Some("a"));
    assert!(state.detail.loaded().is_none());
}

#[test]
fn detail_failure_is_shown_for_current_run() {
    let mut state = replay_state(&["a"]);
    user(&mut state, UserAction::OpenSelected);
    feed(
        &mut state,
        FeedAction::DetailFailed {
            run_id: "a".to_string(),
            message: "not found".to_string(),
        },
    );
    assert_eq!(
        state.detail,
        DetailPane::Failed {
            run_id: "a".to_string(),
            message: "not found".to_string(),
        }
    );
}

#[test]
fn copy_prefers_open_run() {
    let mut state = replay_state(&["a", "b"]);
    open_with(&mut state, bundle("a"));
    user(&mut state, UserAction::SelectNext);

    let effects = user(&mut state, UserAction::CopyRunId);

    assert_eq!(
        effects,
        vec![
            ConsoleEffect::CopyToClipboard("a".to_string()),
            ConsoleEffect::RequestFrame,
        ]
    );
}

#[test]
fn quit_sets_flag_and_emits_quit() {
    let mut state = state();
    let effects = user(&mut state, UserAction::Quit);
    assert!(state.should_quit);
    assert_eq!(effects, vec![ConsoleEffect::Quit]);
}
