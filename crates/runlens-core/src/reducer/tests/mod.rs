use pretty_assertions::assert_eq;
use serde_json::json;

pub(super) use super::reduce;
pub(super) use super::ConsoleEffect;
pub(super) use crate::actions::ConsoleAction;
pub(super) use crate::actions::FeedAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::config::Config;
pub(super) use crate::connection::HealthProbe;
pub(super) use crate::records::Availability;
pub(super) use crate::records::JobSnapshot;
pub(super) use crate::records::JobStatus;
pub(super) use crate::records::ReviewDecision;
pub(super) use crate::records::ReviewRecord;
pub(super) use crate::records::RunBundle;
pub(super) use crate::records::RunRecord;
pub(super) use crate::records::Trace;
pub(super) use crate::risk::RiskLevel;
pub(super) use crate::state::ConsoleState;
pub(super) use crate::state::ConsoleTab;
pub(super) use crate::state::DetailPane;
pub(super) use crate::state::LogBuffer;
pub(super) use crate::state::LogLevel;
pub(super) use crate::state::RunScope;

mod log_buffer;
mod navigation;
mod observation;

fn state() -> ConsoleState {
    ConsoleState::new(&Config::default())
}

fn user(state: &mut ConsoleState, action: UserAction) -> Vec<ConsoleEffect> {
    reduce(state, ConsoleAction::User(action))
}

fn feed(state: &mut ConsoleState, action: FeedAction) -> Vec<ConsoleEffect> {
    reduce(state, ConsoleAction::Feed(action))
}

fn run(id: &str) -> RunRecord {
    serde_json::from_value(json!({
        "id": id,
        "intent": "propose",
        "success": true,
        "output": {"proposals": [
            {"action": "write", "target": "src/main.rs", "trust_required": true,
             "proposal": {"old_content": "fn main() {}", "new_content": "fn main() {\n    run();\n}"}},
        ]},
    }))
    .expect("run fixture")
}

fn review(state: &str, trust_satisfied: bool) -> ReviewRecord {
    ReviewRecord {
        state: Some(state.to_string()),
        trust_satisfied,
        ..ReviewRecord::default()
    }
}

fn job(status: JobStatus) -> JobSnapshot {
    JobSnapshot {
        id: Some("job-1".to_string()),
        status,
        created_at: None,
        started_at: None,
        finished_at: None,
        error: None,
    }
}

fn trace(tool: &str) -> Trace {
    Trace {
        tool_id: Some(tool.to_string()),
        ok: true,
        ..Trace::default()
    }
}

fn bundle(id: &str) -> RunBundle {
    RunBundle::new(id, run(id))
}

/// Connected console on the replay tab with `ids` listed.
fn replay_state(ids: &[&str]) -> ConsoleState {
    let mut state = state();
    feed(
        &mut state,
        FeedAction::HealthProbed {
            probe: HealthProbe::Healthy,
            summary: None,
            detail: None,
        },
    );
    user(&mut state, UserAction::NextTab);
    feed(
        &mut state,
        FeedAction::RunsLoaded {
            scope: RunScope::Replay,
            runs: ids.iter().map(|id| run(id)).collect(),
        },
    );
    assert_eq!(state.tab, ConsoleTab::Replay);
    state
}

/// Opens the selected run and delivers `bundle` for it.
fn open_with(state: &mut ConsoleState, bundle: RunBundle) -> Vec<ConsoleEffect> {
    let effects = user(state, UserAction::OpenSelected);
    assert!(effects.contains(&ConsoleEffect::LoadRun(bundle.run_id.clone())));
    feed(state, FeedAction::DetailLoaded(Box::new(bundle)))
}
