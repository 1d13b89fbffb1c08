use super::*;
use pretty_assertions::assert_eq;

fn log(state: &mut ConsoleState, message: &str) {
    let effects = feed(
        state,
        FeedAction::Log {
            level: LogLevel::Info,
            message: message.to_string(),
        },
    );
    assert_eq!(effects, vec![ConsoleEffect::RequestFrame]);
}

#[test]
fn log_buffer_seq_is_monotonic() {
    let mut state = state();
    log(&mut state, "one");
    log(&mut state, "two");
    log(&mut state, "three");

    let seqs: Vec<u64> = state.logs.iter().map(|entry| entry.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[test]
fn log_buffer_capacity_eviction_is_fifo() {
    let mut state = state();
    state.logs = LogBuffer::new(3);

    for value in ["1", "2", "3", "4", "5"] {
        log(&mut state, value);
    }

    let messages: Vec<&str> = state.logs.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, vec!["3", "4", "5"]);
    assert_eq!(state.logs.latest().map(|entry| entry.seq), Some(5));
}

#[test]
fn default_capacity_is_bounded() {
    let mut state = state();
    for i in 0..600 {
        log(&mut state, &i.to_string());
    }
    assert_eq!(state.logs.len(), 500);
    assert_eq!(state.logs.iter().next().map(|entry| entry.message.as_str()), Some("100"));
}
