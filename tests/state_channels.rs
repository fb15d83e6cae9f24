use serde_json::{Value, json};
use tickerflow::channels::BranchOutcome;
use tickerflow::message::Message;
use tickerflow::routing::{BranchId, RouteAction};
use tickerflow::state::ConversationState;

#[test]
fn new_with_user_message_initializes_channels() {
    let state = ConversationState::new_with_user_message("hello");
    let snap = state.snapshot();
    assert_eq!(snap.messages.len(), 1);
    assert_eq!(snap.messages[0].role, "user");
    assert_eq!(snap.messages_version, 1);
    assert!(snap.context.is_empty());
    assert!(snap.results.is_empty());
    assert_eq!(snap.decision, None);
    assert!(snap.errors.is_empty());
}

#[test]
fn snapshot_is_a_deep_copy() {
    let mut state = ConversationState::new_with_user_message("x");
    let snap = state.snapshot();

    state.messages.get_mut()[0].content = "changed".into();
    state
        .context
        .get_mut()
        .insert("k".into(), Value::String("v".into()));
    state
        .results
        .get_mut()
        .insert(BranchId::Price, BranchOutcome::answer("late"));

    assert_eq!(snap.messages[0].content, "x");
    assert!(!snap.context.contains_key("k"));
    assert!(snap.results.is_empty());
}

#[test]
fn begin_cycle_appends_turn_and_clears_cycle_channels() {
    let mut state = ConversationState::new_with_user_message("first");
    state
        .results
        .get_mut()
        .insert(BranchId::Price, BranchOutcome::answer("stale"));
    state.decision.set(RouteAction::Both);

    state.begin_cycle("second");

    assert_eq!(state.messages.len(), 2);
    assert!(state.results.is_empty());
    assert_eq!(state.decision.get(), None);
}

#[test]
fn messages_length_is_monotonic_across_cycles() {
    let mut state = ConversationState::default();
    let mut last_len = 0;
    for turn in ["a", "b", "c"] {
        state.begin_cycle(turn);
        let _ = state.add_message(Message::ASSISTANT, "reply");
        assert!(state.messages.len() > last_len);
        last_len = state.messages.len();
    }
}

#[test]
fn snapshot_exposes_typed_context_accessors() {
    let state = ConversationState::builder()
        .with_user_message("Compare NVDA vs AMD")
        .with_context("intent", json!("COMPARISON"))
        .with_context("tickers", json!(["NVDA", "AMD"]))
        .build();

    let snap = state.snapshot();
    assert_eq!(
        snap.intent(),
        Some(tickerflow::routing::Intent::Comparison)
    );
    assert_eq!(snap.tickers(), vec!["NVDA", "AMD"]);
    assert_eq!(snap.current_query(), Some("Compare NVDA vs AMD"));
}

#[test]
fn recent_context_windows_the_tail() {
    let mut state = ConversationState::default();
    for i in 0..10 {
        let _ = state.add_message(Message::USER, &format!("m{i}"));
    }
    let snap = state.snapshot();
    let window = snap.recent_context(3);
    assert!(window.contains("m9"));
    assert!(window.contains("m7"));
    assert!(!window.contains("m6"));
}
