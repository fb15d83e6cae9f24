use serde_json::json;
use tickerflow::channels::{BranchOutcome, Channel};
use tickerflow::routing::{BranchId, RouteAction};
use tickerflow::runtimes::{Checkpoint, Checkpointer, InMemoryCheckpointer};
use tickerflow::state::ConversationState;

fn sample_state() -> ConversationState {
    let mut state = ConversationState::new_with_user_message("What's NVDA at?");
    let _ = state.add_context("intent", json!("PRICE"));
    state
        .results
        .get_mut()
        .insert(BranchId::Price, BranchOutcome::answer("NVDA at $875.32"));
    state.decision.set(RouteAction::Price);
    state
}

#[tokio::test]
async fn save_and_load_round_trip_preserves_channels() {
    let store = InMemoryCheckpointer::new();
    let state = sample_state();

    store
        .save(Checkpoint::new("sess1", 3, &state))
        .await
        .unwrap();

    let loaded = store.load_latest("sess1").await.unwrap().unwrap();
    assert_eq!(loaded.step, 3);
    assert_eq!(loaded.state.messages.snapshot(), state.messages.snapshot());
    assert_eq!(loaded.state.context.snapshot(), state.context.snapshot());
    assert_eq!(loaded.state.results.snapshot(), state.results.snapshot());
    assert_eq!(loaded.state.decision.get(), Some(RouteAction::Price));
}

#[tokio::test]
async fn load_of_unknown_session_is_empty() {
    let store = InMemoryCheckpointer::new();
    assert!(store.load_latest("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn save_replaces_whole_snapshot_per_session() {
    let store = InMemoryCheckpointer::new();
    let state = sample_state();

    store
        .save(Checkpoint::new("sess1", 1, &state))
        .await
        .unwrap();

    let mut next = state.clone();
    next.begin_cycle("and AMD?");
    store
        .save(Checkpoint::new("sess1", 2, &next))
        .await
        .unwrap();

    // A load observes the newer snapshot in full, never a blend.
    let loaded = store.load_latest("sess1").await.unwrap().unwrap();
    assert_eq!(loaded.step, 2);
    assert_eq!(loaded.state.messages.len(), 2);
    assert!(loaded.state.results.is_empty());
}

#[tokio::test]
async fn list_sessions_enumerates_saved_ids() {
    let store = InMemoryCheckpointer::new();
    let state = ConversationState::default();
    store
        .save(Checkpoint::new("alpha", 0, &state))
        .await
        .unwrap();
    store
        .save(Checkpoint::new("beta", 0, &state))
        .await
        .unwrap();

    let mut ids = store.list_sessions().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["alpha", "beta"]);
}
