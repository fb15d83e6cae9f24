use tickerflow::channels::Channel;
use tickerflow::routing::BranchId;
use tickerflow::state::ConversationState;

#[allow(dead_code)]
pub fn assert_message_contains(state: &ConversationState, needle: &str) {
    let msgs = state.messages.snapshot();
    let found = msgs.iter().any(|m| m.content.contains(needle));
    assert!(
        found,
        "expected at least one message containing '{needle}', got: {msgs:?}"
    );
}

#[allow(dead_code)]
pub fn assert_result_populated(state: &ConversationState, branch: BranchId) {
    assert!(
        state.results.contains(branch),
        "expected results key '{branch}' to be populated, got keys: {:?}",
        state.results.snapshot().keys().collect::<Vec<_>>()
    );
}
