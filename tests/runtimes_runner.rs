mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{StageProviders, classification, fixture_market, test_engine};
use tickerflow::llm::{CompletionResponse, ProviderError, ScriptedProvider};
use tickerflow::runtimes::{
    CLARIFICATION_REPLY, Checkpointer, InMemoryCheckpointer, RunnerError, SessionInit,
    SessionRunner, TurnStatus,
};
use tickerflow::state::ConversationState;
use tickerflow::tools::PaperBroker;

#[tokio::test]
async fn turns_accumulate_and_sessions_resume_from_checkpoints() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    // Two turns' worth of scripted responses per stage.
    let engine = Arc::new(test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![
                classification("PRICE", &["NVDA"]),
                classification("PRICE", &["AMD"]),
            ])),
            price: Arc::new(ScriptedProvider::sequence(vec![
                CompletionResponse::text("NVDA at $875.32."),
                CompletionResponse::text("AMD at $162.50."),
            ])),
            fundamental: Arc::new(ScriptedProvider::sequence(vec![])),
            trading: Arc::new(ScriptedProvider::sequence(vec![])),
            synthesizer: Arc::new(ScriptedProvider::sequence(vec![
                CompletionResponse::text("NVDA is trading at $875.32."),
                CompletionResponse::text("AMD is trading at $162.50."),
            ])),
        },
        market,
        broker,
    ));

    let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());

    let mut runner =
        SessionRunner::with_checkpointer(engine.clone(), Some(checkpointer.clone()), true);
    let init = runner
        .create_session("client-1".to_string(), ConversationState::default())
        .await
        .unwrap();
    assert_eq!(init, SessionInit::Fresh);

    let turn = runner.run_turn("client-1", "What's NVDA price?").await.unwrap();
    assert_eq!(turn.step, 1);
    assert_eq!(turn.status, TurnStatus::Answered);
    assert!(turn.reply.content.contains("875.32"));

    // A fresh runner sharing the checkpointer resumes the same session.
    let mut resumed_runner =
        SessionRunner::with_checkpointer(engine, Some(checkpointer), true);
    let init = resumed_runner
        .create_session("client-1".to_string(), ConversationState::default())
        .await
        .unwrap();
    assert_eq!(init, SessionInit::Resumed { checkpoint_step: 1 });

    let before_len = resumed_runner
        .get_session("client-1")
        .unwrap()
        .state
        .messages
        .len();
    assert_eq!(before_len, 2); // turn 1: user + assistant

    let turn = resumed_runner
        .run_turn("client-1", "And AMD?")
        .await
        .unwrap();
    assert_eq!(turn.step, 2);
    assert!(turn.reply.content.contains("162.50"));

    // Message history is monotonically non-decreasing across turns.
    let after_len = resumed_runner
        .get_session("client-1")
        .unwrap()
        .state
        .messages
        .len();
    assert_eq!(after_len, 4);
}

#[tokio::test]
async fn classification_failure_becomes_a_clarification_reply() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = Arc::new(test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::outcomes(vec![Err(
                ProviderError::Timeout,
            )])),
            price: Arc::new(ScriptedProvider::sequence(vec![])),
            fundamental: Arc::new(ScriptedProvider::sequence(vec![])),
            trading: Arc::new(ScriptedProvider::sequence(vec![])),
            synthesizer: Arc::new(ScriptedProvider::sequence(vec![])),
        },
        market,
        broker,
    ));

    let mut runner = SessionRunner::with_checkpointer(engine, None, false);
    runner
        .create_session("client-2".to_string(), ConversationState::default())
        .await
        .unwrap();

    let turn = runner.run_turn("client-2", "???").await.unwrap();
    assert_eq!(turn.status, TurnStatus::NeedsClarification);
    assert_eq!(turn.reply.content, CLARIFICATION_REPLY);

    // The aborted cycle is still committed as a turn: the user sees the
    // clarification request and the error is on the record.
    let session = runner.get_session("client-2").unwrap();
    assert_eq!(session.step, 1);
    assert_eq!(session.state.messages.len(), 2);
    assert!(!session.state.errors.is_empty());
}

#[tokio::test]
async fn cancelled_turn_leaves_session_state_untouched() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = Arc::new(test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "PRICE",
                &["NVDA"],
            )])),
            // The price branch hangs well past the caller's patience.
            price: Arc::new(common::StallingProvider),
            fundamental: Arc::new(ScriptedProvider::sequence(vec![])),
            trading: Arc::new(ScriptedProvider::sequence(vec![])),
            synthesizer: Arc::new(ScriptedProvider::sequence(vec![])),
        },
        market,
        broker,
    ));

    let mut runner = SessionRunner::with_checkpointer(engine, None, false);
    runner
        .create_session("client-3".to_string(), ConversationState::default())
        .await
        .unwrap();

    let err = runner
        .run_turn_with_timeout("client-3", "What's NVDA price?", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Cancelled { .. }));

    // No field was partially committed: the session still looks pre-turn.
    let session = runner.get_session("client-3").unwrap();
    assert_eq!(session.step, 0);
    assert_eq!(session.state.messages.len(), 0);
    assert!(session.state.results.is_empty());
    assert_eq!(session.state.decision.get(), None);
}

#[tokio::test]
async fn unknown_session_is_reported() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));
    let engine = Arc::new(test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![])),
            price: Arc::new(ScriptedProvider::sequence(vec![])),
            fundamental: Arc::new(ScriptedProvider::sequence(vec![])),
            trading: Arc::new(ScriptedProvider::sequence(vec![])),
            synthesizer: Arc::new(ScriptedProvider::sequence(vec![])),
        },
        market,
        broker,
    ));

    let mut runner = SessionRunner::with_checkpointer(engine, None, false);
    let err = runner.run_turn("nobody", "hi").await.unwrap_err();
    assert!(matches!(err, RunnerError::SessionNotFound { .. }));
}
