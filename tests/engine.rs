mod common;

use std::sync::Arc;

use serde_json::json;

use common::{
    assert_message_contains, assert_result_populated, classification, fixture_market, test_engine,
    StageProviders,
};
use tickerflow::agents::NO_DATA_REPLY;
use tickerflow::channels::{BranchOutcome, Channel};
use tickerflow::engine::{EngineBuildError, EngineError, GraphEngine};
use tickerflow::llm::{ChatProvider, CompletionResponse, ProviderError, ScriptedProvider};
use tickerflow::message::Message;
use tickerflow::routing::{BranchId, Intent, RouteAction};
use tickerflow::state::ConversationState;
use tickerflow::tools::market::Quote;
use tickerflow::tools::trading::OrderSide;
use tickerflow::tools::{Brokerage, PaperBroker};

fn text(content: &str) -> Arc<dyn ChatProvider> {
    Arc::new(ScriptedProvider::sequence(vec![CompletionResponse::text(
        content,
    )]))
}

fn unused() -> Arc<dyn ChatProvider> {
    // Any call against this provider errors, which would surface as a branch
    // failure the assertions below catch.
    Arc::new(ScriptedProvider::sequence(vec![]))
}

#[tokio::test]
async fn scenario_price_query_runs_single_branch() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let price_provider = Arc::new(ScriptedProvider::sequence(vec![
        CompletionResponse::tool_call("get_stock_quote", json!({"ticker": "NVDA"})),
        CompletionResponse::text("NVDA trades at $875.32, up 1% on the day."),
    ]));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "PRICE",
                &["NVDA"],
            )])),
            price: price_provider.clone(),
            fundamental: unused(),
            trading: unused(),
            synthesizer: text("NVDA is trading at $875.32 right now."),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("What's NVDA price?");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    assert_eq!(report.intent, Intent::Price);
    assert_eq!(report.action, RouteAction::Price);
    assert_eq!(report.ran_branches, vec![BranchId::Price]);
    assert!(!report.degraded);

    // Exactly one results key is populated.
    assert_eq!(state.results.len(), 1);
    assert_result_populated(&state, BranchId::Price);
    // Quote tool ran exactly once (one tool round, then the final answer).
    assert_eq!(price_provider.call_count(), 2);
    // Synthesis appended exactly one assistant reply.
    let assistant_count = state
        .messages
        .snapshot()
        .iter()
        .filter(|m| m.has_role(Message::ASSISTANT))
        .count();
    assert_eq!(assistant_count, 1);
    assert_message_contains(&state, "875.32");
}

#[tokio::test]
async fn scenario_comparison_fans_out_two_branches() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "COMPARISON",
                &["NVDA", "AMD"],
            )])),
            price: Arc::new(ScriptedProvider::sequence(vec![
                CompletionResponse::tool_call("get_stock_quote", json!({"ticker": "NVDA"})),
                CompletionResponse::text("NVDA at $875.32, AMD at $162.50."),
            ])),
            fundamental: Arc::new(ScriptedProvider::sequence(vec![
                CompletionResponse::tool_call("get_company_overview", json!({"ticker": "NVDA"})),
                CompletionResponse::text("NVDA leads in data-center revenue."),
            ])),
            trading: unused(),
            synthesizer: text("NVDA is larger and pricier; AMD trades cheaper."),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("Compare NVDA vs AMD");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    assert_eq!(report.action, RouteAction::Both);
    assert_eq!(
        report.ran_branches,
        vec![BranchId::Price, BranchId::Fundamental]
    );

    // Both branches populated their own distinct keys.
    assert_eq!(state.results.len(), 2);
    assert_result_populated(&state, BranchId::Price);
    assert_result_populated(&state, BranchId::Fundamental);
    assert!(!state.results.contains(BranchId::Trading));
}

#[tokio::test]
async fn scenario_trade_invokes_buy_tool_with_arguments() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "TRADE",
                &["TSLA"],
            )])),
            price: unused(),
            fundamental: unused(),
            trading: Arc::new(ScriptedProvider::sequence(vec![
                CompletionResponse::tool_call(
                    "buy_stock",
                    json!({"ticker": "TSLA", "quantity": 10}),
                ),
                CompletionResponse::text("Bought 10 shares of TSLA at $250.00."),
            ])),
            synthesizer: text("Done - 10 TSLA shares purchased in your paper account."),
        },
        market,
        broker.clone(),
    );

    let mut state = ConversationState::default();
    state.begin_cycle("Buy 10 shares of TSLA");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    assert_eq!(report.action, RouteAction::Trading);
    assert_eq!(state.results.len(), 1);
    assert_result_populated(&state, BranchId::Trading);

    // The order actually hit the brokerage with the requested arguments.
    let orders = broker.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].ticker, "TSLA");
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert!((orders[0].quantity - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn scenario_failing_branch_never_blocks_its_sibling() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    // Fundamental: the news tool fails (unknown ticker), then inference dies.
    let fundamental = Arc::new(ScriptedProvider::outcomes(vec![
        Ok(CompletionResponse::tool_call(
            "get_stock_news",
            json!({"ticker": "XYZQ"}),
        )),
        Err(ProviderError::Transport("upstream 500".into())),
    ]));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "COMPARISON",
                &["NVDA", "AMD"],
            )])),
            price: Arc::new(ScriptedProvider::sequence(vec![CompletionResponse::text(
                "NVDA at $875.32.",
            )])),
            fundamental,
            trading: unused(),
            synthesizer: text("Price data says NVDA is at $875.32; news is unavailable."),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("Compare NVDA vs AMD");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    // The cycle progressed past the join barrier and is not degraded.
    assert!(!report.degraded);

    // Price succeeded, fundamental committed its failure sentinel.
    assert!(matches!(
        state.results.get(BranchId::Price),
        Some(BranchOutcome::Answer { .. })
    ));
    assert!(matches!(
        state.results.get(BranchId::Fundamental),
        Some(BranchOutcome::Failed { .. })
    ));

    // Synthesis still produced a user-visible reply.
    assert_message_contains(&state, "875.32");
    // The branch failure was recorded on the errors channel.
    assert!(!state.errors.is_empty());
}

#[tokio::test]
async fn total_fanout_failure_yields_degraded_response() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "PRICE",
                &["NVDA"],
            )])),
            price: Arc::new(ScriptedProvider::outcomes(vec![Err(
                ProviderError::Timeout,
            )])),
            fundamental: unused(),
            trading: unused(),
            // Degraded synthesis must not call inference at all.
            synthesizer: unused(),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("What's NVDA price?");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    assert!(report.degraded);
    assert_message_contains(&state, NO_DATA_REPLY);
}

#[tokio::test]
async fn classification_failure_aborts_before_routing() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::outcomes(vec![Err(
                ProviderError::Timeout,
            )])),
            price: unused(),
            fundamental: unused(),
            trading: unused(),
            synthesizer: unused(),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("???");
    let err = engine.run_cycle(&mut state, 1).await.unwrap_err();

    assert!(matches!(err, EngineError::Classification { .. }));
    // Nothing was routed or dispatched.
    assert_eq!(state.decision.get(), None);
    assert!(state.results.is_empty());
}

#[tokio::test]
async fn builder_rejects_incomplete_pipelines() {
    let err = GraphEngine::builder()
        .with_analyzer(Arc::new(tickerflow::agents::AnalyzerNode::new(unused())))
        .with_synthesizer(Arc::new(tickerflow::agents::SynthesizerNode::new(unused())))
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineBuildError::MissingBranch(_)));
}

#[tokio::test]
async fn unknown_intent_routes_to_default_action() {
    let market = fixture_market();
    let broker = Arc::new(PaperBroker::new(market.clone()));

    // Make the default branch's data exist for an arbitrary ticker.
    market.insert_quote(Quote {
        ticker: "MSFT".into(),
        price: 430.0,
        previous_close: 428.0,
        change: 2.0,
        change_pct: 0.47,
        volume: 20_000_000,
        market_cap: 3_200_000_000_000,
        high_52w: 460.0,
        low_52w: 310.0,
    });

    let engine = test_engine(
        StageProviders {
            analyzer: Arc::new(ScriptedProvider::sequence(vec![classification(
                "GREETING",
                &["MSFT"],
            )])),
            price: Arc::new(ScriptedProvider::sequence(vec![CompletionResponse::text(
                "MSFT is at $430.",
            )])),
            fundamental: unused(),
            trading: unused(),
            synthesizer: text("MSFT trades at $430."),
        },
        market,
        broker,
    );

    let mut state = ConversationState::default();
    state.begin_cycle("hello there MSFT");
    let report = engine.run_cycle(&mut state, 1).await.unwrap();

    assert_eq!(report.intent, Intent::Unknown);
    assert_eq!(report.action, RouteAction::Price);
    assert_result_populated(&state, BranchId::Price);
}
