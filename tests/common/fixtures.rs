use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tickerflow::agents::{
    AgentBranchNode, AgentRunner, AnalyzerNode, FUNDAMENTAL_PROMPT, PRICE_PROMPT, SynthesizerNode,
    TRADING_PROMPT,
};
use tickerflow::engine::GraphEngine;
use tickerflow::event_bus::{EventBus, MemorySink};
use tickerflow::llm::{
    ChatProvider, CompletionRequest, CompletionResponse, ProviderError, RetryPolicy,
};
use tickerflow::routing::BranchId;
use tickerflow::tools::market::{CompanyOverview, NewsItem, PriceHistory, Quote};
use tickerflow::tools::{
    PaperBroker, StaticMarketData, fundamental_tools, price_tools, trading_tools,
};

/// Market fixture covering the tickers the scenario tests use.
pub fn fixture_market() -> Arc<StaticMarketData> {
    let data = StaticMarketData::new();

    for (ticker, price, cap) in [
        ("NVDA", 875.32, 2_150_000_000_000_u64),
        ("AMD", 162.50, 262_000_000_000_u64),
        ("TSLA", 250.00, 795_000_000_000_u64),
    ] {
        data.insert_quote(Quote {
            ticker: ticker.to_string(),
            price,
            previous_close: price * 0.99,
            change: price * 0.01,
            change_pct: 1.0,
            volume: 40_000_000,
            market_cap: cap,
            high_52w: price * 1.3,
            low_52w: price * 0.6,
        });
        data.insert_history(PriceHistory {
            ticker: ticker.to_string(),
            period: "1mo".to_string(),
            closes: vec![price * 0.9, price * 1.05, price * 0.95, price],
            highs: vec![price * 0.92, price * 1.08, price * 0.97, price * 1.01],
            lows: vec![price * 0.88, price * 1.02, price * 0.93, price * 0.98],
            volumes: vec![38_000_000, 45_000_000, 41_000_000, 40_000_000],
        });
        data.insert_news(
            ticker,
            vec![NewsItem {
                title: format!("{ticker} rallies on strong guidance"),
                source: "Newswire".to_string(),
                sentiment: "Bullish".to_string(),
            }],
        );
        data.insert_overview(CompanyOverview {
            ticker: ticker.to_string(),
            name: format!("{ticker} Inc."),
            sector: "Technology".to_string(),
            industry: "Semiconductors".to_string(),
            market_cap: cap,
            pe_ratio: Some(45.0),
            eps: Some(12.0),
            dividend_yield_pct: 0.03,
            high_52w: price * 1.3,
            low_52w: price * 0.6,
            avg_volume: 42_000_000,
            description: format!("{ticker} designs chips."),
        });
    }

    Arc::new(data)
}

/// Provider that never answers within a test's patience; used to exercise
/// caller cancellation.
pub struct StallingProvider;

#[async_trait]
impl ChatProvider for StallingProvider {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(CompletionResponse::text("too late"))
    }
}

/// Per-stage providers for assembling a test engine.
pub struct StageProviders {
    pub analyzer: Arc<dyn ChatProvider>,
    pub price: Arc<dyn ChatProvider>,
    pub fundamental: Arc<dyn ChatProvider>,
    pub trading: Arc<dyn ChatProvider>,
    pub synthesizer: Arc<dyn ChatProvider>,
}

/// Build an engine with one scripted provider per stage, a quiet memory-sink
/// event bus, and no retry backoff.
pub fn test_engine(
    providers: StageProviders,
    market: Arc<StaticMarketData>,
    broker: Arc<PaperBroker>,
) -> GraphEngine {
    let no_retry = RetryPolicy::none();

    GraphEngine::builder()
        .with_analyzer(Arc::new(
            AnalyzerNode::new(providers.analyzer).with_retry(no_retry),
        ))
        .with_branch(
            BranchId::Price,
            Arc::new(AgentBranchNode::new(
                AgentRunner::new(
                    BranchId::Price,
                    providers.price,
                    price_tools(market.clone()),
                    PRICE_PROMPT,
                )
                .with_retry(no_retry),
            )),
        )
        .with_branch(
            BranchId::Fundamental,
            Arc::new(AgentBranchNode::new(
                AgentRunner::new(
                    BranchId::Fundamental,
                    providers.fundamental,
                    fundamental_tools(market.clone()),
                    FUNDAMENTAL_PROMPT,
                )
                .with_retry(no_retry),
            )),
        )
        .with_branch(
            BranchId::Trading,
            Arc::new(AgentBranchNode::new(
                AgentRunner::new(
                    BranchId::Trading,
                    providers.trading,
                    trading_tools(broker),
                    TRADING_PROMPT,
                )
                .with_retry(no_retry),
            )),
        )
        .with_synthesizer(Arc::new(
            SynthesizerNode::new(providers.synthesizer).with_retry(no_retry),
        ))
        .with_event_bus(EventBus::with_sink(MemorySink::new()))
        .build()
        .expect("test engine wiring is complete")
}

/// Shorthand for a provider that classifies into the given intent/tickers.
pub fn classification(intent: &str, tickers: &[&str]) -> CompletionResponse {
    let tickers = tickers
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ");
    CompletionResponse::text(format!(
        "{{\"intent\": \"{intent}\", \"tickers\": [{tickers}]}}"
    ))
}
