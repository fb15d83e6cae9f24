//! Specialist agents and pipeline assembly.
//!
//! Each specialist branch pairs an [`AgentRunner`] (the bounded tool loop)
//! with its fixed domain tool set; [`analyst_team`] wires the standard
//! three-analyst pipeline into a [`GraphEngine`].

pub mod analyzer;
pub mod branch;
pub mod runner;
pub mod synthesizer;

pub use analyzer::AnalyzerNode;
pub use branch::AgentBranchNode;
pub use runner::{AgentRunReport, AgentRunner, DEFAULT_MAX_ROUNDS};
pub use synthesizer::{NO_DATA_REPLY, SynthesizerNode};

use std::sync::Arc;

use crate::engine::{EngineBuildError, GraphEngine};
use crate::llm::ChatProvider;
use crate::routing::BranchId;
use crate::tools::{Brokerage, MarketData, fundamental_tools, price_tools, trading_tools};

/// System instruction for the price branch.
pub const PRICE_PROMPT: &str = "You are a price analyst. Extract tickers from the context and \
fetch recent price data. Use get_stock_quote for the live price and get_historical_prices for \
range, drawdown, volume, and volatility questions. Answer with the numbers you retrieved.";

/// System instruction for the fundamental branch.
pub const FUNDAMENTAL_PROMPT: &str = "You are a fundamental analyst. Extract tickers from the \
context and gather company data: get_company_overview for fundamentals, \
get_financial_statements for income and balance-sheet figures, get_stock_news for recent news \
and sentiment, get_earnings for reported earnings. Pick tools to match the question.";

/// System instruction for the trading branch.
pub const TRADING_PROMPT: &str = "You are a trading agent for a paper-trading account. Execute \
buy/sell orders the user asked for with buy_stock or sell_stock. Use get_portfolio for holdings \
and balances, get_orders for order history. If the user says \"buy that\", resolve the ticker \
from the conversation. All trades are simulated.";

/// Assemble the standard financial analyst pipeline.
///
/// One inference provider serves every stage; each branch gets its fixed
/// domain tool set wired to the given market-data and brokerage backends.
pub fn analyst_team(
    provider: Arc<dyn ChatProvider>,
    market: Arc<dyn MarketData>,
    broker: Arc<dyn Brokerage>,
) -> Result<GraphEngine, EngineBuildError> {
    GraphEngine::builder()
        .with_analyzer(Arc::new(AnalyzerNode::new(provider.clone())))
        .with_branch(
            BranchId::Price,
            Arc::new(AgentBranchNode::new(AgentRunner::new(
                BranchId::Price,
                provider.clone(),
                price_tools(market.clone()),
                PRICE_PROMPT,
            ))),
        )
        .with_branch(
            BranchId::Fundamental,
            Arc::new(AgentBranchNode::new(AgentRunner::new(
                BranchId::Fundamental,
                provider.clone(),
                fundamental_tools(market),
                FUNDAMENTAL_PROMPT,
            ))),
        )
        .with_branch(
            BranchId::Trading,
            Arc::new(AgentBranchNode::new(AgentRunner::new(
                BranchId::Trading,
                provider.clone(),
                trading_tools(broker),
                TRADING_PROMPT,
            ))),
        )
        .with_synthesizer(Arc::new(SynthesizerNode::new(provider)))
        .build()
}
