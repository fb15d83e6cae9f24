//! Domain tools and name-keyed dispatch.
//!
//! Tools are the external operations an agent loop can invoke: market-data
//! lookups and paper-trading actions. The engine depends only on name-based
//! dispatch through [`ToolRegistry`] and the result/failure shape, never on
//! tool internals. Each specialist domain exposes a fixed registry:
//!
//! - price: `get_stock_quote`, `get_historical_prices`
//! - fundamentals: `get_stock_news`, `get_company_overview`,
//!   `get_financial_statements`, `get_earnings`
//! - trading: `buy_stock`, `sell_stock`, `get_portfolio`, `get_orders`

pub mod fundamental;
pub mod market;
pub mod price;
pub mod registry;
pub mod trading;

pub use fundamental::fundamental_tools;
pub use market::{MarketData, MarketDataError, StaticMarketData};
pub use price::price_tools;
pub use registry::ToolRegistry;
pub use trading::{Brokerage, PaperBroker, trading_tools};

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// An invocable domain operation.
///
/// Implementations parse their own arguments from the JSON value the model
/// supplied and render their result as display-ready text; the agent loop
/// treats both sides opaquely.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the arguments object.
    fn parameters(&self) -> Value;
    async fn invoke(&self, args: Value) -> Result<String, ToolError>;
}

/// Failures from a single tool invocation.
///
/// Tool errors are recovered inside the agent loop (recorded, loop continues);
/// they never abort a branch on their own.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("invalid arguments for tool '{tool}': {reason}")]
    #[diagnostic(code(tickerflow::tools::invalid_arguments))]
    InvalidArguments { tool: &'static str, reason: String },

    #[error("market data error: {0}")]
    #[diagnostic(code(tickerflow::tools::market_data))]
    MarketData(#[from] market::MarketDataError),

    #[error("brokerage error: {0}")]
    #[diagnostic(code(tickerflow::tools::brokerage))]
    Brokerage(#[from] trading::BrokerageError),
}

/// Parse a tool's argument object, mapping failures onto `InvalidArguments`.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &'static str,
    args: Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool,
        reason: e.to_string(),
    })
}
