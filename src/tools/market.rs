//! Market-data provider interface and fixture implementation.
//!
//! The engine never talks to a data vendor directly; price and fundamentals
//! tools consume the [`MarketData`] trait. [`StaticMarketData`] is an
//! in-memory implementation for tests, demos, and offline runs.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

/// Current quote and key metrics for one ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub volume: u64,
    pub market_cap: u64,
    pub high_52w: f64,
    pub low_52w: f64,
}

/// Raw historical series for one ticker and period.
///
/// Metric derivation (period return, max drawdown) is tool-side so providers
/// stay dumb pipes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub period: String,
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<u64>,
}

/// One news item with sentiment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub sentiment: String,
}

/// Company fundamentals snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: u64,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub dividend_yield_pct: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub avg_volume: u64,
    pub description: String,
}

/// One quarter of income-statement and balance-sheet figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyStatement {
    pub period_ending: String,
    pub total_revenue: f64,
    pub gross_profit: f64,
    pub operating_income: f64,
    pub net_income: f64,
    pub ebitda: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub equity: f64,
    pub cash: f64,
}

/// Reported earnings for one quarter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EarningsReport {
    pub period_ending: String,
    pub eps_actual: f64,
    pub eps_estimate: f64,
    pub revenue: f64,
}

/// Market-data access failures.
#[derive(Debug, Error, Diagnostic)]
pub enum MarketDataError {
    #[error("no data for ticker '{ticker}'")]
    #[diagnostic(code(tickerflow::market::not_found))]
    NotFound { ticker: String },

    #[error("market data unavailable: {0}")]
    #[diagnostic(code(tickerflow::market::unavailable))]
    Unavailable(String),
}

/// Read-only market data source consumed by the price and fundamentals tools.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, ticker: &str) -> Result<Quote, MarketDataError>;
    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, MarketDataError>;
    async fn news(&self, ticker: &str) -> Result<Vec<NewsItem>, MarketDataError>;
    async fn overview(&self, ticker: &str) -> Result<CompanyOverview, MarketDataError>;
    /// `quarters_back`: 0 = most recent quarter, 1 = previous, ...
    async fn statements(
        &self,
        ticker: &str,
        quarters_back: usize,
    ) -> Result<QuarterlyStatement, MarketDataError>;
    async fn earnings(&self, ticker: &str) -> Result<EarningsReport, MarketDataError>;
}

#[derive(Clone, Debug, Default)]
struct TickerEntry {
    quote: Option<Quote>,
    history: FxHashMap<String, PriceHistory>,
    news: Vec<NewsItem>,
    overview: Option<CompanyOverview>,
    statements: Vec<QuarterlyStatement>,
    earnings: Option<EarningsReport>,
}

/// In-memory [`MarketData`] backed by fixtures.
#[derive(Default)]
pub struct StaticMarketData {
    entries: RwLock<FxHashMap<String, TickerEntry>>,
}

impl StaticMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry(&self, ticker: &str, f: impl FnOnce(&mut TickerEntry)) {
        let mut entries = self.entries.write().expect("market data poisoned");
        f(entries.entry(ticker.to_uppercase()).or_default());
    }

    fn read_entry<T>(
        &self,
        ticker: &str,
        f: impl FnOnce(&TickerEntry) -> Option<T>,
    ) -> Result<T, MarketDataError> {
        let entries = self.entries.read().expect("market data poisoned");
        entries
            .get(&ticker.to_uppercase())
            .and_then(f)
            .ok_or_else(|| MarketDataError::NotFound {
                ticker: ticker.to_uppercase(),
            })
    }

    pub fn insert_quote(&self, quote: Quote) -> &Self {
        self.with_entry(&quote.ticker.clone(), |e| e.quote = Some(quote));
        self
    }

    pub fn insert_history(&self, history: PriceHistory) -> &Self {
        self.with_entry(&history.ticker.clone(), |e| {
            e.history.insert(history.period.clone(), history);
        });
        self
    }

    pub fn insert_news(&self, ticker: &str, items: Vec<NewsItem>) -> &Self {
        self.with_entry(ticker, |e| e.news = items);
        self
    }

    pub fn insert_overview(&self, overview: CompanyOverview) -> &Self {
        self.with_entry(&overview.ticker.clone(), |e| e.overview = Some(overview));
        self
    }

    pub fn insert_statements(&self, ticker: &str, statements: Vec<QuarterlyStatement>) -> &Self {
        self.with_entry(ticker, |e| e.statements = statements);
        self
    }

    pub fn insert_earnings(&self, ticker: &str, earnings: EarningsReport) -> &Self {
        self.with_entry(ticker, |e| e.earnings = Some(earnings));
        self
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn quote(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        self.read_entry(ticker, |e| e.quote.clone())
    }

    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, MarketDataError> {
        self.read_entry(ticker, |e| e.history.get(period).cloned())
    }

    async fn news(&self, ticker: &str) -> Result<Vec<NewsItem>, MarketDataError> {
        self.read_entry(ticker, |e| {
            if e.news.is_empty() {
                None
            } else {
                Some(e.news.clone())
            }
        })
    }

    async fn overview(&self, ticker: &str) -> Result<CompanyOverview, MarketDataError> {
        self.read_entry(ticker, |e| e.overview.clone())
    }

    async fn statements(
        &self,
        ticker: &str,
        quarters_back: usize,
    ) -> Result<QuarterlyStatement, MarketDataError> {
        self.read_entry(ticker, |e| e.statements.get(quarters_back).cloned())
    }

    async fn earnings(&self, ticker: &str) -> Result<EarningsReport, MarketDataError> {
        self.read_entry(ticker, |e| e.earnings.clone())
    }
}
