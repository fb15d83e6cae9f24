//! Fundamentals-domain tools: news, company overview, financial statements,
//! and earnings.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::market::MarketData;
use super::registry::ToolRegistry;
use super::{Tool, ToolError, parse_args};

/// The fixed tool set for the fundamental branch.
#[must_use]
pub fn fundamental_tools(data: Arc<dyn MarketData>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(NewsTool { data: data.clone() }))
        .with_tool(Arc::new(OverviewTool { data: data.clone() }))
        .with_tool(Arc::new(StatementsTool { data: data.clone() }))
        .with_tool(Arc::new(EarningsTool { data }))
}

#[derive(Deserialize)]
struct TickerArgs {
    ticker: String,
}

#[derive(Deserialize)]
struct StatementsArgs {
    ticker: String,
    #[serde(default)]
    quarters_back: usize,
}

struct NewsTool {
    data: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &'static str {
        "get_stock_news"
    }

    fn description(&self) -> &'static str {
        "Get recent news for a ticker with sentiment labels."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: TickerArgs = parse_args(self.name(), args)?;
        let items = self.data.news(&args.ticker).await?;

        let rendered: Vec<String> = items
            .iter()
            .take(5)
            .map(|item| {
                format!(
                    "- {}\n  Source: {} | Sentiment: {}",
                    item.title, item.source, item.sentiment
                )
            })
            .collect();

        Ok(format!(
            "Recent News - {}:\n\n{}",
            args.ticker.to_uppercase(),
            rendered.join("\n\n")
        ))
    }
}

struct OverviewTool {
    data: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for OverviewTool {
    fn name(&self) -> &'static str {
        "get_company_overview"
    }

    fn description(&self) -> &'static str {
        "Get company fundamentals: sector, industry, market cap, P/E, EPS, dividend yield, 52-week range."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: TickerArgs = parse_args(self.name(), args)?;
        let o = self.data.overview(&args.ticker).await?;

        let mut description = o.description.clone();
        if description.len() > 300 {
            let mut end = 300;
            while !description.is_char_boundary(end) {
                end -= 1;
            }
            description.truncate(end);
            description.push_str("...");
        }

        let fmt_opt = |v: Option<f64>| match v {
            Some(x) => format!("{x:.2}"),
            None => "N/A".to_string(),
        };

        Ok(format!(
            "Company Overview - {}:\n\
             - Name: {}\n\
             - Sector: {}\n\
             - Industry: {}\n\
             - Market Cap: ${}\n\
             - P/E Ratio: {}\n\
             - EPS: ${}\n\
             - Dividend Yield: {:.2}%\n\
             - 52-Week Range: ${:.2} - ${:.2}\n\
             - Average Volume: {}\n\n\
             Description:\n{}",
            o.ticker,
            o.name,
            o.sector,
            o.industry,
            o.market_cap,
            fmt_opt(o.pe_ratio),
            fmt_opt(o.eps),
            o.dividend_yield_pct,
            o.low_52w,
            o.high_52w,
            o.avg_volume,
            description,
        ))
    }
}

struct StatementsTool {
    data: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for StatementsTool {
    fn name(&self) -> &'static str {
        "get_financial_statements"
    }

    fn description(&self) -> &'static str {
        "Get quarterly income statement and balance sheet: revenue, profit, margins, assets, liabilities, cash."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol"},
                "quarters_back": {
                    "type": "integer",
                    "description": "0 = most recent quarter, 1 = previous quarter, ...",
                    "default": 0
                }
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: StatementsArgs = parse_args(self.name(), args)?;
        let s = self
            .data
            .statements(&args.ticker, args.quarters_back)
            .await?;

        let margin = |part: f64| {
            if s.total_revenue > 0.0 {
                part / s.total_revenue * 100.0
            } else {
                0.0
            }
        };

        Ok(format!(
            "Quarterly Financial Statements - {}\n\
             Period Ending: {}\n\n\
             INCOME STATEMENT:\n\
             - Total Revenue: ${:.0}\n\
             - Gross Profit: ${:.0} ({:.1}% margin)\n\
             - Operating Income: ${:.0} ({:.1}% margin)\n\
             - Net Income: ${:.0} ({:.1}% margin)\n\
             - EBITDA: ${:.0}\n\n\
             BALANCE SHEET:\n\
             - Total Assets: ${:.0}\n\
             - Total Liabilities: ${:.0}\n\
             - Stockholders Equity: ${:.0}\n\
             - Cash: ${:.0}",
            args.ticker.to_uppercase(),
            s.period_ending,
            s.total_revenue,
            s.gross_profit,
            margin(s.gross_profit),
            s.operating_income,
            margin(s.operating_income),
            s.net_income,
            margin(s.net_income),
            s.ebitda,
            s.total_assets,
            s.total_liabilities,
            s.equity,
            s.cash,
        ))
    }
}

struct EarningsTool {
    data: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for EarningsTool {
    fn name(&self) -> &'static str {
        "get_earnings"
    }

    fn description(&self) -> &'static str {
        "Get the latest reported earnings: EPS actual vs estimate and revenue."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: TickerArgs = parse_args(self.name(), args)?;
        let e = self.data.earnings(&args.ticker).await?;

        let surprise_pct = if e.eps_estimate.abs() > f64::EPSILON {
            (e.eps_actual - e.eps_estimate) / e.eps_estimate.abs() * 100.0
        } else {
            0.0
        };

        Ok(format!(
            "Earnings - {}\n\
             Period Ending: {}\n\
             - EPS Actual: ${:.2}\n\
             - EPS Estimate: ${:.2} ({:+.1}% surprise)\n\
             - Revenue: ${:.0}",
            args.ticker.to_uppercase(),
            e.period_ending,
            e.eps_actual,
            e.eps_estimate,
            surprise_pct,
            e.revenue,
        ))
    }
}
