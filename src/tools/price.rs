//! Price-domain tools: quote lookup and historical-series analysis.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::market::{MarketData, PriceHistory};
use super::registry::ToolRegistry;
use super::{Tool, ToolError, parse_args};

/// The fixed tool set for the price branch.
#[must_use]
pub fn price_tools(data: Arc<dyn MarketData>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(QuoteTool { data: data.clone() }))
        .with_tool(Arc::new(HistoryTool { data }))
}

#[derive(Deserialize)]
struct TickerArgs {
    ticker: String,
}

#[derive(Deserialize)]
struct HistoryArgs {
    ticker: String,
    #[serde(default = "default_period")]
    period: String,
}

fn default_period() -> String {
    "1mo".to_string()
}

struct QuoteTool {
    data: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for QuoteTool {
    fn name(&self) -> &'static str {
        "get_stock_quote"
    }

    fn description(&self) -> &'static str {
        "Get the current stock price and key metrics: price, daily change, volume, market cap, 52-week range."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol, e.g. \"NVDA\""}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: TickerArgs = parse_args(self.name(), args)?;
        let q = self.data.quote(&args.ticker).await?;

        let from_high = if q.high_52w > 0.0 {
            (q.price - q.high_52w) / q.high_52w * 100.0
        } else {
            0.0
        };
        let from_low = if q.low_52w > 0.0 {
            (q.price - q.low_52w) / q.low_52w * 100.0
        } else {
            0.0
        };

        Ok(format!(
            "Stock Quote - {}:\n\
             - Current Price: ${:.2}\n\
             - Change Today: ${:.2} ({:+.2}%)\n\
             - Previous Close: ${:.2}\n\
             - Volume: {}\n\
             - Market Cap: ${}\n\
             - 52-Week High: ${:.2} (currently {:+.1}% from high)\n\
             - 52-Week Low: ${:.2} (currently {:+.1}% from low)",
            q.ticker,
            q.price,
            q.change,
            q.change_pct,
            q.previous_close,
            q.volume,
            q.market_cap,
            q.high_52w,
            from_high,
            q.low_52w,
            from_low,
        ))
    }
}

struct HistoryTool {
    data: Arc<dyn MarketData>,
}

/// Derived metrics for a historical series.
struct HistoryMetrics {
    start_price: f64,
    end_price: f64,
    period_return_pct: f64,
    period_high: f64,
    period_low: f64,
    max_drawdown_pct: f64,
    avg_volume: f64,
}

fn derive_metrics(history: &PriceHistory) -> Option<HistoryMetrics> {
    let first = *history.closes.first()?;
    let last = *history.closes.last()?;

    let period_high = history.highs.iter().copied().fold(f64::MIN, f64::max);
    let period_low = history.lows.iter().copied().fold(f64::MAX, f64::min);

    // Worst peak-to-trough decline over the period.
    let mut running_max = f64::MIN;
    let mut max_drawdown = 0.0_f64;
    for close in &history.closes {
        running_max = running_max.max(*close);
        if running_max > 0.0 {
            let drawdown = (close - running_max) / running_max * 100.0;
            max_drawdown = max_drawdown.min(drawdown);
        }
    }

    let avg_volume = if history.volumes.is_empty() {
        0.0
    } else {
        history.volumes.iter().sum::<u64>() as f64 / history.volumes.len() as f64
    };

    Some(HistoryMetrics {
        start_price: first,
        end_price: last,
        period_return_pct: if first > 0.0 {
            (last / first - 1.0) * 100.0
        } else {
            0.0
        },
        period_high,
        period_low,
        max_drawdown_pct: max_drawdown,
        avg_volume,
    })
}

#[async_trait]
impl Tool for HistoryTool {
    fn name(&self) -> &'static str {
        "get_historical_prices"
    }

    fn description(&self) -> &'static str {
        "Get historical price data with period high/low, period return, maximum drawdown, and average volume."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol"},
                "period": {
                    "type": "string",
                    "description": "Time period (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, max)",
                    "default": "1mo"
                }
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: HistoryArgs = parse_args(self.name(), args)?;
        let history = self.data.history(&args.ticker, &args.period).await?;

        let Some(m) = derive_metrics(&history) else {
            return Ok(format!("No historical data for {}", history.ticker));
        };

        Ok(format!(
            "Historical Data - {} ({}):\n\
             - Starting Price: ${:.2}\n\
             - Ending Price: ${:.2}\n\
             - Period Return: {:+.2}%\n\
             - Period High: ${:.2}\n\
             - Period Low: ${:.2}\n\
             - Maximum Drawdown: {:.2}% (worst peak-to-trough decline)\n\
             - Average Volume: {:.0}",
            history.ticker,
            history.period,
            m.start_price,
            m.end_price,
            m.period_return_pct,
            m.period_high,
            m.period_low,
            m.max_drawdown_pct,
            m.avg_volume,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> PriceHistory {
        PriceHistory {
            ticker: "TEST".into(),
            period: "1mo".into(),
            closes: closes.to_vec(),
            highs: closes.to_vec(),
            lows: closes.to_vec(),
            volumes: vec![100; closes.len()],
        }
    }

    #[test]
    fn drawdown_tracks_worst_peak_to_trough() {
        // Peak 120, trough 60 afterwards: -50%.
        let m = derive_metrics(&series(&[100.0, 120.0, 90.0, 60.0, 80.0])).unwrap();
        assert!((m.max_drawdown_pct + 50.0).abs() < 1e-9);
        assert!((m.period_return_pct + 20.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_series_has_zero_drawdown() {
        let m = derive_metrics(&series(&[10.0, 11.0, 12.0])).unwrap();
        assert_eq!(m.max_drawdown_pct, 0.0);
    }

    #[test]
    fn empty_series_yields_no_metrics() {
        assert!(derive_metrics(&series(&[])).is_none());
    }
}
