//! Trading-domain tools backed by a paper brokerage.
//!
//! All orders are simulated: the paper broker fills market orders instantly at
//! the current quote, against a fake cash balance. The tools depend only on
//! the [`Brokerage`] trait, so a real broker integration can be swapped in
//! without touching the agent loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::market::MarketData;
use super::registry::ToolRegistry;
use super::{Tool, ToolError, parse_args};
use crate::utils::id_generator::IdGenerator;

/// Starting cash balance for a fresh paper account.
pub const PAPER_STARTING_CASH: f64 = 100_000.0;

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Sizing for a market order: by share count or by dollar amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSize {
    Shares(f64),
    Notional(f64),
}

/// A market order to submit.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: OrderSide,
    pub size: OrderSize,
}

/// Confirmation of a filled order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub fill_price: f64,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

/// One held position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub current_price: f64,
}

impl Position {
    #[must_use]
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    #[must_use]
    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis
    }
}

/// Account totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub equity: f64,
    pub cash: f64,
}

/// Brokerage failures.
#[derive(Debug, Error, Diagnostic)]
pub enum BrokerageError {
    #[error("order must specify either quantity (shares) or dollars, not neither")]
    #[diagnostic(code(tickerflow::trading::unsized_order))]
    UnsizedOrder,

    #[error("insufficient cash: need ${needed:.2}, have ${available:.2}")]
    #[diagnostic(code(tickerflow::trading::insufficient_cash))]
    InsufficientCash { needed: f64, available: f64 },

    #[error("insufficient shares of {ticker}: selling {requested}, holding {held}")]
    #[diagnostic(code(tickerflow::trading::insufficient_shares))]
    InsufficientShares {
        ticker: String,
        requested: f64,
        held: f64,
    },

    #[error("could not price order for {ticker}: {reason}")]
    #[diagnostic(code(tickerflow::trading::pricing))]
    Pricing { ticker: String, reason: String },
}

/// Brokerage operations the trading tools depend on.
#[async_trait]
pub trait Brokerage: Send + Sync {
    async fn submit(&self, order: OrderRequest) -> Result<OrderRecord, BrokerageError>;
    async fn account(&self) -> Result<AccountSummary, BrokerageError>;
    async fn positions(&self) -> Result<Vec<Position>, BrokerageError>;
    /// Most recent orders, newest first.
    async fn orders(&self) -> Result<Vec<OrderRecord>, BrokerageError>;
}

#[derive(Debug, Default)]
struct PaperAccount {
    cash: f64,
    // ticker -> (quantity, cost basis)
    positions: FxHashMap<String, (f64, f64)>,
    orders: Vec<OrderRecord>,
}

/// In-memory paper-trading brokerage.
///
/// Fills market orders instantly at the provider's current quote. State is a
/// single mutex-guarded ledger; no lock is held across the pricing await.
pub struct PaperBroker {
    data: Arc<dyn MarketData>,
    account: Mutex<PaperAccount>,
    ids: IdGenerator,
}

impl PaperBroker {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self::with_cash(data, PAPER_STARTING_CASH)
    }

    #[must_use]
    pub fn with_cash(data: Arc<dyn MarketData>, cash: f64) -> Self {
        Self {
            data,
            account: Mutex::new(PaperAccount {
                cash,
                ..Default::default()
            }),
            ids: IdGenerator::new(),
        }
    }

    async fn price_of(&self, ticker: &str) -> Result<f64, BrokerageError> {
        self.data
            .quote(ticker)
            .await
            .map(|q| q.price)
            .map_err(|e| BrokerageError::Pricing {
                ticker: ticker.to_uppercase(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Brokerage for PaperBroker {
    async fn submit(&self, order: OrderRequest) -> Result<OrderRecord, BrokerageError> {
        let ticker = order.ticker.to_uppercase();
        let price = self.price_of(&ticker).await?;

        let quantity = match order.size {
            OrderSize::Shares(qty) if qty > 0.0 => qty,
            OrderSize::Notional(dollars) if dollars > 0.0 => dollars / price,
            _ => return Err(BrokerageError::UnsizedOrder),
        };
        let notional = quantity * price;

        let mut account = self.account.lock().expect("paper account poisoned");
        match order.side {
            OrderSide::Buy => {
                if notional > account.cash {
                    return Err(BrokerageError::InsufficientCash {
                        needed: notional,
                        available: account.cash,
                    });
                }
                account.cash -= notional;
                let entry = account.positions.entry(ticker.clone()).or_insert((0.0, 0.0));
                entry.0 += quantity;
                entry.1 += notional;
            }
            OrderSide::Sell => {
                let held = account.positions.get(&ticker).map(|p| p.0).unwrap_or(0.0);
                if quantity > held + 1e-9 {
                    return Err(BrokerageError::InsufficientShares {
                        ticker,
                        requested: quantity,
                        held,
                    });
                }
                account.cash += notional;
                let mut emptied = false;
                if let Some(entry) = account.positions.get_mut(&ticker) {
                    // Reduce cost basis proportionally to the shares sold.
                    let fraction = quantity / entry.0;
                    entry.1 -= entry.1 * fraction;
                    entry.0 -= quantity;
                    emptied = entry.0 <= 1e-9;
                }
                if emptied {
                    account.positions.remove(&ticker);
                }
            }
        }

        let record = OrderRecord {
            order_id: self.ids.generate_order_id(),
            ticker,
            side: order.side,
            quantity,
            fill_price: price,
            status: "filled".to_string(),
            submitted_at: Utc::now(),
        };
        account.orders.push(record.clone());
        Ok(record)
    }

    async fn account(&self) -> Result<AccountSummary, BrokerageError> {
        let positions = self.positions().await?;
        let account = self.account.lock().expect("paper account poisoned");
        let equity = account.cash + positions.iter().map(Position::market_value).sum::<f64>();
        Ok(AccountSummary {
            equity,
            cash: account.cash,
        })
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerageError> {
        let held: Vec<(String, f64, f64)> = {
            let account = self.account.lock().expect("paper account poisoned");
            account
                .positions
                .iter()
                .map(|(t, (qty, basis))| (t.clone(), *qty, *basis))
                .collect()
        };

        let mut positions = Vec::with_capacity(held.len());
        for (ticker, quantity, cost_basis) in held {
            let current_price = self.price_of(&ticker).await?;
            positions.push(Position {
                ticker,
                quantity,
                cost_basis,
                current_price,
            });
        }
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(positions)
    }

    async fn orders(&self) -> Result<Vec<OrderRecord>, BrokerageError> {
        let account = self.account.lock().expect("paper account poisoned");
        Ok(account.orders.iter().rev().cloned().collect())
    }
}

/// The fixed tool set for the trading branch.
#[must_use]
pub fn trading_tools(broker: Arc<dyn Brokerage>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(OrderTool {
            broker: broker.clone(),
            side: OrderSide::Buy,
        }))
        .with_tool(Arc::new(OrderTool {
            broker: broker.clone(),
            side: OrderSide::Sell,
        }))
        .with_tool(Arc::new(PortfolioTool {
            broker: broker.clone(),
        }))
        .with_tool(Arc::new(OrdersTool { broker }))
}

#[derive(Deserialize)]
struct OrderArgs {
    ticker: String,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    dollars: Option<f64>,
}

struct OrderTool {
    broker: Arc<dyn Brokerage>,
    side: OrderSide,
}

#[async_trait]
impl Tool for OrderTool {
    fn name(&self) -> &'static str {
        match self.side {
            OrderSide::Buy => "buy_stock",
            OrderSide::Sell => "sell_stock",
        }
    }

    fn description(&self) -> &'static str {
        match self.side {
            OrderSide::Buy => {
                "Place a paper-trade BUY order, sized by share quantity or dollar amount."
            }
            OrderSide::Sell => {
                "Place a paper-trade SELL order for held shares, sized by share quantity or dollar amount."
            }
        }
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock symbol, e.g. \"TSLA\""},
                "quantity": {"type": "number", "description": "Number of shares"},
                "dollars": {"type": "number", "description": "Dollar amount to trade instead of shares"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: OrderArgs = parse_args(self.name(), args)?;
        let size = match (args.quantity, args.dollars) {
            (Some(qty), _) => OrderSize::Shares(qty),
            (None, Some(dollars)) => OrderSize::Notional(dollars),
            (None, None) => return Err(BrokerageError::UnsizedOrder.into()),
        };

        let record = self
            .broker
            .submit(OrderRequest {
                ticker: args.ticker,
                side: self.side,
                size,
            })
            .await?;

        Ok(format!(
            "PAPER TRADE ORDER PLACED:\n\
             Type: {}\n\
             Ticker: {}\n\
             Quantity: {:.4} shares @ ${:.2}\n\
             Order ID: {}\n\
             Status: {}\n\n\
             Note: this is a paper trade, no real money involved",
            record.side.as_str(),
            record.ticker,
            record.quantity,
            record.fill_price,
            record.order_id,
            record.status,
        ))
    }
}

struct PortfolioTool {
    broker: Arc<dyn Brokerage>,
}

#[async_trait]
impl Tool for PortfolioTool {
    fn name(&self) -> &'static str {
        "get_portfolio"
    }

    fn description(&self) -> &'static str {
        "Get the paper-trading portfolio: account value, cash, and all open positions with P&L."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        let account = self.broker.account().await?;
        let positions = self.broker.positions().await?;

        let mut out = format!(
            "PAPER TRADING PORTFOLIO:\n\n\
             Account Value: ${:.2}\n\
             Cash: ${:.2}\n\n\
             Positions ({}):\n",
            account.equity,
            account.cash,
            positions.len()
        );

        if positions.is_empty() {
            out.push_str("\n(No positions)\n");
        } else {
            for pos in &positions {
                let pnl = pos.unrealized_pnl();
                let pnl_pct = if pos.cost_basis.abs() > f64::EPSILON {
                    pnl / pos.cost_basis * 100.0
                } else {
                    0.0
                };
                out.push_str(&format!(
                    "\n{}:\n\
                     - Shares: {:.4}\n\
                     - Current Price: ${:.2}\n\
                     - Market Value: ${:.2}\n\
                     - P&L: ${:.2} ({:+.2}%)\n\
                     - Cost Basis: ${:.2}\n",
                    pos.ticker,
                    pos.quantity,
                    pos.current_price,
                    pos.market_value(),
                    pnl,
                    pnl_pct,
                    pos.cost_basis,
                ));
            }
        }

        Ok(out)
    }
}

struct OrdersTool {
    broker: Arc<dyn Brokerage>,
}

#[async_trait]
impl Tool for OrdersTool {
    fn name(&self) -> &'static str {
        "get_orders"
    }

    fn description(&self) -> &'static str {
        "Get recent paper-trade orders with status and fill details."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        let orders = self.broker.orders().await?;
        if orders.is_empty() {
            return Ok("No recent orders".to_string());
        }

        let mut out = String::from("RECENT PAPER TRADE ORDERS:\n");
        for order in orders.iter().take(10) {
            out.push_str(&format!(
                "\n{} {} {:.4} @ ${:.2}\n  Status: {}\n  Time: {}\n  Order ID: {}\n",
                order.side.as_str(),
                order.ticker,
                order.quantity,
                order.fill_price,
                order.status,
                order.submitted_at.to_rfc3339(),
                order.order_id,
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::market::{Quote, StaticMarketData};

    fn market_with(ticker: &str, price: f64) -> Arc<StaticMarketData> {
        let data = StaticMarketData::new();
        data.insert_quote(Quote {
            ticker: ticker.to_string(),
            price,
            previous_close: price,
            change: 0.0,
            change_pct: 0.0,
            volume: 1_000,
            market_cap: 1_000_000,
            high_52w: price * 1.2,
            low_52w: price * 0.8,
        });
        Arc::new(data)
    }

    #[tokio::test]
    async fn buy_debits_cash_and_opens_position() {
        let broker = PaperBroker::new(market_with("TSLA", 250.0));
        let record = broker
            .submit(OrderRequest {
                ticker: "TSLA".into(),
                side: OrderSide::Buy,
                size: OrderSize::Shares(10.0),
            })
            .await
            .unwrap();

        assert_eq!(record.quantity, 10.0);
        let account = broker.account().await.unwrap();
        assert!((account.cash - (PAPER_STARTING_CASH - 2_500.0)).abs() < 1e-6);
        let positions = broker.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].ticker, "TSLA");
    }

    #[tokio::test]
    async fn sell_requires_held_shares() {
        let broker = PaperBroker::new(market_with("NVDA", 875.0));
        let err = broker
            .submit(OrderRequest {
                ticker: "NVDA".into(),
                side: OrderSide::Sell,
                size: OrderSize::Shares(1.0),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerageError::InsufficientShares { .. }));
    }

    #[tokio::test]
    async fn notional_buy_converts_to_fractional_shares() {
        let broker = PaperBroker::new(market_with("AAPL", 200.0));
        let record = broker
            .submit(OrderRequest {
                ticker: "AAPL".into(),
                side: OrderSide::Buy,
                size: OrderSize::Notional(500.0),
            })
            .await
            .unwrap();
        assert!((record.quantity - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn order_log_is_append_only_newest_first() {
        let broker = PaperBroker::new(market_with("AMD", 160.0));
        for _ in 0..3 {
            broker
                .submit(OrderRequest {
                    ticker: "AMD".into(),
                    side: OrderSide::Buy,
                    size: OrderSize::Shares(1.0),
                })
                .await
                .unwrap();
        }
        let orders = broker.orders().await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders[0].submitted_at >= orders[2].submitted_at);
    }

    #[tokio::test]
    async fn buy_beyond_cash_is_rejected() {
        let broker = PaperBroker::with_cash(market_with("NVDA", 875.0), 100.0);
        let err = broker
            .submit(OrderRequest {
                ticker: "NVDA".into(),
                side: OrderSide::Buy,
                size: OrderSize::Shares(1.0),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerageError::InsufficientCash { .. }));
    }
}
