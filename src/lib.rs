//! # Tickerflow: Concurrent Financial Analyst Pipeline
//!
//! Tickerflow routes a natural-language financial query through a fixed
//! pipeline of computation stages (classify, route, fan out specialist
//! agents, join, synthesize) with versioned state, deterministic barrier
//! merges, and bounded tool-calling loops.
//!
//! ## Core Concepts
//!
//! - **ConversationState**: versioned, channel-based session state; mutation
//!   happens only at barriers
//! - **RoutingTable**: a total pure function from classified intent to a
//!   closed set of routing actions
//! - **GraphEngine**: the five-stage cycle state machine with an explicit
//!   fork-join for parallel branches
//! - **AgentRunner**: the bounded tool-calling loop each specialist runs
//! - **SessionRunner / Checkpointer**: multi-turn sessions persisted per
//!   session id
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickerflow::agents::analyst_team;
//! use tickerflow::llm::{ChatProvider, CompletionResponse, ScriptedProvider};
//! use tickerflow::runtimes::{CheckpointerType, SessionRunner};
//! use tickerflow::state::ConversationState;
//! use tickerflow::tools::{PaperBroker, StaticMarketData};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let market = Arc::new(StaticMarketData::new());
//! let broker = Arc::new(PaperBroker::new(market.clone()));
//! let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::sequence(vec![
//!     CompletionResponse::text(r#"{"intent": "PRICE", "tickers": ["NVDA"]}"#),
//!     CompletionResponse::text("NVDA closed at $875.32."),
//!     CompletionResponse::text("NVDA is trading at $875.32 today."),
//! ]));
//!
//! let engine = Arc::new(analyst_team(provider, market, broker)?);
//! let mut runner = SessionRunner::new(engine, CheckpointerType::InMemory).await;
//!
//! runner
//!     .create_session("demo".to_string(), ConversationState::default())
//!     .await?;
//! let turn = runner.run_turn("demo", "What's NVDA trading at?").await?;
//! println!("{}", turn.reply.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Routing Is Deterministic
//!
//! Classification upstream is a language-model call; routing is not:
//!
//! ```
//! use tickerflow::routing::{Intent, RouteAction, RoutingTable};
//!
//! assert_eq!(RoutingTable::decide(Intent::Comparison), RouteAction::Both);
//! assert_eq!(RoutingTable::decide(Intent::Trade), RouteAction::Trading);
//! // Unrecognized classifications map to a defined default, never an error.
//! assert_eq!(RoutingTable::decide(Intent::parse("GREETING")), RoutingTable::DEFAULT_ACTION);
//! ```
//!
//! ## Module Guide
//!
//! - [`state`] / [`channels`] - versioned state and per-channel merge policy
//! - [`reducers`] - barrier merge strategies, including fail-fast conflicts
//! - [`routing`] - intents, actions, and the routing table
//! - [`engine`] - the cycle state machine and barrier
//! - [`schedulers`] - single dispatch and fork-join execution
//! - [`agents`] - analyzer, specialist branches, synthesizer, assembly
//! - [`llm`] - the opaque inference interface, retry, scripted provider
//! - [`tools`] - tool trait, registry, market data, paper trading
//! - [`runtimes`] - sessions and checkpointing

pub mod agents;
pub mod channels;
pub mod engine;
pub mod event_bus;
pub mod llm;
pub mod message;
pub mod node;
pub mod reducers;
pub mod routing;
pub mod runtimes;
pub mod schedulers;
pub mod state;
pub mod telemetry;
pub mod tools;
pub mod utils;
