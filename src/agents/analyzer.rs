//! The analysis stage: classify the query and extract tickers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::llm::{ChatProvider, CompletionRequest, CompletionResponse, RetryPolicy};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::routing::Intent;
use crate::state::{StateSnapshot, context_keys};
use crate::utils::collections::new_context_map;

const ANALYZER_PROMPT: &str = "You classify financial queries for an analyst team. \
Reply with a single JSON object: {\"intent\": \"<PRICE|NEWS|FUNDAMENTALS|EARNINGS|TRADE|PORTFOLIO|ANALYSIS|COMPARISON>\", \
\"tickers\": [\"...\"]}. Extract every ticker symbol mentioned. Reply with JSON only, no prose.";

const CONTEXT_WINDOW: usize = 5;

#[derive(Debug, Deserialize)]
struct Classification {
    intent: String,
    #[serde(default)]
    tickers: Vec<String>,
}

/// Classifies the current query and writes `intent`, `tickers`, and `query`
/// into the context channel.
///
/// This is the one stage allowed to fail the cycle: with no usable
/// classification there is nothing to route, and the caller turns the failure
/// into a clarification request.
pub struct AnalyzerNode {
    provider: Arc<dyn ChatProvider>,
    retry: RetryPolicy,
}

impl AnalyzerNode {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Node for AnalyzerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let query = snapshot
            .current_query()
            .ok_or(NodeError::MissingInput { what: "user query" })?
            .to_string();

        ctx.emit("analyzer", "classifying query")?;

        let seed = vec![Message::user(&format!(
            "Conversation:\n{}\n\nCurrent query: {query}",
            snapshot.recent_context(CONTEXT_WINDOW)
        ))];
        let request = CompletionRequest::new(ANALYZER_PROMPT, seed);

        let response = self
            .retry
            .complete(self.provider.as_ref(), request)
            .await
            .map_err(|e| NodeError::Classification {
                reason: format!("inference failed: {e}"),
            })?;

        let text = match response {
            CompletionResponse::Text(text) => text,
            CompletionResponse::ToolCalls(_) => {
                return Err(NodeError::Classification {
                    reason: "classifier returned tool calls instead of a label".to_string(),
                });
            }
        };
        if text.trim().is_empty() {
            return Err(NodeError::Classification {
                reason: "classifier returned an empty response".to_string(),
            });
        }

        let (intent, mut tickers) = parse_classification(&text);
        if tickers.is_empty() {
            tickers = extract_tickers(&query);
        }

        ctx.emit(
            "analyzer",
            format!("intent={intent} tickers=[{}]", tickers.join(", ")),
        )?;

        let mut context = new_context_map();
        context.insert(context_keys::INTENT.to_string(), json!(intent.as_str()));
        context.insert(context_keys::TICKERS.to_string(), json!(tickers));
        context.insert(context_keys::QUERY.to_string(), json!(query));

        Ok(NodePartial::new().with_context(context))
    }
}

/// Parse the classifier reply: a JSON object when the model followed
/// instructions, a bare label otherwise. Unrecognized labels become
/// `Intent::Unknown`, which routing maps onto the default action.
fn parse_classification(text: &str) -> (Intent, Vec<String>) {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
        && let Ok(parsed) = serde_json::from_str::<Classification>(&text[start..=end])
    {
        let tickers = parsed
            .tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        return (Intent::parse(&parsed.intent), tickers);
    }

    (Intent::parse(text.trim()), Vec::new())
}

/// Fallback ticker extraction: uppercase alphabetic tokens of 1-5 chars that
/// are not common words.
fn extract_tickers(query: &str) -> Vec<String> {
    const STOPWORDS: [&str; 8] = ["A", "I", "VS", "AND", "OR", "THE", "OF", "BUY"];
    let mut tickers: Vec<String> = Vec::new();
    for token in query.split(|c: char| !c.is_ascii_alphanumeric()) {
        let is_candidate = (1..=5).contains(&token.len())
            && token.chars().all(|c| c.is_ascii_uppercase())
            && !STOPWORDS.contains(&token);
        if is_candidate && !tickers.iter().any(|t| t == token) {
            tickers.push(token.to_string());
        }
    }
    tickers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_classification() {
        let (intent, tickers) =
            parse_classification(r#"{"intent": "COMPARISON", "tickers": ["nvda", "AMD"]}"#);
        assert_eq!(intent, Intent::Comparison);
        assert_eq!(tickers, vec!["NVDA", "AMD"]);
    }

    #[test]
    fn parses_bare_label() {
        let (intent, tickers) = parse_classification("PRICE");
        assert_eq!(intent, Intent::Price);
        assert!(tickers.is_empty());
    }

    #[test]
    fn unrecognized_label_is_unknown() {
        let (intent, _) = parse_classification("GREETING");
        assert_eq!(intent, Intent::Unknown);
    }

    #[test]
    fn ticker_extraction_skips_stopwords() {
        let tickers = extract_tickers("Compare NVDA vs AMD");
        assert_eq!(tickers, vec!["NVDA", "AMD"]);
    }
}
