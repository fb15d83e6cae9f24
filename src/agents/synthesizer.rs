//! The synthesis stage: fold branch results into one user-facing reply.

use async_trait::async_trait;
use std::sync::Arc;

use crate::channels::BranchOutcome;
use crate::channels::errors::{ErrorEvent, Fault};
use crate::llm::{ChatProvider, CompletionRequest, CompletionResponse, RetryPolicy};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::routing::BranchId;
use crate::state::StateSnapshot;

const SYNTHESIZER_PROMPT: &str = "You are a financial analyst replying to a client. \
Use ONLY the analyst data provided; quote specific numbers (prices, ratios, percentages). \
Answer the current question directly and conversationally.";

const CONTEXT_WINDOW: usize = 5;

/// Text of the degraded reply when no branch produced data.
pub const NO_DATA_REPLY: &str =
    "I couldn't retrieve any data for that request right now. Please try again in a moment.";

/// Appends exactly one assistant message built from the populated `results`
/// keys.
///
/// Synthesis must always yield a user-visible reply: with no usable results it
/// answers with a canned degraded response instead of calling inference, and
/// an inference failure falls back to presenting the raw branch output.
pub struct SynthesizerNode {
    provider: Arc<dyn ChatProvider>,
    retry: RetryPolicy,
}

impl SynthesizerNode {
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
impl Node for SynthesizerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        // Stable branch order keeps prompts and fallbacks deterministic.
        let mut sections: Vec<(BranchId, &BranchOutcome)> = snapshot
            .results
            .iter()
            .map(|(branch, outcome)| (*branch, outcome))
            .collect();
        sections.sort_by_key(|(branch, _)| *branch);

        let usable: Vec<&(BranchId, &BranchOutcome)> = sections
            .iter()
            .filter(|(_, outcome)| outcome.is_usable())
            .collect();

        if usable.is_empty() {
            ctx.emit("synthesizer", "no usable branch data; degraded reply")?;
            return Ok(NodePartial::new().with_messages(vec![Message::assistant(NO_DATA_REPLY)]));
        }

        let query = snapshot.current_query().unwrap_or_default().to_string();
        let combined: String = sections
            .iter()
            .map(|(branch, outcome)| {
                format!(
                    "{} ANALYSIS:\n{}",
                    branch.as_str().to_uppercase(),
                    outcome.display_text()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let seed = vec![Message::user(&format!(
            "Recent conversation:\n{}\n\nCurrent question: \"{query}\"\n\nAnalyst data:\n{combined}",
            snapshot.recent_context(CONTEXT_WINDOW)
        ))];
        let request = CompletionRequest::new(SYNTHESIZER_PROMPT, seed);

        match self.retry.complete(self.provider.as_ref(), request).await {
            Ok(CompletionResponse::Text(text)) if !text.trim().is_empty() => {
                ctx.emit("synthesizer", "reply composed")?;
                Ok(NodePartial::new().with_messages(vec![Message::assistant(&text)]))
            }
            Ok(_) => {
                ctx.emit("synthesizer", "unusable inference output; raw fallback")?;
                Ok(fallback_partial(&combined, ctx.step, "unusable inference output"))
            }
            Err(err) => {
                ctx.emit("synthesizer", format!("inference failed: {err}; raw fallback"))?;
                Ok(fallback_partial(&combined, ctx.step, &err.to_string()))
            }
        }
    }
}

/// Degraded but user-visible reply when synthesis inference is unavailable:
/// present the analysts' raw output directly.
fn fallback_partial(combined: &str, step: u64, reason: &str) -> NodePartial {
    let reply = format!("Here is what the analysts found:\n\n{combined}");
    NodePartial::new()
        .with_messages(vec![Message::assistant(&reply)])
        .with_errors(vec![
            ErrorEvent::branch("synthesizer", step, Fault::msg(reason.to_string()))
                .with_tag("fallback"),
        ])
}
