//! The bounded tool-calling loop.

use crate::channels::BranchOutcome;
use crate::channels::errors::Fault;
use crate::llm::{
    ChatProvider, CompletionRequest, CompletionResponse, ProviderError, RetryPolicy,
    ToolCallRequest,
};
use crate::message::Message;
use crate::node::NodeContext;
use crate::routing::BranchId;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Default iteration cap for the tool loop.
pub const DEFAULT_MAX_ROUNDS: usize = 6;

/// Outcome of one agent loop plus the recoverable faults hit along the way.
#[derive(Debug)]
pub struct AgentRunReport {
    pub outcome: BranchOutcome,
    pub faults: Vec<Fault>,
    pub rounds: usize,
}

/// Runs the tool-calling loop for one specialist domain.
///
/// The loop is the system's only open-ended control structure; its termination
/// rests entirely on `max_rounds`, since how many tool rounds the model asks
/// for is outside this crate's control. Within a branch the loop is strictly
/// sequential: one inference call, then each requested tool in the order the
/// response listed them, then back to inference.
pub struct AgentRunner {
    branch: BranchId,
    provider: Arc<dyn ChatProvider>,
    tools: ToolRegistry,
    system_prompt: String,
    max_rounds: usize,
    retry: RetryPolicy,
}

impl AgentRunner {
    #[must_use]
    pub fn new(
        branch: BranchId,
        provider: Arc<dyn ChatProvider>,
        tools: ToolRegistry,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            branch,
            provider,
            tools,
            system_prompt: system_prompt.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn branch(&self) -> BranchId {
        self.branch
    }

    /// Drive the loop to a terminal outcome.
    ///
    /// Tool failures (including unknown tool names) are recorded as failed-call
    /// entries in the branch-local history and the loop continues. Only an
    /// exhausted inference retry escapes as `Err`; the caller converts that
    /// into the branch's sentinel failure.
    pub async fn run(
        &self,
        seed: Vec<Message>,
        ctx: &NodeContext,
    ) -> Result<AgentRunReport, ProviderError> {
        let mut history = seed;
        let mut faults: Vec<Fault> = Vec::new();

        for round in 1..=self.max_rounds {
            let request = CompletionRequest::new(self.system_prompt.clone(), history.clone())
                .with_tools(self.tools.schemas());
            let response = self.retry.complete(self.provider.as_ref(), request).await?;

            match response {
                CompletionResponse::Text(text) => {
                    let _ = ctx.emit("agent", format!("final answer after {round} round(s)"));
                    return Ok(AgentRunReport {
                        outcome: BranchOutcome::answer(text),
                        faults,
                        rounds: round,
                    });
                }
                CompletionResponse::ToolCalls(calls) => {
                    let _ = ctx.emit("agent", format!("round {round}: {} tool call(s)", calls.len()));
                    history.push(Message::assistant(&render_tool_calls(&calls)));
                    for call in calls {
                        self.execute_call(&call, &mut history, &mut faults, ctx).await;
                    }
                }
            }
        }

        let _ = ctx.emit(
            "agent",
            format!("iteration cap ({}) hit; returning partial answer", self.max_rounds),
        );
        faults.push(Fault::msg(format!(
            "iteration cap of {} rounds reached without a final answer",
            self.max_rounds
        )));
        Ok(AgentRunReport {
            outcome: BranchOutcome::Partial {
                text: partial_answer(&history),
                rounds: self.max_rounds,
            },
            faults,
            rounds: self.max_rounds,
        })
    }

    async fn execute_call(
        &self,
        call: &ToolCallRequest,
        history: &mut Vec<Message>,
        faults: &mut Vec<Fault>,
        ctx: &NodeContext,
    ) {
        match self.tools.get(&call.name) {
            None => {
                let _ = ctx.emit("agent", format!("unknown tool requested: {}", call.name));
                faults.push(
                    Fault::msg(format!("tool '{}' is not registered", call.name))
                        .with_details(call.arguments.clone()),
                );
                history.push(Message::tool(&format!("{}: tool not found", call.name)));
            }
            Some(tool) => match tool.invoke(call.arguments.clone()).await {
                Ok(result) => {
                    history.push(Message::tool(&format!("{}: {}", call.name, result)));
                }
                Err(err) => {
                    let _ = ctx.emit("agent", format!("tool {} failed: {err}", call.name));
                    faults.push(
                        Fault::msg(format!("tool '{}' failed", call.name))
                            .with_cause(Fault::msg(err.to_string())),
                    );
                    history.push(Message::tool(&format!("{}: call failed: {err}", call.name)));
                }
            },
        }
    }
}

fn render_tool_calls(calls: &[ToolCallRequest]) -> String {
    let rendered = serde_json::to_string(calls).unwrap_or_else(|_| "[]".to_string());
    format!("requested tool calls: {rendered}")
}

/// Best available partial answer when the cap is hit: the tail of collected
/// tool results, since no final assistant text exists yet.
fn partial_answer(history: &[Message]) -> String {
    let tool_outputs: Vec<&str> = history
        .iter()
        .filter(|m| m.has_role(Message::TOOL))
        .map(|m| m.content.as_str())
        .collect();

    if tool_outputs.is_empty() {
        "No data gathered before the tool budget was exhausted.".to_string()
    } else {
        let tail: Vec<&str> = tool_outputs.iter().rev().take(4).rev().copied().collect();
        format!(
            "Partial findings (tool budget exhausted before a final answer):\n{}",
            tail.join("\n")
        )
    }
}
