//! Inference interface.
//!
//! The engine treats language-model inference as a black box behind
//! [`ChatProvider`]: prompt plus tool schemas in, either free text or a list
//! of tool-call requests out. Latency and output are unspecified; callers must
//! tolerate arbitrary (schema-valid) tool requests and bound their own loops.
//!
//! [`RetryPolicy`] wraps provider calls with bounded, jittered retries;
//! [`ScriptedProvider`] is a deterministic implementation for tests.

mod retry;
mod scripted;

pub use retry::RetryPolicy;
pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::Message;

/// Schema advertised to the model for one invocable tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments object.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
///
/// Transient: lives only inside one agent loop iteration, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One inference request: system instruction, history, and available tools.
#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system: system.into(),
            messages,
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// Inference output: either a final text or a batch of tool-call requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionResponse {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

impl CompletionResponse {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        CompletionResponse::Text(content.into())
    }

    #[must_use]
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        CompletionResponse::ToolCalls(vec![ToolCallRequest::new(name, arguments)])
    }
}

/// Opaque inference backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;
}

/// Inference-interface failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    #[error("inference request timed out")]
    #[diagnostic(code(tickerflow::llm::timeout))]
    Timeout,

    #[error("inference transport error: {0}")]
    #[diagnostic(code(tickerflow::llm::transport))]
    Transport(String),

    #[error("malformed inference response: {0}")]
    #[diagnostic(code(tickerflow::llm::malformed))]
    Malformed(String),

    #[error("scripted provider exhausted after {calls} calls")]
    #[diagnostic(
        code(tickerflow::llm::script_exhausted),
        help("The test script supplied fewer responses than the pipeline requested.")
    )]
    ScriptExhausted { calls: usize },
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout | ProviderError::Transport(_))
    }
}
