//! Pipeline node abstractions.
//!
//! Every stage of a cycle (the analyzer, each specialist branch, the
//! synthesizer) is a [`Node`]: an async unit of work that receives an
//! immutable state snapshot plus an execution context and returns a
//! [`NodePartial`] describing the state changes it wants. Partials are merged
//! at barriers by the engine; nodes never mutate shared state directly.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::channels::{BranchOutcome, errors::ErrorEvent};
use crate::event_bus::Event;
use crate::message::Message;
use crate::routing::{BranchId, RouteAction};
use crate::state::StateSnapshot;

/// An executable pipeline stage.
///
/// Fatal errors (returned as `Err`) abort the cycle and are reserved for the
/// analysis stage, where no routing is possible without a usable
/// classification. Branch nodes recover internally and commit sentinel
/// [`BranchOutcome`]s instead of failing.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, snapshot: StateSnapshot, ctx: NodeContext)
    -> Result<NodePartial, NodeError>;
}

/// Execution context handed to a node for one run.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identity of this node in the pipeline (e.g. "analyzer", "price").
    pub node_id: String,
    /// Cycle number within the session.
    pub step: u64,
    /// Channel for emitting observability events.
    pub event_sender: flume::Sender<Event>,
}

impl NodeContext {
    /// Emit a node-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.event_sender
            .send(Event::node_message_with_meta(
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }
}

/// Partial state update produced by one node run.
///
/// All fields are optional; the barrier merges whatever is present using the
/// per-channel policy. A branch node populates exactly one `results` key;
/// claiming a sibling's key is rejected at the barrier.
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Messages to append to the conversation.
    pub messages: Option<Vec<Message>>,
    /// Context fields to write (replace-on-write per key).
    pub context: Option<FxHashMap<String, serde_json::Value>>,
    /// Branch outcomes to claim (key-disjoint per cycle).
    pub results: Option<FxHashMap<BranchId, BranchOutcome>>,
    /// Routing decision (write-once per cycle).
    pub decision: Option<RouteAction>,
    /// Recoverable error events to record.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: FxHashMap<String, serde_json::Value>) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_result(mut self, branch: BranchId, outcome: BranchOutcome) -> Self {
        self.results
            .get_or_insert_with(FxHashMap::default)
            .insert(branch, outcome);
        self
    }

    #[must_use]
    pub fn with_decision(mut self, decision: RouteAction) -> Self {
        self.decision = Some(decision);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Errors that can occur when using [`NodeContext`] methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(tickerflow::node::event_bus_unavailable),
        help("The event bus may be disconnected. Check pipeline state.")
    )]
    EventBusUnavailable,
}

/// Fatal node execution errors.
///
/// Recoverable conditions belong in `NodePartial.errors`; returning `Err`
/// from a node aborts the cycle.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(tickerflow::node::missing_input),
        help("Check that the upstream stage produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// The analysis stage could not produce a usable classification.
    #[error("classification failed: {reason}")]
    #[diagnostic(
        code(tickerflow::node::classification),
        help("The query may be too vague; ask the user to clarify.")
    )]
    Classification { reason: String },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(tickerflow::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(tickerflow::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(tickerflow::node::event_bus))]
    EventBus(#[from] NodeContextError),
}
