//! Versioned conversation state and snapshots.
//!
//! One [`ConversationState`] exists per session. It is mutated only through
//! barrier commits during a cycle, never directly by branches; branches see
//! immutable [`StateSnapshot`]s instead. Context field names written by the
//! analysis stage are centralized in [`context_keys`].
//!
//! # Examples
//!
//! ```
//! use tickerflow::state::ConversationState;
//! use serde_json::json;
//!
//! let mut state = ConversationState::new_with_user_message("What's NVDA at?");
//! state.context.get_mut().insert("intent".into(), json!("PRICE"));
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.messages.len(), 1);
//! assert_eq!(snapshot.context.get("intent"), Some(&json!("PRICE")));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::channels::{
    BranchOutcome, Channel, ContextChannel, DecisionChannel, ErrorEvent, ErrorsChannel,
    MessagesChannel, ResultsChannel,
};
use crate::message::{Message, Role};
use crate::routing::{BranchId, Intent, RouteAction};

/// Context field names written by the analysis stage.
pub mod context_keys {
    /// Classified intent label (string form of [`crate::routing::Intent`]).
    pub const INTENT: &str = "intent";
    /// Tickers extracted from the query (array of strings).
    pub const TICKERS: &str = "tickers";
    /// The raw query text the cycle is answering.
    pub const QUERY: &str = "query";
}

/// The shared state container for one conversation session.
///
/// Five independent versioned channels; see [`crate::channels`] for the merge
/// policy of each. The `results` and `decision` channels are per-cycle scratch
/// space and are cleared by [`begin_cycle`](Self::begin_cycle); `messages`,
/// `context`, and `errors` persist across turns.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub messages: MessagesChannel,
    pub context: ContextChannel,
    pub results: ResultsChannel,
    pub decision: DecisionChannel,
    pub errors: ErrorsChannel,
}

/// Immutable snapshot of conversation state at a point in time.
///
/// Snapshots are handed to pipeline stages and fan-out branches; they are deep
/// copies, so in-flight barrier commits never tear a reader's view.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub messages: Vec<Message>,
    pub messages_version: u32,
    pub context: FxHashMap<String, Value>,
    pub context_version: u32,
    pub results: FxHashMap<BranchId, BranchOutcome>,
    pub results_version: u32,
    pub decision: Option<RouteAction>,
    pub decision_version: u32,
    pub errors: Vec<ErrorEvent>,
    pub errors_version: u32,
}

impl StateSnapshot {
    /// The classified intent from the context channel, if present.
    #[must_use]
    pub fn intent(&self) -> Option<Intent> {
        self.context
            .get(context_keys::INTENT)
            .and_then(Value::as_str)
            .map(Intent::parse)
    }

    /// Tickers extracted by the analysis stage, in extraction order.
    #[must_use]
    pub fn tickers(&self) -> Vec<String> {
        self.context
            .get(context_keys::TICKERS)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent user message, which is the query this cycle answers.
    #[must_use]
    pub fn current_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::USER))
            .map(|m| m.content.as_str())
    }

    /// The last `n` message contents joined as a context window for prompts.
    #[must_use]
    pub fn recent_context(&self, n: usize) -> String {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..]
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ConversationState {
    /// Create a state seeded with a single user message.
    #[must_use]
    pub fn new_with_user_message(user_text: &str) -> Self {
        let messages = vec![Message::with_role(Role::User, user_text)];
        Self {
            messages: MessagesChannel::new(messages, 1),
            ..Default::default()
        }
    }

    /// Create a state from an existing chat history.
    #[must_use]
    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: MessagesChannel::new(messages, 1),
            ..Default::default()
        }
    }

    /// Builder for states with custom initial data.
    #[must_use]
    pub fn builder() -> ConversationStateBuilder {
        ConversationStateBuilder::default()
    }

    /// Start a new cycle: append the incoming user turn and clear the
    /// per-cycle channels.
    ///
    /// `results` and `decision` belong to exactly one cycle; stale values from
    /// the previous turn must never leak into routing or synthesis.
    pub fn begin_cycle(&mut self, user_text: &str) {
        self.messages
            .get_mut()
            .push(Message::with_role(Role::User, user_text));
        self.results.get_mut().clear();
        self.decision.clear();
    }

    /// Append a message without bumping versions (versions move at barriers).
    #[must_use = "consider using the returned self for method chaining"]
    pub fn add_message(&mut self, role: &str, content: &str) -> &mut Self {
        self.messages
            .get_mut()
            .push(Message::with_role(Role::from(role), content));
        self
    }

    /// Insert a context field without bumping versions.
    #[must_use = "consider using the returned self for method chaining"]
    pub fn add_context(&mut self, key: &str, value: Value) -> &mut Self {
        self.context.get_mut().insert(key.to_string(), value);
        self
    }

    /// Deep-copy snapshot of all channels with their current versions.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            messages_version: self.messages.version(),
            context: self.context.snapshot(),
            context_version: self.context.version(),
            results: self.results.snapshot(),
            results_version: self.results.version(),
            decision: self.decision.snapshot(),
            decision_version: self.decision.version(),
            errors: self.errors.snapshot(),
            errors_version: self.errors.version(),
        }
    }

    /// Most recent assistant reply, if any.
    #[must_use]
    pub fn last_assistant_reply(&self) -> Option<&Message> {
        self.messages.last_with_role(Message::ASSISTANT)
    }
}

/// Fluent builder for [`ConversationState`].
#[derive(Debug, Default)]
pub struct ConversationStateBuilder {
    messages: Vec<Message>,
    context: FxHashMap<String, Value>,
}

impl ConversationStateBuilder {
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::with_role(Role::User, content));
        self
    }

    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages
            .push(Message::with_role(Role::Assistant, content));
        self
    }

    pub fn with_system_message(mut self, content: &str) -> Self {
        self.messages
            .push(Message::with_role(Role::System, content));
        self
    }

    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> ConversationState {
        ConversationState {
            messages: MessagesChannel::new(self.messages, 1),
            context: ContextChannel::new(self.context, 1),
            ..Default::default()
        }
    }
}
