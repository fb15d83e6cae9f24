/*!
Serde-friendly persistence models for conversation state and checkpoints.

These shapes are deliberately decoupled from the in-memory types so the
checkpoint format stays an explicit contract: conversions live here (`From`
impls in both directions), backends stay lean, and no I/O happens in this
module.
*/

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::Hash;

use crate::channels::errors::ErrorEvent;
use crate::channels::{
    BranchOutcome, Channel, ContextChannel, DecisionChannel, ErrorsChannel, MessagesChannel,
    ResultsChannel,
};
use crate::message::Message;
use crate::routing::{BranchId, RouteAction};
use crate::runtimes::checkpointer::Checkpoint;
use crate::state::ConversationState;

/// Vector-shaped channel (messages, errors) with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for PersistedVecChannel<T> {
    fn default() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }
}

/// Map-shaped channel (context, results) with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedMapChannel<K: Eq + Hash, V> {
    pub version: u32,
    #[serde(default = "FxHashMap::default")]
    pub map: FxHashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for PersistedMapChannel<K, V> {
    fn default() -> Self {
        Self {
            version: 1,
            map: FxHashMap::default(),
        }
    }
}

/// The routing-decision channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedDecisionChannel {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub decision: Option<RouteAction>,
}

/// Complete persisted shape of the in-memory [`ConversationState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedState {
    pub messages: PersistedVecChannel<Message>,
    pub context: PersistedMapChannel<String, Value>,
    #[serde(default)]
    pub results: PersistedMapChannel<BranchId, BranchOutcome>,
    #[serde(default)]
    pub decision: PersistedDecisionChannel,
    #[serde(default)]
    pub errors: PersistedVecChannel<ErrorEvent>,
}

/// Full persisted checkpoint representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub step: u64,
    pub state: PersistedState,
    /// RFC3339 creation time (keeps `chrono` types out of the wire shape).
    pub created_at: String,
}

impl From<&ConversationState> for PersistedState {
    fn from(s: &ConversationState) -> Self {
        PersistedState {
            messages: PersistedVecChannel {
                version: s.messages.version(),
                items: s.messages.snapshot(),
            },
            context: PersistedMapChannel {
                version: s.context.version(),
                map: s.context.snapshot(),
            },
            results: PersistedMapChannel {
                version: s.results.version(),
                map: s.results.snapshot(),
            },
            decision: PersistedDecisionChannel {
                version: s.decision.version(),
                decision: s.decision.snapshot(),
            },
            errors: PersistedVecChannel {
                version: s.errors.version(),
                items: s.errors.snapshot(),
            },
        }
    }
}

impl From<PersistedState> for ConversationState {
    fn from(p: PersistedState) -> Self {
        ConversationState {
            messages: MessagesChannel::new(p.messages.items, p.messages.version),
            context: ContextChannel::new(p.context.map, p.context.version),
            results: ResultsChannel::new(p.results.map, p.results.version),
            decision: DecisionChannel::new(p.decision.decision, p.decision.version.max(1)),
            errors: ErrorsChannel::new(p.errors.items, p.errors.version),
        }
    }
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            step: cp.step,
            state: PersistedState::from(&cp.state),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());
        Checkpoint {
            session_id: p.session_id,
            step: p.step,
            state: ConversationState::from(p.state),
            created_at,
        }
    }
}
