//! Versioned state channels.
//!
//! Conversation state is split into independent channels, each carrying its
//! own payload and a version counter. Versions are bumped only at barriers,
//! and only when the payload actually changed, which gives persistence and
//! observability a cheap way to detect state evolution.
//!
//! Channel merge policies:
//! - [`MessagesChannel`]: append-only conversation turns
//! - [`ContextChannel`]: per-key replace (extracted query fields)
//! - [`ResultsChannel`]: key-disjoint claims, one key per branch per cycle
//! - [`DecisionChannel`]: write-once routing decision per cycle
//! - [`ErrorsChannel`]: append-only recoverable error events

pub mod errors;

pub use errors::{ErrorEvent, ErrorScope, Fault, pretty_print, pretty_print_with_mode};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::routing::{BranchId, RouteAction};

/// Common surface of a versioned channel.
pub trait Channel {
    /// Owned deep copy of the channel payload.
    type Snapshot;

    fn snapshot(&self) -> Self::Snapshot;
    fn version(&self) -> u32;
    fn set_version(&mut self, version: u32);
}

/// Terminal output of one branch for one cycle.
///
/// Branch failures never propagate to the scheduler; they are committed here
/// as sentinel values so the join barrier and synthesis stage can proceed with
/// whatever subset of branches succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchOutcome {
    /// The branch converged on a final answer.
    Answer { text: String },
    /// The iteration cap was hit; `text` is the best available partial answer.
    Partial { text: String, rounds: usize },
    /// The branch never reached a terminal answer.
    Failed { reason: String },
}

impl BranchOutcome {
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        BranchOutcome::Answer { text: text.into() }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        BranchOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// True for outcomes that carry usable analysis text.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            BranchOutcome::Answer { .. } | BranchOutcome::Partial { .. }
        )
    }

    /// The text synthesis should present for this outcome.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            BranchOutcome::Answer { text } | BranchOutcome::Partial { text, .. } => text,
            BranchOutcome::Failed { reason } => reason,
        }
    }
}

/// Append-only conversation history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagesChannel {
    items: Vec<Message>,
    version: u32,
}

impl MessagesChannel {
    #[must_use]
    pub fn new(items: Vec<Message>, version: u32) -> Self {
        Self { items, version }
    }

    pub fn get_mut(&mut self) -> &mut Vec<Message> {
        &mut self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent message with the given role, if any.
    #[must_use]
    pub fn last_with_role(&self, role: &str) -> Option<&Message> {
        self.items.iter().rev().find(|m| m.has_role(role))
    }
}

impl Default for MessagesChannel {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl Channel for MessagesChannel {
    type Snapshot = Vec<Message>;

    fn snapshot(&self) -> Vec<Message> {
        self.items.clone()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// Extracted query fields written by the analysis stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextChannel {
    map: FxHashMap<String, Value>,
    version: u32,
}

impl ContextChannel {
    #[must_use]
    pub fn new(map: FxHashMap<String, Value>, version: u32) -> Self {
        Self { map, version }
    }

    pub fn get_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.map
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }
}

impl Default for ContextChannel {
    fn default() -> Self {
        Self::new(FxHashMap::default(), 1)
    }
}

impl Channel for ContextChannel {
    type Snapshot = FxHashMap<String, Value>;

    fn snapshot(&self) -> FxHashMap<String, Value> {
        self.map.clone()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// Branch outputs for the current cycle, keyed by branch identifier.
///
/// The key-disjointness invariant (at most one writer per key per cycle) is
/// enforced at the barrier; the channel itself only stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultsChannel {
    map: FxHashMap<BranchId, BranchOutcome>,
    version: u32,
}

impl ResultsChannel {
    #[must_use]
    pub fn new(map: FxHashMap<BranchId, BranchOutcome>, version: u32) -> Self {
        Self { map, version }
    }

    pub fn get_mut(&mut self) -> &mut FxHashMap<BranchId, BranchOutcome> {
        &mut self.map
    }

    #[must_use]
    pub fn get(&self, branch: BranchId) -> Option<&BranchOutcome> {
        self.map.get(&branch)
    }

    #[must_use]
    pub fn contains(&self, branch: BranchId) -> bool {
        self.map.contains_key(&branch)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ResultsChannel {
    fn default() -> Self {
        Self::new(FxHashMap::default(), 1)
    }
}

impl Channel for ResultsChannel {
    type Snapshot = FxHashMap<BranchId, BranchOutcome>;

    fn snapshot(&self) -> FxHashMap<BranchId, BranchOutcome> {
        self.map.clone()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// The routing decision for the current cycle.
///
/// Written once by the routing stage, read once by the fan-out stage, cleared
/// when the next cycle begins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionChannel {
    decision: Option<RouteAction>,
    version: u32,
}

impl DecisionChannel {
    #[must_use]
    pub fn new(decision: Option<RouteAction>, version: u32) -> Self {
        Self { decision, version }
    }

    #[must_use]
    pub fn get(&self) -> Option<RouteAction> {
        self.decision
    }

    pub fn set(&mut self, action: RouteAction) {
        self.decision = Some(action);
    }

    pub fn clear(&mut self) {
        self.decision = None;
    }
}

impl Default for DecisionChannel {
    fn default() -> Self {
        Self::new(None, 1)
    }
}

impl Channel for DecisionChannel {
    type Snapshot = Option<RouteAction>;

    fn snapshot(&self) -> Option<RouteAction> {
        self.decision
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// Append-only log of recoverable error events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorsChannel {
    events: Vec<ErrorEvent>,
    version: u32,
}

impl ErrorsChannel {
    #[must_use]
    pub fn new(events: Vec<ErrorEvent>, version: u32) -> Self {
        Self { events, version }
    }

    pub fn get_mut(&mut self) -> &mut Vec<ErrorEvent> {
        &mut self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for ErrorsChannel {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl Channel for ErrorsChannel {
    type Snapshot = Vec<ErrorEvent>;

    fn snapshot(&self) -> Vec<ErrorEvent> {
        self.events.clone()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}
