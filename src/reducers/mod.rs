//! State merge strategies applied at barriers.
//!
//! Every reducer folds a [`NodePartial`] delta into [`ConversationState`]
//! using the policy of exactly one channel. Reducers run serialized inside the
//! barrier (the engine owns `&mut ConversationState`), so concurrent branches
//! can never interleave half-applied commits.
//!
//! Unlike plain appends, the results and decision channels can reject a delta:
//! two branches claiming the same results key, or a second routing decision in
//! one cycle, are programming errors surfaced as [`ReducerError`] instead of
//! silent overwrites.

mod add_errors;
mod add_messages;
mod claim_results;
mod merge_context;
mod reducer_registry;
mod set_decision;

pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use claim_results::ClaimResults;
pub use merge_context::MergeContext;
pub use reducer_registry::ReducerRegistry;
pub use set_decision::SetDecision;

use miette::Diagnostic;
use thiserror::Error;

use crate::node::NodePartial;
use crate::routing::BranchId;
use crate::state::ConversationState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the channel a reducer is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    Message,
    Context,
    Result,
    Decision,
    Error,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "messages"),
            Self::Context => write!(f, "context"),
            Self::Result => write!(f, "results"),
            Self::Decision => write!(f, "decision"),
            Self::Error => write!(f, "errors"),
        }
    }
}

/// Unified reducer trait: fold a `NodePartial` delta into the state.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut ConversationState, update: &NodePartial)
    -> Result<(), ReducerError>;
}

/// Merge policy violations detected at a barrier.
#[derive(Debug, Error, Diagnostic)]
pub enum ReducerError {
    #[error("no reducers registered for channel: {0}")]
    #[diagnostic(code(tickerflow::reducers::unknown_channel))]
    UnknownChannel(ChannelType),

    /// Two writers claimed the same results key in one cycle.
    #[error("results key '{key}' claimed twice in one cycle")]
    #[diagnostic(
        code(tickerflow::reducers::result_conflict),
        help("Parallel branches must be key-disjoint by construction; this is a pipeline bug.")
    )]
    ResultConflict { key: BranchId },

    /// The routing decision was written more than once in one cycle.
    #[error("routing decision written twice in one cycle")]
    #[diagnostic(
        code(tickerflow::reducers::decision_conflict),
        help("Only the routing stage may set the decision, exactly once per cycle.")
    )]
    DecisionConflict,
}
