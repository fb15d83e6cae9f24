use super::{Reducer, ReducerError};
use crate::{node::NodePartial, state::ConversationState};

/// Write-once merge for the routing decision channel.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct SetDecision;

impl Reducer for SetDecision {
    fn apply(
        &self,
        state: &mut ConversationState,
        update: &NodePartial,
    ) -> Result<(), ReducerError> {
        if let Some(decision) = update.decision {
            if state.decision.get().is_some() {
                return Err(ReducerError::DecisionConflict);
            }
            state.decision.set(decision);
        }
        Ok(())
    }
}
