use super::{Reducer, ReducerError};
use crate::{node::NodePartial, state::ConversationState};

/// Append-only merge for the messages channel.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(
        &self,
        state: &mut ConversationState,
        update: &NodePartial,
    ) -> Result<(), ReducerError> {
        if let Some(messages) = &update.messages
            && !messages.is_empty()
        {
            state.messages.get_mut().extend(messages.iter().cloned());
        }
        Ok(())
    }
}
