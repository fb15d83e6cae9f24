use super::{Reducer, ReducerError};
use crate::{node::NodePartial, state::ConversationState};

/// Replace-on-write merge for the context channel.
///
/// Keys are applied in sorted order so merges stay deterministic regardless of
/// hash-map iteration order.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct MergeContext;

impl Reducer for MergeContext {
    fn apply(
        &self,
        state: &mut ConversationState,
        update: &NodePartial,
    ) -> Result<(), ReducerError> {
        if let Some(context_update) = &update.context
            && !context_update.is_empty()
        {
            let mut sorted: Vec<_> = context_update.iter().collect();
            sorted.sort_by(|(left, _), (right, _)| left.cmp(right));
            let state_map = state.context.get_mut();
            for (k, v) in sorted {
                state_map.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}
