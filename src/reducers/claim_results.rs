use super::{Reducer, ReducerError};
use crate::{node::NodePartial, state::ConversationState};

/// Key-set merge for the results channel.
///
/// Each key may be claimed at most once per cycle. A duplicate claim means two
/// branches were wired to the same key: a pipeline bug, rejected fast rather
/// than silently overwritten.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct ClaimResults;

impl Reducer for ClaimResults {
    fn apply(
        &self,
        state: &mut ConversationState,
        update: &NodePartial,
    ) -> Result<(), ReducerError> {
        if let Some(results_update) = &update.results
            && !results_update.is_empty()
        {
            let mut sorted: Vec<_> = results_update.iter().collect();
            sorted.sort_by_key(|(branch, _)| **branch);
            for (branch, outcome) in sorted {
                if state.results.contains(*branch) {
                    return Err(ReducerError::ResultConflict { key: *branch });
                }
                state.results.get_mut().insert(*branch, outcome.clone());
            }
        }
        Ok(())
    }
}
