use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::channels::BranchOutcome;
use crate::routing::BranchId;

/// Fresh context map with the crate's standard hasher.
#[must_use]
pub fn new_context_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// Fresh results map with the crate's standard hasher.
#[must_use]
pub fn new_results_map() -> FxHashMap<BranchId, BranchOutcome> {
    FxHashMap::default()
}
