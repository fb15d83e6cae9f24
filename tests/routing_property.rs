use proptest::prelude::*;

use tickerflow::channels::{BranchOutcome, Channel};
use tickerflow::node::NodePartial;
use tickerflow::reducers::ReducerRegistry;
use tickerflow::routing::{BranchId, Intent, RouteAction, RoutingTable};
use tickerflow::state::ConversationState;

proptest! {
    /// `Intent::parse` accepts arbitrary classifier output and `decide` stays
    /// total over it: any string maps to exactly one of the four actions.
    #[test]
    fn decide_is_total_over_arbitrary_labels(label in ".*") {
        let intent = Intent::parse(&label);
        let action = RoutingTable::decide(intent);
        prop_assert!(matches!(
            action,
            RouteAction::Price | RouteAction::Fundamental | RouteAction::Trading | RouteAction::Both
        ));
        // Deterministic: a second evaluation agrees.
        prop_assert_eq!(action, RoutingTable::decide(Intent::parse(&label)));
    }

    /// Known intents round-trip through their string form.
    #[test]
    fn known_intents_round_trip(idx in 0usize..Intent::KNOWN.len()) {
        let intent = Intent::KNOWN[idx];
        prop_assert_eq!(Intent::parse(intent.as_str()), intent);
    }

    /// Key-disjoint result merges are commutative: any permutation of branch
    /// commits produces the same final results map.
    #[test]
    fn key_disjoint_merges_commute(perm in proptest::sample::subsequence(
        vec![BranchId::Price, BranchId::Fundamental, BranchId::Trading], 0..=3
    ).prop_shuffle()) {
        let registry = ReducerRegistry::default();

        let mut forward = ConversationState::default();
        for branch in &perm {
            let partial = NodePartial::new()
                .with_result(*branch, BranchOutcome::answer(branch.as_str()));
            registry.apply_all(&mut forward, &partial).unwrap();
        }

        let mut reverse = ConversationState::default();
        for branch in perm.iter().rev() {
            let partial = NodePartial::new()
                .with_result(*branch, BranchOutcome::answer(branch.as_str()));
            registry.apply_all(&mut reverse, &partial).unwrap();
        }

        prop_assert_eq!(forward.results.snapshot(), reverse.results.snapshot());
        prop_assert_eq!(forward.results.len(), perm.len());
    }
}
