use tickerflow::routing::{BranchId, Intent, RouteAction, RoutingTable};

#[test]
fn decide_is_total_and_deterministic_over_known_intents() {
    for intent in Intent::KNOWN {
        let first = RoutingTable::decide(intent);
        let second = RoutingTable::decide(intent);
        assert_eq!(first, second, "decide must be deterministic for {intent}");
    }
}

#[test]
fn decide_maps_the_published_contract() {
    assert_eq!(RoutingTable::decide(Intent::Price), RouteAction::Price);
    assert_eq!(RoutingTable::decide(Intent::News), RouteAction::Fundamental);
    assert_eq!(
        RoutingTable::decide(Intent::Fundamentals),
        RouteAction::Fundamental
    );
    assert_eq!(
        RoutingTable::decide(Intent::Earnings),
        RouteAction::Fundamental
    );
    assert_eq!(RoutingTable::decide(Intent::Trade), RouteAction::Trading);
    assert_eq!(RoutingTable::decide(Intent::Portfolio), RouteAction::Trading);
    assert_eq!(RoutingTable::decide(Intent::Analysis), RouteAction::Both);
    assert_eq!(RoutingTable::decide(Intent::Comparison), RouteAction::Both);
}

#[test]
fn unrecognized_classifications_map_to_the_default_action() {
    for label in ["", "GREETING", "price?", "🚀", "unknown nonsense"] {
        let intent = Intent::parse(label);
        assert_eq!(RoutingTable::decide(intent), RoutingTable::DEFAULT_ACTION);
    }
}

#[test]
fn intent_parse_is_case_insensitive() {
    assert_eq!(Intent::parse("price"), Intent::Price);
    assert_eq!(Intent::parse(" Comparison "), Intent::Comparison);
    assert_eq!(Intent::parse("TRADE"), Intent::Trade);
}

#[test]
fn actions_spawn_fixed_branch_sets() {
    assert_eq!(RouteAction::Price.branches(), &[BranchId::Price]);
    assert_eq!(RouteAction::Fundamental.branches(), &[BranchId::Fundamental]);
    assert_eq!(RouteAction::Trading.branches(), &[BranchId::Trading]);
    assert_eq!(
        RouteAction::Both.branches(),
        &[BranchId::Price, BranchId::Fundamental]
    );
    assert!(RouteAction::Both.is_parallel());
    assert!(!RouteAction::Trading.is_parallel());
}

#[test]
fn branch_keys_are_a_stable_serialized_contract() {
    let json = serde_json::to_string(&BranchId::Fundamental).unwrap();
    assert_eq!(json, "\"fundamental\"");
    let json = serde_json::to_string(&RouteAction::Both).unwrap();
    assert_eq!(json, "\"both\"");
}
