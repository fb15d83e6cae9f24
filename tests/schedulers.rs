use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tickerflow::channels::BranchOutcome;
use tickerflow::event_bus::{EventBus, MemorySink};
use tickerflow::node::{Node, NodeContext, NodeError, NodePartial};
use tickerflow::routing::BranchId;
use tickerflow::schedulers::Scheduler;
use tickerflow::state::{ConversationState, StateSnapshot};

/// Claims its branch key after an optional delay.
struct DelayNode {
    branch: BranchId,
    delay: Duration,
}

#[async_trait]
impl Node for DelayNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(NodePartial::new().with_result(self.branch, BranchOutcome::answer("done")))
    }
}

/// Fails with a node error.
struct ErrNode;

#[async_trait]
impl Node for ErrNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        Err(NodeError::MissingInput { what: "test_key" })
    }
}

/// Dies outright.
struct PanicNode;

#[async_trait]
impl Node for PanicNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        panic!("branch task blew up");
    }
}

fn snapshot() -> StateSnapshot {
    ConversationState::default().snapshot()
}

#[tokio::test]
async fn fan_out_joins_all_branches_in_spawn_order() {
    let scheduler = Scheduler::new(2);
    let bus = EventBus::with_sink(MemorySink::new());

    // The slower branch is spawned first; the report still lists spawn order.
    let branches: Vec<(BranchId, Arc<dyn Node>)> = vec![
        (
            BranchId::Price,
            Arc::new(DelayNode {
                branch: BranchId::Price,
                delay: Duration::from_millis(40),
            }),
        ),
        (
            BranchId::Fundamental,
            Arc::new(DelayNode {
                branch: BranchId::Fundamental,
                delay: Duration::from_millis(1),
            }),
        ),
    ];

    let report = scheduler
        .fan_out(branches, snapshot(), 1, bus.get_sender())
        .await;

    let ids: Vec<BranchId> = report.outcomes.iter().map(|(b, _)| *b).collect();
    assert_eq!(ids, vec![BranchId::Price, BranchId::Fundamental]);
    assert!(report.outcomes.iter().all(|(_, r)| r.is_ok()));
    assert!(!report.all_failed());
}

#[tokio::test]
async fn failing_branch_is_contained_and_sibling_completes() {
    let scheduler = Scheduler::new(2);
    let bus = EventBus::with_sink(MemorySink::new());

    let branches: Vec<(BranchId, Arc<dyn Node>)> = vec![
        (BranchId::Price, Arc::new(ErrNode)),
        (
            BranchId::Fundamental,
            Arc::new(DelayNode {
                branch: BranchId::Fundamental,
                delay: Duration::from_millis(10),
            }),
        ),
    ];

    let report = scheduler
        .fan_out(branches, snapshot(), 1, bus.get_sender())
        .await;

    let price = &report.outcomes[0];
    let fundamental = &report.outcomes[1];
    assert!(price.1.is_err());
    assert!(fundamental.1.is_ok());
    assert!(!report.all_failed());
}

#[tokio::test]
async fn panicking_branch_becomes_a_branch_failure() {
    let scheduler = Scheduler::new(2);
    let bus = EventBus::with_sink(MemorySink::new());

    let branches: Vec<(BranchId, Arc<dyn Node>)> = vec![
        (BranchId::Price, Arc::new(PanicNode)),
        (
            BranchId::Fundamental,
            Arc::new(DelayNode {
                branch: BranchId::Fundamental,
                delay: Duration::from_millis(1),
            }),
        ),
    ];

    let report = scheduler
        .fan_out(branches, snapshot(), 1, bus.get_sender())
        .await;

    let failure = report.outcomes[0].1.as_ref().unwrap_err();
    assert_eq!(failure.branch, BranchId::Price);
    assert!(failure.reason.contains("panicked"));
    assert!(report.outcomes[1].1.is_ok());
}

#[tokio::test]
async fn all_failed_is_reported_for_synthesis_degradation() {
    let scheduler = Scheduler::new(2);
    let bus = EventBus::with_sink(MemorySink::new());

    let branches: Vec<(BranchId, Arc<dyn Node>)> =
        vec![(BranchId::Price, Arc::new(ErrNode))];
    let report = scheduler
        .fan_out(branches, snapshot(), 1, bus.get_sender())
        .await;
    assert!(report.all_failed());
}

#[tokio::test]
async fn limit_one_still_completes_every_branch() {
    let scheduler = Scheduler::new(1);
    let bus = EventBus::with_sink(MemorySink::new());

    let branches: Vec<(BranchId, Arc<dyn Node>)> = vec![
        (
            BranchId::Price,
            Arc::new(DelayNode {
                branch: BranchId::Price,
                delay: Duration::from_millis(5),
            }),
        ),
        (
            BranchId::Fundamental,
            Arc::new(DelayNode {
                branch: BranchId::Fundamental,
                delay: Duration::from_millis(5),
            }),
        ),
    ];

    let report = scheduler
        .fan_out(branches, snapshot(), 1, bus.get_sender())
        .await;
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|(_, r)| r.is_ok()));
}
