//! Concurrent execution of pipeline nodes.
//!
//! The scheduler owns the two execution shapes the engine needs:
//!
//! - [`dispatch`](Scheduler::dispatch): run one node inline; its error is the
//!   caller's error (used for the analysis and synthesis stages).
//! - [`fan_out`](Scheduler::fan_out): spawn a fixed set of branches as
//!   independent tasks and block at a join barrier until every one has
//!   reported terminal status. There is no partial join. A branch that fails
//!   (node error or task panic) yields a [`BranchFailure`] in its slot;
//!   siblings are never aborted.
//!
//! Branch tasks only ever see immutable snapshots, so the barrier is the sole
//! point where their outputs meet shared state.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::event_bus::Event;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::routing::BranchId;
use crate::state::StateSnapshot;

/// Executes nodes with a bounded degree of parallelism.
#[derive(Clone, Debug)]
pub struct Scheduler {
    concurrency_limit: usize,
}

/// Terminal failure of one branch inside a fan-out.
///
/// Recovered at the branch boundary: the engine commits a sentinel result for
/// the branch and the cycle proceeds.
#[derive(Clone, Debug)]
pub struct BranchFailure {
    pub branch: BranchId,
    pub reason: String,
}

/// Result of one fan-out/join step, in spawn order.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub outcomes: Vec<(BranchId, Result<NodePartial, BranchFailure>)>,
}

impl FanOutReport {
    /// True when no branch produced a usable partial.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|(_, r)| r.is_err())
    }
}

/// Fatal scheduling errors.
///
/// Only single-dispatch stages surface node errors; fan-out converts branch
/// failures into [`BranchFailure`] slots instead.
#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("node '{node}' failed at step {step}: {source}")]
    #[diagnostic(code(tickerflow::scheduler::node_run))]
    NodeRun {
        node: String,
        step: u64,
        #[source]
        source: NodeError,
    },
}

impl Default for Scheduler {
    fn default() -> Self {
        let limit = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(limit)
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Run a single node inline, propagating its error to the caller.
    #[instrument(skip(self, node, snapshot, event_sender), err)]
    pub async fn dispatch(
        &self,
        node_id: &str,
        node: &Arc<dyn Node>,
        snapshot: StateSnapshot,
        step: u64,
        event_sender: flume::Sender<Event>,
    ) -> Result<NodePartial, SchedulerError> {
        let ctx = NodeContext {
            node_id: node_id.to_string(),
            step,
            event_sender,
        };
        node.run(snapshot, ctx)
            .await
            .map_err(|source| SchedulerError::NodeRun {
                node: node_id.to_string(),
                step,
                source,
            })
    }

    /// Spawn the given branches concurrently and join all of them.
    ///
    /// Each branch receives its own snapshot clone; tasks acquire a semaphore
    /// permit so the degree of parallelism never exceeds the configured limit.
    /// The returned report preserves spawn order regardless of completion
    /// interleaving.
    ///
    /// Branches run inside a `JoinSet`, so dropping the returned future at a
    /// caller's cancellation point aborts every live branch task; nothing
    /// keeps running detached. Panics inside a branch are caught and reported
    /// as that branch's failure.
    #[instrument(skip(self, branches, snapshot, event_sender), fields(branch_count = branches.len()))]
    pub async fn fan_out(
        &self,
        branches: Vec<(BranchId, Arc<dyn Node>)>,
        snapshot: StateSnapshot,
        step: u64,
        event_sender: flume::Sender<Event>,
    ) -> FanOutReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let spawn_order: Vec<BranchId> = branches.iter().map(|(b, _)| *b).collect();

        let mut set = JoinSet::new();
        for (branch, node) in branches {
            let snapshot = snapshot.clone();
            let sender = event_sender.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("fan-out semaphore closed");
                let ctx = NodeContext {
                    node_id: branch.as_str().to_string(),
                    step,
                    event_sender: sender,
                };
                let run = AssertUnwindSafe(node.run(snapshot, ctx)).catch_unwind();
                (branch, run.await)
            });
        }

        // Join barrier: every branch reports terminal status before any merge.
        let mut by_branch: FxHashMap<BranchId, Result<NodePartial, BranchFailure>> =
            FxHashMap::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((branch, Ok(Ok(partial)))) => {
                    by_branch.insert(branch, Ok(partial));
                }
                Ok((branch, Ok(Err(node_err)))) => {
                    by_branch.insert(
                        branch,
                        Err(BranchFailure {
                            branch,
                            reason: node_err.to_string(),
                        }),
                    );
                }
                Ok((branch, Err(_panic))) => {
                    tracing::error!(branch = %branch, "branch task panicked");
                    by_branch.insert(
                        branch,
                        Err(BranchFailure {
                            branch,
                            reason: "branch task panicked".to_string(),
                        }),
                    );
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "branch task died before reporting");
                }
            }
        }

        let outcomes = spawn_order
            .into_iter()
            .map(|branch| {
                let outcome = by_branch.remove(&branch).unwrap_or(Err(BranchFailure {
                    branch,
                    reason: "branch task died before reporting".to_string(),
                }));
                (branch, outcome)
            })
            .collect();

        FanOutReport { outcomes }
    }
}
