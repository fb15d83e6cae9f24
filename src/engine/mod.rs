//! The cycle execution engine.
//!
//! One cycle answers one user query through a fixed five-stage pipeline:
//!
//! ```text
//! ANALYZING -> ROUTING -> {FANNING_OUT | SINGLE_DISPATCH} -> JOINING
//!           -> SYNTHESIZING -> DONE
//! ```
//!
//! The engine drives stage transitions, resolves the routing decision through
//! [`RoutingTable`], performs the explicit fork-join for parallel actions, and
//! commits merged state at a barrier after every stage. State is mutated
//! nowhere else; branches only ever read snapshots.

mod builder;

pub use builder::{EngineBuildError, GraphEngineBuilder};

use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::instrument;

use crate::channels::errors::{ErrorEvent, ErrorScope, Fault};
use crate::channels::{BranchOutcome, Channel};
use crate::event_bus::{Event, EventBus};
use crate::message::Message;
use crate::node::{Node, NodePartial};
use crate::reducers::{ReducerError, ReducerRegistry};
use crate::routing::{BranchId, Intent, RouteAction, RoutingTable};
use crate::schedulers::{Scheduler, SchedulerError};
use crate::state::ConversationState;
use crate::utils::collections::new_context_map;

/// Pipeline stage identifiers, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Analyzing,
    Routing,
    FanningOut,
    SingleDispatch,
    Joining,
    Synthesizing,
    Done,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleStage::Analyzing => "ANALYZING",
            CycleStage::Routing => "ROUTING",
            CycleStage::FanningOut => "FANNING_OUT",
            CycleStage::SingleDispatch => "SINGLE_DISPATCH",
            CycleStage::Joining => "JOINING",
            CycleStage::Synthesizing => "SYNTHESIZING",
            CycleStage::Done => "DONE",
        };
        f.write_str(label)
    }
}

/// Result of applying node partials at a barrier.
#[derive(Debug, Clone, Default)]
pub struct BarrierOutcome {
    /// Channel identifiers that were updated during the barrier.
    pub updated_channels: Vec<&'static str>,
    /// Aggregated error events recorded in this barrier, in stable order.
    pub errors: Vec<ErrorEvent>,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub step: u64,
    pub intent: Intent,
    pub action: RouteAction,
    /// Branches dispatched this cycle, in spawn order.
    pub ran_branches: Vec<BranchId>,
    /// True when every dispatched branch failed; synthesis still produced a
    /// (degraded) response.
    pub degraded: bool,
    /// Channels updated across all barriers of the cycle.
    pub updated_channels: Vec<&'static str>,
}

/// Cycle-level failures.
///
/// Per the error taxonomy, only a classification failure (no routing possible)
/// aborts a cycle; branch and tool failures are absorbed upstream.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("classification failed: {reason}")]
    #[diagnostic(
        code(tickerflow::engine::classification),
        help("Surface this to the user as a clarification request.")
    )]
    Classification { reason: String },

    #[error("no node registered for branch '{branch}'")]
    #[diagnostic(code(tickerflow::engine::missing_branch))]
    MissingBranch { branch: BranchId },

    #[error(transparent)]
    #[diagnostic(code(tickerflow::engine::barrier))]
    Barrier(#[from] ReducerError),

    #[error("synthesis stage failed: {source}")]
    #[diagnostic(code(tickerflow::engine::synthesis))]
    Synthesis {
        #[source]
        source: SchedulerError,
    },
}

/// Executes cycles against a fixed pipeline of nodes.
///
/// Construct with [`GraphEngine::builder`]; `build()` validates that the
/// analyzer, synthesizer, and every routable branch are registered, so a
/// routing decision can never point at a missing node at runtime.
pub struct GraphEngine {
    pub(crate) analyzer: Arc<dyn Node>,
    pub(crate) branches: FxHashMap<BranchId, Arc<dyn Node>>,
    pub(crate) synthesizer: Arc<dyn Node>,
    pub(crate) scheduler: Scheduler,
    pub(crate) reducers: ReducerRegistry,
    pub(crate) event_bus: EventBus,
}

impl fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphEngine")
            .field("branches", &self.branches.len())
            .finish_non_exhaustive()
    }
}

impl GraphEngine {
    #[must_use]
    pub fn builder() -> GraphEngineBuilder {
        GraphEngineBuilder::new()
    }

    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn emit_stage(&self, step: u64, stage: CycleStage) {
        let _ = self
            .event_bus
            .get_sender()
            .send(Event::diagnostic("stage", format!("step {step}: {stage}")));
    }

    /// Execute one full cycle for the query most recently appended to
    /// `state.messages`.
    ///
    /// The caller owns cycle boundaries: call
    /// [`ConversationState::begin_cycle`] first so `results` and `decision`
    /// are fresh. On success exactly one assistant message has been appended.
    #[instrument(skip(self, state), err)]
    pub async fn run_cycle(
        &self,
        state: &mut ConversationState,
        step: u64,
    ) -> Result<CycleReport, EngineError> {
        let sender = self.event_bus.get_sender();
        let mut updated_channels: Vec<&'static str> = Vec::new();

        // ANALYZING: populate context or abort; without a classification
        // there is nothing to route.
        self.emit_stage(step, CycleStage::Analyzing);
        let analysis = self
            .scheduler
            .dispatch("analyzer", &self.analyzer, state.snapshot(), step, sender.clone())
            .await
            .map_err(|e| EngineError::Classification {
                reason: e.to_string(),
            })?;
        let outcome = self.apply_barrier(state, &["analyzer"], vec![analysis])?;
        merge_updated(&mut updated_channels, &outcome);

        // ROUTING: pure decision, committed write-once.
        self.emit_stage(step, CycleStage::Routing);
        let snapshot = state.snapshot();
        let intent = snapshot
            .intent()
            .ok_or_else(|| EngineError::Classification {
                reason: "analysis produced no intent".to_string(),
            })?;
        let action = RoutingTable::decide(intent);
        tracing::info!(step, %intent, %action, "routing decision");
        let outcome = self.apply_barrier(
            state,
            &["router"],
            vec![NodePartial::new().with_decision(action)],
        )?;
        merge_updated(&mut updated_channels, &outcome);

        // FANNING_OUT / SINGLE_DISPATCH: spawn exactly the branches the
        // action names, each against a read-only snapshot.
        let dispatch_stage = if action.is_parallel() {
            CycleStage::FanningOut
        } else {
            CycleStage::SingleDispatch
        };
        self.emit_stage(step, dispatch_stage);

        let mut branch_nodes: Vec<(BranchId, Arc<dyn Node>)> = Vec::new();
        for branch in action.branches() {
            let node = self
                .branches
                .get(branch)
                .cloned()
                .ok_or(EngineError::MissingBranch { branch: *branch })?;
            branch_nodes.push((*branch, node));
        }
        let ran_branches: Vec<BranchId> = branch_nodes.iter().map(|(b, _)| *b).collect();

        let fan_out = self
            .scheduler
            .fan_out(branch_nodes, state.snapshot(), step, sender.clone())
            .await;

        // JOINING: every branch has reported terminal status; failures become
        // sentinel results so synthesis sees whatever subset succeeded.
        self.emit_stage(step, CycleStage::Joining);
        let degraded = fan_out.all_failed();
        let mut partials: Vec<NodePartial> = Vec::with_capacity(fan_out.outcomes.len());
        let mut labels: Vec<&'static str> = Vec::with_capacity(fan_out.outcomes.len());
        for (branch, outcome) in fan_out.outcomes {
            labels.push(branch.as_str());
            match outcome {
                Ok(partial) => partials.push(partial),
                Err(failure) => {
                    partials.push(
                        NodePartial::new()
                            .with_result(branch, BranchOutcome::failed(failure.reason.clone()))
                            .with_errors(vec![ErrorEvent::branch(
                                branch.as_str(),
                                step,
                                Fault::msg(failure.reason),
                            )]),
                    );
                }
            }
        }
        if degraded {
            partials.push(NodePartial::new().with_errors(vec![ErrorEvent::scheduler(
                step,
                Fault::msg("every branch in the dispatch failed; synthesizing degraded response"),
            )]));
        }
        let outcome = self.apply_barrier(state, &labels, partials)?;
        merge_updated(&mut updated_channels, &outcome);

        // SYNTHESIZING: append exactly one response message.
        self.emit_stage(step, CycleStage::Synthesizing);
        let synthesis = self
            .scheduler
            .dispatch(
                "synthesizer",
                &self.synthesizer,
                state.snapshot(),
                step,
                sender.clone(),
            )
            .await
            .map_err(|source| EngineError::Synthesis { source })?;
        let outcome = self.apply_barrier(state, &["synthesizer"], vec![synthesis])?;
        merge_updated(&mut updated_channels, &outcome);

        self.emit_stage(step, CycleStage::Done);

        Ok(CycleReport {
            step,
            intent,
            action,
            ran_branches,
            degraded,
            updated_channels,
        })
    }

    /// Merge node partials and apply reducers, bumping versions on change.
    ///
    /// This is the only place shared state is written. Partials from
    /// concurrent branches arrive here strictly after the join barrier, so the
    /// merge is single-threaded and interleaved commits cannot tear state.
    /// Key-disjointness of `results` and the write-once decision are enforced
    /// during aggregation, before any reducer runs.
    #[instrument(skip(self, state, run_ids, node_partials), err)]
    pub fn apply_barrier(
        &self,
        state: &mut ConversationState,
        run_ids: &[&'static str],
        node_partials: Vec<NodePartial>,
    ) -> Result<BarrierOutcome, ReducerError> {
        let mut msgs_all: Vec<Message> = Vec::new();
        let mut context_all = new_context_map();
        let mut results_all = crate::utils::collections::new_results_map();
        let mut decision_all: Option<RouteAction> = None;
        let mut errors_all: Vec<ErrorEvent> = Vec::new();

        for (i, partial) in node_partials.iter().enumerate() {
            let nid = run_ids.get(i).copied().unwrap_or("?");

            if let Some(ms) = &partial.messages
                && !ms.is_empty()
            {
                tracing::debug!(node = nid, count = ms.len(), "node produced messages");
                msgs_all.extend(ms.clone());
            }

            if let Some(ctx) = &partial.context
                && !ctx.is_empty()
            {
                // Sorted keys keep the merged map deterministic across runs.
                let mut sorted: Vec<_> = ctx.iter().collect();
                sorted.sort_by(|(left, _), (right, _)| left.cmp(right));
                for (k, v) in sorted {
                    context_all.insert(k.clone(), v.clone());
                }
            }

            if let Some(results) = &partial.results {
                let mut sorted: Vec<_> = results.iter().collect();
                sorted.sort_by_key(|(branch, _)| **branch);
                for (branch, result) in sorted {
                    if results_all.contains_key(branch) || state.results.contains(*branch) {
                        return Err(ReducerError::ResultConflict { key: *branch });
                    }
                    results_all.insert(*branch, result.clone());
                }
            }

            if let Some(decision) = partial.decision {
                if decision_all.is_some() {
                    return Err(ReducerError::DecisionConflict);
                }
                decision_all = Some(decision);
            }

            if let Some(errs) = &partial.errors
                && !errs.is_empty()
            {
                errors_all.extend(errs.clone());
            }
        }

        // Stable ordering so persisted error logs do not drift across runs.
        errors_all.sort_by(|a, b| {
            let key_a = scope_sort_key(&a.scope);
            let key_b = scope_sort_key(&b.scope);
            key_a
                .cmp(&key_b)
                .then_with(|| a.when.cmp(&b.when))
                .then_with(|| a.error.message.cmp(&b.error.message))
        });

        let merged = NodePartial {
            messages: if msgs_all.is_empty() {
                None
            } else {
                Some(msgs_all)
            },
            context: if context_all.is_empty() {
                None
            } else {
                Some(context_all)
            },
            results: if results_all.is_empty() {
                None
            } else {
                Some(results_all)
            },
            decision: decision_all,
            errors: if errors_all.is_empty() {
                None
            } else {
                Some(errors_all.clone())
            },
        };

        // Record before-states for version bump decisions.
        let msgs_before_len = state.messages.len();
        let msgs_before_ver = state.messages.version();
        let context_before = state.context.snapshot();
        let context_before_ver = state.context.version();
        let results_before_len = state.results.len();
        let results_before_ver = state.results.version();
        let decision_before = state.decision.get();
        let decision_before_ver = state.decision.version();
        let errors_before_len = state.errors.len();
        let errors_before_ver = state.errors.version();

        // Reducers do not bump versions; the barrier does, on change only.
        self.reducers.apply_all(state, &merged)?;

        let mut updated: Vec<&'static str> = Vec::new();
        if state.messages.len() != msgs_before_len {
            state.messages.set_version(msgs_before_ver.saturating_add(1));
            updated.push("messages");
        }
        if state.context.snapshot() != context_before {
            state
                .context
                .set_version(context_before_ver.saturating_add(1));
            updated.push("context");
        }
        if state.results.len() != results_before_len {
            state
                .results
                .set_version(results_before_ver.saturating_add(1));
            updated.push("results");
        }
        if state.decision.get() != decision_before {
            state
                .decision
                .set_version(decision_before_ver.saturating_add(1));
            updated.push("decision");
        }
        if state.errors.len() != errors_before_len {
            state
                .errors
                .set_version(errors_before_ver.saturating_add(1));
            updated.push("errors");
        }

        if !updated.is_empty() {
            tracing::debug!(channels = ?updated, "barrier applied");
        }

        Ok(BarrierOutcome {
            updated_channels: updated,
            errors: errors_all,
        })
    }
}

fn merge_updated(acc: &mut Vec<&'static str>, outcome: &BarrierOutcome) {
    for channel in &outcome.updated_channels {
        if !acc.contains(channel) {
            acc.push(channel);
        }
    }
}

fn scope_sort_key(scope: &ErrorScope) -> (u8, &str, u64) {
    match scope {
        ErrorScope::Branch { branch, step } => (0, branch.as_str(), *step),
        ErrorScope::Scheduler { step } => (1, "", *step),
        ErrorScope::Session { session, step } => (2, session.as_str(), *step),
        ErrorScope::App => (3, "", 0),
    }
}
