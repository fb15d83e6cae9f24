use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::GraphEngine;
use crate::event_bus::EventBus;
use crate::node::Node;
use crate::reducers::ReducerRegistry;
use crate::routing::BranchId;
use crate::schedulers::Scheduler;

/// Builder for [`GraphEngine`].
///
/// The pipeline shape is fixed (analyze → route → branches → synthesize); the
/// builder wires concrete nodes into it and validates completeness at
/// `build()` so routing can never reach an unregistered branch at runtime.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tickerflow::engine::GraphEngine;
/// use tickerflow::routing::BranchId;
/// # fn nodes() -> (Arc<dyn tickerflow::node::Node>, Arc<dyn tickerflow::node::Node>) { unimplemented!() }
///
/// # fn example() -> Result<GraphEngine, tickerflow::engine::EngineBuildError> {
/// # let (analyzer, node) = nodes();
/// let engine = GraphEngine::builder()
///     .with_analyzer(analyzer)
///     .with_branch(BranchId::Price, node.clone())
///     .with_branch(BranchId::Fundamental, node.clone())
///     .with_branch(BranchId::Trading, node.clone())
///     .with_synthesizer(node)
///     .build()?;
/// # Ok(engine)
/// # }
/// ```
pub struct GraphEngineBuilder {
    analyzer: Option<Arc<dyn Node>>,
    branches: FxHashMap<BranchId, Arc<dyn Node>>,
    synthesizer: Option<Arc<dyn Node>>,
    scheduler: Scheduler,
    reducers: ReducerRegistry,
    event_bus: Option<EventBus>,
}

/// Validation failures reported by [`GraphEngineBuilder::build`].
#[derive(Debug, Error, Diagnostic)]
pub enum EngineBuildError {
    #[error("pipeline has no analyzer node")]
    #[diagnostic(code(tickerflow::engine::build::missing_analyzer))]
    MissingAnalyzer,

    #[error("pipeline has no synthesizer node")]
    #[diagnostic(code(tickerflow::engine::build::missing_synthesizer))]
    MissingSynthesizer,

    #[error("no node registered for routable branch '{0}'")]
    #[diagnostic(
        code(tickerflow::engine::build::missing_branch),
        help("Every branch the routing table can dispatch must be registered.")
    )]
    MissingBranch(BranchId),
}

impl Default for GraphEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphEngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzer: None,
            branches: FxHashMap::default(),
            synthesizer: None,
            scheduler: Scheduler::default(),
            reducers: ReducerRegistry::default(),
            event_bus: None,
        }
    }

    #[must_use]
    pub fn with_analyzer(mut self, node: Arc<dyn Node>) -> Self {
        self.analyzer = Some(node);
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: BranchId, node: Arc<dyn Node>) -> Self {
        self.branches.insert(branch, node);
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, node: Arc<dyn Node>) -> Self {
        self.synthesizer = Some(node);
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[must_use]
    pub fn with_reducers(mut self, reducers: ReducerRegistry) -> Self {
        self.reducers = reducers;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Validate and assemble the engine; starts the event-bus listener.
    pub fn build(self) -> Result<GraphEngine, EngineBuildError> {
        let analyzer = self.analyzer.ok_or(EngineBuildError::MissingAnalyzer)?;
        let synthesizer = self
            .synthesizer
            .ok_or(EngineBuildError::MissingSynthesizer)?;
        for branch in BranchId::ALL {
            if !self.branches.contains_key(&branch) {
                return Err(EngineBuildError::MissingBranch(branch));
            }
        }

        let event_bus = self.event_bus.unwrap_or_default();
        event_bus.listen_for_events();

        Ok(GraphEngine {
            analyzer,
            branches: self.branches,
            synthesizer,
            scheduler: self.scheduler,
            reducers: self.reducers,
            event_bus,
        })
    }
}
