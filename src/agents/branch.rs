//! Node wrapper that contains one specialist branch.

use async_trait::async_trait;

use super::runner::AgentRunner;
use crate::channels::BranchOutcome;
use crate::channels::errors::{ErrorEvent, Fault};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

/// How many trailing conversation turns a branch sees as context.
const CONTEXT_WINDOW: usize = 5;

/// Adapts an [`AgentRunner`] to the [`Node`] interface and absorbs its
/// failures.
///
/// This is the branch boundary of the error taxonomy: whatever happens inside
/// the loop (provider retries exhausted, tool cascade, iteration cap), the
/// node returns `Ok` with a sentinel [`BranchOutcome`] claiming only its own
/// results key, so a failing branch never blocks its siblings or the cycle.
pub struct AgentBranchNode {
    runner: AgentRunner,
}

impl AgentBranchNode {
    #[must_use]
    pub fn new(runner: AgentRunner) -> Self {
        Self { runner }
    }

    fn seed_messages(&self, snapshot: &StateSnapshot) -> Vec<Message> {
        let context = snapshot.recent_context(CONTEXT_WINDOW);
        let tickers = snapshot.tickers();
        let ticker_hint = if tickers.is_empty() {
            String::new()
        } else {
            format!("\nTickers: {}", tickers.join(", "))
        };
        vec![Message::user(&format!(
            "Context:\n{context}{ticker_hint}\n\nGather the relevant data and answer."
        ))]
    }
}

#[async_trait]
impl Node for AgentBranchNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let branch = self.runner.branch();
        let seed = self.seed_messages(&snapshot);

        match self.runner.run(seed, &ctx).await {
            Ok(report) => {
                let errors: Vec<ErrorEvent> = report
                    .faults
                    .into_iter()
                    .map(|fault| {
                        ErrorEvent::branch(branch.as_str(), ctx.step, fault).with_tag("recovered")
                    })
                    .collect();

                let mut partial = NodePartial::new().with_result(branch, report.outcome);
                if !errors.is_empty() {
                    partial = partial.with_errors(errors);
                }
                Ok(partial)
            }
            Err(provider_err) => {
                let _ = ctx.emit("agent", format!("branch failed: {provider_err}"));
                let reason = format!("inference failed after retries: {provider_err}");
                Ok(NodePartial::new()
                    .with_result(branch, BranchOutcome::failed(reason.clone()))
                    .with_errors(vec![
                        ErrorEvent::branch(branch.as_str(), ctx.step, Fault::msg(reason))
                            .with_tag("provider"),
                    ]))
            }
        }
    }
}
