//! Multi-turn session orchestration.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::instrument;

use super::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
use super::runtime_config::RuntimeConfig;
use crate::channels::Channel;
use crate::channels::errors::{ErrorEvent, Fault};
use crate::engine::{EngineError, GraphEngine};
use crate::message::Message;
use crate::state::ConversationState;

/// Reply sent when the analysis stage cannot classify the query.
pub const CLARIFICATION_REPLY: &str = "I wasn't able to work out what you're asking for. \
Could you rephrase? For example, name a ticker, ask for news or fundamentals, or describe a trade.";

/// Live state of one session between turns.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub state: ConversationState,
    /// Number of completed cycles.
    pub step: u64,
}

/// Indicates how a session was initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInit {
    Fresh,
    Resumed { checkpoint_step: u64 },
}

/// How the turn concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// Normal reply from synthesis.
    Answered,
    /// Every branch failed; the reply is degraded but user-visible.
    Degraded,
    /// Classification failed; the reply asks the user to rephrase.
    NeedsClarification,
}

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub step: u64,
    pub reply: Message,
    pub status: TurnStatus,
}

/// Session-runner failures.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(tickerflow::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("turn cancelled after {waited_ms}ms; session state unchanged")]
    #[diagnostic(code(tickerflow::runner::cancelled))]
    Cancelled { waited_ms: u64 },

    #[error(transparent)]
    #[diagnostic(code(tickerflow::runner::engine))]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(code(tickerflow::runner::checkpointer))]
    Checkpointer(#[from] CheckpointerError),
}

/// Runs engine cycles against session-keyed state with checkpointing.
///
/// Each turn executes against a clone of the stored state and commits only on
/// success, so a cancelled or failed cycle leaves the session at its last
/// completed turn; no field is ever partially committed.
pub struct SessionRunner {
    engine: Arc<GraphEngine>,
    sessions: FxHashMap<String, SessionState>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    autosave: bool,
}

impl SessionRunner {
    /// Create a runner with the given backend type and autosave enabled.
    pub async fn new(engine: Arc<GraphEngine>, checkpointer_type: CheckpointerType) -> Self {
        let config = RuntimeConfig::new(None, Some(checkpointer_type), None);
        Self::from_config(engine, &config, true).await
    }

    /// Create a runner from an explicit runtime configuration.
    pub async fn from_config(
        engine: Arc<GraphEngine>,
        config: &RuntimeConfig,
        autosave: bool,
    ) -> Self {
        let checkpointer = match &config.checkpointer {
            None => None,
            Some(kind) => Self::create_checkpointer(kind, config.sqlite_db_name.clone()).await,
        };
        Self::with_checkpointer(engine, checkpointer, autosave)
    }

    /// Create a runner with a pre-built checkpointer.
    #[must_use]
    pub fn with_checkpointer(
        engine: Arc<GraphEngine>,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        autosave: bool,
    ) -> Self {
        Self {
            engine,
            sessions: FxHashMap::default(),
            checkpointer,
            autosave,
        }
    }

    async fn create_checkpointer(
        checkpointer_type: &CheckpointerType,
        sqlite_db_name: Option<String>,
    ) -> Option<Arc<dyn Checkpointer>> {
        match checkpointer_type {
            CheckpointerType::InMemory => Some(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::SQLite => {
                let db_url = std::env::var("TICKERFLOW_SQLITE_URL")
                    .ok()
                    .or_else(|| sqlite_db_name.map(|name| format!("sqlite://{name}")))
                    .unwrap_or_else(|| "sqlite://tickerflow.db".to_string());
                if let Some(path) = db_url.strip_prefix("sqlite://") {
                    let path = path.trim();
                    if !path.is_empty() {
                        let p = std::path::Path::new(path);
                        if let Some(parent) = p.parent() {
                            let _ = std::fs::create_dir_all(parent);
                        }
                        if !p.exists() {
                            let _ = std::fs::File::create_new(p);
                        }
                    }
                }
                match super::checkpointer_sqlite::SQLiteCheckpointer::connect(&db_url).await {
                    Ok(cp) => Some(Arc::new(cp) as Arc<dyn Checkpointer>),
                    Err(e) => {
                        tracing::error!(url = %db_url, error = %e, "SQLite checkpointer init failed");
                        None
                    }
                }
            }
        }
    }

    /// Initialize a session, resuming from a checkpoint when one exists.
    #[instrument(skip(self, initial_state), err)]
    pub async fn create_session(
        &mut self,
        session_id: String,
        initial_state: ConversationState,
    ) -> Result<SessionInit, RunnerError> {
        let restored = if let Some(cp) = &self.checkpointer {
            cp.load_latest(&session_id).await?
        } else {
            None
        };

        if let Some(checkpoint) = restored {
            let step = checkpoint.step;
            self.sessions.insert(
                session_id,
                SessionState {
                    state: checkpoint.state,
                    step,
                },
            );
            return Ok(SessionInit::Resumed {
                checkpoint_step: step,
            });
        }

        let session_state = SessionState {
            state: initial_state,
            step: 0,
        };
        if let Some(cp) = &self.checkpointer {
            let _ = cp
                .save(Checkpoint::new(
                    &session_id,
                    session_state.step,
                    &session_state.state,
                ))
                .await;
        }
        self.sessions.insert(session_id, session_state);
        Ok(SessionInit::Fresh)
    }

    /// Run one cycle for an incoming user turn.
    #[instrument(skip(self, user_text), err)]
    pub async fn run_turn(
        &mut self,
        session_id: &str,
        user_text: &str,
    ) -> Result<TurnReport, RunnerError> {
        self.execute_turn(session_id, user_text, None).await
    }

    /// Like [`run_turn`](Self::run_turn) but cancels the cycle after
    /// `timeout`.
    ///
    /// Cancellation drops the in-flight cycle at its next suspension point;
    /// because turns commit on success only, the stored session state is
    /// untouched.
    #[instrument(skip(self, user_text), err)]
    pub async fn run_turn_with_timeout(
        &mut self,
        session_id: &str,
        user_text: &str,
        timeout: Duration,
    ) -> Result<TurnReport, RunnerError> {
        self.execute_turn(session_id, user_text, Some(timeout)).await
    }

    async fn execute_turn(
        &mut self,
        session_id: &str,
        user_text: &str,
        timeout: Option<Duration>,
    ) -> Result<TurnReport, RunnerError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| RunnerError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        // Work on a clone; commit only on success so cancellation or failure
        // can never leave a partially-applied turn behind.
        let mut working = session.state.clone();
        let step = session.step + 1;
        working.begin_cycle(user_text);

        let cycle = self.engine.run_cycle(&mut working, step);
        let cycle_result = match timeout {
            None => cycle.await,
            Some(limit) => match tokio::time::timeout(limit, cycle).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(session = %session_id, step, "turn cancelled by timeout");
                    return Err(RunnerError::Cancelled {
                        waited_ms: limit.as_millis() as u64,
                    });
                }
            },
        };

        let (reply, status) = match cycle_result {
            Ok(report) => {
                let reply = working
                    .last_assistant_reply()
                    .cloned()
                    .unwrap_or_else(|| Message::assistant(CLARIFICATION_REPLY));
                let status = if report.degraded {
                    TurnStatus::Degraded
                } else {
                    TurnStatus::Answered
                };
                (reply, status)
            }
            Err(EngineError::Classification { reason }) => {
                // Cycle aborted before routing; surface a clarification
                // request instead of an internal error.
                tracing::info!(session = %session_id, step, %reason, "classification failed");
                let errors_version = working.errors.version();
                working.errors.get_mut().push(
                    ErrorEvent::session(session_id, step, Fault::msg(reason))
                        .with_tag("classification"),
                );
                working.errors.set_version(errors_version.saturating_add(1));

                let messages_version = working.messages.version();
                let _ = working.add_message(Message::ASSISTANT, CLARIFICATION_REPLY);
                working
                    .messages
                    .set_version(messages_version.saturating_add(1));

                (
                    Message::assistant(CLARIFICATION_REPLY),
                    TurnStatus::NeedsClarification,
                )
            }
            Err(other) => return Err(RunnerError::Engine(other)),
        };

        let session = self
            .sessions
            .get_mut(session_id)
            .expect("session checked above");
        session.state = working;
        session.step = step;

        if self.autosave
            && let Some(cp) = &self.checkpointer
            && let Some(session) = self.sessions.get(session_id)
        {
            let _ = cp
                .save(Checkpoint::new(session_id, session.step, &session.state))
                .await;
        }

        Ok(TurnReport {
            step,
            reply,
            status,
        })
    }

    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    #[must_use]
    pub fn list_sessions(&self) -> Vec<&String> {
        self.sessions.keys().collect()
    }
}
