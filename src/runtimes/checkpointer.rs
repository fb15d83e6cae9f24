//! Checkpoint persistence contracts and the in-memory backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::state::ConversationState;

/// Which persistence backend a runner should use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointerType {
    InMemory,
    #[cfg(feature = "sqlite")]
    SQLite,
}

/// A persisted snapshot of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub session_id: String,
    /// Cycle count at the time of the snapshot.
    pub step: u64,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(session_id: &str, step: u64, state: &ConversationState) -> Self {
        Self {
            session_id: session_id.to_string(),
            step,
            state: state.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Checkpoint storage failures.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    #[error("checkpoint serialization failed: {source}")]
    #[diagnostic(code(tickerflow::checkpointer::serde))]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[cfg(feature = "sqlite")]
    #[error("checkpoint database error: {source}")]
    #[diagnostic(code(tickerflow::checkpointer::database))]
    Database {
        #[from]
        source: sqlx::Error,
    },

    #[error("checkpoint storage error: {0}")]
    #[diagnostic(code(tickerflow::checkpointer::storage))]
    Storage(String),
}

/// Session-keyed checkpoint persistence.
///
/// Implementations must be atomic per session: a save is either fully visible
/// to a subsequent load or not at all, so concurrent turns on one session
/// never observe a half-written state.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointerError>;
    async fn load_latest(&self, session_id: &str)
    -> Result<Option<Checkpoint>, CheckpointerError>;
    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointerError>;
}

/// Volatile checkpoint store for tests and development.
///
/// Atomicity comes for free: each save replaces the whole entry under a write
/// lock.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    store: RwLock<FxHashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointerError> {
        self.store
            .write()
            .await
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn load_latest(
        &self,
        session_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointerError> {
        Ok(self.store.read().await.get(session_id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointerError> {
        Ok(self.store.read().await.keys().cloned().collect())
    }
}
