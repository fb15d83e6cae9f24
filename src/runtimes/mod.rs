//! Session runtime: checkpointing and multi-turn orchestration.
//!
//! The runtime layer is what makes the engine conversational. A
//! [`SessionRunner`] keys live [`SessionState`]s by session id, runs one
//! engine cycle per user turn, and persists snapshots through a pluggable
//! [`Checkpointer`] so a session survives process restarts.
//!
//! Persistence backends: [`InMemoryCheckpointer`] always; `SQLiteCheckpointer`
//! behind the `sqlite` feature (on by default).

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SQLiteCheckpointer;
pub use persistence::{
    PersistedCheckpoint, PersistedDecisionChannel, PersistedMapChannel, PersistedState,
    PersistedVecChannel,
};
pub use runner::{
    CLARIFICATION_REPLY, RunnerError, SessionInit, SessionRunner, SessionState, TurnReport,
    TurnStatus,
};
pub use runtime_config::RuntimeConfig;
