use super::CheckpointerType;
use crate::utils::id_generator::IdGenerator;

/// Runtime settings for a session runner.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Explicit session id; a random one is generated when absent.
    pub session_id: Option<String>,
    /// Persistence backend; `None` disables checkpointing.
    pub checkpointer: Option<CheckpointerType>,
    /// Database file for the SQLite backend.
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_id: Some(IdGenerator::new().generate_session_id()),
            checkpointer: Some(CheckpointerType::InMemory),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "tickerflow.db".to_string()))
    }

    #[must_use]
    pub fn new(
        session_id: Option<String>,
        checkpointer: Option<CheckpointerType>,
        sqlite_db_name: Option<String>,
    ) -> Self {
        Self {
            session_id,
            checkpointer,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }
}
