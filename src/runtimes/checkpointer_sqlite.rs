//! SQLite-backed checkpoint persistence.
//!
//! One row per session; saving upserts the row in a single statement, which
//! gives the per-session atomicity the [`Checkpointer`] contract requires.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;

use super::checkpointer::{Checkpoint, Checkpointer, CheckpointerError};
use super::persistence::PersistedCheckpoint;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS checkpoints (\
    session_id TEXT PRIMARY KEY,\
    step INTEGER NOT NULL,\
    payload TEXT NOT NULL,\
    created_at TEXT NOT NULL\
)";

/// Durable [`Checkpointer`] backed by a SQLite database.
pub struct SQLiteCheckpointer {
    pool: sqlx::SqlitePool,
}

impl SQLiteCheckpointer {
    /// Connect to `database_url` (e.g. `sqlite://sessions.db`) and ensure the
    /// checkpoint table exists.
    pub async fn connect(database_url: &str) -> Result<Self, CheckpointerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Checkpointer for SQLiteCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointerError> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let payload = serde_json::to_string(&persisted)?;

        sqlx::query(
            "INSERT INTO checkpoints (session_id, step, payload, created_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(session_id) DO UPDATE SET \
                 step = excluded.step, \
                 payload = excluded.payload, \
                 created_at = excluded.created_at",
        )
        .bind(&persisted.session_id)
        .bind(persisted.step as i64)
        .bind(&payload)
        .bind(&persisted.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_latest(
        &self,
        session_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointerError> {
        let row = sqlx::query("SELECT payload FROM checkpoints WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let payload: String = row.get("payload");
                let persisted: PersistedCheckpoint = serde_json::from_str(&payload)?;
                Ok(Some(Checkpoint::from(persisted)))
            }
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointerError> {
        let rows = sqlx::query("SELECT session_id FROM checkpoints ORDER BY session_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("session_id")).collect())
    }
}
