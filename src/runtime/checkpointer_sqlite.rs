/*!
SQLite-backed checkpoint store.

Durable counterpart to [`InMemoryCheckpointer`](super::InMemoryCheckpointer):
one row per thread, upserted on every suspension, deleted when the run
completes. The schema is created on connect, so a fresh database file is
usable immediately. State and interrupt payloads are stored as JSON text and
round-trip through the same serde models the in-memory store relies on.

Enabled by the default `sqlite` feature.
*/

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::checkpoint::{Checkpoint, CheckpointError, Checkpointer, PendingInterrupt};
use async_trait::async_trait;

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id  TEXT PRIMARY KEY,
    paused_at  TEXT NOT NULL,
    state      TEXT NOT NULL,
    interrupt  TEXT NOT NULL,
    saved_at   TEXT NOT NULL
)";

pub struct SqliteCheckpointer {
    pool: SqlitePool,
}

impl SqliteCheckpointer {
    /// Open (creating if missing) the database at `path` and ensure the
    /// checkpoint table exists.
    pub async fn connect(path: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(storage)?;
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(storage)?;
        debug!(path, "sqlite checkpointer connected");
        Ok(Self { pool })
    }
}

fn storage(err: sqlx::Error) -> CheckpointError {
    CheckpointError::Storage {
        message: err.to_string(),
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let interrupt = serde_json::to_string(&checkpoint.interrupt)?;
        sqlx::query(
            "INSERT INTO checkpoints (thread_id, paused_at, state, interrupt, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(thread_id) DO UPDATE SET
                 paused_at = excluded.paused_at,
                 state = excluded.state,
                 interrupt = excluded.interrupt,
                 saved_at = excluded.saved_at",
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.paused_at)
        .bind(&state)
        .bind(&interrupt)
        .bind(checkpoint.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError> {
        let row = sqlx::query(
            "SELECT paused_at, state, interrupt, saved_at
             FROM checkpoints WHERE thread_id = ?1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| CheckpointError::ThreadNotFound {
            thread_id: thread_id.to_string(),
        })?;

        let state = serde_json::from_str(row.get::<String, _>("state").as_str())?;
        let interrupt: PendingInterrupt =
            serde_json::from_str(row.get::<String, _>("interrupt").as_str())?;
        let saved_at = DateTime::parse_from_rfc3339(row.get::<String, _>("saved_at").as_str())
            .map_err(|e| CheckpointError::Storage {
                message: format!("bad saved_at timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Checkpoint {
            thread_id: thread_id.to_string(),
            paused_at: row.get("paused_at"),
            state,
            interrupt,
            saved_at,
        })
    }

    async fn clear(&self, thread_id: &str) -> Result<(), CheckpointError> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
