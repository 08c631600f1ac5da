//! Runtime configuration with environment fallbacks.
//!
//! Resolution order: explicit value, then process environment (a `.env` file
//! is honored via dotenvy), then the built-in default.
//!
//! | Setting | Env var | Default |
//! |---|---|---|
//! | checkpoint store | `REBOOK_CHECKPOINTER` (`memory`/`sqlite`) | `memory` |
//! | sqlite db path | `REBOOK_SQLITE_DB` | `rebook_checkpoints.db` |

use std::sync::Arc;

use tracing::warn;

use super::checkpoint::{CheckpointError, Checkpointer, InMemoryCheckpointer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CheckpointerKind {
    #[default]
    InMemory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub checkpointer: CheckpointerKind,
    pub sqlite_db_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            checkpointer: CheckpointerKind::default(),
            sqlite_db_name: "rebook_checkpoints.db".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(kind) = std::env::var("REBOOK_CHECKPOINTER") {
            match kind.as_str() {
                "memory" => config.checkpointer = CheckpointerKind::InMemory,
                #[cfg(feature = "sqlite")]
                "sqlite" => config.checkpointer = CheckpointerKind::Sqlite,
                other => {
                    warn!(value = %other, "unrecognized REBOOK_CHECKPOINTER; using in-memory");
                }
            }
        }
        if let Ok(db) = std::env::var("REBOOK_SQLITE_DB") {
            config.sqlite_db_name = db;
        }
        config
    }

    /// Build the configured checkpoint store.
    pub async fn checkpointer(&self) -> Result<Arc<dyn Checkpointer>, CheckpointError> {
        match self.checkpointer {
            CheckpointerKind::InMemory => Ok(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerKind::Sqlite => {
                let store =
                    super::checkpointer_sqlite::SqliteCheckpointer::connect(&self.sqlite_db_name)
                        .await?;
                Ok(Arc::new(store))
            }
        }
    }
}
