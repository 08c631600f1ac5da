//! Execution runtime: the cursor-loop executor, the fan-out coordinator, and
//! suspend/resume persistence.

mod checkpoint;
#[cfg(feature = "sqlite")]
mod checkpointer_sqlite;
mod config;
mod executor;
pub mod fanout;

pub use checkpoint::{
    Checkpoint, CheckpointError, Checkpointer, InMemoryCheckpointer, PendingInterrupt,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use config::{CheckpointerKind, RuntimeConfig};
pub use executor::{Executor, RunOutcome, RunnerError};
