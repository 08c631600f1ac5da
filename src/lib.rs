//! # Rebook: Durable Calendar-Rescheduling Workflows
//!
//! Rebook is a resumable workflow engine wrapped around one concrete job:
//! rescheduling a day of calendar events by negotiating with every invitee
//! concurrently. Executions stream their progress as events, suspend at
//! human-confirmation points, and survive process restarts through
//! checkpoints keyed by thread id.
//!
//! ## Core Concepts
//!
//! - **Steps**: Async units of work that read a staged state record and
//!   contribute exactly the fields the next stage declares
//! - **State**: An immutable, progressively-extended record whose stage tag
//!   is set fresh on every extension
//! - **Graph**: A compiled linear pipeline plus one fan-out edge spawning a
//!   per-invitee sub-workflow
//! - **Interrupts**: First-class suspensions that checkpoint the run and
//!   wait for a typed resume signal
//! - **Events**: A per-run stream of state snapshots, text chunks, loading
//!   notices, and interrupts, filtered to a client-safe protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rebook::domain::mock::{self, MockCalendar, MockDirectory, MockMessenger};
//! use rebook::domain::User;
//! use rebook::runtime::InMemoryCheckpointer;
//! use rebook::service::WorkflowService;
//! use rebook::state::StateRecord;
//!
//! # async fn demo() -> miette::Result<()> {
//! let user = User::new("Dana", "Europe/Berlin");
//! let calendar = Arc::new(MockCalendar::new(vec![]));
//! let directory = Arc::new(MockDirectory::new([user.clone()]));
//! let messenger = Arc::new(MockMessenger::new());
//! let collaborators = mock::collaborators(calendar, directory, messenger);
//!
//! let service = WorkflowService::new(
//!     Arc::new(rebook::reschedule::build_graph().map_err(miette::Report::from)?),
//!     collaborators,
//!     Arc::new(InMemoryCheckpointer::new()),
//! );
//!
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
//! let seed = StateRecord::initial(date, &user).map_err(miette::Report::from)?;
//! let session = service.start("thread-1", seed);
//! while let Ok(record) = session.records.recv_async().await {
//!     println!("{}", serde_json::to_string(&record).unwrap());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`state`] - Staged state records and schema validation
//! - [`step`] - The step trait, outcomes, and suspension
//! - [`graphs`] - Workflow declaration, compile-time validation, fan-out
//! - [`runtime`] - Execution, checkpointing, and the fan-out coordinator
//! - [`events`] - The per-run event stream and its sinks
//! - [`protocol`] - Client-facing NDJSON records and resume signals
//! - [`service`] - Start/resume session API tying the above together
//! - [`domain`] - Calendar, messaging, and proposal collaborators
//! - [`reschedule`] - The concrete rescheduling pipeline

pub mod domain;
pub mod events;
pub mod graphs;
pub mod message;
pub mod protocol;
pub mod reschedule;
pub mod runtime;
pub mod service;
pub mod state;
pub mod step;
pub mod telemetry;
