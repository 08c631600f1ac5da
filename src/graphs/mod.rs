//! Workflow topology: declaration, validation, and the compiled graph.
//!
//! A workflow is a fixed chain of [`Step`](crate::step::Step)s connected by
//! unconditional edges, plus at most one dynamic construct: the conditional
//! fan-out edge, which at runtime produces one send instruction per invitee,
//! all targeting the same sub-workflow. [`GraphBuilder`] declares the
//! topology; [`GraphBuilder::compile`] validates it and yields an immutable
//! [`WorkflowGraph`] the runtime drives.
//!
//! Validation covers: every referenced step is declared, exactly one entry,
//! at most one outgoing edge per step, acyclicity outside the fan-out
//! construct, every step reachable from the entry (the terminal falls out of
//! the linear walk, so it is reachable from every step), and every step's
//! declared field requirements satisfied by some ancestor.
//!
//! # Quick Start
//!
//! ```
//! use rebook::graphs::GraphBuilder;
//! use rebook::state::Stage;
//! # use async_trait::async_trait;
//! # use rebook::state::StateRecord;
//! # use rebook::step::{Step, StepContext, StepError, StepOutcome};
//! # struct Noop;
//! # #[async_trait]
//! # impl Step for Noop {
//! #     async fn run(&self, _: &StateRecord, _: StepContext) -> Result<StepOutcome, StepError> {
//! #         Ok(StepOutcome::stay())
//! #     }
//! # }
//!
//! let graph = GraphBuilder::new()
//!     .add_step("first", Noop)
//!     .add_step("second", Noop)
//!     .add_edge("first", "second")
//!     .set_entry("first", Stage::Initial)
//!     .compile()
//!     .unwrap();
//! assert_eq!(graph.entry(), "first");
//! ```

mod builder;
mod compilation;
mod fanout;

pub use builder::GraphBuilder;
pub use compilation::{GraphValidationError, WorkflowGraph};
pub use fanout::{
    BranchCollector, FanoutEdge, FanoutFinisher, FanoutPlanner, FanoutReport, SendInstruction,
};
