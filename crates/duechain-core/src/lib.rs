//! duechain-core library.
//!
//! Tasks may carry a chain of up to three escalation stages. When a task is
//! not done by its due date, the [`escalation`] engine moves it one stage at
//! a time, and the [`store::TaskStore`] persists each move with a
//! compare-and-set and records exactly one notification per stage.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums in the library ([`error::StoreError`]),
//!   `anyhow::Result` at configuration and database-open boundaries.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Time**: injected through [`clock::Clock`]; nothing reads the wall clock
//!   behind the caller's back.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod escalation;
pub mod model;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorCode, StoreError, ValidationError};
pub use model::notification::{Notification, NotificationKind, NotificationRequest, Recipient};
pub use model::task::{
    EmailStage, EscalationChain, EscalationInput, EscalationStatus, StageInput, Task, TaskDraft,
    TaskId, TaskPatch, TaskStatus, UserStage,
};
pub use store::{
    CasOutcome, NotificationSink, OutcomeKind, RunReport, TaskRepository, TaskScan, TaskStore,
    UnreadableTask,
};
