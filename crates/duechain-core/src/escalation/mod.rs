//! Deadline escalation engine.
//!
//! [`deadline`] computes the effective deadline, [`resolve`] decides whether
//! a task moves up one stage, and [`runner`] turns those decisions into task
//! updates and notification requests. None of these modules touch storage.

pub mod deadline;
pub mod resolve;
pub mod runner;

pub use deadline::{EffectiveDeadline, compute_effective_deadline};
pub use resolve::{Transition, resolve_transition};
pub use runner::{Escalation, EscalationRunner, EscalationUpdate, RunOutcome};
