//! Effective-deadline calculation.
//!
//! A task's effective deadline cascades from its due date through the stage
//! durations implied by its current escalation stage:
//!
//! | stage       | effective deadline                          | requires          |
//! |-------------|---------------------------------------------|-------------------|
//! | `None`      | `due + L1` (or `due` when L1 is absent)     | -                 |
//! | `Level1`    | `due + L1 + L2`                             | L1, L2            |
//! | `Level2`    | `due + L1 + L2 + email`                     | L1, L2, email     |
//! | `EmailSent` | none                                        | -                 |
//!
//! Comparison is by calendar day in UTC; the time of day never matters.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::model::task::{EscalationStatus, Task, TaskStatus};

/// The deadline that currently matters for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveDeadline {
    pub deadline: Option<NaiveDate>,
    pub is_overdue: bool,
}

impl EffectiveDeadline {
    const fn inert(deadline: Option<NaiveDate>) -> Self {
        Self {
            deadline,
            is_overdue: false,
        }
    }
}

/// Compute the effective deadline of `task` and whether it has passed at `now`.
///
/// Done or undated tasks report their raw due date and are never overdue.
#[must_use]
pub fn compute_effective_deadline(task: &Task, now: DateTime<Utc>) -> EffectiveDeadline {
    let Some(due) = task.due_date else {
        return EffectiveDeadline::inert(None);
    };
    if task.status == TaskStatus::Done {
        return EffectiveDeadline::inert(Some(due));
    }

    match cascade_offset_days(task) {
        Some(offset) => match due.checked_add_days(Days::new(offset)) {
            Some(deadline) => EffectiveDeadline {
                deadline: Some(deadline),
                is_overdue: now.date_naive() > deadline,
            },
            None => EffectiveDeadline::inert(None),
        },
        None => EffectiveDeadline::inert(None),
    }
}

/// Days added to the due date for the task's current stage, or `None` when no
/// further threshold exists.
fn cascade_offset_days(task: &Task) -> Option<u64> {
    let chain = &task.escalation;
    let level1 = chain.level1.as_ref().map(|s| u64::from(s.duration_days));
    let level2 = chain.level2.as_ref().map(|s| u64::from(s.duration_days));
    let email = chain.email.as_ref().map(|s| u64::from(s.duration_days));

    match task.escalation_status {
        EscalationStatus::None => Some(level1.unwrap_or(0)),
        EscalationStatus::Level1 => Some(level1? + level2?),
        EscalationStatus::Level2 => Some(level1? + level2? + email?),
        EscalationStatus::EmailSent => None,
    }
}
