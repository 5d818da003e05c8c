use chrono::{DateTime, Utc};
use serde::Serialize;

use super::deadline::compute_effective_deadline;
use crate::model::task::{EscalationStatus, Task, TaskStatus};

/// Outcome of evaluating one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    NoChange,
    Advance {
        from: EscalationStatus,
        to: EscalationStatus,
    },
}

impl Transition {
    #[must_use]
    pub const fn target(self) -> Option<EscalationStatus> {
        match self {
            Self::NoChange => None,
            Self::Advance { to, .. } => Some(to),
        }
    }
}

/// Decide whether `task` should move to its next escalation stage at `now`.
///
/// Advances at most one stage per call, only into a configured stage, and
/// never backwards. A `now` earlier than the task's creation is treated as
/// not yet overdue.
#[must_use]
pub fn resolve_transition(task: &Task, now: DateTime<Utc>) -> Transition {
    if task.status == TaskStatus::Done || now < task.created_at {
        return Transition::NoChange;
    }
    let Some(next) = task.escalation_status.next() else {
        return Transition::NoChange;
    };
    if !task.escalation.has_stage(next) {
        return Transition::NoChange;
    }
    if !compute_effective_deadline(task, now).is_overdue {
        return Transition::NoChange;
    }

    Transition::Advance {
        from: task.escalation_status,
        to: next,
    }
}
