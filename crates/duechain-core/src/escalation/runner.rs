use chrono::{DateTime, Utc};
use serde::Serialize;

use super::resolve::{Transition, resolve_transition};
use crate::model::notification::{NotificationRequest, Recipient};
use crate::model::task::{EscalationStatus, Task, TaskId};

/// Default deep link attached to escalation notifications.
pub const DEFAULT_LINK_TO: &str = "/tasks";

/// Conditional update asking persistence to move `id` from `expected` to `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationUpdate {
    pub id: TaskId,
    pub expected: EscalationStatus,
    pub new: EscalationStatus,
}

/// One task advanced by a run, with the notification it owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub task: Task,
    pub update: EscalationUpdate,
    pub notification: NotificationRequest,
}

/// Deltas produced by a run. Nothing here has been persisted or sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub escalations: Vec<Escalation>,
}

impl RunOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.escalations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.escalations.len()
    }

    pub fn updated_tasks(&self) -> impl Iterator<Item = &Task> {
        self.escalations.iter().map(|e| &e.task)
    }

    pub fn notifications(&self) -> impl Iterator<Item = &NotificationRequest> {
        self.escalations.iter().map(|e| &e.notification)
    }
}

/// Evaluates every task and emits the escalation deltas for this instant.
#[derive(Debug, Clone)]
pub struct EscalationRunner {
    link_to: Option<String>,
}

impl Default for EscalationRunner {
    fn default() -> Self {
        Self {
            link_to: Some(DEFAULT_LINK_TO.to_string()),
        }
    }
}

impl EscalationRunner {
    #[must_use]
    pub const fn new(link_to: Option<String>) -> Self {
        Self { link_to }
    }

    /// Compute the escalations due at `now`.
    ///
    /// Pure with respect to its inputs: calling it twice with the same tasks
    /// and instant yields the same outcome.
    #[must_use]
    pub fn run(&self, tasks: &[Task], now: DateTime<Utc>) -> RunOutcome {
        let escalations = tasks
            .iter()
            .filter_map(|task| match resolve_transition(task, now) {
                Transition::NoChange => None,
                Transition::Advance { from, to } => self.escalate(task, from, to),
            })
            .collect();
        RunOutcome { escalations }
    }

    fn escalate(
        &self,
        task: &Task,
        from: EscalationStatus,
        to: EscalationStatus,
    ) -> Option<Escalation> {
        let (recipient, message) = match to {
            EscalationStatus::Level1 | EscalationStatus::Level2 => {
                let stage = if to == EscalationStatus::Level1 {
                    task.escalation.level1.as_ref()
                } else {
                    task.escalation.level2.as_ref()
                }?;
                let level = if to == EscalationStatus::Level1 { 1 } else { 2 };
                (
                    Recipient::User(stage.assignee.clone()),
                    format!(
                        "Task \"{}\" is overdue and has been escalated to you (level {level}).",
                        task.name
                    ),
                )
            }
            EscalationStatus::EmailSent => {
                let stage = task.escalation.email.as_ref()?;
                (
                    Recipient::Email(stage.recipient.clone()),
                    format!(
                        "Task \"{}\" is still overdue after all escalation levels.",
                        task.name
                    ),
                )
            }
            EscalationStatus::None => return None,
        };

        let mut updated = task.clone();
        updated.escalation_status = to;

        Some(Escalation {
            update: EscalationUpdate {
                id: task.id.clone(),
                expected: from,
                new: to,
            },
            notification: NotificationRequest {
                task_id: task.id.clone(),
                stage: to,
                recipient,
                message,
                link_to: self.link_to.clone(),
            },
            task: updated,
        })
    }
}
