use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::task::{EscalationStatus, ParseEnumError, TaskId};

/// Who an escalation notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum Recipient {
    /// A user of the application, notified in-app.
    User(String),
    /// A literal email address from the final stage.
    Email(String),
}

impl Recipient {
    /// The address stored as the notification's `user_id`.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::User(id) | Self::Email(id) => id,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Email(addr) => write!(f, "email:{addr}"),
        }
    }
}

/// Notification class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskEscalation,
    TaskAssignment,
}

impl NotificationKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::TaskEscalation => "task_escalation",
            Self::TaskAssignment => "task_assignment",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "task_escalation" => Ok(Self::TaskEscalation),
            "task_assignment" => Ok(Self::TaskAssignment),
            _ => Err(ParseEnumError {
                expected: "notification kind",
                got: s.to_string(),
            }),
        }
    }
}

/// Request to record one notification for one escalation transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub task_id: TaskId,
    pub stage: EscalationStatus,
    pub recipient: Recipient,
    pub message: String,
    pub link_to: Option<String>,
}

/// How many ids a sink tries for one request before giving up.
pub const NOTIFICATION_ID_ATTEMPTS: u32 = 4;

impl NotificationRequest {
    /// Deterministic id for this (task, stage) pair.
    #[must_use]
    pub fn notification_id(&self) -> String {
        super::id::notification_id(&self.task_id, self.stage)
    }

    /// Id to use when earlier attempts collided with another pair.
    #[must_use]
    pub fn notification_id_at(&self, attempt: u32) -> String {
        super::id::notification_id_at(&self.task_id, self.stage, attempt)
    }
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub link_to: Option<String>,
    pub task_id: Option<TaskId>,
    /// Stage this notification announces; absent for non-escalation kinds.
    pub stage: Option<EscalationStatus>,
}

impl Notification {
    /// Materialize an escalation request as an unread notification.
    #[must_use]
    pub fn from_request(request: &NotificationRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: request.notification_id(),
            user_id: request.recipient.address().to_string(),
            message: request.message.clone(),
            kind: NotificationKind::TaskEscalation,
            is_read: false,
            created_at: now,
            link_to: request.link_to.clone(),
            task_id: Some(request.task_id.clone()),
            stage: Some(request.stage),
        }
    }

    /// Whether this notification already announces `request`'s (task, stage).
    ///
    /// Sinks dedupe on this pair, never on the id alone.
    #[must_use]
    pub fn announces(&self, request: &NotificationRequest) -> bool {
        self.task_id.as_ref() == Some(&request.task_id) && self.stage == Some(request.stage)
    }
}
