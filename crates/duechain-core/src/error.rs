use std::fmt;

use thiserror::Error;

use crate::model::task::{EscalationStatus, TaskId};

/// Machine-readable error codes for scripts and callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    TaskNotFound,
    InvalidEnumValue,
    InvalidTaskField,
    InvalidEscalationConfig,
    StaleEscalation,
    PersistenceFailed,
    NotificationFailed,
    CorruptDatabase,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::TaskNotFound => "E2001",
            Self::InvalidEnumValue => "E2002",
            Self::InvalidTaskField => "E2003",
            Self::InvalidEscalationConfig => "E2004",
            Self::StaleEscalation => "E3001",
            Self::PersistenceFailed => "E5001",
            Self::NotificationFailed => "E5002",
            Self::CorruptDatabase => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::TaskNotFound => "Task not found",
            Self::InvalidEnumValue => "Invalid status value",
            Self::InvalidTaskField => "Invalid task field",
            Self::InvalidEscalationConfig => "Invalid escalation configuration",
            Self::StaleEscalation => "Escalation stage changed concurrently",
            Self::PersistenceFailed => "Task persistence failed",
            Self::NotificationFailed => "Notification delivery failed",
            Self::CorruptDatabase => "Corrupt task database",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `due init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .duechain/config.toml and retry."),
            Self::TaskNotFound => Some("Run `due list` to see existing task IDs."),
            Self::InvalidEnumValue => Some("Use one of: todo, in-progress, done."),
            Self::InvalidTaskField => None,
            Self::InvalidEscalationConfig => {
                Some("Give each escalation stage both a target and a duration in days.")
            }
            Self::StaleEscalation => None,
            Self::PersistenceFailed => Some("Run `due escalate` again; it is safe to repeat."),
            Self::NotificationFailed => Some("Check the notification backend and retry."),
            Self::CorruptDatabase => Some("Restore .duechain/duechain.db from a backup."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Rejections raised while validating task drafts and patches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("escalation {stage} needs both a target and a duration")]
    IncompleteStage { stage: &'static str },
    #[error("escalation {stage} target must not be empty")]
    EmptyStageTarget { stage: &'static str },
    #[error("email recipient '{0}' is not an email address")]
    InvalidEmail(String),
}

impl ValidationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyName => ErrorCode::InvalidTaskField,
            Self::IncompleteStage { .. }
            | Self::EmptyStageTarget { .. }
            | Self::InvalidEmail(_) => ErrorCode::InvalidEscalationConfig,
        }
    }
}

/// Errors surfaced by task repositories, notification sinks and the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task {id} is at {found}, expected {expected}")]
    Stale {
        id: TaskId,
        expected: EscalationStatus,
        found: EscalationStatus,
    },

    #[error("corrupt row for task {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::TaskNotFound,
            Self::Validation(err) => err.code(),
            Self::Stale { .. } => ErrorCode::StaleEscalation,
            Self::Corrupt { .. } => ErrorCode::CorruptDatabase,
            Self::Notification(_) => ErrorCode::NotificationFailed,
            Self::Sqlite(_) | Self::Backend(_) => ErrorCode::PersistenceFailed,
        }
    }

    /// Remediation hint, falling back to the error message when no hint exists.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.code()
            .hint()
            .map_or_else(|| self.code().message().to_string(), str::to_string)
    }

    /// Whether retrying the whole operation later can reasonably succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Backend(_) | Self::Notification(_)
        )
    }
}
