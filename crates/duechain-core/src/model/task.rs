use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ValidationError;

/// Opaque task identifier, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Work status, owned by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    ToDo,
    InProgress,
    Done,
}

impl TaskStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

/// Escalation stage of a task.
///
/// Ordered `None < Level1 < Level2 < EmailSent`; a task's stage never moves
/// backwards and `EmailSent` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    #[default]
    None,
    Level1,
    Level2,
    EmailSent,
}

impl EscalationStatus {
    pub const ALL: [Self; 4] = [Self::None, Self::Level1, Self::Level2, Self::EmailSent];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Level1 => "level1",
            Self::Level2 => "level2",
            Self::EmailSent => "email_sent",
        }
    }

    /// The stage directly after this one, or `None` for the terminal stage.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Level1),
            Self::Level1 => Some(Self::Level2),
            Self::Level2 => Some(Self::EmailSent),
            Self::EmailSent => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::EmailSent)
    }
}

/// An escalation stage handed to a user: target and days allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStage {
    pub assignee: String,
    pub duration_days: u32,
}

/// The final escalation stage, addressed to a literal email recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailStage {
    pub recipient: String,
    pub duration_days: u32,
}

/// Optional three-stage escalation chain.
///
/// Each stage is wholly present or wholly absent, so a target without a
/// duration (or the reverse) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationChain {
    pub level1: Option<UserStage>,
    pub level2: Option<UserStage>,
    pub email: Option<EmailStage>,
}

impl EscalationChain {
    /// Build a chain from independently-nullable stored columns.
    ///
    /// Half-configured stages are treated as not configured.
    #[must_use]
    pub fn from_columns(
        level1: (Option<String>, Option<u32>),
        level2: (Option<String>, Option<u32>),
        email: (Option<String>, Option<u32>),
    ) -> Self {
        Self {
            level1: pair("level 1", level1).map(|(assignee, duration_days)| UserStage {
                assignee,
                duration_days,
            }),
            level2: pair("level 2", level2).map(|(assignee, duration_days)| UserStage {
                assignee,
                duration_days,
            }),
            email: pair("email", email).map(|(recipient, duration_days)| EmailStage {
                recipient,
                duration_days,
            }),
        }
    }

    /// Whether the stage that `status` represents is configured.
    ///
    /// `None` has no stage of its own and always reports `true`.
    #[must_use]
    pub const fn has_stage(&self, status: EscalationStatus) -> bool {
        match status {
            EscalationStatus::None => true,
            EscalationStatus::Level1 => self.level1.is_some(),
            EscalationStatus::Level2 => self.level2.is_some(),
            EscalationStatus::EmailSent => self.email.is_some(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.level1.is_none() && self.level2.is_none() && self.email.is_none()
    }
}

fn pair(stage: &'static str, parts: (Option<String>, Option<u32>)) -> Option<(String, u32)> {
    match parts {
        (Some(target), Some(days)) if !target.trim().is_empty() => Some((target, days)),
        (None, None) => None,
        (target, days) => {
            tracing::warn!(
                stage,
                has_target = target.is_some(),
                has_duration = days.is_some(),
                "half-configured escalation stage treated as not configured"
            );
            None
        }
    }
}

/// A work item that may carry an escalation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub escalation_status: EscalationStatus,
    pub escalation: EscalationChain,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw target/duration pair for one stage, as typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageInput {
    pub target: Option<String>,
    pub duration_days: Option<u32>,
}

impl StageInput {
    pub fn new(target: Option<String>, duration_days: Option<u32>) -> Self {
        Self {
            target,
            duration_days,
        }
    }

    fn validate(&self, stage: &'static str) -> Result<Option<(String, u32)>, ValidationError> {
        match (&self.target, self.duration_days) {
            (None, None) => Ok(None),
            (Some(target), Some(days)) => {
                let target = target.trim();
                if target.is_empty() {
                    return Err(ValidationError::EmptyStageTarget { stage });
                }
                Ok(Some((target.to_string(), days)))
            }
            _ => Err(ValidationError::IncompleteStage { stage }),
        }
    }
}

/// Unvalidated escalation chain input from the task editing surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationInput {
    pub level1: StageInput,
    pub level2: StageInput,
    pub email: StageInput,
}

impl EscalationInput {
    /// Validate strictly: every stage is both-or-neither and the email target
    /// looks like an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, level 1 first.
    pub fn validate(&self) -> Result<EscalationChain, ValidationError> {
        let level1 = self
            .level1
            .validate("level 1")?
            .map(|(assignee, duration_days)| UserStage {
                assignee,
                duration_days,
            });
        let level2 = self
            .level2
            .validate("level 2")?
            .map(|(assignee, duration_days)| UserStage {
                assignee,
                duration_days,
            });
        let email = match self.email.validate("email")? {
            Some((recipient, _)) if !looks_like_email(&recipient) => {
                return Err(ValidationError::InvalidEmail(recipient));
            }
            Some((recipient, duration_days)) => Some(EmailStage {
                recipient,
                duration_days,
            }),
            None => None,
        };
        Ok(EscalationChain {
            level1,
            level2,
            email,
        })
    }
}

fn looks_like_email(raw: &str) -> bool {
    raw.split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDraft {
    pub name: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub escalation: EscalationInput,
}

impl TaskDraft {
    /// Validate the draft and build a fresh task with no escalation yet.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty name or a malformed chain.
    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Result<Task, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let escalation = self.escalation.validate()?;
        Ok(Task {
            id,
            name,
            description: self.description,
            assigned_to: self.assigned_to,
            due_date: self.due_date,
            status: self.status,
            escalation_status: EscalationStatus::None,
            escalation,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Manual edit of a task.
///
/// The escalation stage is deliberately absent: only the escalation runner
/// advances it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub status: Option<TaskStatus>,
    pub escalation: Option<EscalationInput>,
}

impl TaskPatch {
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.assigned_to.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.escalation.is_none()
    }

    /// Apply the patch to `task`, validating every touched field first.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] and leaves `task` untouched when any
    /// field is invalid.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let name = match &self.name {
            Some(name) if name.trim().is_empty() => return Err(ValidationError::EmptyName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let escalation = self
            .escalation
            .as_ref()
            .map(EscalationInput::validate)
            .transpose()?;

        if let Some(name) = name {
            task.name = name;
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to.clone_from(assigned_to);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(escalation) = escalation {
            task.escalation = escalation;
        }
        task.updated_at = now;
        Ok(())
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "todo" | "to_do" => Ok(Self::ToDo),
            "in_progress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for EscalationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" => Ok(Self::None),
            "level1" | "level_1" => Ok(Self::Level1),
            "level2" | "level_2" => Ok(Self::Level2),
            "email_sent" => Ok(Self::EmailSent),
            _ => Err(ParseEnumError {
                expected: "escalation status",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn stage(target: &str, days: u32) -> StageInput {
        StageInput::new(Some(target.to_string()), Some(days))
    }

    #[test]
    fn enum_json_uses_stable_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::ToDo).unwrap(), "\"todo\"");
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&EscalationStatus::EmailSent).unwrap(),
            "\"email_sent\""
        );
        assert_eq!(
            serde_json::from_str::<EscalationStatus>("\"level2\"").unwrap(),
            EscalationStatus::Level2
        );
    }

    #[test]
    fn new_tasks_default_to_todo_and_unescalated() {
        assert_eq!(TaskStatus::default(), TaskStatus::ToDo);
        assert_eq!(EscalationStatus::default(), EscalationStatus::None);
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(TaskStatus::from_str(&value.to_string()).unwrap(), value);
        }
        for value in EscalationStatus::ALL {
            assert_eq!(EscalationStatus::from_str(&value.to_string()).unwrap(), value);
        }
        assert_eq!(TaskStatus::from_str("In-Progress").unwrap(), TaskStatus::InProgress);
        assert!(TaskStatus::from_str("blocked").is_err());
        assert!(EscalationStatus::from_str("level3").is_err());
    }

    #[test]
    fn escalation_stages_are_ordered_and_terminal() {
        assert!(EscalationStatus::None < EscalationStatus::Level1);
        assert!(EscalationStatus::Level1 < EscalationStatus::Level2);
        assert!(EscalationStatus::Level2 < EscalationStatus::EmailSent);
        assert_eq!(EscalationStatus::Level2.next(), Some(EscalationStatus::EmailSent));
        assert_eq!(EscalationStatus::EmailSent.next(), None);
        assert!(EscalationStatus::EmailSent.is_terminal());
    }

    #[test]
    fn from_columns_drops_half_configured_stages() {
        let chain = EscalationChain::from_columns(
            (Some("alice".into()), Some(3)),
            (Some("bob".into()), None),
            (None, Some(2)),
        );
        assert_eq!(
            chain.level1,
            Some(UserStage {
                assignee: "alice".into(),
                duration_days: 3
            })
        );
        assert!(chain.level2.is_none());
        assert!(chain.email.is_none());
        assert!(chain.has_stage(EscalationStatus::Level1));
        assert!(!chain.has_stage(EscalationStatus::Level2));
    }

    #[test]
    fn input_validation_is_strict() {
        let input = EscalationInput {
            level1: StageInput::new(Some("alice".into()), None),
            ..EscalationInput::default()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::IncompleteStage { stage: "level 1" })
        );

        let input = EscalationInput {
            email: stage("not-an-address", 2),
            ..EscalationInput::default()
        };
        assert!(matches!(input.validate(), Err(ValidationError::InvalidEmail(_))));

        let input = EscalationInput {
            level2: stage("  carol ", 2),
            email: stage("boss@example.com", 1),
            ..EscalationInput::default()
        };
        let chain = input.validate().unwrap();
        assert!(chain.level1.is_none());
        assert_eq!(chain.level2.unwrap().assignee, "carol");
    }

    #[test]
    fn draft_creates_unescalated_task() {
        let draft = TaskDraft {
            name: "  File VAT return ".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            escalation: EscalationInput {
                level1: stage("alice", 3),
                ..EscalationInput::default()
            },
            ..TaskDraft::default()
        };
        let task = draft.into_task(TaskId::new("tk-1"), now()).unwrap();
        assert_eq!(task.name, "File VAT return");
        assert_eq!(task.status, TaskStatus::ToDo);
        assert_eq!(task.escalation_status, EscalationStatus::None);
        assert_eq!(task.created_at, task.updated_at);

        let empty = TaskDraft::default().into_task(TaskId::new("tk-2"), now());
        assert_eq!(empty, Err(ValidationError::EmptyName));
    }

    #[test]
    fn patch_is_all_or_nothing() {
        let mut task = TaskDraft {
            name: "Payroll".into(),
            ..TaskDraft::default()
        }
        .into_task(TaskId::new("tk-3"), now())
        .unwrap();
        let before = task.clone();

        let bad = TaskPatch {
            status: Some(TaskStatus::Done),
            escalation: Some(EscalationInput {
                level1: StageInput::new(None, Some(2)),
                ..EscalationInput::default()
            }),
            ..TaskPatch::default()
        };
        assert!(bad.apply(&mut task, now()).is_err());
        assert_eq!(task, before);

        let later = now() + chrono::Duration::hours(1);
        TaskPatch::status(TaskStatus::Done)
            .apply(&mut task, later)
            .unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.updated_at, later);
        assert_eq!(task.escalation_status, EscalationStatus::None);
    }
}
