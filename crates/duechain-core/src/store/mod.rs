//! Task Store: the state container that owns the task list and drives
//! escalation runs against injected persistence and notification backends.
//!
//! Escalation writes are compare-and-set on the stage column. When two
//! sessions run concurrently against the same stale snapshot, exactly one
//! write lands and only that session notifies; the loser's delta is dropped
//! without error.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::escalation::{EscalationRunner, EscalationUpdate, RunOutcome};
use crate::model::id::generate_task_id;
use crate::model::notification::{Notification, NotificationRequest};
use crate::model::task::{EscalationStatus, Task, TaskDraft, TaskId, TaskPatch};

/// Result of a conditional escalation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CasOutcome {
    Applied,
    /// The stored stage no longer matched the expected one.
    Stale,
}

/// A stored task that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableTask {
    pub task_id: TaskId,
    pub reason: String,
}

/// Every loadable task, plus the rows set aside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskScan {
    pub tasks: Vec<Task>,
    pub unreadable: Vec<UnreadableTask>,
}

/// Remote persistence for tasks.
pub trait TaskRepository {
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Like [`fetch_tasks`](Self::fetch_tasks), but a task that fails to load
    /// is set aside instead of failing the whole list.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read at all.
    fn scan_tasks(&self) -> Result<TaskScan, StoreError> {
        Ok(TaskScan {
            tasks: self.fetch_tasks()?,
            unreadable: Vec::new(),
        })
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend rejects the write.
    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Overwrite the user-editable fields of an existing task. The stored
    /// escalation stage is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError>;

    /// Write `update.new` only if the stored stage still equals `update.expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids, or a backend error.
    fn compare_and_set_escalation(
        &self,
        update: &EscalationUpdate,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError>;
}

/// Durable notification recording.
pub trait NotificationSink {
    /// Record `request` once. Recording the same (task, stage) pair again
    /// returns the existing notification.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the notification cannot be recorded.
    fn emit(
        &self,
        request: &NotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError>;
}

impl<R: TaskRepository + ?Sized> TaskRepository for Arc<R> {
    fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        (**self).fetch_tasks()
    }

    fn scan_tasks(&self) -> Result<TaskScan, StoreError> {
        (**self).scan_tasks()
    }

    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        (**self).get_task(id)
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        (**self).insert_task(task)
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        (**self).save_task(task)
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        (**self).delete_task(id)
    }

    fn compare_and_set_escalation(
        &self,
        update: &EscalationUpdate,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        (**self).compare_and_set_escalation(update, now)
    }
}

impl<N: NotificationSink + ?Sized> NotificationSink for Arc<N> {
    fn emit(
        &self,
        request: &NotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        (**self).emit(request, now)
    }
}

/// What happened to one attempted escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeKind {
    Escalated { notification_id: String },
    /// Another session advanced the task first.
    Stale,
    PersistFailed { reason: String },
    /// The stage was persisted but the notification was not recorded.
    NotifyFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub from: EscalationStatus,
    pub to: EscalationStatus,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

/// Per-task results of one `run_escalations` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub evaluated: usize,
    pub outcomes: Vec<TaskOutcome>,
    /// Stored tasks that could not be loaded and were not evaluated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<UnreadableTask>,
}

impl RunReport {
    pub fn escalated(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.kind, OutcomeKind::Escalated { .. }))
    }

    /// Tasks whose stage could not be written; re-running the pass retries them.
    #[must_use]
    pub fn unpersisted(&self) -> Vec<&TaskId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.kind, OutcomeKind::PersistFailed { .. }))
            .map(|o| &o.task_id)
            .collect()
    }

    #[must_use]
    pub fn failed_notifications(&self) -> Vec<&TaskId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.kind, OutcomeKind::NotifyFailed { .. }))
            .map(|o| &o.task_id)
            .collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unpersisted().is_empty() && self.failed_notifications().is_empty()
    }
}

/// Owns the task list for one session.
pub struct TaskStore<R, N, C> {
    repo: R,
    notifier: N,
    clock: C,
    runner: EscalationRunner,
    tasks: Vec<Task>,
    unreadable: Vec<UnreadableTask>,
}

impl<R, N, C> TaskStore<R, N, C>
where
    R: TaskRepository,
    N: NotificationSink,
    C: Clock,
{
    #[must_use]
    pub fn new(repo: R, notifier: N, clock: C) -> Self {
        Self {
            repo,
            notifier,
            clock,
            runner: EscalationRunner::default(),
            tasks: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: EscalationRunner) -> Self {
        self.runner = runner;
        self
    }

    /// The task list as last loaded or modified through this store.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repo
    }

    /// Tasks the last load set aside.
    #[must_use]
    pub fn unreadable(&self) -> &[UnreadableTask] {
        &self.unreadable
    }

    /// Reload the task list from the repository. Tasks that cannot be loaded
    /// are logged and kept out of the list; see [`unreadable`](Self::unreadable).
    ///
    /// # Errors
    ///
    /// Propagates the repository error; the cached list is left untouched.
    pub fn fetch_tasks(&mut self) -> Result<&[Task], StoreError> {
        let scan = self.repo.scan_tasks()?;
        for bad in &scan.unreadable {
            warn!(task_id = %bad.task_id, reason = %bad.reason, "skipping unreadable task");
        }
        self.tasks = scan.tasks;
        self.unreadable = scan.unreadable;
        Ok(&self.tasks)
    }

    /// # Errors
    ///
    /// Returns a validation error for a malformed draft, or the repository error.
    pub fn create_task(&mut self, draft: TaskDraft) -> Result<Task, StoreError> {
        let now = self.clock.now();
        let id = generate_task_id(&draft.name, now);
        let task = draft.into_task(id, now)?;
        self.repo.insert_task(&task)?;
        info!(task_id = %task.id, name = %task.name, "task created");
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Apply a manual edit. Escalation stage changes are not accepted here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], a validation error, or the repository error.
    pub fn update_task(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let mut task = self.repo.get_task(id)?;
        patch.apply(&mut task, self.clock.now())?;
        self.repo.save_task(&task)?;
        debug!(task_id = %id, status = %task.status, "task updated");
        self.replace_cached(task.clone());
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or the repository error.
    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), StoreError> {
        self.repo.delete_task(id)?;
        self.tasks.retain(|t| &t.id != id);
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Load current tasks, run the escalation engine, and apply its deltas.
    ///
    /// Safe to call as often as wanted; each call advances a task by at most
    /// one stage.
    ///
    /// # Errors
    ///
    /// Fails only when the task list cannot be loaded. Per-task persistence
    /// and notification failures are reported in the [`RunReport`].
    pub fn run_escalations(&mut self) -> Result<RunReport, StoreError> {
        let now = self.clock.now();
        self.fetch_tasks()?;
        let outcome = self.runner.run(&self.tasks, now);
        let evaluated = self.tasks.len();
        let mut report = self.persist_escalations(outcome, now);
        report.evaluated = evaluated;
        report.skipped.clone_from(&self.unreadable);
        Ok(report)
    }

    /// Apply a computed [`RunOutcome`]: conditionally persist each stage and
    /// notify only for writes that landed.
    pub fn persist_escalations(&mut self, outcome: RunOutcome, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport {
            evaluated: 0,
            outcomes: Vec::with_capacity(outcome.len()),
            skipped: Vec::new(),
        };

        for escalation in outcome.escalations {
            let update = &escalation.update;
            let kind = match self.repo.compare_and_set_escalation(update, now) {
                Ok(CasOutcome::Applied) => {
                    info!(
                        task_id = %update.id,
                        from = %update.expected,
                        to = %update.new,
                        recipient = %escalation.notification.recipient,
                        "task escalated"
                    );
                    let mut task = escalation.task;
                    task.updated_at = now;
                    self.replace_cached(task);
                    self.notify(&escalation.notification, now)
                }
                Ok(CasOutcome::Stale) => {
                    debug!(
                        task_id = %update.id,
                        expected = %update.expected,
                        "escalation already applied elsewhere; dropping delta"
                    );
                    OutcomeKind::Stale
                }
                Err(err) => {
                    warn!(task_id = %update.id, error = %err, "failed to persist escalation");
                    OutcomeKind::PersistFailed {
                        reason: err.to_string(),
                    }
                }
            };
            report.outcomes.push(TaskOutcome {
                task_id: update.id.clone(),
                from: update.expected,
                to: update.new,
                kind,
            });
        }

        report
    }

    fn notify(&self, request: &NotificationRequest, now: DateTime<Utc>) -> OutcomeKind {
        match self.notifier.emit(request, now) {
            Ok(note) => OutcomeKind::Escalated {
                notification_id: note.id,
            },
            Err(err) => {
                warn!(
                    task_id = %request.task_id,
                    recipient = %request.recipient,
                    error = %err,
                    "escalation persisted but notification failed"
                );
                OutcomeKind::NotifyFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn replace_cached(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }
}
