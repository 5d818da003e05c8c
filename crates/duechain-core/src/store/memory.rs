//! In-process backends guarded by a mutex.
//!
//! Several [`TaskStore`](super::TaskStore) sessions may share one backend
//! through an `Arc`, which makes these the reference for concurrency tests.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CasOutcome, NotificationSink, TaskRepository};
use crate::error::StoreError;
use crate::escalation::EscalationUpdate;
use crate::model::notification::{NOTIFICATION_ID_ATTEMPTS, Notification, NotificationRequest};
use crate::model::task::{Task, TaskId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct RepoState {
    tasks: BTreeMap<TaskId, Task>,
    fail_next_write: Option<String>,
}

impl RepoState {
    fn take_failure(&mut self) -> Result<(), StoreError> {
        match self.fail_next_write.take() {
            Some(reason) => Err(StoreError::Backend(reason)),
            None => Ok(()),
        }
    }
}

/// Task repository held in memory, ordered by id.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    state: Mutex<RepoState>,
}

impl MemoryTaskRepository {
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let repo = Self::default();
        lock(&repo.state)
            .tasks
            .extend(tasks.into_iter().map(|t| (t.id.clone(), t)));
        repo
    }

    /// Make the next write fail with a transient backend error.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_write = Some(reason.into());
    }
}

impl TaskRepository for MemoryTaskRepository {
    fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = lock(&self.state).tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        lock(&self.state)
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.take_failure()?;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::Backend(format!("duplicate task id {}", task.id)));
        }
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.take_failure()?;
        let stored = state
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| StoreError::NotFound(task.id.clone()))?;
        let stage = stored.escalation_status;
        *stored = task.clone();
        stored.escalation_status = stage;
        Ok(())
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.take_failure()?;
        state
            .tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn compare_and_set_escalation(
        &self,
        update: &EscalationUpdate,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let mut state = lock(&self.state);
        state.take_failure()?;
        let stored = state
            .tasks
            .get_mut(&update.id)
            .ok_or_else(|| StoreError::NotFound(update.id.clone()))?;
        if stored.escalation_status != update.expected {
            return Ok(CasOutcome::Stale);
        }
        stored.escalation_status = update.new;
        stored.updated_at = now;
        Ok(CasOutcome::Applied)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    notifications: Vec<Notification>,
    fail_next: Option<String>,
}

/// Notification sink that keeps every recorded notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    state: Mutex<SinkState>,
}

impl MemoryNotificationSink {
    /// Snapshot of recorded notifications, oldest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.state).notifications.clone()
    }

    /// A sink that already holds `notifications`.
    pub fn with_notifications(notifications: impl IntoIterator<Item = Notification>) -> Self {
        let sink = Self::default();
        lock(&sink.state).notifications.extend(notifications);
        sink
    }

    /// Make the next emit fail.
    pub fn fail_next(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next = Some(reason.into());
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn emit(
        &self,
        request: &NotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next.take() {
            return Err(StoreError::Notification(reason));
        }
        if let Some(existing) = state.notifications.iter().find(|n| n.announces(request)) {
            return Ok(existing.clone());
        }
        let id = (0..NOTIFICATION_ID_ATTEMPTS)
            .map(|attempt| request.notification_id_at(attempt))
            .find(|id| state.notifications.iter().all(|n| &n.id != id))
            .ok_or_else(|| {
                StoreError::Notification(format!(
                    "no free notification id for {} at {}",
                    request.task_id, request.stage
                ))
            })?;
        let note = Notification {
            id,
            ..Notification::from_request(request, now)
        };
        state.notifications.push(note.clone());
        Ok(note)
    }
}
