//! [`NotificationSink`] over the `notifications` table, plus the read-side
//! queries the notification list needs.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{SqliteBackend, from_micros, to_micros};
use crate::error::StoreError;
use crate::model::notification::{
    NOTIFICATION_ID_ATTEMPTS, Notification, NotificationKind, NotificationRequest,
};
use crate::model::task::{EscalationStatus, TaskId};
use crate::store::NotificationSink;

const NOTIFICATION_COLUMNS: &str =
    "notification_id, user_id, message, kind, is_read, link_to, task_id, created_at_us, stage";

/// Filters for listing notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub user_id: Option<String>,
    pub unread_only: bool,
    pub limit: Option<u32>,
}

/// A raw `notifications` row before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NotificationRow {
    notification_id: String,
    user_id: String,
    message: String,
    kind: String,
    is_read: bool,
    link_to: Option<String>,
    task_id: Option<String>,
    created_at_us: i64,
    stage: Option<String>,
}

impl NotificationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            notification_id: row.get(0)?,
            user_id: row.get(1)?,
            message: row.get(2)?,
            kind: row.get(3)?,
            is_read: row.get(4)?,
            link_to: row.get(5)?,
            task_id: row.get(6)?,
            created_at_us: row.get(7)?,
            stage: row.get(8)?,
        })
    }

    fn into_notification(self) -> Result<Notification, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.notification_id.clone(),
            reason,
        };
        let kind: NotificationKind = self.kind.parse().map_err(|e| corrupt(format!("{e}")))?;
        let stage: Option<EscalationStatus> = self
            .stage
            .as_deref()
            .map(str::parse::<EscalationStatus>)
            .transpose()
            .map_err(|e| corrupt(format!("stage: {e}")))?;
        let created_at = from_micros(&self.notification_id, self.created_at_us)?;
        Ok(Notification {
            id: self.notification_id,
            user_id: self.user_id,
            message: self.message,
            kind,
            is_read: self.is_read,
            created_at,
            link_to: self.link_to,
            task_id: self.task_id.map(TaskId::new),
            stage,
        })
    }
}

impl SqliteBackend {
    /// # Errors
    ///
    /// Returns a [`StoreError`] on query failure or a corrupt row.
    pub fn get_notification(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1");
        self.conn
            .query_row(&sql, [id], NotificationRow::from_row)
            .optional()?
            .map(NotificationRow::into_notification)
            .transpose()
    }

    /// Notifications newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on query failure or a corrupt row.
    pub fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 = 0 OR is_read = 0)
             ORDER BY created_at_us DESC, notification_id ASC
             LIMIT ?3"
        );
        let limit = filter.limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![filter.user_id, filter.unread_only, limit],
                NotificationRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    /// Mark a notification read. Returns `false` when no such notification exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on write failure.
    pub fn mark_notification_read(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE notification_id = ?1",
            [id],
        )?;
        Ok(changed == 1)
    }
}

impl SqliteBackend {
    /// The escalation notification already recorded for (task, stage), if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on query failure or a corrupt row.
    pub fn stage_notification(
        &self,
        task_id: &TaskId,
        stage: EscalationStatus,
    ) -> Result<Option<Notification>, StoreError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE task_id = ?1 AND stage = ?2"
        );
        self.conn
            .query_row(
                &sql,
                params![task_id.as_str(), stage.as_str()],
                NotificationRow::from_row,
            )
            .optional()?
            .map(NotificationRow::into_notification)
            .transpose()
    }
}

impl NotificationSink for SqliteBackend {
    fn emit(
        &self,
        request: &NotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let template = Notification::from_request(request, now);
        for attempt in 0..NOTIFICATION_ID_ATTEMPTS {
            let note = Notification {
                id: request.notification_id_at(attempt),
                ..template.clone()
            };
            // Ignored on either key: the id, or the (task, stage) pair.
            let inserted = self.conn.execute(
                "INSERT OR IGNORE INTO notifications (
                    notification_id, user_id, message, kind, is_read, link_to, task_id,
                    created_at_us, stage
                ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)",
                params![
                    note.id,
                    note.user_id,
                    note.message,
                    note.kind.to_string(),
                    note.link_to,
                    request.task_id.as_str(),
                    to_micros(now),
                    request.stage.as_str(),
                ],
            )?;
            if inserted == 1 {
                return Ok(note);
            }
            if let Some(existing) = self.stage_notification(&request.task_id, request.stage)? {
                tracing::debug!(notification_id = %existing.id, "notification already recorded");
                return Ok(existing);
            }
            tracing::warn!(
                notification_id = %note.id,
                task_id = %request.task_id,
                stage = %request.stage,
                "notification id held by another task stage; rehashing"
            );
        }
        Err(StoreError::Notification(format!(
            "no free notification id for {} at {}",
            request.task_id, request.stage
        )))
    }
}
