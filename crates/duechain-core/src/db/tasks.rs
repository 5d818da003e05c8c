//! [`TaskRepository`] over the `tasks` table.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{SqliteBackend, from_micros, to_micros};
use crate::error::StoreError;
use crate::escalation::EscalationUpdate;
use crate::model::task::{EscalationChain, EscalationStatus, Task, TaskId, TaskStatus};
use crate::store::{CasOutcome, TaskRepository, TaskScan, UnreadableTask};

const DATE_FORMAT: &str = "%Y-%m-%d";

const TASK_COLUMNS: &str = "task_id, name, description, assigned_to, due_date, status, \
     escalation_status, level1_assignee, level1_days, level2_assignee, level2_days, \
     email_recipient, email_days, created_at_us, updated_at_us";

/// A raw `tasks` row before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TaskRow {
    task_id: String,
    name: String,
    description: Option<String>,
    assigned_to: Option<String>,
    due_date: Option<String>,
    status: String,
    escalation_status: String,
    level1_assignee: Option<String>,
    level1_days: Option<i64>,
    level2_assignee: Option<String>,
    level2_days: Option<i64>,
    email_recipient: Option<String>,
    email_days: Option<i64>,
    created_at_us: i64,
    updated_at_us: i64,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            task_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            assigned_to: row.get(3)?,
            due_date: row.get(4)?,
            status: row.get(5)?,
            escalation_status: row.get(6)?,
            level1_assignee: row.get(7)?,
            level1_days: row.get(8)?,
            level2_assignee: row.get(9)?,
            level2_days: row.get(10)?,
            email_recipient: row.get(11)?,
            email_days: row.get(12)?,
            created_at_us: row.get(13)?,
            updated_at_us: row.get(14)?,
        })
    }

    fn into_task(self) -> Result<Task, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.task_id.clone(),
            reason,
        };
        let status: TaskStatus = self.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let escalation_status: EscalationStatus = self
            .escalation_status
            .parse()
            .map_err(|e| corrupt(format!("{e}")))?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT))
            .transpose()
            .map_err(|e| corrupt(format!("due date: {e}")))?;
        let created_at = from_micros(&self.task_id, self.created_at_us)?;
        let updated_at = from_micros(&self.task_id, self.updated_at_us)?;

        // Negative or oversized durations count as missing.
        let days = |raw: Option<i64>| raw.and_then(|d| u32::try_from(d).ok());
        let escalation = EscalationChain::from_columns(
            (self.level1_assignee, days(self.level1_days)),
            (self.level2_assignee, days(self.level2_days)),
            (self.email_recipient, days(self.email_days)),
        );

        Ok(Task {
            id: TaskId::new(self.task_id),
            name: self.name,
            description: self.description,
            assigned_to: self.assigned_to,
            due_date,
            status,
            escalation_status,
            escalation,
            created_at,
            updated_at,
        })
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn stage_columns(task: &Task) -> [(Option<&str>, Option<i64>); 3] {
    let chain = &task.escalation;
    [
        (
            chain.level1.as_ref().map(|s| s.assignee.as_str()),
            chain.level1.as_ref().map(|s| i64::from(s.duration_days)),
        ),
        (
            chain.level2.as_ref().map(|s| s.assignee.as_str()),
            chain.level2.as_ref().map(|s| i64::from(s.duration_days)),
        ),
        (
            chain.email.as_ref().map(|s| s.recipient.as_str()),
            chain.email.as_ref().map(|s| i64::from(s.duration_days)),
        ),
    ]
}

impl SqliteBackend {
    fn task_exists(&self, id: &TaskId) -> Result<bool, StoreError> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE task_id = ?1)",
            [id.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Current stored stage of a task, read without loading the whole row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn escalation_status(&self, id: &TaskId) -> Result<EscalationStatus, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT escalation_status FROM tasks WHERE task_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(id.clone()))?;
        raw.parse().map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("{e}"),
        })
    }
}

impl TaskRepository for SqliteBackend {
    fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at_us ASC, task_id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], TaskRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    fn scan_tasks(&self) -> Result<TaskScan, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at_us ASC, task_id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut scan = TaskScan::default();
        while let Some(row) = rows.next()? {
            let task_id: String = row.get(0)?;
            match TaskRow::from_row(row)
                .map_err(StoreError::from)
                .and_then(TaskRow::into_task)
            {
                Ok(task) => scan.tasks.push(task),
                Err(err) => scan.unreadable.push(UnreadableTask {
                    task_id: TaskId::new(task_id),
                    reason: err.to_string(),
                }),
            }
        }
        Ok(scan)
    }

    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1");
        self.conn
            .query_row(&sql, [id.as_str()], TaskRow::from_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?
            .into_task()
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let [l1, l2, email] = stage_columns(task);
        self.conn.execute(
            "INSERT INTO tasks (
                task_id, name, description, assigned_to, due_date, status,
                escalation_status, level1_assignee, level1_days, level2_assignee,
                level2_days, email_recipient, email_days, created_at_us, updated_at_us
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                task.id.as_str(),
                task.name,
                task.description,
                task.assigned_to,
                format_date(task.due_date),
                task.status.to_string(),
                task.escalation_status.to_string(),
                l1.0,
                l1.1,
                l2.0,
                l2.1,
                email.0,
                email.1,
                to_micros(task.created_at),
                to_micros(task.updated_at),
            ],
        )?;
        Ok(())
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let [l1, l2, email] = stage_columns(task);
        let changed = self.conn.execute(
            "UPDATE tasks SET
                name = ?2, description = ?3, assigned_to = ?4, due_date = ?5, status = ?6,
                level1_assignee = ?7, level1_days = ?8, level2_assignee = ?9,
                level2_days = ?10, email_recipient = ?11, email_days = ?12,
                updated_at_us = ?13
             WHERE task_id = ?1",
            params![
                task.id.as_str(),
                task.name,
                task.description,
                task.assigned_to,
                format_date(task.due_date),
                task.status.to_string(),
                l1.0,
                l1.1,
                l2.0,
                l2.1,
                email.0,
                email.1,
                to_micros(task.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(task.id.clone()));
        }
        Ok(())
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_id = ?1", [id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn compare_and_set_escalation(
        &self,
        update: &EscalationUpdate,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET escalation_status = ?1, updated_at_us = ?2
             WHERE task_id = ?3 AND escalation_status = ?4",
            params![
                update.new.to_string(),
                to_micros(now),
                update.id.as_str(),
                update.expected.to_string(),
            ],
        )?;
        if changed == 1 {
            return Ok(CasOutcome::Applied);
        }
        if self.task_exists(&update.id)? {
            Ok(CasOutcome::Stale)
        } else {
            Err(StoreError::NotFound(update.id.clone()))
        }
    }
}
