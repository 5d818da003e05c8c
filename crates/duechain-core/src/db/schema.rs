//! Canonical SQLite schema for duechain.
//!
//! - `tasks` holds one row per task; each escalation stage is a nullable
//!   target/duration column pair
//! - `notifications` holds recorded notifications; escalation rows are unique
//!   per (task, stage), so re-recording the same stage is a no-op
//! - `schema_migrations` lists the upgrades applied to this file

/// Migration v1: tasks and notifications.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    description TEXT,
    assigned_to TEXT,
    due_date TEXT,
    status TEXT NOT NULL CHECK (status IN ('todo', 'in_progress', 'done')),
    escalation_status TEXT NOT NULL DEFAULT 'none'
        CHECK (escalation_status IN ('none', 'level1', 'level2', 'email_sent')),
    level1_assignee TEXT,
    level1_days INTEGER,
    level2_assignee TEXT,
    level2_days INTEGER,
    email_recipient TEXT,
    email_days INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (task_id LIKE 'tk-%')
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL CHECK (length(trim(user_id)) > 0),
    message TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('task_escalation', 'task_assignment')),
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    link_to TEXT,
    task_id TEXT,
    created_at_us INTEGER NOT NULL
);
";

/// Migration v2: read-path indexes for list views and escalation runs.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_tasks_status_due
    ON tasks(status, due_date);

CREATE INDEX IF NOT EXISTS idx_tasks_escalation
    ON tasks(escalation_status, status);

CREATE INDEX IF NOT EXISTS idx_notifications_user_read
    ON notifications(user_id, is_read, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_notifications_task
    ON notifications(task_id);
";

/// Migration v3: record which stage an escalation notification announces and
/// allow at most one notification per (task, stage).
pub const MIGRATION_V3_SQL: &str = r"
ALTER TABLE notifications ADD COLUMN stage TEXT
    CHECK (stage IS NULL OR stage IN ('level1', 'level2', 'email_sent'));

CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_task_stage
    ON notifications(task_id, stage)
    WHERE task_id IS NOT NULL AND stage IS NOT NULL;
";

/// Upgrade history, created before the first migration runs.
pub const MIGRATION_HISTORY_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

/// Indexes expected by list and escalation query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tasks_status_due",
    "idx_tasks_escalation",
    "idx_notifications_user_read",
    "idx_notifications_task",
    "idx_notifications_task_stage",
];
