//! Versioned schema upgrades for the task database.
//!
//! `PRAGMA user_version` records how far a file has been upgraded. Pending
//! steps run together in one transaction, each leaving a row in
//! `schema_migrations`. A file written by a newer binary is refused rather
//! than guessed at.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use super::schema;

/// One schema step.
struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "tasks and notifications",
        sql: schema::MIGRATION_V1_SQL,
    },
    Step {
        version: 2,
        name: "list and escalation indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
    Step {
        version: 3,
        name: "one notification per task stage",
        sql: schema::MIGRATION_V3_SQL,
    },
];

/// Schema version written by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 3;

/// The version recorded in the file; 0 for a fresh database.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or holds a negative value.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw).with_context(|| format!("invalid schema version {raw}"))
}

/// Bring the file up to [`LATEST_SCHEMA_VERSION`] and check that the
/// indexes the task and notification queries rely on are present.
///
/// # Errors
///
/// Returns an error if the file is newer than this binary, a step fails
/// (nothing from the failed upgrade is kept), or an index is missing.
pub fn upgrade(conn: &mut Connection) -> Result<u32> {
    let found = schema_version(conn)?;
    if found > LATEST_SCHEMA_VERSION {
        bail!(
            "task database is at schema v{found}, this build of due only knows v{LATEST_SCHEMA_VERSION}"
        );
    }

    if found < LATEST_SCHEMA_VERSION {
        let tx = conn.transaction()?;
        tx.execute_batch(schema::MIGRATION_HISTORY_SQL)?;
        for step in STEPS.iter().filter(|step| step.version > found) {
            tx.execute_batch(step.sql)
                .with_context(|| format!("schema v{} ({})", step.version, step.name))?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                params![step.version, step.name],
            )?;
            debug!(version = step.version, name = step.name, "schema step applied");
        }
        tx.pragma_update(None, "user_version", i64::from(LATEST_SCHEMA_VERSION))?;
        tx.commit()?;
        info!(from = found, to = LATEST_SCHEMA_VERSION, "task database upgraded");
    }

    let missing = missing_indexes(conn)?;
    if !missing.is_empty() {
        bail!("task database is missing indexes: {}", missing.join(", "));
    }
    Ok(LATEST_SCHEMA_VERSION)
}

/// Required indexes that do not exist in the file.
///
/// # Errors
///
/// Returns an error if `sqlite_master` cannot be queried.
pub fn missing_indexes(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut stmt =
        conn.prepare("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)")?;
    let mut missing = Vec::new();
    for &index in schema::REQUIRED_INDEXES {
        let present: bool = stmt.query_row([index], |row| row.get(0))?;
        if !present {
            missing.push(index);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(conn: &Connection) -> Vec<(u32, String)> {
        let mut stmt = conn
            .prepare("SELECT version, name FROM schema_migrations ORDER BY version")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn fresh_file_reaches_latest_with_history() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        assert_eq!(upgrade(&mut conn).unwrap(), LATEST_SCHEMA_VERSION);
        assert_eq!(schema_version(&conn).unwrap(), LATEST_SCHEMA_VERSION);
        assert!(missing_indexes(&conn).unwrap().is_empty());

        let versions: Vec<u32> = history(&conn).into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(
            STEPS.last().map(|step| step.version),
            Some(LATEST_SCHEMA_VERSION)
        );
    }

    #[test]
    fn second_upgrade_changes_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        upgrade(&mut conn).unwrap();
        upgrade(&mut conn).unwrap();
        assert_eq!(history(&conn).len(), STEPS.len());
    }

    #[test]
    fn v1_file_keeps_tasks_and_gains_stage_key() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::MIGRATION_V1_SQL).unwrap();
        conn.pragma_update(None, "user_version", 1_i64).unwrap();
        conn.execute(
            "INSERT INTO tasks (
                task_id, name, status, escalation_status, created_at_us, updated_at_us
            ) VALUES ('tk-legacy01', 'Legacy task', 'todo', 'level1', 1, 2)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO notifications (
                notification_id, user_id, message, kind, task_id, created_at_us
            ) VALUES ('nt-legacy01', 'alice', 'old', 'task_escalation', 'tk-legacy01', 3)",
            [],
        )
        .unwrap();

        upgrade(&mut conn).unwrap();

        let stage: String = conn
            .query_row(
                "SELECT escalation_status FROM tasks WHERE task_id = 'tk-legacy01'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stage, "level1");
        let note_stage: Option<String> = conn
            .query_row(
                "SELECT stage FROM notifications WHERE notification_id = 'nt-legacy01'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(note_stage, None);
        let versions: Vec<u32> = history(&conn).into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[test]
    fn newer_file_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99_i64).unwrap();
        let err = upgrade(&mut conn).unwrap_err();
        assert!(err.to_string().contains("schema v99"));
    }

    #[test]
    fn dropped_index_is_reported() {
        let mut conn = Connection::open_in_memory().unwrap();
        upgrade(&mut conn).unwrap();
        conn.execute_batch("DROP INDEX idx_notifications_task_stage").unwrap();
        assert_eq!(
            missing_indexes(&conn).unwrap(),
            vec!["idx_notifications_task_stage"]
        );
        assert!(upgrade(&mut conn).is_err());
    }

    #[test]
    fn schema_rejects_unknown_stage() {
        let mut conn = Connection::open_in_memory().unwrap();
        upgrade(&mut conn).unwrap();
        let result = conn.execute(
            "INSERT INTO tasks (
                task_id, name, status, escalation_status, created_at_us, updated_at_us
            ) VALUES ('tk-bad', 'Bad', 'todo', 'level3', 1, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn one_notification_row_per_task_stage() {
        let mut conn = Connection::open_in_memory().unwrap();
        upgrade(&mut conn).unwrap();
        let insert = "INSERT INTO notifications (
                notification_id, user_id, message, kind, task_id, stage, created_at_us
            ) VALUES (?1, 'alice', 'overdue', 'task_escalation', 'tk-1', 'level1', 1)";
        conn.execute(insert, ["nt-a"]).unwrap();
        assert!(conn.execute(insert, ["nt-b"]).is_err());
    }
}
