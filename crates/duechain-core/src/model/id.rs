//! Short, prefixed identifiers derived from blake3 digests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use super::task::{EscalationStatus, TaskId};

const TASK_ID_HEX_LEN: usize = 12;
const NOTIFICATION_ID_HEX_LEN: usize = 16;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh task id (`tk-` and 12 hex digits).
///
/// The process-local sequence keeps ids distinct for tasks created with the
/// same name within the same instant.
#[must_use]
pub fn generate_task_id(name: &str, now: DateTime<Utc>) -> TaskId {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&now.timestamp_micros().to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    TaskId::new(format!(
        "tk-{}",
        short_hex(&hasher.finalize(), TASK_ID_HEX_LEN)
    ))
}

/// Deterministic notification id (`nt-` and 16 hex digits) for a (task, stage) pair.
#[must_use]
pub fn notification_id(task_id: &TaskId, stage: EscalationStatus) -> String {
    notification_id_at(task_id, stage, 0)
}

/// Notification id for the given rehash attempt. Attempt 0 is
/// [`notification_id`]; later attempts are used only when an earlier id is
/// already held by a different (task, stage) pair.
#[must_use]
pub fn notification_id_at(task_id: &TaskId, stage: EscalationStatus, attempt: u32) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(task_id.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(stage.as_str().as_bytes());
    if attempt > 0 {
        hasher.update(&attempt.to_le_bytes());
    }
    format!(
        "nt-{}",
        short_hex(&hasher.finalize(), NOTIFICATION_ID_HEX_LEN)
    )
}

fn short_hex(hash: &blake3::Hash, len: usize) -> String {
    let mut hex = hash.to_hex().to_string();
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_ids_are_prefixed_and_unique() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = generate_task_id("same", now);
        let b = generate_task_id("same", now);
        assert!(a.as_str().starts_with("tk-"));
        assert_eq!(a.as_str().len(), 3 + TASK_ID_HEX_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn notification_ids_are_stable() {
        let task = TaskId::new("tk-0000abcd");
        assert_eq!(
            notification_id(&task, EscalationStatus::Level1),
            notification_id(&task, EscalationStatus::Level1)
        );
        assert_ne!(
            notification_id(&task, EscalationStatus::Level1),
            notification_id(&task, EscalationStatus::EmailSent)
        );
    }

    #[test]
    fn rehash_attempts_give_distinct_full_width_ids() {
        let task = TaskId::new("tk-0000abcd");
        let first = notification_id_at(&task, EscalationStatus::Level1, 0);
        let second = notification_id_at(&task, EscalationStatus::Level1, 1);
        assert_eq!(first, notification_id(&task, EscalationStatus::Level1));
        assert_ne!(first, second);
        assert_eq!(first.len(), 3 + NOTIFICATION_ID_HEX_LEN);
        assert_eq!(second.len(), 3 + NOTIFICATION_ID_HEX_LEN);
    }
}
