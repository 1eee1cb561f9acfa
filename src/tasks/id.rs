//! Identifier generation.
//!
//! Ids are a prefix plus a per-project sequence number:
//! - `EPIC-<n>` for epics
//! - `TREK-<n>` for tasks and subtasks (one shared sequence, so a dependency
//!   endpoint never needs its kind spelled out)
//! - `CMT-<n>` for comments
//!
//! Counters live in the `id_counters` table and advance inside the creating
//! transaction, so a rolled-back create never consumes a number.

use crate::error::Result;
use crate::tasks::models::EntityKind;
use rusqlite::{params, Connection};

/// Prefix for epic ids.
pub const EPIC_PREFIX: &str = "EPIC";

/// Prefix for task and subtask ids.
pub const TASK_PREFIX: &str = "TREK";

/// Prefix for comment ids.
pub const COMMENT_PREFIX: &str = "CMT";

/// The id prefix used for entities of `kind`.
#[must_use]
pub const fn prefix_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Epic => EPIC_PREFIX,
        EntityKind::Task | EntityKind::Subtask => TASK_PREFIX,
    }
}

/// Format an id from its prefix and sequence number.
#[must_use]
pub fn format_id(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq}")
}

/// Split an id into its prefix and sequence number.
///
/// Returns `None` for anything that is not `<LETTERS>-<digits>`.
#[must_use]
pub fn parse_id(id: &str) -> Option<(&str, u64)> {
    let (prefix, number) = id.rsplit_once('-')?;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    number.parse().ok().map(|n| (prefix, n))
}

/// Normalize user input such as `trek-7` or ` Epic-2 ` to canonical form.
///
/// Input that does not look like an id is returned trimmed but otherwise
/// untouched, so lookups simply miss.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    let trimmed = id.trim();
    match parse_id(trimmed) {
        Some((prefix, seq)) => format_id(&prefix.to_ascii_uppercase(), seq),
        None => trimmed.to_string(),
    }
}

/// Allocate the next id for `prefix`.
///
/// Must be called inside the write transaction that stores the new record.
pub fn next_id(conn: &Connection, prefix: &str) -> Result<String> {
    let seq: i64 = conn.query_row(
        "INSERT INTO id_counters (prefix, next) VALUES (?1, 1)
         ON CONFLICT(prefix) DO UPDATE SET next = next + 1
         RETURNING next",
        params![prefix],
        |row| row.get(0),
    )?;
    Ok(format_id(prefix, u64::try_from(seq).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE id_counters (prefix TEXT PRIMARY KEY, next INTEGER NOT NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_prefix_for_kind() {
        assert_eq!(prefix_for(EntityKind::Epic), "EPIC");
        assert_eq!(prefix_for(EntityKind::Task), "TREK");
        assert_eq!(prefix_for(EntityKind::Subtask), "TREK");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("TREK-7"), Some(("TREK", 7)));
        assert_eq!(parse_id("EPIC-12"), Some(("EPIC", 12)));
        assert_eq!(parse_id("TREK-"), None);
        assert_eq!(parse_id("-7"), None);
        assert_eq!(parse_id("TREK-7a"), None);
        assert_eq!(parse_id("no dash"), None);
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("trek-7"), "TREK-7");
        assert_eq!(normalize_id("  Epic-2 "), "EPIC-2");
        assert_eq!(normalize_id("TREK-007"), "TREK-7");
        assert_eq!(normalize_id("not an id"), "not an id");
    }

    #[test]
    fn test_next_id_increments_per_prefix() {
        let conn = counter_db();
        assert_eq!(next_id(&conn, TASK_PREFIX).unwrap(), "TREK-1");
        assert_eq!(next_id(&conn, TASK_PREFIX).unwrap(), "TREK-2");
        assert_eq!(next_id(&conn, EPIC_PREFIX).unwrap(), "EPIC-1");
        assert_eq!(next_id(&conn, TASK_PREFIX).unwrap(), "TREK-3");
        assert_eq!(next_id(&conn, COMMENT_PREFIX).unwrap(), "CMT-1");
    }

    #[test]
    fn test_next_id_rolled_back_is_reissued() {
        let mut conn = counter_db();
        {
            let tx = conn.transaction().unwrap();
            assert_eq!(next_id(&tx, TASK_PREFIX).unwrap(), "TREK-1");
            // dropped without commit
        }
        assert_eq!(next_id(&conn, TASK_PREFIX).unwrap(), "TREK-1");
    }
}
