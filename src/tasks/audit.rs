//! Append-only history log.
//!
//! Every committed field change is one row in `history`. Rows are only ever
//! inserted; `seq` is an AUTOINCREMENT key, so it strictly increases and is
//! never reused even across rollbacks.

use crate::error::{Error, Result};
use crate::tasks::entities::parse_kind;
use crate::tasks::models::{EntityKind, HistoryEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ToSql};

/// A history event before it has been assigned a sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent<'a> {
    /// The entity the change applies to.
    pub entity_id: &'a str,
    /// Kind of that entity.
    pub entity_kind: EntityKind,
    /// Which field changed.
    pub field: &'a str,
    /// Value before the change.
    pub old_value: Option<&'a str>,
    /// Value after the change.
    pub new_value: Option<&'a str>,
}

/// Filter and paging options for [`history`].
#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    /// Only events for this entity.
    pub entity_id: Option<String>,
    /// Only events at or after this RFC 3339 timestamp.
    pub since: Option<String>,
    /// Only events at or before this RFC 3339 timestamp.
    pub until: Option<String>,
    /// Maximum number of events to return.
    pub limit: Option<usize>,
    /// Number of matching events to skip.
    pub offset: Option<usize>,
}

/// Append one event and return its sequence number.
///
/// Runs inside the caller's transaction: if the mutation later fails the
/// event disappears with it.
pub fn record(conn: &Connection, event: &NewEvent<'_>, actor: &str, timestamp: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO history (entity_id, entity_kind, field, old_value, new_value, actor, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.entity_id,
            event.entity_kind.as_str(),
            event.field,
            event.old_value,
            event.new_value,
            actor,
            timestamp
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Parse an RFC 3339 bound and render it in the stored timestamp format.
///
/// Stored stamps are UTC with exactly six fractional digits, so once a bound
/// is in the same shape string comparison matches instant comparison.
fn normalize_bound(name: &str, value: &str) -> Result<String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Micros, true))
        .map_err(|e| Error::Validation(format!("{name} must be an RFC 3339 timestamp: {e}")))
}

/// Query the log, oldest first.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `since` or `until` is not RFC 3339.
#[allow(clippy::cast_possible_wrap)]
pub fn history(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<HistoryEvent>> {
    let mut conditions = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref id) = filter.entity_id {
        conditions.push("entity_id = ?");
        values.push(Box::new(id.clone()));
    }
    if let Some(ref since) = filter.since {
        conditions.push("timestamp >= ?");
        values.push(Box::new(normalize_bound("since", since)?));
    }
    if let Some(ref until) = filter.until {
        conditions.push("timestamp <= ?");
        values.push(Box::new(normalize_bound("until", until)?));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // SQLite needs a LIMIT before it accepts an OFFSET; -1 means unbounded.
    let limit = filter.limit.map_or(-1, |l| l as i64);
    let offset = filter.offset.unwrap_or(0) as i64;
    values.push(Box::new(limit));
    values.push(Box::new(offset));

    let sql = format!(
        "SELECT seq, entity_id, entity_kind, field, old_value, new_value, actor, timestamp
         FROM history {where_clause}
         ORDER BY seq ASC LIMIT ? OFFSET ?"
    );

    let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(params.as_slice(), |row| {
            Ok(HistoryEvent {
                seq: row.get(0)?,
                entity_id: row.get(1)?,
                entity_kind: parse_kind(row, 2)?,
                field: row.get(3)?,
                old_value: row.get(4)?,
                new_value: row.get(5)?,
                actor: row.get(6)?,
                timestamp: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::store::SCHEMA;

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn status_change<'a>(id: &'a str, old: &'a str, new: &'a str) -> NewEvent<'a> {
        NewEvent {
            entity_id: id,
            entity_kind: EntityKind::Task,
            field: "status",
            old_value: Some(old),
            new_value: Some(new),
        }
    }

    #[test]
    fn test_record_assigns_increasing_seq() {
        let conn = db();
        let a = record(&conn, &status_change("TREK-1", "todo", "in_progress"), "agent", "t1")
            .unwrap();
        let b = record(&conn, &status_change("TREK-1", "in_progress", "completed"), "agent", "t2")
            .unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_history_filters_by_entity() {
        let conn = db();
        record(&conn, &status_change("TREK-1", "todo", "in_progress"), "agent", "t1").unwrap();
        record(&conn, &status_change("TREK-2", "todo", "archived"), "agent", "t2").unwrap();
        record(&conn, &status_change("TREK-1", "in_progress", "completed"), "bot", "t3").unwrap();

        let filter = HistoryFilter { entity_id: Some("TREK-1".to_string()), ..Default::default() };
        let events = history(&conn, &filter).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.entity_id == "TREK-1"));
        assert!(events[0].seq < events[1].seq);
        assert_eq!(events[1].actor, "bot");
        assert_eq!(events[1].new_value.as_deref(), Some("completed"));
    }

    #[test]
    fn test_history_time_range_and_paging() {
        let conn = db();
        let stamps = [
            "2024-01-01T09:00:00.000000Z",
            "2024-01-02T09:00:00.000000Z",
            "2024-01-03T09:00:00.000000Z",
            "2024-01-04T09:00:00.000000Z",
        ];
        for (i, ts) in stamps.iter().enumerate() {
            let id = format!("TREK-{i}");
            record(&conn, &status_change(&id, "todo", "in_progress"), "agent", ts).unwrap();
        }

        let ranged = history(
            &conn,
            &HistoryFilter {
                since: Some("2024-01-02T09:00:00Z".to_string()),
                until: Some("2024-01-03T09:00:00Z".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ranged.len(), 2);
        assert_eq!(ranged[0].timestamp, stamps[1]);

        let page = history(
            &conn,
            &HistoryFilter { limit: Some(2), offset: Some(1), ..Default::default() },
        )
        .unwrap();
        assert_eq!(page.iter().map(|e| e.entity_id.as_str()).collect::<Vec<_>>(), [
            "TREK-1", "TREK-2"
        ]);

        let tail =
            history(&conn, &HistoryFilter { offset: Some(3), ..Default::default() }).unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn test_history_bounds_compare_as_instants() {
        let conn = db();
        let ts = "2024-05-06T23:11:39.502667Z";
        record(&conn, &status_change("TREK-1", "todo", "in_progress"), "agent", ts).unwrap();

        let count = |since: Option<&str>, until: Option<&str>| {
            let filter = HistoryFilter {
                since: since.map(str::to_string),
                until: until.map(str::to_string),
                ..Default::default()
            };
            history(&conn, &filter).unwrap().len()
        };

        // A whole-second bound sits before the fractional stamp.
        assert_eq!(count(Some("2024-05-06T23:11:39Z"), None), 1);
        assert_eq!(count(None, Some("2024-05-06T23:11:39Z")), 0);
        // Offsets name the same instant as their UTC form.
        assert_eq!(count(Some("2024-05-06T23:11:39+00:00"), None), 1);
        assert_eq!(count(Some("2024-05-07T01:11:39+02:00"), None), 1);
        assert_eq!(count(None, Some("2024-05-07T01:11:40+02:00")), 1);
        assert_eq!(count(None, Some("2024-05-07T01:11:39+02:00")), 0);
        // Exact stamps are inclusive at both ends.
        assert_eq!(count(Some(ts), Some(ts)), 1);
    }

    #[test]
    fn test_history_rejects_malformed_bounds() {
        let conn = db();
        for bad in ["yesterday", "2024-05-06", "2024-05-06 23:11:39"] {
            let filter = HistoryFilter { since: Some(bad.to_string()), ..Default::default() };
            assert!(matches!(history(&conn, &filter), Err(Error::Validation(_))), "{bad}");
            let filter = HistoryFilter { until: Some(bad.to_string()), ..Default::default() };
            assert!(matches!(history(&conn, &filter), Err(Error::Validation(_))), "{bad}");
        }
    }

    #[test]
    fn test_rolled_back_event_is_discarded() {
        let mut conn = db();
        {
            let tx = conn.transaction().unwrap();
            record(&tx, &status_change("TREK-1", "todo", "in_progress"), "agent", "t1").unwrap();
        }
        assert!(history(&conn, &HistoryFilter::default()).unwrap().is_empty());
    }
}
