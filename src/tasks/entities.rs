//! Row-level access to the `entities` and `comments` tables.
//!
//! These functions take any `&Connection` (a `Transaction` derefs to one) and
//! perform no validation or auditing; the store composes them.

use crate::error::{Error, Result};
use crate::tasks::id::parse_id;
use crate::tasks::models::{Comment, Entity, EntityKind, Priority, Status};
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

const ENTITY_COLUMNS: &str =
    "id, kind, title, description, status, priority, parent_id, created_at, updated_at";

/// Filter options for listing entities.
#[derive(Debug, Default, Clone)]
pub struct EntityFilter {
    /// Filter by kind.
    pub kind: Option<EntityKind>,
    /// Filter by status.
    pub status: Option<Status>,
    /// Filter by parent id.
    pub parent_id: Option<String>,
    /// Filter by maximum priority (inclusive, lower number = higher priority).
    pub max_priority: Option<Priority>,
}

/// Current time as an RFC 3339 UTC string with microseconds.
///
/// The fixed width keeps lexical order equal to chronological order.
#[must_use]
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current time, but never earlier than `previous`.
#[must_use]
pub fn now_after(previous: &str) -> String {
    let current = now();
    if current.as_str() < previous {
        previous.to_string()
    } else {
        current
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read an [`EntityKind`] column.
pub fn parse_kind(row: &Row, idx: usize) -> rusqlite::Result<EntityKind> {
    let value: String = row.get(idx)?;
    EntityKind::from_str(&value).map_err(|e| conversion_error(idx, e))
}

fn parse_entity(row: &Row) -> rusqlite::Result<Entity> {
    let status: String = row.get(4)?;
    let priority: u8 = row.get(5)?;
    Ok(Entity {
        id: row.get(0)?,
        kind: parse_kind(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: Status::from_str(&status).map_err(|e| conversion_error(4, e))?,
        priority: Priority::from_u8(priority)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Integer, Box::new(e)))?,
        parent_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn parse_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        author: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Numeric part of an id, used as a stable ordering key.
fn seq_of(id: &str) -> i64 {
    parse_id(id).and_then(|(_, n)| i64::try_from(n).ok()).unwrap_or_default()
}

/// Fetch an entity by id.
pub fn get(conn: &Connection, id: &str) -> Result<Option<Entity>> {
    let entity = conn
        .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
            params![id],
            parse_entity,
        )
        .optional()?;
    Ok(entity)
}

/// Fetch an entity by id, failing with [`Error::NotFound`].
pub fn require(conn: &Connection, id: &str) -> Result<Entity> {
    get(conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))
}

/// Insert a new entity row.
pub fn insert(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        "INSERT INTO entities
            (id, seq, kind, title, description, status, priority, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entity.id,
            seq_of(&entity.id),
            entity.kind.as_str(),
            entity.title,
            entity.description,
            entity.status.as_str(),
            entity.priority.as_u8(),
            entity.parent_id,
            entity.created_at,
            entity.updated_at,
        ],
    )?;
    Ok(())
}

/// Write back the mutable fields of an entity.
pub fn write(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        "UPDATE entities
         SET title = ?2, description = ?3, status = ?4, priority = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            entity.id,
            entity.title,
            entity.description,
            entity.status.as_str(),
            entity.priority.as_u8(),
            entity.updated_at,
        ],
    )?;
    Ok(())
}

/// Bump `updated_at` only.
pub fn touch(conn: &Connection, id: &str, updated_at: &str) -> Result<()> {
    conn.execute("UPDATE entities SET updated_at = ?2 WHERE id = ?1", params![id, updated_at])?;
    Ok(())
}

/// All descendants of `id`: children first, then grandchildren, each level in
/// creation order.
pub fn descendants(conn: &Connection, id: &str) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(&format!(
        "WITH RECURSIVE tree(id, depth) AS (
            SELECT id, 1 FROM entities WHERE parent_id = ?1
            UNION ALL
            SELECT e.id, tree.depth + 1 FROM entities e JOIN tree ON e.parent_id = tree.id
         )
         SELECT {} FROM entities JOIN tree ON tree.id = entities.id
         ORDER BY tree.depth, entities.seq",
        qualified_columns()
    ))?;
    let entities =
        stmt.query_map(params![id], parse_entity)?.collect::<rusqlite::Result<_>>()?;
    Ok(entities)
}

fn qualified_columns() -> String {
    ENTITY_COLUMNS.split(", ").map(|c| format!("entities.{c}")).collect::<Vec<_>>().join(", ")
}

/// List entities, ordered by priority then creation order.
pub fn list(conn: &Connection, filter: &EntityFilter) -> Result<Vec<Entity>> {
    let mut conditions = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(kind) = filter.kind {
        conditions.push("kind = ?");
        params_vec.push(Box::new(kind.as_str()));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(ref parent_id) = filter.parent_id {
        conditions.push("parent_id = ?");
        params_vec.push(Box::new(parent_id.clone()));
    }
    if let Some(max_priority) = filter.max_priority {
        conditions.push("priority <= ?");
        params_vec.push(Box::new(max_priority.as_u8()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {ENTITY_COLUMNS} FROM entities {where_clause}
         ORDER BY priority ASC, created_at ASC, seq ASC, id ASC"
    );

    let params: Vec<&dyn ToSql> = params_vec.iter().map(AsRef::as_ref).collect();
    let mut stmt = conn.prepare(&sql)?;
    let entities =
        stmt.query_map(params.as_slice(), parse_entity)?.collect::<rusqlite::Result<_>>()?;
    Ok(entities)
}

/// Tasks and subtasks in `todo` whose dependencies are all completed.
pub fn ready(conn: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities
         WHERE kind IN ('task', 'subtask') AND status = 'todo'
           AND NOT EXISTS (
               SELECT 1 FROM dependencies d
               JOIN entities dep ON dep.id = d.dependency
               WHERE d.dependent = entities.id AND dep.status != 'completed'
           )
         ORDER BY priority ASC, created_at ASC, seq ASC, id ASC"
    ))?;
    let entities = stmt.query_map([], parse_entity)?.collect::<rusqlite::Result<_>>()?;
    Ok(entities)
}

/// Insert a new comment row.
pub fn insert_comment(conn: &Connection, comment: &Comment) -> Result<()> {
    conn.execute(
        "INSERT INTO comments (id, seq, entity_id, author, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            comment.id,
            seq_of(&comment.id),
            comment.entity_id,
            comment.author,
            comment.body,
            comment.created_at,
        ],
    )?;
    Ok(())
}

/// Comments on an entity, oldest first.
pub fn comments_for(conn: &Connection, entity_id: &str) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_id, author, body, created_at FROM comments
         WHERE entity_id = ?1 ORDER BY seq ASC",
    )?;
    let comments =
        stmt.query_map(params![entity_id], parse_comment)?.collect::<rusqlite::Result<_>>()?;
    Ok(comments)
}
