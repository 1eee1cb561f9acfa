//! Inverted token index over entity text and comment bodies.
//!
//! Documents are entities (title + description) and comments (body), keyed by
//! their id. Postings are plain `(token, doc_id)` rows maintained inside the
//! same transaction as the mutation that changed the text.

use crate::error::Result;
use crate::tasks::models::{EntityKind, Status};
use rusqlite::{params, Connection, ToSql};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tokens shorter than this are not indexed.
const MIN_TOKEN_LEN: usize = 2;

/// What a search hit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// An epic's title or description.
    Epic,
    /// A task's title or description.
    Task,
    /// A subtask's title or description.
    Subtask,
    /// A comment body.
    Comment,
}

impl SearchType {
    /// Parse a search type from a string.
    ///
    /// # Errors
    ///
    /// Returns the rejected input if it is not a known type.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "task" => Ok(Self::Task),
            "subtask" => Ok(Self::Subtask),
            "comment" => Ok(Self::Comment),
            _ => Err(format!(
                "invalid search type: '{s}' (must be one of: epic, task, subtask, comment)"
            )),
        }
    }

    /// Get the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Task => "task",
            Self::Subtask => "subtask",
            Self::Comment => "comment",
        }
    }
}

impl From<EntityKind> for SearchType {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Epic => Self::Epic,
            EntityKind::Task => Self::Task,
            EntityKind::Subtask => Self::Subtask,
        }
    }
}

/// Optional restrictions on a search.
#[derive(Debug, Default, Clone)]
pub struct SearchFilter {
    /// Only hits of this type.
    pub kind: Option<SearchType>,
    /// Only hits whose entity (the owner, for comments) has this status.
    pub status: Option<Status>,
    /// Maximum number of hits.
    pub limit: Option<usize>,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Id of the matching entity or comment.
    pub id: String,
    /// What the id refers to.
    pub kind: SearchType,
    /// The entity itself, or the entity a comment belongs to.
    pub entity_id: String,
    /// Status of `entity_id`.
    pub status: Status,
    /// Number of distinct query tokens that matched.
    pub score: usize,
    /// Last update of the entity, or creation time of the comment.
    pub updated_at: String,
}

/// Split text into index tokens.
///
/// Lowercases, splits on anything that is not alphanumeric, drops tokens
/// shorter than two characters and removes duplicates (sorted output).
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn replace_postings(conn: &Connection, doc_id: &str, tokens: &[String]) -> Result<()> {
    conn.execute("DELETE FROM search_postings WHERE doc_id = ?1", params![doc_id])?;
    let mut stmt =
        conn.prepare_cached("INSERT INTO search_postings (token, doc_id) VALUES (?1, ?2)")?;
    for token in tokens {
        stmt.execute(params![token, doc_id])?;
    }
    Ok(())
}

/// Re-index an entity from its current title and description.
pub fn index_entity(
    conn: &Connection,
    id: &str,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    let text = format!("{title} {}", description.unwrap_or_default());
    replace_postings(conn, id, &tokenize(&text))
}

/// Index a comment body.
pub fn index_comment(conn: &Connection, comment_id: &str, body: &str) -> Result<()> {
    replace_postings(conn, comment_id, &tokenize(body))
}

/// Run a query. Every query token must match (AND semantics).
///
/// Hits are ranked by matched token count, then most recently updated, then id.
pub fn search(conn: &Connection, query: &str, filter: &SearchFilter) -> Result<Vec<SearchHit>> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; tokens.len()].join(", ");
    let sql = format!(
        "WITH matches AS (
            SELECT doc_id, COUNT(DISTINCT token) AS score FROM search_postings
            WHERE token IN ({placeholders})
            GROUP BY doc_id
            HAVING COUNT(DISTINCT token) = ?
         )
         SELECT m.doc_id, e.kind, e.id, e.status, e.updated_at, m.score
           FROM matches m JOIN entities e ON e.id = m.doc_id
         UNION ALL
         SELECT m.doc_id, 'comment', c.entity_id, e.status, c.created_at, m.score
           FROM matches m
           JOIN comments c ON c.id = m.doc_id
           JOIN entities e ON e.id = c.entity_id"
    );

    let token_count = i64::try_from(tokens.len()).unwrap_or(i64::MAX);
    let mut values: Vec<&dyn ToSql> = tokens.iter().map(|t| t as &dyn ToSql).collect();
    values.push(&token_count);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(values.as_slice(), |row| {
        let kind: String = row.get(1)?;
        let status: String = row.get(3)?;
        let score: i64 = row.get(5)?;
        Ok((
            row.get::<_, String>(0)?,
            kind,
            row.get::<_, String>(2)?,
            status,
            row.get::<_, String>(4)?,
            score,
        ))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (id, kind, entity_id, status, updated_at, score) = row?;
        let (Ok(kind), Ok(status)) = (SearchType::from_str(&kind), Status::from_str(&status))
        else {
            continue;
        };
        if filter.kind.is_some_and(|k| k != kind) || filter.status.is_some_and(|s| s != status) {
            continue;
        }
        hits.push(SearchHit {
            id,
            kind,
            entity_id,
            status,
            score: usize::try_from(score).unwrap_or_default(),
            updated_at,
        });
    }

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(limit) = filter.limit {
        hits.truncate(limit);
    }
    Ok(hits)
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

    fn postings_for(conn: &Connection, doc_id: &str) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT token FROM search_postings WHERE doc_id = ?1 ORDER BY token")?;
        let tokens =
            stmt.query_map(params![doc_id], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
        Ok(tokens)
    }

    fn insert_entity(conn: &Connection, id: &str, kind: &str, status: &str, updated_at: &str) {
        conn.execute(
            "INSERT INTO entities (id, seq, kind, title, status, priority, created_at, updated_at)
             VALUES (?1, 0, ?2, 'x', ?3, 2, ?4, ?4)",
            params![id, kind, status, updated_at],
        )
        .unwrap();
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Implement OAuth-2 login!"), ["implement", "login", "oauth"]);
        assert_eq!(tokenize("a b c"), Vec::<String>::new());
        assert_eq!(tokenize("Login login LOGIN"), ["login"]);
        assert_eq!(tokenize("v2 x y"), ["v2"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_index_entity_replaces_postings() {
        let conn = db();
        index_entity(&conn, "TREK-1", "Implement login", Some("with OAuth")).unwrap();
        assert_eq!(postings_for(&conn, "TREK-1").unwrap(), ["implement", "login", "oauth", "with"]);

        index_entity(&conn, "TREK-1", "Implement logout", None).unwrap();
        assert_eq!(postings_for(&conn, "TREK-1").unwrap(), ["implement", "logout"]);
    }

    #[test]
    fn test_search_and_semantics() {
        let conn = db();
        insert_entity(&conn, "TREK-1", "task", "todo", "2024-01-01");
        insert_entity(&conn, "TREK-2", "task", "todo", "2024-01-02");
        index_entity(&conn, "TREK-1", "Implement login", None).unwrap();
        index_entity(&conn, "TREK-2", "Login tests", None).unwrap();

        let both = search(&conn, "login", &SearchFilter::default()).unwrap();
        // most recently updated first
        assert_eq!(both.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), ["TREK-2", "TREK-1"]);

        let one = search(&conn, "implement LOGIN", &SearchFilter::default()).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, "TREK-1");
        assert_eq!(one[0].score, 2);

        assert!(search(&conn, "login payments", &SearchFilter::default()).unwrap().is_empty());
        assert!(search(&conn, "a", &SearchFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_search_filters() {
        let conn = db();
        insert_entity(&conn, "EPIC-1", "epic", "todo", "2024-01-01");
        insert_entity(&conn, "TREK-1", "task", "completed", "2024-01-02");
        index_entity(&conn, "EPIC-1", "Auth work", None).unwrap();
        index_entity(&conn, "TREK-1", "Auth login", None).unwrap();
        conn.execute(
            "INSERT INTO comments (id, seq, entity_id, author, body, created_at)
             VALUES ('CMT-1', 1, 'TREK-1', 'me', 'auth is tricky', '2024-01-03')",
            [],
        )
        .unwrap();
        index_comment(&conn, "CMT-1", "auth is tricky").unwrap();

        let all = search(&conn, "auth", &SearchFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "CMT-1");
        assert_eq!(all[0].kind, SearchType::Comment);
        assert_eq!(all[0].entity_id, "TREK-1");

        let epics = search(
            &conn,
            "auth",
            &SearchFilter { kind: Some(SearchType::Epic), ..Default::default() },
        )
        .unwrap();
        assert_eq!(epics.len(), 1);
        assert_eq!(epics[0].id, "EPIC-1");

        let completed = search(
            &conn,
            "auth",
            &SearchFilter { status: Some(Status::Completed), ..Default::default() },
        )
        .unwrap();
        assert_eq!(completed.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), [
            "CMT-1", "TREK-1"
        ]);

        let limited =
            search(&conn, "auth", &SearchFilter { limit: Some(1), ..Default::default() }).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_search_type_from_str() {
        assert_eq!(SearchType::from_str("Comment").unwrap(), SearchType::Comment);
        assert!(SearchType::from_str("note").is_err());
        assert_eq!(SearchType::from(EntityKind::Subtask), SearchType::Subtask);
    }
}
