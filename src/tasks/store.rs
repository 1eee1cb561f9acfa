//! Tracker store trait and `SQLite` implementation.
//!
//! Every mutating operation runs in one `BEGIN IMMEDIATE` transaction that
//! validates, mutates entities and edges, appends history and refreshes the
//! search index. Any error drops the transaction, so a failed command leaves
//! the database exactly as it was.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::paths;
use crate::tasks::audit::{self, HistoryFilter, NewEvent};
use crate::tasks::entities::{self, EntityFilter};
use crate::tasks::graph::{self, DependencyGraph};
use crate::tasks::id::{next_id, parse_id, prefix_for, COMMENT_PREFIX};
use crate::tasks::models::{
    Comment, Dependency, Entity, EntityKind, HistoryEvent, Priority, Status,
};
use crate::tasks::search::{self, SearchFilter, SearchHit};
use crate::tasks::state;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Table definitions. Safe to run against an existing database.
pub const SCHEMA: &str = r"
    -- Epics, tasks and subtasks
    CREATE TABLE IF NOT EXISTS entities (
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('epic', 'task', 'subtask')),
        title TEXT NOT NULL CHECK (length(trim(title)) > 0),
        description TEXT,
        status TEXT NOT NULL DEFAULT 'todo'
            CHECK (status IN ('todo', 'in_progress', 'completed', 'wont_fix', 'archived')),
        priority INTEGER NOT NULL DEFAULT 2 CHECK (priority >= 0 AND priority <= 5),
        parent_id TEXT REFERENCES entities(id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (kind != 'epic' OR status != 'wont_fix')
    );

    -- Comments (append-only)
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        entity_id TEXT NOT NULL REFERENCES entities(id),
        author TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    -- Dependencies (dependent waits for dependency)
    CREATE TABLE IF NOT EXISTS dependencies (
        dependent TEXT NOT NULL REFERENCES entities(id),
        dependency TEXT NOT NULL REFERENCES entities(id),
        created_at TEXT NOT NULL,
        PRIMARY KEY (dependent, dependency),
        CHECK (dependent != dependency)
    );

    -- Immutable history log
    CREATE TABLE IF NOT EXISTS history (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id TEXT NOT NULL,
        entity_kind TEXT NOT NULL,
        field TEXT NOT NULL,
        old_value TEXT,
        new_value TEXT,
        actor TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    -- Inverted search index
    CREATE TABLE IF NOT EXISTS search_postings (
        token TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        PRIMARY KEY (token, doc_id)
    ) WITHOUT ROWID;

    -- Per-prefix id sequences
    CREATE TABLE IF NOT EXISTS id_counters (
        prefix TEXT PRIMARY KEY,
        next INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(parent_id);
    CREATE INDEX IF NOT EXISTS idx_entities_status_priority ON entities(status, priority);
    CREATE INDEX IF NOT EXISTS idx_comments_entity ON comments(entity_id);
    CREATE INDEX IF NOT EXISTS idx_dependencies_dependency ON dependencies(dependency);
    CREATE INDEX IF NOT EXISTS idx_history_entity ON history(entity_id);
    CREATE INDEX IF NOT EXISTS idx_search_postings_doc ON search_postings(doc_id);

    CREATE TRIGGER IF NOT EXISTS entities_parent_immutable
    BEFORE UPDATE OF parent_id, kind ON entities
    WHEN OLD.parent_id IS NOT NEW.parent_id OR OLD.kind != NEW.kind
    BEGIN
        SELECT RAISE(ABORT, 'parent_id and kind are immutable');
    END;

    CREATE TRIGGER IF NOT EXISTS history_no_update BEFORE UPDATE ON history BEGIN
        SELECT RAISE(ABORT, 'history is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS history_no_delete BEFORE DELETE ON history BEGIN
        SELECT RAISE(ABORT, 'history is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS comments_no_update BEFORE UPDATE ON comments BEGIN
        SELECT RAISE(ABORT, 'comments are immutable');
    END;

    CREATE TRIGGER IF NOT EXISTS comments_no_delete BEFORE DELETE ON comments BEGIN
        SELECT RAISE(ABORT, 'comments are immutable');
    END;
";

/// Trait for tracker operations.
///
/// All methods return a `Result`; see [`Error`] for the failure kinds.
#[allow(clippy::missing_errors_doc)]
pub trait TrackerStore {
    // Entities
    /// Create an epic, task or subtask.
    fn create(&self, kind: EntityKind, fields: NewEntity) -> Result<Entity>;

    /// Get an entity by id.
    fn get(&self, id: &str) -> Result<Entity>;

    /// Apply a patch to an entity.
    fn update(&self, id: &str, patch: EntityPatch) -> Result<Entity>;

    /// List entities with optional filters.
    fn list(&self, filter: &EntityFilter) -> Result<Vec<Entity>>;

    /// Complete an epic, archiving its unfinished descendants.
    fn complete_epic(&self, epic_id: &str) -> Result<EpicCompletion>;

    // Dependencies
    /// Make `dependent` wait for `dependency`.
    fn add_dependency(&self, dependent: &str, dependency: &str) -> Result<Dependency>;

    /// Remove a dependency. Returns whether an edge was removed.
    fn remove_dependency(&self, dependent: &str, dependency: &str) -> Result<bool>;

    /// Direct dependencies of an entity.
    fn dependencies(&self, id: &str) -> Result<Vec<String>>;

    /// Entities that depend directly on `id`.
    fn dependents(&self, id: &str) -> Result<Vec<String>>;

    /// Dependencies of `id` that are not completed yet.
    fn blocked_by(&self, id: &str) -> Result<Vec<String>>;

    /// Tasks and subtasks that can be started now, most important first.
    fn ready(&self) -> Result<Vec<Entity>>;

    // Comments
    /// Add a comment to an entity.
    fn add_comment(&self, entity_id: &str, author: &str, body: &str) -> Result<Comment>;

    /// Comments on an entity, oldest first.
    fn comments(&self, entity_id: &str) -> Result<Vec<Comment>>;

    // Search and history
    /// Full-text search over titles, descriptions and comments.
    fn search(&self, query: &str, filter: &SearchFilter) -> Result<Vec<SearchHit>>;

    /// History events in sequence order.
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEvent>>;

    /// Dump every table.
    fn export(&self) -> Result<Snapshot>;

    /// Create an epic.
    fn create_epic(&self, fields: NewEntity) -> Result<Entity> {
        self.create(EntityKind::Epic, fields)
    }

    /// Create a task under `epic_id`.
    fn create_task(&self, epic_id: &str, fields: NewEntity) -> Result<Entity> {
        self.create(EntityKind::Task, fields.parent(epic_id))
    }

    /// Create a subtask under `task_id`.
    fn create_subtask(&self, task_id: &str, fields: NewEntity) -> Result<Entity> {
        self.create(EntityKind::Subtask, fields.parent(task_id))
    }
}

/// Fields for a new entity.
#[derive(Debug, Default, Clone)]
pub struct NewEntity {
    /// Title (required, non-empty).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Raw priority; validated to 0-5, defaults to 2.
    pub priority: Option<u8>,
    /// Parent epic (tasks) or task (subtasks).
    pub parent_id: Option<String>,
}

impl NewEntity {
    /// Start with just a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the parent id.
    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Fields that can be changed on an entity.
#[derive(Debug, Default, Clone)]
pub struct EntityPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some; an empty string clears it).
    pub description: Option<String>,
    /// New raw priority (if Some).
    pub priority: Option<u8>,
    /// New status (if Some).
    pub status: Option<Status>,
    /// Parent id. Always rejected: parents are fixed at creation.
    pub parent_id: Option<String>,
}

impl EntityPatch {
    /// A patch that only changes status.
    #[must_use]
    pub fn status(status: Status) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.parent_id.is_none()
    }
}

/// Result of completing an epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicCompletion {
    /// The completed epic.
    pub epic: Entity,
    /// Descendants that were archived by the cascade.
    pub archived: Vec<Entity>,
}

/// Full contents of the store, for export and before/after comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version of the exported store.
    pub schema_version: i64,
    /// All entities, grouped by id prefix and ordered by sequence number.
    pub entities: Vec<Entity>,
    /// All comments.
    pub comments: Vec<Comment>,
    /// All dependency edges.
    pub dependencies: Vec<Dependency>,
    /// The full history log.
    pub history: Vec<HistoryEvent>,
    /// Search postings as `(token, doc_id)` pairs.
    pub postings: Vec<(String, String)>,
    /// Id counters as `(prefix, last issued)`.
    pub counters: Vec<(String, i64)>,
}

/// Default actor recorded on history events.
pub const DEFAULT_ACTOR: &str = "agent";

/// SQLite-based tracker store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    actor: String,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Create a new `SQLite` store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(db_path, &Config::default())
    }

    /// Create a store using the actor and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn with_config(db_path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            actor: config.actor.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the store for a project directory (`<project>/.trekker/trekker.db`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read or the database cannot
    /// be initialized.
    pub fn for_project(project_dir: &Path) -> Result<Self> {
        let config = Config::load_from(project_dir)?;
        Self::with_config(paths::project_db_path(project_dir), &config)
    }

    /// Use a different actor label for history events.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The actor recorded on history events.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(Error::Validation(format!(
                "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        conn.execute_batch(SCHEMA)?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Run `f` inside an IMMEDIATE transaction and commit if it succeeds.
    fn write<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn record(
        &self,
        conn: &Connection,
        entity: &Entity,
        field: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<i64> {
        let event = NewEvent {
            entity_id: &entity.id,
            entity_kind: entity.kind,
            field,
            old_value,
            new_value,
        };
        audit::record(conn, &event, &self.actor, &entity.updated_at)
    }

    fn create_in(&self, conn: &Connection, kind: EntityKind, fields: NewEntity) -> Result<Entity> {
        let title = fields.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        let priority = validate_priority(fields.priority)?.unwrap_or_default();

        match (kind.parent_kind(), fields.parent_id.as_deref()) {
            (None, Some(_)) => {
                return Err(Error::Validation(format!("an {kind} cannot have a parent")));
            }
            (Some(parent_kind), None) => {
                return Err(Error::Validation(format!("a {kind} requires a parent {parent_kind}")));
            }
            (Some(parent_kind), Some(parent_id)) => {
                let parent = entities::require(conn, parent_id)?;
                if parent.kind != parent_kind {
                    return Err(Error::Validation(format!(
                        "parent of a {kind} must be a {parent_kind}, but {parent_id} is a {}",
                        parent.kind
                    )));
                }
                if parent.is_closed() {
                    return Err(Error::Validation(format!(
                        "cannot add a {kind} to {parent_id}: it is {}",
                        parent.status
                    )));
                }
            }
            (None, None) => {}
        }

        let timestamp = entities::now();
        let entity = Entity {
            id: next_id(conn, prefix_for(kind))?,
            kind,
            title: title.to_string(),
            description: fields.description.filter(|d| !d.trim().is_empty()),
            status: Status::Todo,
            priority,
            parent_id: fields.parent_id,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        entities::insert(conn, &entity)?;
        search::index_entity(conn, &entity.id, &entity.title, entity.description.as_deref())?;
        self.record(conn, &entity, "created", None, Some(&entity.title))?;
        Ok(entity)
    }

    /// Apply a patch inside an open transaction.
    ///
    /// Returns the updated entity and any descendants archived by a cascade.
    fn update_in(
        &self,
        conn: &Connection,
        id: &str,
        patch: EntityPatch,
    ) -> Result<(Entity, Vec<Entity>)> {
        let current = entities::require(conn, id)?;

        if patch.parent_id.is_some() {
            return Err(Error::ImmutableField { id: id.to_string(), field: "parent_id" });
        }

        let mut next = current.clone();
        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::Validation("title must not be empty".to_string()));
            }
            next.title = title.to_string();
        }
        if let Some(description) = patch.description {
            next.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(priority) = validate_priority(patch.priority)? {
            next.priority = priority;
        }

        let mut archived = Vec::new();
        if let Some(status) = patch.status.filter(|s| *s != current.status) {
            state::check_transition(current.kind, current.status, status)?;
            if state::requires_dependencies(current.kind, status) {
                let blocking = graph::blocked_by(conn, id)?;
                if !blocking.is_empty() {
                    return Err(Error::BlockedByDependency {
                        kind: current.kind,
                        id: id.to_string(),
                        blocking,
                    });
                }
            }
            if state::cascades_to_children(current.kind, status) {
                archived = self.archive_descendants(conn, id)?;
            }
            next.status = status;
        }

        let mut changes: Vec<(&str, Option<String>, Option<String>)> = Vec::new();
        if next.title != current.title {
            changes.push(("title", Some(current.title.clone()), Some(next.title.clone())));
        }
        if next.description != current.description {
            changes.push(("description", current.description.clone(), next.description.clone()));
        }
        if next.priority != current.priority {
            changes.push((
                "priority",
                Some(current.priority.as_u8().to_string()),
                Some(next.priority.as_u8().to_string()),
            ));
        }
        if next.status != current.status {
            changes.push((
                "status",
                Some(current.status.to_string()),
                Some(next.status.to_string()),
            ));
        }

        if changes.is_empty() {
            return Ok((current, archived));
        }

        next.updated_at = entities::now_after(&current.updated_at);
        entities::write(conn, &next)?;
        if next.title != current.title || next.description != current.description {
            search::index_entity(conn, &next.id, &next.title, next.description.as_deref())?;
        }
        for (field, old_value, new_value) in &changes {
            self.record(conn, &next, field, old_value.as_deref(), new_value.as_deref())?;
        }
        Ok((next, archived))
    }

    /// Archive every non-terminal descendant of `id`, one event each.
    fn archive_descendants(&self, conn: &Connection, id: &str) -> Result<Vec<Entity>> {
        let mut archived = Vec::new();
        for mut child in entities::descendants(conn, id)? {
            if child.is_closed() {
                continue;
            }
            let previous = child.status;
            child.status = Status::Archived;
            child.updated_at = entities::now_after(&child.updated_at);
            entities::write(conn, &child)?;
            self.record(
                conn,
                &child,
                "status",
                Some(previous.as_str()),
                Some(Status::Archived.as_str()),
            )?;
            archived.push(child);
        }
        Ok(archived)
    }

    /// Bump an entity's `updated_at` and return the refreshed row.
    fn touch(conn: &Connection, id: &str) -> Result<Entity> {
        let mut entity = entities::require(conn, id)?;
        entity.updated_at = entities::now_after(&entity.updated_at);
        entities::touch(conn, id, &entity.updated_at)?;
        Ok(entity)
    }
}

fn validate_priority(priority: Option<u8>) -> Result<Option<Priority>> {
    priority
        .map(Priority::from_u8)
        .transpose()
        .map_err(|e| Error::Validation(e.to_string()))
}

fn require_work_item(entity: &Entity) -> Result<()> {
    if entity.kind.is_work_item() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} is an {}; only tasks and subtasks can have dependencies",
            entity.id, entity.kind
        )))
    }
}

impl TrackerStore for SqliteStore {
    fn create(&self, kind: EntityKind, fields: NewEntity) -> Result<Entity> {
        let entity = self.write(|tx| self.create_in(tx, kind, fields))?;
        debug!(id = %entity.id, kind = %entity.kind, "created entity");
        Ok(entity)
    }

    fn get(&self, id: &str) -> Result<Entity> {
        let conn = self.open()?;
        entities::require(&conn, id)
    }

    fn update(&self, id: &str, patch: EntityPatch) -> Result<Entity> {
        if patch.is_empty() {
            return self.get(id);
        }
        let (entity, archived) = self.write(|tx| self.update_in(tx, id, patch))?;
        if archived.is_empty() {
            debug!(id = %entity.id, status = %entity.status, "updated entity");
        } else {
            info!(id = %entity.id, status = %entity.status, archived = archived.len(), "updated entity and archived descendants");
        }
        Ok(entity)
    }

    fn list(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        let conn = self.open()?;
        entities::list(&conn, filter)
    }

    fn complete_epic(&self, epic_id: &str) -> Result<EpicCompletion> {
        let (epic, archived) = self.write(|tx| {
            let epic = entities::require(tx, epic_id)?;
            if epic.kind != EntityKind::Epic {
                return Err(Error::Validation(format!("{epic_id} is a {}, not an epic", epic.kind)));
            }
            // Re-completing is a transition out of a terminal state, not a no-op.
            state::check_transition(epic.kind, epic.status, Status::Completed)?;
            self.update_in(tx, epic_id, EntityPatch::status(Status::Completed))
        })?;
        info!(id = %epic.id, archived = archived.len(), "completed epic");
        Ok(EpicCompletion { epic, archived })
    }

    fn add_dependency(&self, dependent: &str, dependency: &str) -> Result<Dependency> {
        if dependent == dependency {
            return Err(Error::SelfDependency(dependent.to_string()));
        }

        let edge = self.write(|tx| {
            let from = entities::require(tx, dependent)?;
            let to = entities::require(tx, dependency)?;
            require_work_item(&from)?;
            require_work_item(&to)?;

            if graph::edge_exists(tx, dependent, dependency)? {
                let created_at: String = tx.query_row(
                    "SELECT created_at FROM dependencies WHERE dependent = ?1 AND dependency = ?2",
                    params![dependent, dependency],
                    |row| row.get(0),
                )?;
                return Ok(Dependency {
                    dependent: dependent.to_string(),
                    dependency: dependency.to_string(),
                    created_at,
                });
            }

            if DependencyGraph::load(tx)?.would_create_cycle(dependent, dependency) {
                return Err(Error::Cycle {
                    dependent: dependent.to_string(),
                    dependency: dependency.to_string(),
                });
            }

            let from = Self::touch(tx, &from.id)?;
            graph::insert_edge(tx, dependent, dependency, &from.updated_at)?;
            self.record(tx, &from, "dependency", None, Some(dependency))?;
            Ok(Dependency {
                dependent: dependent.to_string(),
                dependency: dependency.to_string(),
                created_at: from.updated_at,
            })
        })?;
        debug!(dependent, dependency, "added dependency");
        Ok(edge)
    }

    fn remove_dependency(&self, dependent: &str, dependency: &str) -> Result<bool> {
        let removed = self.write(|tx| {
            if !graph::delete_edge(tx, dependent, dependency)? {
                return Ok(false);
            }
            let from = Self::touch(tx, dependent)?;
            self.record(tx, &from, "dependency", Some(dependency), None)?;
            Ok(true)
        })?;
        if removed {
            debug!(dependent, dependency, "removed dependency");
        }
        Ok(removed)
    }

    fn dependencies(&self, id: &str) -> Result<Vec<String>> {
        let conn = self.open()?;
        entities::require(&conn, id)?;
        graph::dependencies(&conn, id)
    }

    fn dependents(&self, id: &str) -> Result<Vec<String>> {
        let conn = self.open()?;
        entities::require(&conn, id)?;
        graph::dependents(&conn, id)
    }

    fn blocked_by(&self, id: &str) -> Result<Vec<String>> {
        let conn = self.open()?;
        entities::require(&conn, id)?;
        graph::blocked_by(&conn, id)
    }

    fn ready(&self) -> Result<Vec<Entity>> {
        let conn = self.open()?;
        entities::ready(&conn)
    }

    fn add_comment(&self, entity_id: &str, author: &str, body: &str) -> Result<Comment> {
        let author = author.trim();
        if author.is_empty() {
            return Err(Error::Validation("comment author must not be empty".to_string()));
        }
        if body.trim().is_empty() {
            return Err(Error::Validation("comment body must not be empty".to_string()));
        }

        let comment = self.write(|tx| {
            let entity = Self::touch(tx, entity_id)?;
            let comment = Comment {
                id: next_id(tx, COMMENT_PREFIX)?,
                entity_id: entity.id.clone(),
                author: author.to_string(),
                body: body.to_string(),
                created_at: entity.updated_at.clone(),
            };
            entities::insert_comment(tx, &comment)?;
            search::index_comment(tx, &comment.id, &comment.body)?;
            self.record(tx, &entity, "comment", None, Some(&comment.id))?;
            Ok(comment)
        })?;
        debug!(id = %comment.id, entity = %comment.entity_id, "added comment");
        Ok(comment)
    }

    fn comments(&self, entity_id: &str) -> Result<Vec<Comment>> {
        let conn = self.open()?;
        entities::require(&conn, entity_id)?;
        entities::comments_for(&conn, entity_id)
    }

    fn search(&self, query: &str, filter: &SearchFilter) -> Result<Vec<SearchHit>> {
        let conn = self.open()?;
        search::search(&conn, query, filter)
    }

    fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEvent>> {
        let conn = self.open()?;
        if let Some(ref id) = filter.entity_id {
            entities::require(&conn, id)?;
        }
        audit::history(&conn, filter)
    }

    fn export(&self) -> Result<Snapshot> {
        let conn = self.open()?;
        let schema_version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        let mut entities = Vec::new();
        for kind in [EntityKind::Epic, EntityKind::Task, EntityKind::Subtask] {
            entities.extend(entities::list(
                &conn,
                &EntityFilter { kind: Some(kind), ..EntityFilter::default() },
            )?);
        }
        // Numeric on the sequence part: TREK-2 before TREK-10.
        entities.sort_by(|a, b| {
            parse_id(&a.id).cmp(&parse_id(&b.id)).then_with(|| a.id.cmp(&b.id))
        });

        let mut comments = Vec::new();
        for entity in &entities {
            comments.extend(entities::comments_for(&conn, &entity.id)?);
        }

        let mut stmt = conn.prepare(
            "SELECT dependent, dependency, created_at FROM dependencies ORDER BY rowid",
        )?;
        let dependencies = stmt
            .query_map([], |row| {
                Ok(Dependency {
                    dependent: row.get(0)?,
                    dependency: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt =
            conn.prepare("SELECT token, doc_id FROM search_postings ORDER BY doc_id, token")?;
        let postings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = conn.prepare("SELECT prefix, next FROM id_counters ORDER BY prefix")?;
        let counters = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Snapshot {
            schema_version,
            entities,
            comments,
            dependencies,
            history: audit::history(&conn, &HistoryFilter::default())?,
            postings,
            counters,
        })
    }
}
