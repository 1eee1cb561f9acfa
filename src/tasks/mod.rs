//! Work tracking system.
//!
//! This module provides a tracker for agent work sessions with:
//! - Epics, tasks and subtasks with title, description, priority, and status
//! - A per-kind status state machine with cascading archival
//! - Dependencies between tasks and subtasks (with cycle detection)
//! - Comments attached to any entity
//! - Token search across titles, descriptions and comments
//! - An append-only history of every change
//!
//! # Example
//!
//! ```no_run
//! use trekker::tasks::{NewEntity, SqliteStore, TrackerStore};
//!
//! let store = SqliteStore::new("/tmp/trekker.db").unwrap();
//!
//! let epic = store.create_epic(NewEntity::new("Auth")).unwrap();
//! let login = store.create_task(&epic.id, NewEntity::new("Implement login")).unwrap();
//! let tests = store.create_task(&epic.id, NewEntity::new("Add tests")).unwrap();
//!
//! // tests cannot start until login is completed
//! store.add_dependency(&tests.id, &login.id).unwrap();
//!
//! let hits = store.search("login", &Default::default()).unwrap();
//! ```

pub mod audit;
pub mod entities;
pub mod graph;
pub mod id;
pub mod models;
pub mod search;
pub mod state;
pub mod store;

pub use audit::HistoryFilter;
pub use entities::EntityFilter;
pub use graph::DependencyGraph;
pub use models::{
    Comment, Dependency, Entity, EntityKind, HistoryEvent, InvalidKind, InvalidPriority,
    InvalidStatus, Priority, Status,
};
pub use search::{SearchFilter, SearchHit, SearchType};
pub use store::{EntityPatch, EpicCompletion, NewEntity, Snapshot, SqliteStore, TrackerStore};
