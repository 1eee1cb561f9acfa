//! Error types for `trekker`.

use crate::tasks::models::{EntityKind, Status};

/// Errors returned by the tracker engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input (empty title, out-of-range priority, wrong parent kind, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An id did not resolve to a stored record.
    #[error("not found: {0}")]
    NotFound(String),

    /// A patch tried to change a field that is fixed at creation.
    #[error("{id}: field '{field}' is immutable")]
    ImmutableField {
        /// The entity being updated.
        id: String,
        /// The field the patch tried to change.
        field: &'static str,
    },

    /// The requested status change is not allowed for this kind.
    #[error("invalid transition for {kind}: {from} -> {to}")]
    InvalidTransition {
        /// Kind of the entity.
        kind: EntityKind,
        /// Current status.
        from: Status,
        /// Requested status.
        to: Status,
    },

    /// The entity has dependencies that are not yet completed.
    #[error("{kind} {id} blocked by {}", describe_blocking(.blocking))]
    BlockedByDependency {
        /// Kind of the blocked entity.
        kind: EntityKind,
        /// The blocked entity.
        id: String,
        /// Every outstanding dependency.
        blocking: Vec<String>,
    },

    /// An entity cannot depend on itself.
    #[error("{0} cannot depend on itself")]
    SelfDependency(String),

    /// Adding the edge would close a cycle in the dependency graph.
    #[error("adding dependency {dependent} -> {dependency} would create a cycle")]
    Cycle {
        /// The entity that would gain the dependency.
        dependent: String,
        /// The entity it would depend on.
        dependency: String,
    },

    /// A `SQLite` database error occurred.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The config file could not be parsed or written.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether a caller may reasonably retry the failed command.
    ///
    /// Only storage-level failures (lock contention, disk errors) qualify;
    /// every other error is deterministic for the same input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

fn describe_blocking(blocking: &[String]) -> String {
    let noun = if blocking.len() == 1 { "dependency" } else { "dependencies" };
    format!("incomplete {noun} {}", blocking.join(", "))
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
