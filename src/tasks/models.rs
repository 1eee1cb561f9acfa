//! Record types for the tracker: entities, comments, dependency edges and history.

use serde::{Deserialize, Serialize};

/// Priority levels (0 = most important).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Priority {
    /// Critical priority - blocking issues.
    Critical = 0,
    /// High priority.
    High = 1,
    /// Medium priority (default).
    #[default]
    Medium = 2,
    /// Low priority.
    Low = 3,
    /// Backlog - future work.
    Backlog = 4,
    /// Someday - may never happen.
    Someday = 5,
}

impl Priority {
    /// Create a priority from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is greater than 5.
    pub const fn from_u8(value: u8) -> Result<Self, InvalidPriority> {
        match value {
            0 => Ok(Self::Critical),
            1 => Ok(Self::High),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Low),
            4 => Ok(Self::Backlog),
            5 => Ok(Self::Someday),
            _ => Err(InvalidPriority(value)),
        }
    }

    /// Get the numeric value of the priority.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.as_u8()
    }
}

impl TryFrom<u8> for Priority {
    type Error = InvalidPriority;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

/// Error when an invalid priority value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPriority(pub u8);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: {} (must be 0-5)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// The three kinds of tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Top-level grouping of tasks.
    Epic,
    /// Unit of work belonging to an epic.
    Task,
    /// Unit of work belonging to a task.
    Subtask,
}

impl EntityKind {
    /// Parse a kind from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a known kind.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidKind> {
        match s.to_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "task" => Ok(Self::Task),
            "subtask" => Ok(Self::Subtask),
            _ => Err(InvalidKind(s.to_string())),
        }
    }

    /// Get the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Task => "task",
            Self::Subtask => "subtask",
        }
    }

    /// The kind a parent of this kind must have, if any.
    #[must_use]
    pub const fn parent_kind(self) -> Option<Self> {
        match self {
            Self::Epic => None,
            Self::Task => Some(Self::Epic),
            Self::Subtask => Some(Self::Task),
        }
    }

    /// Whether entities of this kind can take part in dependency edges.
    #[must_use]
    pub const fn is_work_item(self) -> bool {
        matches!(self, Self::Task | Self::Subtask)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when an invalid kind string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKind(pub String);

impl std::fmt::Display for InvalidKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid kind: '{}' (must be one of: epic, task, subtask)", self.0)
    }
}

impl std::error::Error for InvalidKind {}

/// Entity status. Which values a given kind may take is decided by
/// [`crate::tasks::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Will not be done (tasks and subtasks only).
    WontFix,
    /// Shelved without completion.
    Archived,
}

impl Status {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] =
        [Self::Todo, Self::InProgress, Self::Completed, Self::WontFix, Self::Archived];

    /// Parse a status from a string.
    ///
    /// Accepts `in-progress` as well as `in_progress`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "wont_fix" => Ok(Self::WontFix),
            "archived" => Ok(Self::Archived),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::WontFix => "wont_fix",
            Self::Archived => "archived",
        }
    }

    /// Terminal statuses admit no further transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::WontFix | Self::Archived)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status: '{}' (must be one of: todo, in_progress, completed, wont_fix, archived)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStatus {}

/// An epic, task or subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier such as `EPIC-3` or `TREK-12`.
    pub id: String,
    /// What kind of entity this is.
    pub kind: EntityKind,
    /// Short title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Current status.
    pub status: Status,
    /// Priority level (0-5, lower is more important).
    pub priority: Priority,
    /// Owning epic (for tasks) or task (for subtasks).
    pub parent_id: Option<String>,
    /// RFC 3339 timestamp when the entity was created.
    pub created_at: String,
    /// RFC 3339 timestamp of the last mutation.
    pub updated_at: String,
}

impl Entity {
    /// Check if the entity is in a terminal status.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A comment attached to an entity. Comments are never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Identifier such as `CMT-5`.
    pub id: String,
    /// The entity this comment belongs to.
    pub entity_id: String,
    /// Free-text author label.
    pub author: String,
    /// Comment text.
    pub body: String,
    /// RFC 3339 timestamp when the comment was created.
    pub created_at: String,
}

/// A dependency edge: `dependent` cannot start or finish before `dependency`
/// is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The entity that waits.
    pub dependent: String,
    /// The entity waited on.
    pub dependency: String,
    /// RFC 3339 timestamp when the edge was added.
    pub created_at: String,
}

/// One immutable entry in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Position in the global, strictly increasing event order.
    pub seq: i64,
    /// The entity the change applies to.
    pub entity_id: String,
    /// Kind of that entity.
    pub entity_kind: EntityKind,
    /// Which field changed (`created`, `status`, `dependency`, ...).
    pub field: String,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change.
    pub new_value: Option<String>,
    /// Who made the change.
    pub actor: String,
    /// RFC 3339 timestamp of the change.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_u8() {
        assert_eq!(Priority::from_u8(0).unwrap(), Priority::Critical);
        assert_eq!(Priority::from_u8(2).unwrap(), Priority::Medium);
        assert_eq!(Priority::from_u8(5).unwrap(), Priority::Someday);
        assert!(Priority::from_u8(6).is_err());
        assert!(Priority::from_u8(255).is_err());
    }

    #[test]
    fn test_priority_default_and_ordering() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::Backlog < Priority::Someday);
    }

    #[test]
    fn test_priority_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "3");
        let parsed: Priority = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Priority::Critical);
        assert!(serde_json::from_str::<Priority>("9").is_err());
    }

    #[test]
    fn test_invalid_priority_display() {
        assert_eq!(InvalidPriority(7).to_string(), "invalid priority: 7 (must be 0-5)");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(Status::from_str("todo").unwrap(), Status::Todo);
        assert_eq!(Status::from_str("IN_PROGRESS").unwrap(), Status::InProgress);
        assert_eq!(Status::from_str("in-progress").unwrap(), Status::InProgress);
        assert_eq!(Status::from_str("wont_fix").unwrap(), Status::WontFix);
        assert!(Status::from_str("open").is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in Status::ALL {
            assert_eq!(Status::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"in_progress\"");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!Status::Todo.is_terminal());
        assert!(!Status::InProgress.is_terminal());
        assert!(Status::Completed.is_terminal());
        assert!(Status::WontFix.is_terminal());
        assert!(Status::Archived.is_terminal());
    }

    #[test]
    fn test_invalid_status_display() {
        let err = InvalidStatus("open".to_string());
        assert!(err.to_string().contains("open"));
        assert!(err.to_string().contains("wont_fix"));
    }

    #[test]
    fn test_kind_parent_kind() {
        assert_eq!(EntityKind::Epic.parent_kind(), None);
        assert_eq!(EntityKind::Task.parent_kind(), Some(EntityKind::Epic));
        assert_eq!(EntityKind::Subtask.parent_kind(), Some(EntityKind::Task));
        assert!(!EntityKind::Epic.is_work_item());
        assert!(EntityKind::Subtask.is_work_item());
        assert!(EntityKind::from_str("Story").is_err());
    }

    #[test]
    fn test_entity_serialization() {
        let entity = Entity {
            id: "TREK-1".to_string(),
            kind: EntityKind::Task,
            title: "Implement login".to_string(),
            description: None,
            status: Status::Todo,
            priority: Priority::High,
            parent_id: Some("EPIC-1".to_string()),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        };

        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"kind\":\"task\""));
        let parsed: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entity);
        assert!(!parsed.is_closed());
    }
}
