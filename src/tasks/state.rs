//! Status transition rules.
//!
//! The rules are a table per entity kind: for each current status, the set of
//! statuses it may move to. Terminal statuses map to nothing.
//!
//! | kind          | from          | to                                              |
//! |---------------|---------------|-------------------------------------------------|
//! | epic          | `todo`        | `in_progress`, `completed`, `archived`          |
//! | epic          | `in_progress` | `completed`, `archived`                         |
//! | task, subtask | `todo`        | `in_progress`, `completed`, `wont_fix`, `archived` |
//! | task, subtask | `in_progress` | `completed`, `wont_fix`, `archived`             |

use crate::error::{Error, Result};
use crate::tasks::models::{EntityKind, Status};

const EPIC_FROM_TODO: &[Status] = &[Status::InProgress, Status::Completed, Status::Archived];
const EPIC_FROM_IN_PROGRESS: &[Status] = &[Status::Completed, Status::Archived];
const WORK_FROM_TODO: &[Status] =
    &[Status::InProgress, Status::Completed, Status::WontFix, Status::Archived];
const WORK_FROM_IN_PROGRESS: &[Status] = &[Status::Completed, Status::WontFix, Status::Archived];

/// Statuses reachable in one step from `from`.
#[must_use]
pub const fn allowed_transitions(kind: EntityKind, from: Status) -> &'static [Status] {
    match (kind, from) {
        (EntityKind::Epic, Status::Todo) => EPIC_FROM_TODO,
        (EntityKind::Epic, Status::InProgress) => EPIC_FROM_IN_PROGRESS,
        (EntityKind::Task | EntityKind::Subtask, Status::Todo) => WORK_FROM_TODO,
        (EntityKind::Task | EntityKind::Subtask, Status::InProgress) => WORK_FROM_IN_PROGRESS,
        _ => &[],
    }
}

/// Check that `from -> to` is a legal move for `kind`.
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] when the table does not allow it.
pub fn check_transition(kind: EntityKind, from: Status, to: Status) -> Result<()> {
    if allowed_transitions(kind, from).contains(&to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { kind, from, to })
    }
}

/// Whether entering `to` requires every dependency to be completed first.
#[must_use]
pub const fn requires_dependencies(kind: EntityKind, to: Status) -> bool {
    kind.is_work_item() && matches!(to, Status::InProgress | Status::Completed)
}

/// Whether entering `to` archives the entity's open descendants.
#[must_use]
pub const fn cascades_to_children(kind: EntityKind, to: Status) -> bool {
    !matches!(kind, EntityKind::Subtask) && to.is_terminal()
}
