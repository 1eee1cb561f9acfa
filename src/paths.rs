//! Path utilities for locating the tracker database.
//!
//! A project keeps its data in `<project>/.trekker/`. The project root is the
//! nearest ancestor of the working directory that already has a `.trekker`
//! directory; when there is none, the working directory itself is used.

use std::path::{Path, PathBuf};

/// The per-project data directory name.
pub const DATA_DIR_NAME: &str = ".trekker";

/// The database filename.
pub const DATABASE_FILENAME: &str = "trekker.db";

/// Get the data directory for a project.
#[must_use]
pub fn project_data_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(DATA_DIR_NAME)
}

/// Get the database path for a project.
///
/// Returns `<project>/.trekker/trekker.db`.
#[must_use]
pub fn project_db_path(project_dir: &Path) -> PathBuf {
    project_data_dir(project_dir).join(DATABASE_FILENAME)
}

/// Find the project root for `start`.
///
/// Walks up from `start` looking for a `.trekker` directory and falls back
/// to `start` when no ancestor has one.
#[must_use]
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| project_data_dir(dir).is_dir())
        .unwrap_or(start)
        .to_path_buf()
}

/// Expand a leading `~` to the home directory.
///
/// Paths without a leading `~`, or when the home directory is unknown, are
/// returned unchanged.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

/// Resolve the database path from an explicit override or the project layout.
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    explicit.map_or_else(|| project_db_path(&find_project_root(cwd)), expand_home)
}
