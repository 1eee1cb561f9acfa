//! Dependency CLI subcommands.

use clap::Subcommand;

/// Dependency management commands.
///
/// The first ID depends on the second: it cannot be started or completed
/// until the dependency is completed. Cycles are rejected.
#[derive(Subcommand, Debug, Clone)]
pub enum DepCommand {
    /// Add a dependency.
    Add {
        /// Task or subtask that will wait
        id: String,

        /// Task or subtask that must be completed first
        #[arg(long)]
        depends_on: String,
    },

    /// Remove a dependency. Removing a missing edge is not an error.
    Remove {
        /// Task or subtask that has the dependency
        id: String,

        /// Dependency to remove
        #[arg(long)]
        depends_on: String,
    },

    /// Show dependencies, dependents and blockers of an entity.
    List {
        /// Entity ID
        id: String,
    },
}
