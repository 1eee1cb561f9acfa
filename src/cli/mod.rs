//! Hierarchical CLI for trekker.
//!
//! Two-level commands for epics, tasks, subtasks, dependencies and comments,
//! plus top-level query commands. Every command prints pretty JSON on stdout.

mod comment;
mod dep;
mod epic;
mod run;
mod work;

#[cfg(test)]
mod tests;

pub use comment::CommentCommand;
pub use dep::DepCommand;
pub use epic::EpicCommand;
pub use run::{run, run_in, CliOutput};
pub use work::{SubtaskCommand, TaskCommand};

use crate::tasks::{EntityKind, SearchType, Status};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trekker - track epics, tasks and subtasks for agent work sessions.
///
/// For detailed help on any command group, use:
///   trekker <command> --help
#[derive(Parser, Debug)]
#[command(name = "trekker")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file (default: <project>/.trekker/trekker.db)
    #[arg(long, global = true, env = "TREKKER_DB")]
    pub db: Option<PathBuf>,

    /// Actor recorded on history events (overrides config)
    #[arg(long, global = true, env = "TREKKER_ACTOR")]
    pub actor: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and the default config file.
    Init,

    /// Epic management - create and complete epics.
    #[command(subcommand)]
    Epic(EpicCommand),

    /// Task management.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Subtask management.
    #[command(subcommand)]
    Subtask(SubtaskCommand),

    /// Show an entity with its comments and dependencies.
    Show {
        /// Entity ID
        id: String,
    },

    /// Update an entity's fields.
    ///
    /// Only specified fields are updated; others remain unchanged.
    Update {
        /// Entity ID
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New description (empty string clears it)
        #[arg(short, long)]
        description: Option<String>,

        /// New priority: 0=critical .. 5=someday
        #[arg(short, long)]
        priority: Option<u8>,

        /// New status: todo, in_progress, completed, wont_fix, archived
        #[arg(short, long, value_parser = parse_status)]
        status: Option<Status>,
    },

    /// Dependency management - make a task wait for another.
    #[command(subcommand)]
    Dep(DepCommand),

    /// Comment management.
    #[command(subcommand)]
    Comment(CommentCommand),

    /// Search titles, descriptions and comments. All words must match.
    Search {
        /// Search query
        query: String,

        /// Only hits of this type: epic, task, subtask, comment
        #[arg(long = "type", value_parser = parse_search_type)]
        kind: Option<SearchType>,

        /// Only hits whose entity has this status
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the change history, oldest first.
    History {
        /// Only events for this entity
        id: Option<String>,

        /// Only events at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,

        /// Only events at or before this RFC 3339 timestamp
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of events
        #[arg(long)]
        limit: Option<usize>,

        /// Number of events to skip
        #[arg(long)]
        offset: Option<usize>,
    },

    /// List entities, most important first.
    List {
        /// Filter by kind: epic, task, subtask
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<EntityKind>,

        /// Filter by status
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,

        /// Filter by parent ID
        #[arg(long)]
        parent: Option<String>,

        /// Only entities at this priority or more urgent
        #[arg(long)]
        max_priority: Option<u8>,
    },

    /// List tasks and subtasks that can be started now.
    Ready,

    /// Dump the whole database as JSON.
    Export,
}

fn parse_status(s: &str) -> Result<Status, String> {
    Status::from_str(s).map_err(|e| e.to_string())
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    EntityKind::from_str(s).map_err(|e| e.to_string())
}

fn parse_search_type(s: &str) -> Result<SearchType, String> {
    SearchType::from_str(s)
}
