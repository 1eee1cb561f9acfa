//! Comment CLI subcommands.

use clap::Subcommand;

/// Comment management commands.
///
/// Comments capture progress, findings, or context. They are immutable once
/// added and are included in search.
#[derive(Subcommand, Debug, Clone)]
pub enum CommentCommand {
    /// Add a comment to an epic, task or subtask.
    Add {
        /// Entity ID
        id: String,

        /// Comment text
        #[arg(short, long)]
        body: String,

        /// Author (defaults to the configured actor)
        #[arg(short, long)]
        author: Option<String>,
    },

    /// List comments on an entity, oldest first.
    List {
        /// Entity ID
        id: String,
    },
}
