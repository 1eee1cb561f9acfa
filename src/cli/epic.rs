//! Epic CLI subcommands.

use clap::Subcommand;

/// Epic management commands.
///
/// Epics group related tasks. Completing an epic archives every task and
/// subtask under it that is not already finished.
#[derive(Subcommand, Debug, Clone)]
pub enum EpicCommand {
    /// Create a new epic.
    Create {
        /// Title for the epic (required)
        #[arg(short, long)]
        title: String,

        /// Description with more details
        #[arg(short, long)]
        description: Option<String>,

        /// Priority: 0=critical .. 5=someday
        #[arg(short, long)]
        priority: Option<u8>,
    },

    /// Complete an epic and archive its unfinished children.
    Complete {
        /// Epic ID
        id: String,
    },
}
