//! Task and subtask CLI subcommands.

use clap::Subcommand;

/// Task management commands.
///
/// Tasks are the core unit of work. Each task belongs to an epic and has:
/// - A title and optional description
/// - A priority (0=critical to 5=someday)
/// - A status (todo, in_progress, completed, wont_fix, archived)
/// - Optional dependencies on other tasks or subtasks
///
/// ## Quick Start
///
/// ```bash
/// trekker epic create --title "Auth"
/// trekker task create --epic EPIC-1 --title "Implement login" --priority 1
/// trekker update TREK-1 --status in_progress
/// ```
#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Create a new task under an epic.
    ///
    /// Tasks are created with status "todo" and, by default, priority 2.
    Create {
        /// Parent epic ID
        #[arg(short, long)]
        epic: String,

        /// Title for the task (required)
        #[arg(short, long)]
        title: String,

        /// Description with more details
        #[arg(short, long)]
        description: Option<String>,

        /// Priority: 0=critical, 1=high, 2=medium, 3=low, 4=backlog, 5=someday
        #[arg(short, long)]
        priority: Option<u8>,
    },
}

/// Subtask management commands.
///
/// Subtasks break a task into smaller steps. They follow the same status
/// rules as tasks and can take part in dependencies.
#[derive(Subcommand, Debug, Clone)]
pub enum SubtaskCommand {
    /// Create a new subtask under a task.
    Create {
        /// Parent task ID
        #[arg(long)]
        task: String,

        /// Title for the subtask (required)
        #[arg(short, long)]
        title: String,

        /// Description with more details
        #[arg(short, long)]
        description: Option<String>,

        /// Priority: 0=critical .. 5=someday
        #[arg(short, long)]
        priority: Option<u8>,
    },
}
