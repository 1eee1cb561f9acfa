//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output.

use crate::cli::{
    Cli, Command, CommentCommand, DepCommand, EpicCommand, SubtaskCommand, TaskCommand,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::paths;
use crate::tasks::id::normalize_id;
use crate::tasks::{
    Comment, Entity, EntityFilter, EntityKind, EntityPatch, HistoryFilter, NewEntity, Priority,
    SearchFilter, SqliteStore, Status, TrackerStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Run a CLI command against the project containing the current directory.
pub fn run(cli: Cli) -> CliOutput {
    match std::env::current_dir() {
        Ok(cwd) => run_in(cli, &cwd),
        Err(e) => error_output(&Error::Io(e)),
    }
}

/// Run a CLI command as if started from `cwd`.
pub fn run_in(cli: Cli, cwd: &Path) -> CliOutput {
    let Cli { db, actor, command } = cli;

    if matches!(command, Command::Init) {
        return respond(run_init(db.as_deref(), cwd));
    }

    match open_store(db.as_deref(), actor, cwd) {
        Ok(store) => dispatch(&store, command, cwd),
        Err(e) => error_output(&e),
    }
}

fn dispatch(store: &SqliteStore, command: Command, cwd: &Path) -> CliOutput {
    match command {
        Command::Init => respond(run_init(Some(store.db_path()), cwd)),
        Command::Epic(cmd) => run_epic_cmd(store, cmd),
        Command::Task(cmd) => run_task_cmd(store, cmd),
        Command::Subtask(cmd) => run_subtask_cmd(store, cmd),
        Command::Show { id } => respond(show(store, &normalize_id(&id))),
        Command::Update { id, title, description, priority, status } => {
            let patch = EntityPatch { title, description, priority, status, parent_id: None };
            respond(store.update(&normalize_id(&id), patch))
        }
        Command::Dep(cmd) => run_dep_cmd(store, cmd),
        Command::Comment(cmd) => run_comment_cmd(store, cmd),
        Command::Search { query, kind, status, limit } => {
            respond(store.search(&query, &SearchFilter { kind, status, limit }))
        }
        Command::History { id, since, until, limit, offset } => {
            let filter = HistoryFilter {
                entity_id: id.as_deref().map(normalize_id),
                since,
                until,
                limit,
                offset,
            };
            respond(store.history(&filter))
        }
        Command::List { kind, status, parent, max_priority } => {
            respond(list(store, kind, status, parent.as_deref(), max_priority))
        }
        Command::Ready => respond(store.ready()),
        Command::Export => respond(store.export()),
    }
}

fn open_store(db: Option<&Path>, actor: Option<String>, cwd: &Path) -> Result<SqliteStore> {
    let root = paths::find_project_root(cwd);
    let config = Config::load_from(&root)?;
    let db_path = paths::resolve_db_path(db, cwd);
    debug!(db = %db_path.display(), "opening store");

    let store = SqliteStore::with_config(db_path, &config)?;
    Ok(match actor {
        Some(actor) => store.with_actor(actor),
        None => store,
    })
}

// === Commands ===

#[derive(Debug, Serialize)]
struct InitOutput {
    db_path: PathBuf,
    config_path: PathBuf,
}

fn run_init(db: Option<&Path>, cwd: &Path) -> Result<InitOutput> {
    let root = paths::find_project_root(cwd);
    let config_path = Config::config_path(&root);
    let config = Config::load_from(&root)?;
    if !config_path.exists() {
        config.save_to(&root)?;
    }

    let db_path = paths::resolve_db_path(db, cwd);
    SqliteStore::with_config(&db_path, &config)?;
    Ok(InitOutput { db_path, config_path })
}

fn run_epic_cmd(store: &SqliteStore, cmd: EpicCommand) -> CliOutput {
    match cmd {
        EpicCommand::Create { title, description, priority } => {
            respond(store.create_epic(new_entity(title, description, priority)))
        }
        EpicCommand::Complete { id } => respond(store.complete_epic(&normalize_id(&id))),
    }
}

fn run_task_cmd(store: &SqliteStore, cmd: TaskCommand) -> CliOutput {
    match cmd {
        TaskCommand::Create { epic, title, description, priority } => respond(
            store.create_task(&normalize_id(&epic), new_entity(title, description, priority)),
        ),
    }
}

fn run_subtask_cmd(store: &SqliteStore, cmd: SubtaskCommand) -> CliOutput {
    match cmd {
        SubtaskCommand::Create { task, title, description, priority } => respond(
            store.create_subtask(&normalize_id(&task), new_entity(title, description, priority)),
        ),
    }
}

fn new_entity(title: String, description: Option<String>, priority: Option<u8>) -> NewEntity {
    NewEntity { title, description, priority, parent_id: None }
}

fn run_dep_cmd(store: &SqliteStore, cmd: DepCommand) -> CliOutput {
    match cmd {
        DepCommand::Add { id, depends_on } => {
            respond(store.add_dependency(&normalize_id(&id), &normalize_id(&depends_on)))
        }
        DepCommand::Remove { id, depends_on } => {
            let (id, depends_on) = (normalize_id(&id), normalize_id(&depends_on));
            respond(store.remove_dependency(&id, &depends_on).map(|removed| RemovedOutput {
                dependent: id,
                dependency: depends_on,
                removed,
            }))
        }
        DepCommand::List { id } => respond(dep_list(store, &normalize_id(&id))),
    }
}

fn run_comment_cmd(store: &SqliteStore, cmd: CommentCommand) -> CliOutput {
    match cmd {
        CommentCommand::Add { id, body, author } => {
            let author = author.unwrap_or_else(|| store.actor().to_string());
            respond(store.add_comment(&normalize_id(&id), &author, &body))
        }
        CommentCommand::List { id } => respond(store.comments(&normalize_id(&id))),
    }
}

fn show(store: &SqliteStore, id: &str) -> Result<ShowOutput> {
    let entity = store.get(id)?;
    let children =
        store.list(&EntityFilter { parent_id: Some(id.to_string()), ..EntityFilter::default() })?;
    Ok(ShowOutput {
        comments: store.comments(id)?,
        dependencies: store.dependencies(id)?,
        dependents: store.dependents(id)?,
        blocked_by: store.blocked_by(id)?,
        children,
        entity,
    })
}

fn dep_list(store: &SqliteStore, id: &str) -> Result<DepListOutput> {
    Ok(DepListOutput {
        id: id.to_string(),
        dependencies: store.dependencies(id)?,
        dependents: store.dependents(id)?,
        blocked_by: store.blocked_by(id)?,
    })
}

fn list(
    store: &SqliteStore,
    kind: Option<EntityKind>,
    status: Option<Status>,
    parent: Option<&str>,
    max_priority: Option<u8>,
) -> Result<Vec<Entity>> {
    let max_priority = max_priority
        .map(Priority::from_u8)
        .transpose()
        .map_err(|e| Error::Validation(e.to_string()))?;
    store.list(&EntityFilter { kind, status, parent_id: parent.map(normalize_id), max_priority })
}

// === Output ===

fn respond<T: Serialize>(result: Result<T>) -> CliOutput {
    match result {
        Ok(value) => json_output(&value),
        Err(e) => error_output(&e),
    }
}

fn json_output<T: Serialize>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(&Error::Json(e)),
    }
}

fn error_output(error: &Error) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![format!("error: {error}")] }
}

/// An entity with everything attached to it.
#[derive(Debug, Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    entity: Entity,
    children: Vec<Entity>,
    comments: Vec<Comment>,
    dependencies: Vec<String>,
    dependents: Vec<String>,
    blocked_by: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DepListOutput {
    id: String,
    dependencies: Vec<String>,
    dependents: Vec<String>,
    blocked_by: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RemovedOutput {
    dependent: String,
    dependency: String,
    removed: bool,
}
