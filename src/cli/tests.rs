//! Tests for the CLI module.

use super::*;
use clap::Parser;
use serde_json::Value;
use serial_test::serial;
use std::process::ExitCode;
use tempfile::TempDir;

/// Run `trekker --db <tmp>/t.db --actor tester <args>` from the temp dir.
fn exec(dir: &TempDir, args: &[&str]) -> CliOutput {
    let db = dir.path().join("t.db");
    let db = db.to_str().unwrap();
    let mut argv = vec!["trekker", "--db", db, "--actor", "tester"];
    argv.extend_from_slice(args);
    run_in(Cli::try_parse_from(argv).unwrap(), dir.path())
}

fn json(output: &CliOutput) -> Value {
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "stderr: {:?}", output.stderr);
    serde_json::from_str(&output.stdout[0]).unwrap()
}

fn failure(output: &CliOutput) -> &str {
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stdout.is_empty());
    &output.stderr[0]
}

#[test]
fn test_parse_rejects_unknown_status() {
    let result = Cli::try_parse_from(["trekker", "update", "TREK-1", "--status", "done"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_accepts_status_aliases() {
    let cli = Cli::try_parse_from(["trekker", "update", "TREK-1", "--status", "in-progress"])
        .unwrap();
    match cli.command {
        Command::Update { status, .. } => assert_eq!(status, Some(Status::InProgress)),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_create_show_update() {
    let dir = TempDir::new().unwrap();

    let epic = json(&exec(&dir, &["epic", "create", "--title", "Auth", "--priority", "1"]));
    assert_eq!(epic["id"], "EPIC-1");
    assert_eq!(epic["kind"], "epic");
    assert_eq!(epic["priority"], 1);

    let task = json(&exec(&dir, &["task", "create", "--epic", "epic-1", "--title", "Login"]));
    assert_eq!(task["id"], "TREK-1");
    assert_eq!(task["parent_id"], "EPIC-1");
    assert_eq!(task["status"], "todo");

    let shown = json(&exec(&dir, &["show", "EPIC-1"]));
    assert_eq!(shown["title"], "Auth");
    assert_eq!(shown["children"][0]["id"], "TREK-1");

    let updated = json(&exec(&dir, &["update", "trek-1", "--status", "in_progress"]));
    assert_eq!(updated["status"], "in_progress");
}

#[test]
fn test_errors_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    let out = exec(&dir, &["show", "TREK-9"]);
    assert_eq!(failure(&out), "error: not found: TREK-9");

    let out = exec(&dir, &["epic", "create", "--title", "Auth", "--priority", "9"]);
    assert!(failure(&out).contains("must be 0-5"));

    let out = exec(&dir, &["list", "--max-priority", "7"]);
    assert!(failure(&out).starts_with("error: validation failed"));
}

#[test]
fn test_dependencies_and_ready() {
    let dir = TempDir::new().unwrap();
    exec(&dir, &["epic", "create", "--title", "Auth"]);
    exec(&dir, &["task", "create", "--epic", "EPIC-1", "--title", "Login"]);
    exec(&dir, &["task", "create", "--epic", "EPIC-1", "--title", "Tests"]);

    let edge = json(&exec(&dir, &["dep", "add", "TREK-2", "--depends-on", "TREK-1"]));
    assert_eq!(edge["dependent"], "TREK-2");
    assert_eq!(edge["dependency"], "TREK-1");

    let out = exec(&dir, &["dep", "add", "TREK-1", "--depends-on", "TREK-2"]);
    assert!(failure(&out).contains("cycle"));

    let out = exec(&dir, &["update", "TREK-2", "--status", "in_progress"]);
    assert_eq!(failure(&out), "error: task TREK-2 blocked by incomplete dependency TREK-1");

    let listed = json(&exec(&dir, &["dep", "list", "TREK-2"]));
    assert_eq!(listed["blocked_by"], serde_json::json!(["TREK-1"]));

    let ready = json(&exec(&dir, &["ready"]));
    assert_eq!(ready.as_array().unwrap().len(), 1);
    assert_eq!(ready[0]["id"], "TREK-1");

    let removed = json(&exec(&dir, &["dep", "remove", "TREK-2", "--depends-on", "TREK-1"]));
    assert_eq!(removed["removed"], true);
    let again = json(&exec(&dir, &["dep", "remove", "TREK-2", "--depends-on", "TREK-1"]));
    assert_eq!(again["removed"], false);
}

#[test]
fn test_comments_search_and_history() {
    let dir = TempDir::new().unwrap();
    exec(&dir, &["epic", "create", "--title", "Auth"]);

    let comment =
        json(&exec(&dir, &["comment", "add", "EPIC-1", "--body", "OAuth provider chosen"]));
    assert_eq!(comment["id"], "CMT-1");
    assert_eq!(comment["author"], "tester");

    let comments = json(&exec(&dir, &["comment", "list", "EPIC-1"]));
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let hits = json(&exec(&dir, &["search", "oauth", "--type", "comment"]));
    assert_eq!(hits[0]["id"], "CMT-1");
    assert_eq!(hits[0]["entity_id"], "EPIC-1");

    let history = json(&exec(&dir, &["history", "EPIC-1"]));
    let fields: Vec<_> =
        history.as_array().unwrap().iter().map(|e| e["field"].as_str().unwrap()).collect();
    assert_eq!(fields, ["created", "comment"]);
    assert_eq!(history[0]["actor"], "tester");

    let paged = json(&exec(&dir, &["history", "--limit", "1", "--offset", "1"]));
    assert_eq!(paged[0]["field"], "comment");

    let out = exec(&dir, &["history", "--since", "2024-13-01T00:00:00Z"]);
    assert!(failure(&out).starts_with("error: validation failed: since must be an RFC 3339"));
}

#[test]
fn test_complete_epic_and_export() {
    let dir = TempDir::new().unwrap();
    exec(&dir, &["epic", "create", "--title", "Auth"]);
    exec(&dir, &["task", "create", "--epic", "EPIC-1", "--title", "Login"]);
    exec(&dir, &["subtask", "create", "--task", "TREK-1", "--title", "Form"]);

    let done = json(&exec(&dir, &["epic", "complete", "EPIC-1"]));
    assert_eq!(done["epic"]["status"], "completed");
    assert_eq!(done["archived"].as_array().unwrap().len(), 2);

    let export = json(&exec(&dir, &["export"]));
    assert_eq!(export["entities"].as_array().unwrap().len(), 3);
    assert_eq!(export["schema_version"], 1);

    let archived = json(&exec(&dir, &["list", "--status", "archived", "--type", "subtask"]));
    assert_eq!(archived[0]["id"], "TREK-2");
}

#[test]
fn test_init_creates_database_and_config() {
    let dir = TempDir::new().unwrap();
    let out = exec(&dir, &["init"]);
    let value = json(&out);

    assert!(dir.path().join("t.db").exists());
    assert!(dir.path().join(".trekker/config.yaml").exists());
    assert_eq!(value["config_path"], dir.path().join(".trekker/config.yaml").to_str().unwrap());
}

#[test]
#[serial]
fn test_database_from_environment() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("env.db");
    std::env::set_var("TREKKER_DB", &db);

    let cli = Cli::try_parse_from(["trekker", "epic", "create", "--title", "Auth"]).unwrap();
    std::env::remove_var("TREKKER_DB");

    assert_eq!(cli.db.as_deref(), Some(db.as_path()));
    let out = run_in(cli, dir.path());
    assert_eq!(out.exit_code, ExitCode::SUCCESS);
    assert!(db.exists());
}

#[test]
#[serial]
fn test_default_database_location() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".trekker")).unwrap();
    let nested = dir.path().join("src");
    std::fs::create_dir_all(&nested).unwrap();
    std::env::remove_var("TREKKER_DB");
    std::env::remove_var("TREKKER_ACTOR");

    let cli = Cli::try_parse_from(["trekker", "epic", "create", "--title", "Auth"]).unwrap();
    let out = run_in(cli, &nested);
    assert_eq!(out.exit_code, ExitCode::SUCCESS);
    assert!(dir.path().join(".trekker/trekker.db").exists());
}

#[test]
#[serial]
fn test_actor_from_config() {
    let dir = TempDir::new().unwrap();
    crate::config::Config { actor: "planner".to_string(), busy_timeout_ms: 1000 }
        .save_to(dir.path())
        .unwrap();
    std::env::remove_var("TREKKER_ACTOR");

    let db = dir.path().join("t.db");
    let db = db.to_str().unwrap();
    let cli =
        Cli::try_parse_from(["trekker", "--db", db, "epic", "create", "--title", "Auth"]).unwrap();
    run_in(cli, dir.path());

    let cli = Cli::try_parse_from(["trekker", "--db", db, "history"]).unwrap();
    let history = json(&run_in(cli, dir.path()));
    assert_eq!(history[0]["actor"], "planner");
}
