//! Command-line parsing and end-to-end runs of the binary

#![cfg(feature = "database")]

use assert_cmd::Command;
use clap::{CommandFactory, Parser};
use formstore::cli::{Cli, Commands, FormCommands};
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_list_accepts_scope_flags() {
    let cli = Cli::try_parse_from(["formstore", "list", "--form", "3", "--state", "submitted", "--op", "<"]).unwrap();

    match cli.command {
        Some(Commands::List {
            form,
            state,
            op,
            active,
        }) => {
            assert_eq!(form.as_deref(), Some("3"));
            assert_eq!(state.as_deref(), Some("submitted"));
            assert_eq!(op, "<");
            assert!(!active);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn test_active_conflicts_with_state() {
    assert!(Cli::try_parse_from(["formstore", "list", "--active", "--state", "draft"]).is_err());
}

#[test]
fn test_global_database_flag_after_subcommand() {
    let cli = Cli::try_parse_from(["formstore", "form", "import", "camp.json", "--database", "sqlite::memory:"]).unwrap();

    assert_eq!(cli.database.as_deref(), Some("sqlite::memory:"));
    assert!(matches!(
        cli.command,
        Some(Commands::Form {
            command: FormCommands::Import { .. }
        })
    ));
}

#[test]
fn test_errors_defaults_to_deep_checks() {
    let cli = Cli::try_parse_from(["formstore", "errors", "12"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Errors {
            submission: 12,
            shallow: false
        })
    ));
}

const CAMP_FORM: &str = r#"{
    "title": "Summer camp",
    "schema": {
        "kind": "camp_registration",
        "title": "Camp registration",
        "fields": [
            { "name": "name", "rules": "required|min:3" },
            { "name": "newsletter", "type": "checkbox" }
        ]
    },
    "relations": [
        {
            "field": "children",
            "title": "Children",
            "required_min": 1,
            "target": {
                "kind": "camp_child",
                "title": "Child",
                "fields": [{ "name": "name", "rules": "required" }]
            }
        }
    ]
}"#;

fn formstore(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("formstore").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("FORMSTORE_DATABASE__URL", "sqlite://formstore.db");
    cmd
}

#[test]
fn test_submission_round_trip_through_binary() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("camp.json"), CAMP_FORM).unwrap();

    formstore(&dir)
        .args(["form", "import", "camp.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported form #1: Summer camp"));

    formstore(&dir)
        .args(["submitter", "add", "--email", "ada@example.org"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered submitter #1"));

    formstore(&dir)
        .args(["create", "--form", "1", "--submitter", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created draft submission #1"));

    formstore(&dir)
        .args(["attach", "1", "--data", r#"{"name": "Ada Lovelace"}"#])
        .assert()
        .success();

    formstore(&dir)
        .args(["errors", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("You have to add more Child (1 required)"));

    formstore(&dir)
        .args(["add-row", "1", "--field", "children", "--data", r#"{"name": "Grace"}"#])
        .assert()
        .success();

    formstore(&dir)
        .args(["submit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Submission #1 submitted"));

    formstore(&dir)
        .args(["list", "--state", "submitted"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada Lovelace"));

    formstore(&dir)
        .args(["export-emails", "--output", "emails.txt"])
        .assert()
        .success();
    let exported = std::fs::read_to_string(dir.path().join("emails.txt")).unwrap();
    assert_eq!(exported, "ada@example.org");

    formstore(&dir)
        .args(["export-emails"])
        .assert()
        .success()
        .stdout("ada@example.org")
        .stderr(predicate::str::contains("Content-Length: 15"));
}

#[test]
fn test_withdrawn_submission_cannot_be_submitted() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("camp.json"), CAMP_FORM).unwrap();

    for args in [
        vec!["form", "import", "camp.json"],
        vec!["submitter", "add", "--email", "ada@example.org"],
        vec!["create", "--form", "1", "--submitter", "1"],
        vec!["attach", "1", "--data", r#"{"name": "Ada Lovelace"}"#],
    ] {
        formstore(&dir).args(args).assert().success();
    }

    formstore(&dir)
        .args(["withdraw", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("withdrawn"));

    formstore(&dir)
        .args(["submit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("was not submitted (status: Cancelled)"));

    formstore(&dir)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Removed] [Cancelled]"))
        .stdout(predicate::str::contains("No data available"));
}
