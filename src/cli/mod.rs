use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "formstore")]
#[command(about = "Form submissions with a draft, submit and withdraw lifecycle")]
#[command(long_about = "Formstore keeps form submissions in a SQLite database and moves them \
                       through their lifecycle. Start with 'formstore form import <file>' \
                       to load a form definition.")]
pub struct Cli {
    /// Database URL, overriding configuration
    #[arg(long, global = true, help = "Database URL (overrides database.url from configuration)")]
    pub database: Option<String>,
    /// Emit JSON log lines
    #[arg(long, global = true, help = "Write logs as JSON lines to stderr")]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Print the effective configuration as TOML
    Config {
        /// Write it to formstore.toml instead
        #[arg(long, help = "Write the effective configuration to formstore.toml")]
        write: bool,
    },
    /// Manage form definitions
    Form {
        #[command(subcommand)]
        command: FormCommands,
    },
    /// Manage submitters
    Submitter {
        #[command(subcommand)]
        command: SubmitterCommands,
    },
    /// Start a draft submission
    Create {
        /// Form id
        #[arg(long)]
        form: i64,
        /// Submitter id
        #[arg(long)]
        submitter: i64,
    },
    /// Store field values and attach them to a submission
    Attach {
        submission: i64,
        /// JSON object, or @path to a file holding one
        #[arg(long, help = "Field values as a JSON object, or @file")]
        data: String,
    },
    /// Add a row under one of the form's relations
    AddRow {
        submission: i64,
        /// Relation field name
        #[arg(long)]
        field: String,
        /// JSON object, or @path to a file holding one
        #[arg(long, help = "Row values as a JSON object, or @file")]
        data: String,
    },
    /// List submissions matching the given filters
    List {
        /// Form id, or a JSON object with an "id"
        #[arg(long)]
        form: Option<String>,
        /// State label or code
        #[arg(long)]
        state: Option<String>,
        /// Comparison applied to --state
        #[arg(long, default_value = "=", help = "Comparison for --state: = != < <= > >=")]
        op: String,
        /// Only non-cancelled submissions
        #[arg(long, conflicts_with = "state")]
        active: bool,
    },
    /// Show a read-only preview of a submission
    Show {
        submission: i64,
        /// Render HTML instead of plain text
        #[arg(long)]
        html: bool,
        /// Also print backend links and notification variables
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// List the issues that keep a draft from being submitted
    Errors {
        submission: i64,
        /// Skip relation checks
        #[arg(long)]
        shallow: bool,
    },
    /// Hand in a draft submission
    Submit { submission: i64 },
    /// Withdraw a draft submission and purge its data
    Withdraw { submission: i64 },
    /// Export the submitter addresses of matching submissions
    ExportEmails {
        /// Form id, or a JSON object with an "id"
        #[arg(long)]
        form: Option<String>,
        /// State label or code
        #[arg(long)]
        state: Option<String>,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum FormCommands {
    /// Load a form definition from a JSON file
    Import { path: PathBuf },
    /// List forms as id/title pairs
    List,
}

#[derive(Subcommand)]
pub enum SubmitterCommands {
    /// Register a submitter
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// List submitters as id/email pairs
    List,
}
