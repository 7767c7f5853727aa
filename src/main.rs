use anyhow::Result;
use clap::Parser;
use tracing::Instrument;

use formstore::cli::commands::{
    build_query,
    config::ConfigCommand,
    export::ExportEmailsCommand,
    forms::{ImportFormCommand, ListFormsCommand},
    lifecycle::{SubmitCommand, WithdrawCommand},
    list::ListCommand,
    migrate::MigrateCommand,
    open_service, open_store, show_how_to_get_started,
    submission::{AddRowCommand, AttachCommand, CreateCommand, ErrorsCommand, ShowCommand},
    submitters::{AddSubmitterCommand, ListSubmittersCommand},
};
use formstore::cli::{Cli, Commands, FormCommands, SubmitterCommands};
use formstore::config::{config, FormStoreConfig};
use formstore::observability::{lifecycle_metrics, OperationTimer};
use formstore::telemetry::{create_command_span, generate_correlation_id, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config()?.clone();
    if cli.json_logs {
        config.observability.json_output = true;
    }
    init_telemetry(&config.observability)?;

    let command_name = command_name(cli.command.as_ref());
    let span = create_command_span(command_name, &generate_correlation_id());

    let timer = OperationTimer::new(command_name);
    let result = tokio::runtime::Runtime::new()?.block_on(run(cli, config).instrument(span));
    timer.finish();
    lifecycle_metrics().log_stats();

    shutdown_telemetry();
    result
}

fn command_name(command: Option<&Commands>) -> &'static str {
    match command {
        None => "help",
        Some(Commands::Migrate) => "migrate",
        Some(Commands::Config { .. }) => "config",
        Some(Commands::Form { .. }) => "form",
        Some(Commands::Submitter { .. }) => "submitter",
        Some(Commands::Create { .. }) => "create",
        Some(Commands::Attach { .. }) => "attach",
        Some(Commands::AddRow { .. }) => "add-row",
        Some(Commands::List { .. }) => "list",
        Some(Commands::Show { .. }) => "show",
        Some(Commands::Errors { .. }) => "errors",
        Some(Commands::Submit { .. }) => "submit",
        Some(Commands::Withdraw { .. }) => "withdraw",
        Some(Commands::ExportEmails { .. }) => "export-emails",
    }
}

async fn run(cli: Cli, config: FormStoreConfig) -> Result<()> {
    let database = cli.database.as_deref();

    let Some(command) = cli.command else {
        return show_how_to_get_started().await;
    };

    if let Commands::Config { write } = command {
        return ConfigCommand::new(write).execute(&config);
    }

    if let Commands::Migrate = command {
        let store = open_store(&config, database).await?;
        let result = MigrateCommand::new().execute(&store).await;
        store.shutdown().await;
        return result;
    }

    let mut service = open_service(&config, database).await?;

    let result = match command {
        Commands::Migrate | Commands::Config { .. } => Ok(()),
        Commands::Form { command } => match command {
            FormCommands::Import { path } => ImportFormCommand::new(path).execute(&mut service).await,
            FormCommands::List => ListFormsCommand.execute(&service).await,
        },
        Commands::Submitter { command } => match command {
            SubmitterCommands::Add { email, name } => {
                AddSubmitterCommand::new(email, name).execute(&service).await
            }
            SubmitterCommands::List => ListSubmittersCommand.execute(&service).await,
        },
        Commands::Create { form, submitter } => CreateCommand::new(form, submitter).execute(&service).await,
        Commands::Attach { submission, data } => AttachCommand::new(submission, data).execute(&service).await,
        Commands::AddRow {
            submission,
            field,
            data,
        } => AddRowCommand::new(submission, field, data).execute(&service).await,
        Commands::List {
            form,
            state,
            op,
            active,
        } => {
            let query = build_query(form.as_deref(), state.as_deref(), &op, active)?;
            ListCommand::new(query).execute(&service).await
        }
        Commands::Show {
            submission,
            html,
            verbose,
        } => {
            ShowCommand::new(submission, config.admin.base_url.clone())
                .with_html(html)
                .with_verbose(verbose)
                .execute(&service)
                .await
        }
        Commands::Errors { submission, shallow } => ErrorsCommand::new(submission, !shallow).execute(&service).await,
        Commands::Submit { submission } => SubmitCommand::new(submission).execute(&service).await,
        Commands::Withdraw { submission } => WithdrawCommand::new(submission).execute(&service).await,
        Commands::ExportEmails {
            form,
            state,
            output,
        } => {
            let query = build_query(form.as_deref(), state.as_deref(), "=", false)?;
            ExportEmailsCommand::new(query, config.export.filename.clone())
                .with_output(output)
                .execute(&service)
                .await
        }
    };

    service.store().shutdown().await;
    result
}
