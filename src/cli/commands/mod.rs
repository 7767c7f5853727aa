use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

use crate::config::{DatabaseConfig, FormStoreConfig};
use crate::storage::SqliteStore;
use crate::submissions::{
    Comparison, EventBus, FormSelector, LoggingListener, SubmissionQuery, SubmissionService,
    SubmissionState,
};

pub mod config;
pub mod export;
pub mod forms;
pub mod lifecycle;
pub mod list;
pub mod migrate;
pub mod submission;
pub mod submitters;

/// Opens the configured database and loads the record registry from it
pub async fn open_service(
    config: &FormStoreConfig,
    database_override: Option<&str>,
) -> Result<SubmissionService<SqliteStore>> {
    let store = open_store(config, database_override).await?;
    let events = EventBus::new().with_listener(std::sync::Arc::new(LoggingListener));
    let service = SubmissionService::load(store, events)
        .await
        .context("Failed to load forms")?;
    Ok(service)
}

pub async fn open_store(config: &FormStoreConfig, database_override: Option<&str>) -> Result<SqliteStore> {
    let mut database: DatabaseConfig = config.database.clone().unwrap_or_default();
    if let Some(url) = database_override {
        database.url = url.to_string();
    }

    SqliteStore::from_config(&database)
        .await
        .with_context(|| format!("Failed to open database at {}", database.url))
}

/// Parses a JSON object given inline or as `@path`
pub fn parse_fields(source: &str) -> Result<Map<String, Value>> {
    let text = match source.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read {path}"))?,
        None => source.to_string(),
    };

    match serde_json::from_str(&text).context("Field values are not valid JSON")? {
        Value::Object(fields) => Ok(fields),
        other => Err(anyhow!("Expected a JSON object of field values, got {other}")),
    }
}

/// Accepts a bare id or any JSON value a form selector understands
pub fn parse_form_selector(source: &str) -> Result<FormSelector> {
    let value = serde_json::from_str::<Value>(source).unwrap_or_else(|_| Value::String(source.to_string()));
    Ok(FormSelector::try_from(&value)?)
}

pub fn build_query(
    form: Option<&str>,
    state: Option<&str>,
    op: &str,
    active: bool,
) -> Result<SubmissionQuery> {
    let mut query = SubmissionQuery::new();

    if let Some(form) = form {
        query = query.by_form(parse_form_selector(form)?);
    }
    if let Some(state) = state {
        let state: SubmissionState = state.parse()?;
        let op: Comparison = op.parse()?;
        query = query.in_state_with(state, op);
    }
    if active {
        query = query.active();
    }

    Ok(query)
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("📝 Formstore - form submissions");
    println!();
    println!("To get started:");
    println!("  📥 formstore form import form.json      # Load a form definition");
    println!("  👤 formstore submitter add --email ...  # Register a submitter");
    println!("  ✏️  formstore create --form 1 --submitter 2");
    println!("  📋 formstore list --active             # See open submissions");
    println!();
    println!("💡 'formstore errors <id>' shows what keeps a draft from being submitted");
    Ok(())
}
