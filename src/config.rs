use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for formstore
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormStoreConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
    /// Backend links
    pub admin: AdminConfig,
    /// Email export settings
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (overridden by RUST_LOG)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_output: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Base URL of the backend, used to build submission links
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// File name offered for the email export
    pub filename: String,
}

impl Default for FormStoreConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_output: false,
            },
            database: Some(DatabaseConfig::default()),
            admin: AdminConfig {
                base_url: "http://localhost/backend".to_string(),
            },
            export: ExportConfig {
                filename: crate::export::DEFAULT_EXPORT_FILENAME.to_string(),
            },
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://formstore.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

impl FormStoreConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (formstore.toml, .formstore-rc)
    /// 3. Environment variables (prefixed with FORMSTORE_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("formstore.toml").exists() {
            builder = builder.add_source(File::with_name("formstore"));
        }

        if Path::new(".formstore-rc").exists() {
            builder = builder.add_source(File::with_name(".formstore-rc").format(config::FileFormat::Toml));
        }

        // FORMSTORE_DATABASE__URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("FORMSTORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<FormStoreConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = FormStoreConfig::load_env_file();
        FormStoreConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static FormStoreConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let defaults = FormStoreConfig::default();
        let text = toml::to_string_pretty(&defaults).unwrap();
        let parsed: FormStoreConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed.export.filename, "emails.txt");
        assert_eq!(parsed.database.unwrap().max_connections, 5);
        assert!(!parsed.observability.json_output);
    }

    #[test]
    fn test_defaults_feed_config_builder() {
        let built = Config::builder()
            .add_source(Config::try_from(&FormStoreConfig::default()).unwrap())
            .build()
            .unwrap();
        let loaded: FormStoreConfig = built.try_deserialize().unwrap();
        assert_eq!(loaded.admin.base_url, "http://localhost/backend");
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formstore.toml");

        let mut custom = FormStoreConfig::default();
        custom.export.filename = "camp-emails.txt".to_string();
        custom.save_to_file(&path).unwrap();

        let loaded: FormStoreConfig = Config::builder()
            .add_source(File::from(path.as_path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(loaded.export.filename, "camp-emails.txt");
    }
}
