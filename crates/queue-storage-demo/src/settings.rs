//! Demo configuration.
//!
//! Sources are layered lowest to highest precedence:
//! 1. `appsettings.json` in the working directory (optional)
//! 2. The file named by `--config` (required when given)
//! 3. `QUEUE_DEMO__*` environment variables
//! 4. `--connection-string` on the command line

use queue_storage::{QueueStorageError, StorageAccount};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration file read from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

/// Prefix of environment overrides, e.g. `QUEUE_DEMO__CONNECTIONSTRING`
pub const ENV_PREFIX: &str = "QUEUE_DEMO";

/// Configuration key holding the storage connection string
pub const CONNECTION_STRING_KEY: &str = "ConnectionString";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing configuration value: {key}")]
    Missing { key: String },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(#[source] QueueStorageError),
}

/// Settings the samples need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoConfig {
    pub connection_string: Option<String>,
}

impl DemoConfig {
    /// Load configuration from the default file, an optional explicit file
    /// and the environment
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Json).required(false),
        );

        if let Some(path) = explicit_path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let values: HashMap<String, config::Value> = settings.try_deserialize()?;
        Self::from_values(values)
    }

    /// Pick settings out of the merged configuration table
    ///
    /// File keys keep their spelling while environment keys arrive
    /// lowercased, so keys match case-insensitively and the lowercase
    /// (environment) spelling wins.
    fn from_values(values: HashMap<String, config::Value>) -> Result<Self, ConfigError> {
        let mut connection_string = None;
        let mut from_environment = false;

        for (key, value) in values {
            if !key.eq_ignore_ascii_case(CONNECTION_STRING_KEY) {
                continue;
            }

            let is_environment = key == key.to_ascii_lowercase();
            if connection_string.is_none() || (is_environment && !from_environment) {
                connection_string = Some(value.into_string()?);
                from_environment = is_environment;
            }
        }

        debug!(
            has_connection_string = connection_string.is_some(),
            "Configuration loaded"
        );

        Ok(Self { connection_string })
    }

    /// Connection string to use: the command-line value when present,
    /// otherwise the configured one
    pub fn resolve_connection_string<'a>(
        &'a self,
        override_value: Option<&'a str>,
    ) -> Result<&'a str, ConfigError> {
        override_value
            .or(self.connection_string.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key: CONNECTION_STRING_KEY.to_string(),
            })
    }
}

/// Parse a connection string into a storage account
pub fn create_storage_account(connection_string: &str) -> Result<StorageAccount, ConfigError> {
    StorageAccount::from_connection_string(connection_string)
        .map_err(ConfigError::InvalidConnectionString)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
