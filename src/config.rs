//! Process-level settings, read from the environment once at startup and
//! validated up front so misconfiguration fails before any job is touched.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Otoscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,otoscribe=debug"
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {name} has invalid value: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("cannot determine home directory for the default data dir")]
    NoHomeDir,
}

/// Connection settings for the hosted inference endpoint.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Everything the pipeline needs from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root for the filesystem object store and the registry database.
    pub data_dir: PathBuf,
    pub registry_db_path: PathBuf,
    /// Object store holding raw report uploads.
    pub input_store_ref: String,
    /// Object store holding archived results.
    pub output_store_ref: String,
    pub inference: InferenceSettings,
    pub push_timeout_secs: u64,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup (testable without touching
    /// the process environment).
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let data_dir = match lookup("OTOSCRIBE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(SettingsError::NoHomeDir)?
                .join(APP_NAME),
        };

        let registry_db_path = match lookup("OTOSCRIBE_REGISTRY_DB") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("otoscribe.db"),
        };

        let base_url = lookup("OTOSCRIBE_INFERENCE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(SettingsError::MissingVar("OTOSCRIBE_INFERENCE_URL"))?;
        let model = lookup("OTOSCRIBE_INFERENCE_MODEL")
            .filter(|v| !v.is_empty())
            .ok_or(SettingsError::MissingVar("OTOSCRIBE_INFERENCE_MODEL"))?;

        Ok(Self {
            data_dir,
            registry_db_path,
            input_store_ref: lookup("OTOSCRIBE_INPUT_STORE")
                .unwrap_or_else(|| "input-reports".to_string()),
            output_store_ref: lookup("OTOSCRIBE_OUTPUT_STORE")
                .unwrap_or_else(|| "completed-reports".to_string()),
            inference: InferenceSettings {
                base_url,
                model,
                timeout_secs: parse_secs(&lookup, "OTOSCRIBE_INFERENCE_TIMEOUT_SECS", 120)?,
            },
            push_timeout_secs: parse_secs(&lookup, "OTOSCRIBE_PUSH_TIMEOUT_SECS", 10)?,
        })
    }
}

fn parse_secs(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, SettingsError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| SettingsError::InvalidVar { name, value }),
    }
}
