//! Configuration loading and validation.
//!
//! Loads settings from `./config.toml` (or `$TICKETLINE_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//! Secrets are never stored in the file: the file names the environment
//! variables that hold them, and [`Config::resolve_secrets`] reads those.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::pipeline::dedup::DEFAULT_DEDUP_CAPACITY;
use crate::pipeline::recency::DEFAULT_RECENCY_TTL_HOURS;

/// Upper bound for `pipeline.recency_ttl_hours` (one year).
pub const MAX_RECENCY_TTL_HOURS: i64 = 8760;
use crate::whatsapp::client::DEFAULT_API_BASE_URL;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener.
    pub server: ServerConfig,
    /// WhatsApp Cloud API.
    pub whatsapp: WhatsAppConfig,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
    /// Database location.
    pub storage: StorageConfig,
    /// Customer directory.
    pub directory: DirectoryConfig,
    /// Operator email notifications.
    pub notify: NotifyConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Graph API base URL, optionally including a version segment.
    pub api_base_url: String,
    /// Business phone number id used in the messages endpoint path.
    pub phone_number_id: String,
    /// Business phone number recorded on message records.
    pub business_phone_number: String,
    /// Environment variable holding the API access token.
    pub access_token_env: String,
    /// Environment variable holding the webhook verification token.
    pub verify_token_env: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            phone_number_id: String::new(),
            business_phone_number: String::new(),
            access_token_env: "TICKETLINE_WHATSAPP_TOKEN".to_owned(),
            verify_token_env: "TICKETLINE_VERIFY_TOKEN".to_owned(),
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of recent message ids kept for redelivery suppression.
    pub dedup_capacity: usize,
    /// Hours a sender counts as recently active.
    pub recency_ttl_hours: i64,
    /// Seconds between sweeps of expired recency entries.
    pub recency_sweep_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            recency_ttl_hours: DEFAULT_RECENCY_TTL_HOURS,
            recency_sweep_secs: 300,
        }
    }
}

/// Database location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/ticketline.db".to_owned(),
        }
    }
}

/// Customer directory location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// TOML file of `[[customers]]`; personalisation is off when unset.
    pub path: Option<String>,
}

/// Operator email notification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Recipient of delivery notices; notifications are off when unset.
    pub operator_email: Option<String>,
    /// SMTP relay host; email is logged instead of sent when unset.
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// SMTP login user name.
    pub username: String,
    /// Environment variable holding the SMTP password.
    pub password_env: String,
    /// `From:` address.
    pub from: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            operator_email: None,
            smtp_host: None,
            smtp_port: 587,
            username: String::new(),
            password_env: "TICKETLINE_SMTP_PASSWORD".to_owned(),
            from: "noreply@localhost".to_owned(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON log files.
    pub logs_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_owned(),
        }
    }
}

/// Secrets resolved from the environment at startup.
#[derive(Clone)]
pub struct Secrets {
    /// WhatsApp API access token.
    pub access_token: String,
    /// Webhook verification token.
    pub verify_token: String,
    /// SMTP password, when SMTP is configured.
    pub smtp_password: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("smtp_password", &self.smtp_password.is_some())
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = config_path_with(&env);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to read config at {}: {e}",
                    path.display()
                ))
            }
        };
        config.apply_overrides(env);
        Ok(config)
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("TICKETLINE_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env("TICKETLINE_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(
                    var = "TICKETLINE_PORT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TICKETLINE_API_BASE_URL") {
            self.whatsapp.api_base_url = v;
        }
        if let Some(v) = env("TICKETLINE_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = env("TICKETLINE_BUSINESS_PHONE") {
            self.whatsapp.business_phone_number = v;
        }
        if let Some(v) = env("TICKETLINE_DATABASE_PATH") {
            self.storage.database_path = v;
        }
        if let Some(v) = env("TICKETLINE_DIRECTORY_PATH") {
            self.directory.path = Some(v);
        }
        if let Some(v) = env("TICKETLINE_OPERATOR_EMAIL") {
            self.notify.operator_email = Some(v);
        }
        if let Some(v) = env("TICKETLINE_SMTP_HOST") {
            self.notify.smtp_host = Some(v);
        }
        if let Some(v) = env("TICKETLINE_LOGS_DIR") {
            self.logging.logs_dir = v;
        }
    }

    /// Check settings the service cannot start without.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        if self.whatsapp.phone_number_id.trim().is_empty() {
            anyhow::bail!("whatsapp.phone_number_id must be set");
        }
        if self.whatsapp.business_phone_number.trim().is_empty() {
            anyhow::bail!("whatsapp.business_phone_number must be set");
        }
        if self.pipeline.dedup_capacity == 0 {
            anyhow::bail!("pipeline.dedup_capacity must be at least 1");
        }
        if self.pipeline.recency_ttl_hours <= 0 {
            anyhow::bail!("pipeline.recency_ttl_hours must be positive");
        }
        if self.pipeline.recency_ttl_hours > MAX_RECENCY_TTL_HOURS {
            anyhow::bail!("pipeline.recency_ttl_hours must be at most {MAX_RECENCY_TTL_HOURS}");
        }
        if self.pipeline.recency_sweep_secs == 0 {
            anyhow::bail!("pipeline.recency_sweep_secs must be positive");
        }
        Ok(())
    }

    /// Read the secrets named by this config from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret variable is unset or empty.
    pub fn resolve_secrets(&self, env: impl Fn(&str) -> Option<String>) -> Result<Secrets> {
        let required = |name: &str| {
            env(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("environment variable {name} is not set"))
        };
        let access_token = required(&self.whatsapp.access_token_env)?;
        let verify_token = required(&self.whatsapp.verify_token_env)?;
        let smtp_password = if self.notify.smtp_host.is_some() {
            Some(required(&self.notify.password_env)?)
        } else {
            None
        };
        Ok(Secrets {
            access_token,
            verify_token,
            smtp_password,
        })
    }
}

/// Resolve the config file path using a custom env resolver.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env("TICKETLINE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
