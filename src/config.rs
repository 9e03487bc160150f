//! Configuration module for the file-integrity monitor.
//!
//! Settings are loaded once at startup and never change afterwards. Sources
//! are layered:
//! - Default values
//! - Configuration file (`.toml`, or `.json` for the legacy `config.json`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FILEGUARD_` and use double
//! underscores to separate nested levels:
//! - `FILEGUARD_EMAIL_COOLDOWN_SECONDS=300` sets `email_cooldown_seconds`
//! - `FILEGUARD_WATCHER__COALESCE_WINDOW_MS=500` sets `watcher.coalesce_window_ms`
//! - `FILEGUARD_ALERTS__EMAIL=false` sets `alerts.email`

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::types::MonitorTarget;
use crate::watcher::NormalizerConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FILEGUARD_CONFIG";

/// Prefix of environment overrides, e.g. `FILEGUARD_WATCHER__TICK_MS`.
pub const ENV_PREFIX: &str = "FILEGUARD_";

const PASSWORD_ENV: &str = "FILEGUARD_EMAIL_PASSWORD";

/// Files tried in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["fileguard.toml", "config.json"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("No configuration file found (looked for {tried})")]
    Missing { tried: String },

    #[error("Unsupported configuration format: {} (expected .toml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration file already exists at {}. Use --force to overwrite", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Failed to write configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A credential that never shows up in debug output.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(****)")
        }
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Hand-edited JSON configs sometimes store the password as a number
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Secret(s),
            Raw::Signed(n) => Secret(n.to_string()),
            Raw::Unsigned(n) => Secret(n.to_string()),
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Directories to watch
    #[serde(default)]
    pub monitor_folders: Vec<PathBuf>,

    /// Watch subdirectories of every monitored folder
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// SMTP relay host
    #[serde(default)]
    pub smtp_server: String,

    /// SMTP port; 465 selects implicit TLS, anything else STARTTLS
    #[serde(default)]
    pub smtp_port: u16,

    /// Sender address, also used as the SMTP login
    #[serde(default)]
    pub sender_email: String,

    #[serde(default)]
    pub receiver_emails: Vec<String>,

    #[serde(default)]
    pub email_password: Secret,

    /// Minimum seconds between two alert emails
    #[serde(default = "default_email_cooldown_seconds")]
    pub email_cooldown_seconds: u64,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Window in which repeated modifications of a path collapse into one event.
    /// Zero passes every modification through.
    #[serde(default)]
    pub coalesce_window_ms: u64,

    /// Drop modification notifications for directories
    #[serde(default = "default_true")]
    pub ignore_directory_modifications: bool,

    /// How often pending coalesced events are checked
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Capacity of the queue between the OS watcher and the pipeline
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AlertsConfig {
    /// Activity log file
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Show desktop notifications
    #[serde(default = "default_true")]
    pub notifications: bool,

    /// Send alert emails
    #[serde(default = "default_true")]
    pub email: bool,

    /// Upper bound on a single SMTP exchange
    #[serde(default = "default_email_timeout_seconds")]
    pub email_timeout_seconds: u64,

    /// How long a desktop notification stays visible
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: u64,

    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Diagnostic log levels.
///
/// ```toml
/// [logging]
/// default = "info"
///
/// [logging.modules]
/// fileguard = "debug"
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `lettre = "warn"`
    #[serde(default)]
    pub modules: IndexMap<String, String>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_email_cooldown_seconds() -> u64 { 60 }
fn default_tick_ms() -> u64 { 100 }
fn default_event_buffer() -> usize { 1024 }
fn default_log_path() -> PathBuf { PathBuf::from("logs/activity.log") }
fn default_email_timeout_seconds() -> u64 { 30 }
fn default_notification_timeout_ms() -> u64 { 5000 }
fn default_app_name() -> String { "FileGuard-FIM".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_folders: Vec::new(),
            recursive: true,
            smtp_server: String::new(),
            smtp_port: 0,
            sender_email: String::new(),
            receiver_emails: Vec::new(),
            email_password: Secret::default(),
            email_cooldown_seconds: default_email_cooldown_seconds(),
            watcher: WatcherConfig::default(),
            alerts: AlertsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 0,
            ignore_directory_modifications: true,
            tick_ms: default_tick_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            notifications: true,
            email: true,
            email_timeout_seconds: default_email_timeout_seconds(),
            notification_timeout_ms: default_notification_timeout_ms(),
            app_name: default_app_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: IndexMap::new(),
        }
    }
}

impl Settings {
    /// Resolve the configuration file path.
    ///
    /// An explicit path wins, then `FILEGUARD_CONFIG`, then the first of
    /// [`DEFAULT_CONFIG_FILES`] present in the working directory.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| ConfigError::Missing {
                tried: DEFAULT_CONFIG_FILES.join(", "),
            })
    }

    /// Locate and load the configuration, then validate it.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::locate(explicit)?;
        let settings = Self::load_from(&path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a specific file plus environment overrides.
    ///
    /// Does not validate; see [`Settings::validate`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };

        let mut figment = figment
            // Double underscore (__) separates nested levels
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into())
                    .ignore(&["email_password"]),
            );

        // Env values are parsed as numbers or booleans; the password must stay verbatim
        if let Ok(raw) = std::env::var(PASSWORD_ENV) {
            figment = figment.merge(Serialized::default("email_password", raw));
        }

        figment
            .extract()
            .map_err(|e| ConfigError::Parse(Box::new(e)))
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor_folders.is_empty() {
            return Err(ConfigError::Invalid(
                "monitor_folders must list at least one folder".to_string(),
            ));
        }
        if self.watcher.tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "watcher.tick_ms must be greater than zero".to_string(),
            ));
        }

        if self.alerts.email {
            if self.smtp_server.trim().is_empty() {
                return Err(ConfigError::Invalid("smtp_server is required".to_string()));
            }
            if self.smtp_port == 0 {
                return Err(ConfigError::Invalid("smtp_port is required".to_string()));
            }
            if self.email_password.is_empty() {
                return Err(ConfigError::Invalid("email_password is required".to_string()));
            }
            check_address("sender_email", &self.sender_email)?;
            if self.receiver_emails.is_empty() {
                return Err(ConfigError::Invalid(
                    "receiver_emails must list at least one address".to_string(),
                ));
            }
            for receiver in &self.receiver_emails {
                check_address("receiver_emails", receiver)?;
            }
        }

        Ok(())
    }

    /// Monitor targets in configuration order.
    pub fn targets(&self) -> Vec<MonitorTarget> {
        self.monitor_folders
            .iter()
            .map(|path| MonitorTarget::new(path.clone(), self.recursive))
            .collect()
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            ignore_directory_modifications: self.watcher.ignore_directory_modifications,
            ..NormalizerConfig::default()
        }
        .with_coalesce_window(Duration::from_millis(self.watcher.coalesce_window_ms))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.watcher.tick_ms)
    }

    pub fn email_cooldown(&self) -> Duration {
        Duration::from_secs(self.email_cooldown_seconds)
    }

    /// Placeholder configuration written by `fileguard init`.
    pub fn example() -> Self {
        Self {
            monitor_folders: vec![
                PathBuf::from("/path/to/monitor/folder1"),
                PathBuf::from("/path/to/monitor/folder2"),
            ],
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
            sender_email: "sender@example.com".to_string(),
            receiver_emails: vec![
                "receiver1@example.com".to_string(),
                "receiver2@example.com".to_string(),
            ],
            email_password: Secret::new("your_email_password_here"),
            ..Self::default()
        }
    }

    /// Save current configuration to file as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write the example configuration to `path`.
    pub fn init_config_file(path: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let path = path.as_ref().to_path_buf();

        if !force && path.exists() {
            return Err(ConfigError::AlreadyExists { path });
        }

        Self::example().save(&path)?;
        Ok(path)
    }
}

fn check_address(field: &str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid(format!("{field}: '{value}' is not a valid address ({e})")))
}
