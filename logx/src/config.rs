//! Configuration record: application descriptors, credential owners and
//! viewer/retrieval settings.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/logx/config.toml` (or the platform
//! config dir). A missing file loads as an empty configuration.
//!
//! ```toml
//! editor = "code --wait"
//!
//! [[users]]
//! id = "u-1"
//! name = "ops"
//! username = "deploy"
//!
//! [[apps]]
//! name = "billing"
//! user_ref = "u-1"
//! log_path = "/var/log/billing/billing.log"
//! log_pattern = "billing-{date}.log"
//! date_format = "%Y-%m-%d"
//! servers = ["10.0.0.1", "10.0.0.2:2222"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Placeholder substituted with the rendered date in a log pattern.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Errors that can occur when loading, saving or editing the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),
}

/// Named reference to a username/password pair held in the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOwner {
    /// Key used to look the secret up.
    pub id: String,
    /// Display name, unique within the configuration.
    pub name: String,
    /// Login name, kept here for listing only.
    #[serde(default)]
    pub username: String,
}

/// A log source: where the file lives, how dated files are named, and which
/// hosts carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub name: String,
    /// Id of the [`CredentialOwner`] used to log in.
    pub user_ref: String,
    /// Path of the current (non-dated) log file.
    pub log_path: String,
    /// File name pattern for dated files; `{date}` is optional.
    #[serde(default)]
    pub log_pattern: String,
    /// strftime template, or a reference-date layout such as `2006-01-02`.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Order is significant: it is the default iteration order.
    #[serde(default)]
    pub servers: Vec<String>,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl ApplicationDescriptor {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("App name cannot be empty".into()));
        }
        if self.log_path.trim().is_empty() && self.log_pattern.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "App '{}' needs a log path or a log pattern",
                self.name
            )));
        }
        if self.servers.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "App '{}' needs at least one server",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether the pattern renders differently per date.
    pub fn is_dated(&self) -> bool {
        self.log_pattern.contains(DATE_PLACEHOLDER)
    }
}

/// Settings for the interactive viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Show a line-number gutter.
    pub line_numbers: bool,
    /// Directory that saved views are written to; current dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            line_numbers: true,
            save_dir: None,
        }
    }
}

/// Settings for the retrieval orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub connect_timeout_secs: u64,
    /// Hosts fetched at once; 1 means sequential.
    pub parallelism: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            parallelism: 1,
        }
    }
}

impl RetrievalSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

/// Root configuration record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Custom editor command; platform default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(default)]
    pub viewer: ViewerSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub users: Vec<CredentialOwner>,
    #[serde(default)]
    pub apps: Vec<ApplicationDescriptor>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns an empty config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "configuration saved");

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// `$XDG_CONFIG_HOME/logx/config.toml` first, then the platform config dir.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg_config.is_empty() {
                return Ok(PathBuf::from(xdg_config).join("logx").join("config.toml"));
            }
        }

        dirs::config_dir()
            .map(|p| p.join("logx").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for user in &self.users {
            if !ids.insert(&user.id) {
                return Err(ConfigError::Validation(format!("Duplicate user id: {}", user.id)));
            }
            if !names.insert(&user.name) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate user name: {}",
                    user.name
                )));
            }
        }

        let mut app_names = HashSet::new();
        for app in &self.apps {
            app.validate()?;
            if !app_names.insert(&app.name) {
                return Err(ConfigError::Validation(format!("Duplicate app name: {}", app.name)));
            }
            if !ids.contains(&app.user_ref) {
                return Err(ConfigError::Validation(format!(
                    "App '{}' references unknown user '{}'",
                    app.name, app.user_ref
                )));
            }
        }

        Ok(())
    }

    pub fn find_app(&self, name: &str) -> Option<&ApplicationDescriptor> {
        self.apps.iter().find(|a| a.name == name)
    }

    pub fn find_user(&self, id: &str) -> Option<&CredentialOwner> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_user_by_name(&self, name: &str) -> Option<&CredentialOwner> {
        self.users.iter().find(|u| u.name == name)
    }

    /// Add a new user. Returns error if the id or name already exists.
    pub fn add_user(&mut self, user: CredentialOwner) -> Result<(), ConfigError> {
        if user.name.trim().is_empty() || user.id.trim().is_empty() {
            return Err(ConfigError::Validation("User id and name cannot be empty".into()));
        }
        if self.users.iter().any(|u| u.id == user.id || u.name == user.name) {
            return Err(ConfigError::Validation(format!(
                "User '{}' already exists",
                user.name
            )));
        }
        self.users.push(user);
        Ok(())
    }

    /// Remove a user by name, returning it.
    ///
    /// Refuses while an app still references the user.
    pub fn delete_user(&mut self, name: &str) -> Result<CredentialOwner, ConfigError> {
        let pos = self
            .users
            .iter()
            .position(|u| u.name == name)
            .ok_or_else(|| ConfigError::UserNotFound(name.to_string()))?;

        let id = &self.users[pos].id;
        if let Some(app) = self.apps.iter().find(|a| &a.user_ref == id) {
            return Err(ConfigError::Validation(format!(
                "User '{}' is still used by app '{}'",
                name, app.name
            )));
        }

        Ok(self.users.remove(pos))
    }

    /// Add a new app. Returns error if the name already exists.
    pub fn add_app(&mut self, app: ApplicationDescriptor) -> Result<(), ConfigError> {
        app.validate()?;
        if self.apps.iter().any(|a| a.name == app.name) {
            return Err(ConfigError::Validation(format!("App '{}' already exists", app.name)));
        }
        if self.find_user(&app.user_ref).is_none() {
            return Err(ConfigError::UserNotFound(app.user_ref.clone()));
        }
        self.apps.push(app);
        Ok(())
    }

    /// Replace the app with the same name, keeping its position.
    pub fn update_app(&mut self, app: ApplicationDescriptor) -> Result<(), ConfigError> {
        app.validate()?;
        if self.find_user(&app.user_ref).is_none() {
            return Err(ConfigError::UserNotFound(app.user_ref.clone()));
        }
        let slot = self
            .apps
            .iter_mut()
            .find(|a| a.name == app.name)
            .ok_or_else(|| ConfigError::AppNotFound(app.name.clone()))?;
        *slot = app;
        Ok(())
    }

    pub fn delete_app(&mut self, name: &str) -> Result<ApplicationDescriptor, ConfigError> {
        let pos = self
            .apps
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| ConfigError::AppNotFound(name.to_string()))?;
        Ok(self.apps.remove(pos))
    }

    /// Set or clear the custom editor command.
    pub fn set_editor(&mut self, command: Option<String>) {
        self.editor = command.filter(|c| !c.trim().is_empty());
    }
}
