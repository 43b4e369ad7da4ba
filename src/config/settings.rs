use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::ConfigError;
use crate::dedup::DedupFallback;

pub const DEFAULT_FOLDER_TEMPLATE: &str = "RSS/{name}";
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "{subject}";

/// Main settings struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub imap: ImapSettings,
    pub sync: SyncSettings,
    pub defaults: AppDefaults,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Bounds every HTTP request and every store command.
    pub timeout_secs: u64,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 993,
            user: String::new(),
            password: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Folder holding the feed definition messages.
    pub control_folder: String,
    /// Token a control message's subject must contain.
    pub config_marker: String,
    pub dedup_fallback: DedupFallback,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            control_folder: ".config".to_string(),
            config_marker: "rss-imap".to_string(),
            dedup_fallback: DedupFallback::Skip,
        }
    }
}

/// Templates used when no feed definition overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppDefaults {
    pub folder_template: String,
    pub subject_template: String,
}

impl Default for AppDefaults {
    fn default() -> Self {
        Self {
            folder_template: DEFAULT_FOLDER_TEMPLATE.to_string(),
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
        }
    }
}

/// What the store needs to open a session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Settings {
    /// Load settings from `path`, or from the default path when none is
    /// given, then apply environment overrides.
    ///
    /// A missing default file is created with comments; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::create_default_config(&path)?;
                    Self::default()
                }
            }
        };

        settings.apply_env()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading settings from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default settings file path: `~/.config/rss-imap/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("rss-imap").join("config.toml"))
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, keyed by environment variable name.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("IMAP_HOST") {
            self.imap.host = host;
        }
        if let Some(port) = get("IMAP_PORT") {
            self.imap.port = port.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                key: "IMAP_PORT",
                value: port,
            })?;
        }
        if let Some(user) = get("IMAP_USER") {
            self.imap.user = user;
        }
        if let Some(password) = get("IMAP_PASS") {
            self.imap.password = password;
        }
        if let Some(secs) = get("RSS_IMAP_TIMEOUT") {
            self.imap.timeout_secs =
                secs.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                    key: "RSS_IMAP_TIMEOUT",
                    value: secs,
                })?;
        }
        if let Some(template) = get("FEED_FOLDER_TEMPLATE") {
            self.defaults.folder_template = template;
        }
        if let Some(template) = get("FEED_ITEM_SUBJECT_TEMPLATE") {
            self.defaults.subject_template = template;
        }

        Ok(self)
    }

    /// Check that everything needed to connect is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.imap.host.trim().is_empty() {
            return Err(ConfigError::MissingSetting("IMAP host"));
        }
        if self.imap.user.trim().is_empty() {
            return Err(ConfigError::MissingSetting("IMAP user"));
        }
        if self.imap.password.is_empty() {
            return Err(ConfigError::MissingSetting("IMAP password"));
        }
        if self.imap.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "timeout_secs",
                value: "0".to_string(),
            });
        }
        if self.defaults.folder_template.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "folder_template",
                value: self.defaults.folder_template.clone(),
            });
        }
        if self.defaults.subject_template.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "subject_template",
                value: self.defaults.subject_template.clone(),
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.validate()?;
        Ok(Credentials {
            host: self.imap.host.trim().to_string(),
            port: self.imap.port,
            user: self.imap.user.trim().to_string(),
            password: self.imap.password.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.imap.timeout_secs)
    }

    /// Create a default settings file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default settings file content with comments.
    fn default_config_content() -> String {
        r##"# rss-imap configuration
#
# Every value here can be overridden by the environment:
#   IMAP_HOST, IMAP_PORT, IMAP_USER, IMAP_PASS, RSS_IMAP_TIMEOUT,
#   FEED_FOLDER_TEMPLATE, FEED_ITEM_SUBJECT_TEMPLATE
#
# Feeds themselves are defined in messages in the control folder.

[imap]
host = ""
port = 993
user = ""
# Prefer IMAP_PASS over storing the password here
password = ""

# Timeout for each HTTP request and IMAP command, in seconds
timeout_secs = 10

[sync]
# Folder holding the feed definitions
control_folder = ".config"

# Subject token marking a feed definition message
config_marker = "rss-imap"

# What to do when the duplicate check fails twice for a feed:
# "skip" (deliver nothing for that feed this run) or "deliver-all"
dedup_fallback = "skip"

[defaults]
# {name} is replaced by the feed name
folder_template = "RSS/{name}"

# {name} is replaced by the feed name, {subject} by the item title
subject_template = "{subject}"
"##
        .to_string()
    }
}
