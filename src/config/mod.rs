//! Configuration for rss-imap.
//!
//! Two layers live here:
//!
//! - [`Settings`]: connection and process settings, read from
//!   `~/.config/rss-imap/config.toml` and the environment at startup.
//! - Feed definitions: YAML documents stored as messages in the control
//!   folder ([`source`]), resolved into [`FeedConfig`](crate::domain::FeedConfig)
//!   values by [`resolver`].

pub mod resolver;
pub mod settings;
pub mod source;

pub use resolver::{resolve, ConfigDocument, Resolved};
pub use settings::{AppDefaults, Credentials, ImapSettings, Settings, SyncSettings};

use std::fmt;
use std::path::PathBuf;

/// Where a configuration document came from: the text it was read from and
/// its position in that text's YAML stream (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentLocation {
    pub text: usize,
    pub document: usize,
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "text {}, document {}", self.text, self.document)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("No {0} configured")]
    MissingSetting(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidSetting { key: &'static str, value: String },

    #[error("Invalid YAML in {location}: {source}")]
    Yaml {
        location: DocumentLocation,
        source: serde_yaml::Error,
    },

    #[error("{location}: expected a mapping, found {found}")]
    NotAMapping {
        location: DocumentLocation,
        found: &'static str,
    },

    #[error("{location}: {key} must be a list, found {found}")]
    NotAList {
        location: DocumentLocation,
        key: &'static str,
        found: &'static str,
    },

    #[error("{location}: feed entry has no {field}")]
    MissingField {
        location: DocumentLocation,
        field: &'static str,
    },

    #[error("{location}: feed {feed:?} resolves to an empty {template}")]
    EmptyTemplate {
        location: DocumentLocation,
        feed: String,
        template: &'static str,
    },
}
