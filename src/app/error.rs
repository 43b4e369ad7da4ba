use thiserror::Error;

use crate::config::ConfigError;
use crate::dedup::DedupError;
use crate::store::StoreError;
use crate::translator::TranslationError;

#[derive(Error, Debug)]
pub enum RssImapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dedup error: {0}")]
    Dedup(#[from] DedupError),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RssImapError>;
