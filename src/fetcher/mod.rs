pub mod http_fetcher;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::app::{Result, RssImapError};

#[async_trait]
pub trait Fetcher {
    /// Raw body of the document at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Serves fixed bodies keyed by URL. Unknown URLs fail.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| RssImapError::Other(format!("No such feed: {}", url)))
    }
}
