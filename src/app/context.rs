use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::error::Result;
use crate::config::source::load_feeds;
use crate::config::{Resolved, Settings};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::pipeline::{SyncPipeline, SyncReport};
use crate::store::{ImapStore, MailStore, StoreSession};

pub struct AppContext {
    pub settings: Settings,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
}

impl AppContext {
    /// Load settings (file, then environment) and build the HTTP client.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        Self::with_settings(Settings::load(config_path)?)
    }

    pub fn with_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(settings.timeout())?);
        Ok(Self::with_fetcher(settings, fetcher))
    }

    pub fn with_fetcher(settings: Settings, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self { settings, fetcher }
    }

    pub fn pipeline(&self) -> SyncPipeline {
        SyncPipeline::new(self.fetcher.clone(), self.settings.sync.dedup_fallback)
    }

    /// Open an IMAP session with the configured credentials.
    pub async fn connect(&self) -> Result<StoreSession<ImapStore>> {
        let credentials = self.settings.credentials()?;
        let store = ImapStore::connect(&credentials, self.settings.timeout()).await?;
        Ok(StoreSession::open(store).await?)
    }

    /// Connect, run one sync and log out.
    pub async fn sync(&self) -> Result<SyncReport> {
        let session = self.connect().await?;
        let (session, report) = self.sync_session(session).await?;
        logout(session).await;
        Ok(report)
    }

    /// Read the feed definitions through `session` and deliver every feed.
    pub async fn sync_session<S>(&self, mut session: StoreSession<S>) -> Result<(StoreSession<S>, SyncReport)>
    where
        S: MailStore + 'static,
    {
        let resolved = load_feeds(&mut session, &self.settings).await?;
        if resolved.feeds.is_empty() {
            info!("No feeds configured in {}", self.settings.sync.control_folder);
        }
        self.pipeline().run(session, resolved.feeds).await
    }

    /// Connect, resolve the feed definitions and log out.
    pub async fn resolve_feeds(&self) -> Result<Resolved> {
        let mut session = self.connect().await?;
        let resolved = load_feeds(&mut session, &self.settings).await?;
        logout(session).await;
        Ok(resolved)
    }
}

async fn logout<S: MailStore>(session: StoreSession<S>) {
    if let Err(e) = session.logout().await {
        warn!("Logout failed: {}", e);
    }
}
