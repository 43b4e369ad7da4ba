use std::future::Future;
use std::time::Duration;

use async_imap::types::{Fetch, Name};
use async_imap::Session;
use async_native_tls::TlsStream;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

use crate::config::Credentials;
use crate::store::{FetchPart, MailStore, MessageHandle, Query, StoreError};

type ImapSession = Session<TlsStream<Compat<TcpStream>>>;

const FETCH_MESSAGE_ID: &str = "BODY.PEEK[HEADER.FIELDS (MESSAGE-ID)]";
const FETCH_FULL: &str = "BODY.PEEK[]";

/// IMAP-over-TLS backend. Every command is bounded by the session timeout.
pub struct ImapStore {
    session: ImapSession,
    timeout: Duration,
}

impl ImapStore {
    pub async fn connect(credentials: &Credentials, timeout: Duration) -> Result<Self, StoreError> {
        let host = credentials.host.as_str();
        info!(host = %host, port = credentials.port, "Connecting to IMAP server");

        let tcp = bounded(timeout, "connect", async {
            TcpStream::connect((host, credentials.port))
                .await
                .map_err(|source| StoreError::Connect {
                    host: host.to_string(),
                    source,
                })
        })
        .await?;

        let tls = bounded(timeout, "TLS handshake", async {
            async_native_tls::TlsConnector::new()
                .connect(host, tcp.compat())
                .await
                .map_err(|e| StoreError::Tls {
                    host: host.to_string(),
                    reason: e.to_string(),
                })
        })
        .await?;

        let client = async_imap::Client::new(tls);
        let session = bounded(timeout, "login", async {
            client
                .login(&credentials.user, &credentials.password)
                .await
                .map_err(|(source, _)| StoreError::Login {
                    user: credentials.user.clone(),
                    source,
                })
        })
        .await?;

        debug!("Logged in as {}", credentials.user);
        Ok(Self { session, timeout })
    }
}

#[async_trait]
impl MailStore for ImapStore {
    async fn list_folders(&mut self) -> Result<Vec<String>, StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "LIST", async move {
            let names: Vec<Name> = session
                .list(Some(""), Some("*"))
                .await?
                .try_collect()
                .await?;
            Ok::<_, StoreError>(names.iter().map(|n| n.name().to_string()).collect())
        })
        .await
    }

    async fn create_folder(&mut self, folder: &str) -> Result<(), StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "CREATE", async move {
            session.create(folder).await.map_err(|e| StoreError::Folder {
                op: "create",
                folder: folder.to_string(),
                reason: e.to_string(),
            })
        })
        .await
    }

    async fn subscribe(&mut self, folder: &str) -> Result<(), StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "SUBSCRIBE", async move {
            session.subscribe(folder).await.map_err(|e| StoreError::Folder {
                op: "subscribe to",
                folder: folder.to_string(),
                reason: e.to_string(),
            })
        })
        .await
    }

    async fn select(&mut self, folder: &str) -> Result<(), StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "SELECT", async move {
            session
                .select(folder)
                .await
                .map(|_| ())
                .map_err(|e| StoreError::Folder {
                    op: "select",
                    folder: folder.to_string(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn search(&mut self, query: &Query) -> Result<Vec<MessageHandle>, StoreError> {
        let criteria = query.to_imap();
        debug!("SEARCH {}", criteria);

        let session = &mut self.session;
        bounded(self.timeout, "SEARCH", async move {
            let handles = session.search(&criteria).await?;
            Ok::<_, StoreError>(handles.into_iter().collect())
        })
        .await
    }

    async fn fetch(
        &mut self,
        handles: &[MessageHandle],
        part: FetchPart,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let sequence_set = handles
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let query = match part {
            FetchPart::MessageIdHeader => FETCH_MESSAGE_ID,
            FetchPart::Full => FETCH_FULL,
        };

        let session = &mut self.session;
        bounded(self.timeout, "FETCH", async move {
            let fetches: Vec<Fetch> = session
                .fetch(&sequence_set, query)
                .await?
                .try_collect()
                .await?;

            // Unsolicited FETCH responses (flag updates) carry no section
            Ok::<_, StoreError>(
                fetches
                    .iter()
                    .filter_map(|f| match part {
                        FetchPart::MessageIdHeader => f.header().or_else(|| f.body()),
                        FetchPart::Full => f.body(),
                    })
                    .map(<[u8]>::to_vec)
                    .collect(),
            )
        })
        .await
    }

    async fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "APPEND", async move {
            session
                .append(folder, None, None, message)
                .await
                .map_err(|e| StoreError::Folder {
                    op: "append to",
                    folder: folder.to_string(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn logout(&mut self) -> Result<(), StoreError> {
        let session = &mut self.session;
        bounded(self.timeout, "LOGOUT", async move {
            session.logout().await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

async fn bounded<T, F>(timeout: Duration, op: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StoreError::Timeout {
            op,
            secs: timeout.as_secs(),
        })?
}
