//! Message store access.
//!
//! [`MailStore`] is the raw capability a backend provides. [`StoreSession`]
//! wraps one backend connection with a folder cache and explicit folder
//! selection; it is owned by exactly one task at a time.

pub mod imap;
pub mod memory;
pub mod query;
pub mod session;

pub use imap::ImapStore;
pub use memory::MemoryStore;
pub use query::{Query, MESSAGE_ID_HEADER};
pub use session::{Selected, StoreSession};

use async_trait::async_trait;
use thiserror::Error;

/// Sequence number of a message in the selected folder.
pub type MessageHandle = u32;

/// What to retrieve for each fetched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPart {
    /// Only the Message-ID header.
    MessageIdHeader,
    /// The complete RFC 5322 message.
    Full,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not connect to {host}: {source}")]
    Connect {
        host: String,
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("Login as {user} failed: {source}")]
    Login {
        user: String,
        source: async_imap::error::Error,
    },

    #[error("{op} timed out after {secs}s")]
    Timeout { op: &'static str, secs: u64 },

    #[error("Could not {op} folder \"{folder}\": {reason}")]
    Folder {
        op: &'static str,
        folder: String,
        reason: String,
    },

    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),

    #[error("{0}")]
    Other(String),
}

/// Capabilities a message store backend provides.
///
/// `search` and `fetch` operate on the folder most recently passed to
/// `select`; callers go through [`StoreSession::select`] rather than calling
/// them directly.
#[async_trait]
pub trait MailStore: Send {
    async fn list_folders(&mut self) -> Result<Vec<String>, StoreError>;

    async fn create_folder(&mut self, folder: &str) -> Result<(), StoreError>;

    async fn subscribe(&mut self, folder: &str) -> Result<(), StoreError>;

    async fn select(&mut self, folder: &str) -> Result<(), StoreError>;

    async fn search(&mut self, query: &Query) -> Result<Vec<MessageHandle>, StoreError>;

    async fn fetch(
        &mut self,
        handles: &[MessageHandle],
        part: FetchPart,
    ) -> Result<Vec<Vec<u8>>, StoreError>;

    async fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), StoreError>;

    async fn logout(&mut self) -> Result<(), StoreError>;
}
