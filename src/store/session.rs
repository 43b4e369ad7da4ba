use std::collections::HashSet;

use tracing::{debug, info};

use crate::store::{FetchPart, MailStore, MessageHandle, Query, StoreError};

/// One open connection to a store plus the state the server keeps for it.
pub struct StoreSession<S> {
    store: S,
    folders: HashSet<String>,
    selected: Option<String>,
}

impl<S: MailStore> StoreSession<S> {
    /// Wrap a connected backend, loading its folder list.
    pub async fn open(mut store: S) -> Result<Self, StoreError> {
        let folders = store
            .list_folders()
            .await?
            .into_iter()
            .map(|f| folder_key(&f).to_string())
            .collect();

        Ok(Self {
            store,
            folders,
            selected: None,
        })
    }

    pub fn has_folder(&self, folder: &str) -> bool {
        self.folders.contains(folder_key(folder))
    }

    /// Folder currently selected on the server, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Create `folder` unless it exists. Returns true if it was created.
    pub async fn ensure_folder(&mut self, folder: &str) -> Result<bool, StoreError> {
        if self.has_folder(folder) {
            return Ok(false);
        }

        info!("Creating folder {}", folder);
        self.store.create_folder(folder).await?;
        self.folders.insert(folder_key(folder).to_string());
        Ok(true)
    }

    /// Like [`ensure_folder`](Self::ensure_folder), also subscribing to a
    /// newly created folder.
    pub async fn create_and_subscribe(&mut self, folder: &str) -> Result<bool, StoreError> {
        let created = self.ensure_folder(folder).await?;
        if created {
            self.store.subscribe(folder).await?;
        }
        Ok(created)
    }

    /// Make `folder` the current folder. A no-op on the server when it
    /// already is.
    pub async fn select(&mut self, folder: &str) -> Result<Selected<'_, S>, StoreError> {
        if self.selected.as_deref() != Some(folder) {
            debug!("Selecting folder {}", folder);
            // A failed SELECT leaves no folder selected
            self.selected = None;
            self.store.select(folder).await?;
            self.selected = Some(folder.to_string());
        }

        Ok(Selected { session: self })
    }

    pub async fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), StoreError> {
        self.store.append(folder, message).await
    }

    /// Full messages in `folder` matching `query`, newest first.
    pub async fn fetch_messages(
        &mut self,
        folder: &str,
        query: &Query,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut selected = self.select(folder).await?;
        let handles = selected.search(query).await?;
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut messages = selected.fetch(&handles, FetchPart::Full).await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn logout(mut self) -> Result<(), StoreError> {
        self.store.logout().await
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

/// Proof that a folder is selected. Searching and fetching are only
/// possible through it.
pub struct Selected<'a, S> {
    session: &'a mut StoreSession<S>,
}

impl<S: MailStore> Selected<'_, S> {
    pub fn folder(&self) -> &str {
        self.session.selected.as_deref().unwrap_or_default()
    }

    /// Matching handles in ascending order.
    pub async fn search(&mut self, query: &Query) -> Result<Vec<MessageHandle>, StoreError> {
        let mut handles = self.session.store.search(query).await?;
        handles.sort_unstable();
        Ok(handles)
    }

    pub async fn fetch(
        &mut self,
        handles: &[MessageHandle],
        part: FetchPart,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        self.session.store.fetch(handles, part).await
    }
}

/// Folder names compare without a trailing hierarchy separator.
fn folder_key(folder: &str) -> &str {
    folder.strip_suffix('/').unwrap_or(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_ensure_folder_creates_once() {
        let mut session = StoreSession::open(MemoryStore::new()).await.unwrap();
        assert!(session.ensure_folder("RSS/Foo").await.unwrap());
        assert!(!session.ensure_folder("RSS/Foo").await.unwrap());
        assert!(session.has_folder("RSS/Foo/"));
        assert_eq!(session.store().created_folders(), vec!["RSS/Foo".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_folders_loaded_on_open() {
        let store = MemoryStore::new().with_folder("RSS/");
        let mut session = StoreSession::open(store).await.unwrap();
        assert!(session.has_folder("RSS"));
        assert!(!session.ensure_folder("RSS").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_subscribe_only_subscribes_new() {
        let store = MemoryStore::new().with_folder("Old");
        let mut session = StoreSession::open(store).await.unwrap();
        assert!(!session.create_and_subscribe("Old").await.unwrap());
        assert!(session.create_and_subscribe("New").await.unwrap());
        assert!(session.store().is_subscribed("New"));
        assert!(!session.store().is_subscribed("Old"));
    }

    #[tokio::test]
    async fn test_select_is_idempotent() {
        let store = MemoryStore::new().with_folder("A").with_folder("B");
        let mut session = StoreSession::open(store).await.unwrap();

        session.select("A").await.unwrap();
        session.select("A").await.unwrap();
        assert_eq!(session.store().select_count(), 1);
        assert_eq!(session.selected(), Some("A"));

        let selected = session.select("B").await.unwrap();
        assert_eq!(selected.folder(), "B");
        assert_eq!(session.store().select_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_select_clears_selection() {
        let store = MemoryStore::new().with_folder("A");
        let mut session = StoreSession::open(store).await.unwrap();
        session.select("A").await.unwrap();
        assert!(session.select("Missing").await.is_err());
        assert_eq!(session.selected(), None);
    }

    #[tokio::test]
    async fn test_fetch_messages_newest_first() {
        let store = MemoryStore::new()
            .with_message(".config", "Subject: rss-imap one\r\n\r\nfirst\r\n")
            .with_message(".config", "Subject: unrelated\r\n\r\nskip\r\n")
            .with_message(".config", "Subject: rss-imap two\r\n\r\nsecond\r\n");
        let mut session = StoreSession::open(store).await.unwrap();

        let messages = session
            .fetch_messages(".config", &Query::subject("rss-imap").not_deleted())
            .await
            .unwrap();
        let bodies: Vec<String> = messages
            .iter()
            .map(|m| String::from_utf8_lossy(m).into_owned())
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("second"));
        assert!(bodies[1].contains("first"));
    }
}
