use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::store::{FetchPart, MailStore, MessageHandle, Query, StoreError, MESSAGE_ID_HEADER};

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub raw: Vec<u8>,
    pub deleted: bool,
}

/// A store kept in process memory, with IMAP-like search semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    folders: BTreeMap<String, Vec<StoredMessage>>,
    created: Vec<String>,
    subscribed: BTreeSet<String>,
    selected: Option<String>,
    failing_searches: usize,
    selects: usize,
    searches: usize,
    logged_out: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folders.entry(key(folder)).or_default();
        self
    }

    pub fn with_message(self, folder: &str, raw: impl Into<Vec<u8>>) -> Self {
        self.with_stored(folder, raw.into(), false)
    }

    pub fn with_deleted_message(self, folder: &str, raw: impl Into<Vec<u8>>) -> Self {
        self.with_stored(folder, raw.into(), true)
    }

    fn with_stored(mut self, folder: &str, raw: Vec<u8>, deleted: bool) -> Self {
        self.folders
            .entry(key(folder))
            .or_default()
            .push(StoredMessage { raw, deleted });
        self
    }

    /// Make the next `count` searches fail.
    pub fn fail_searches(&mut self, count: usize) {
        self.failing_searches = count;
    }

    pub fn messages(&self, folder: &str) -> &[StoredMessage] {
        self.folders
            .get(&key(folder))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Message-ID header values of the messages in `folder`, in order.
    pub fn message_ids(&self, folder: &str) -> Vec<String> {
        self.messages(folder)
            .iter()
            .filter_map(|m| header_value(&m.raw, MESSAGE_ID_HEADER))
            .collect()
    }

    pub fn created_folders(&self) -> Vec<String> {
        self.created.clone()
    }

    pub fn is_subscribed(&self, folder: &str) -> bool {
        self.subscribed.contains(&key(folder))
    }

    pub fn select_count(&self) -> usize {
        self.selects
    }

    pub fn search_count(&self) -> usize {
        self.searches
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    fn selected_messages(&self) -> Result<&[StoredMessage], StoreError> {
        let folder = self
            .selected
            .as_ref()
            .ok_or_else(|| StoreError::Other("No folder selected".into()))?;
        Ok(self.messages(folder))
    }
}

#[async_trait]
impl MailStore for MemoryStore {
    async fn list_folders(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.folders.keys().cloned().collect())
    }

    async fn create_folder(&mut self, folder: &str) -> Result<(), StoreError> {
        if self.folders.contains_key(&key(folder)) {
            return Err(folder_error("create", folder, "already exists"));
        }
        self.folders.insert(key(folder), Vec::new());
        self.created.push(key(folder));
        Ok(())
    }

    async fn subscribe(&mut self, folder: &str) -> Result<(), StoreError> {
        if !self.folders.contains_key(&key(folder)) {
            return Err(folder_error("subscribe", folder, "no such folder"));
        }
        self.subscribed.insert(key(folder));
        Ok(())
    }

    async fn select(&mut self, folder: &str) -> Result<(), StoreError> {
        self.selects += 1;
        self.selected = None;
        if !self.folders.contains_key(&key(folder)) {
            return Err(folder_error("select", folder, "no such folder"));
        }
        self.selected = Some(key(folder));
        Ok(())
    }

    async fn search(&mut self, query: &Query) -> Result<Vec<MessageHandle>, StoreError> {
        self.searches += 1;
        if self.failing_searches > 0 {
            self.failing_searches -= 1;
            return Err(StoreError::Other("search rejected by server".into()));
        }

        Ok(self
            .selected_messages()?
            .iter()
            .zip(1..)
            .filter(|(message, _)| matches(query, message))
            .map(|(_, handle)| handle)
            .collect())
    }

    async fn fetch(
        &mut self,
        handles: &[MessageHandle],
        part: FetchPart,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let messages = self.selected_messages()?;
        handles
            .iter()
            .map(|&handle| {
                let message = handle
                    .checked_sub(1)
                    .and_then(|i| messages.get(i as usize))
                    .ok_or_else(|| StoreError::Other(format!("No message {}", handle)))?;
                Ok(match part {
                    FetchPart::Full => message.raw.clone(),
                    FetchPart::MessageIdHeader => match header_value(&message.raw, MESSAGE_ID_HEADER) {
                        Some(id) => format!("{}: {}\r\n\r\n", MESSAGE_ID_HEADER, id).into_bytes(),
                        None => b"\r\n".to_vec(),
                    },
                })
            })
            .collect()
    }

    async fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), StoreError> {
        let messages = self
            .folders
            .get_mut(&key(folder))
            .ok_or_else(|| folder_error("append to", folder, "no such folder"))?;
        messages.push(StoredMessage {
            raw: message.to_vec(),
            deleted: false,
        });
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), StoreError> {
        self.logged_out = true;
        self.selected = None;
        Ok(())
    }
}

fn key(folder: &str) -> String {
    folder.strip_suffix('/').unwrap_or(folder).to_string()
}

fn folder_error(op: &'static str, folder: &str, reason: &str) -> StoreError {
    StoreError::Folder {
        op,
        folder: folder.to_string(),
        reason: reason.to_string(),
    }
}

fn matches(query: &Query, message: &StoredMessage) -> bool {
    match query {
        Query::All => true,
        Query::Header { name, value } => contains(header_value(&message.raw, name), value),
        Query::Subject(text) => contains(header_value(&message.raw, "Subject"), text),
        Query::Deleted => message.deleted,
        Query::Not(inner) => !matches(inner, message),
        Query::Or(left, right) => matches(left, message) || matches(right, message),
        Query::And(terms) => terms.iter().all(|t| matches(t, message)),
    }
}

fn contains(haystack: Option<String>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

/// Unfolded value of the first header called `name`.
fn header_value(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut value: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with(|c: char| c == ' ' || c == '\t') {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((field, rest)) = line.split_once(':') {
            if field.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: &str = "Message-ID: <abc@example>\r\nSubject: Hello\r\n World\r\n\r\nbody\r\n";

    #[test]
    fn test_header_value_unfolds() {
        assert_eq!(header_value(MSG.as_bytes(), "subject").as_deref(), Some("Hello World"));
        assert_eq!(header_value(MSG.as_bytes(), "Message-Id").as_deref(), Some("<abc@example>"));
        assert_eq!(header_value(MSG.as_bytes(), "From"), None);
    }

    #[tokio::test]
    async fn test_search_respects_deleted() {
        let mut store = MemoryStore::new()
            .with_message("F", MSG)
            .with_deleted_message("F", MSG);
        store.select("F").await.unwrap();

        let q = Query::header(MESSAGE_ID_HEADER, "abc@example");
        assert_eq!(store.search(&q).await.unwrap(), vec![1, 2]);
        assert_eq!(store.search(&q.not_deleted()).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_search_requires_selection() {
        let mut store = MemoryStore::new().with_message("F", MSG);
        assert!(store.search(&Query::All).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_message_id_header() {
        let mut store = MemoryStore::new().with_message("F", MSG);
        store.select("F").await.unwrap();
        let fetched = store.fetch(&[1], FetchPart::MessageIdHeader).await.unwrap();
        assert_eq!(fetched, vec![b"Message-ID: <abc@example>\r\n\r\n".to_vec()]);
        assert!(store.fetch(&[2], FetchPart::Full).await.is_err());
    }

    #[tokio::test]
    async fn test_append_requires_folder() {
        let mut store = MemoryStore::new();
        assert!(store.append("Nope", b"x").await.is_err());
        store.create_folder("Yes").await.unwrap();
        store.append("Yes", b"x").await.unwrap();
        assert_eq!(store.messages("Yes").len(), 1);
    }

    #[tokio::test]
    async fn test_injected_search_failures() {
        let mut store = MemoryStore::new().with_message("F", MSG);
        store.select("F").await.unwrap();
        store.fail_searches(1);
        assert!(store.search(&Query::All).await.is_err());
        assert_eq!(store.search(&Query::All).await.unwrap(), vec![1]);
        assert_eq!(store.search_count(), 2);
    }
}
