//! Batched existence checks against a store folder.
//!
//! One combined predicate per batch:
//!
//! ```text
//! OR(HEADER Message-ID id1, ..., HEADER Message-ID idN) NOT DELETED
//! ```
//!
//! The matching messages' Message-ID headers are then fetched and
//! intersected with the candidates, since IMAP header search is a
//! substring match.

use std::collections::HashSet;

use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{FetchPart, MailStore, Query, StoreError, StoreSession};

/// Lookups made per batch before giving up: the first try plus one retry.
pub const DEFAULT_ATTEMPTS: u32 = 2;

#[derive(Error, Debug)]
#[error("Message-ID lookup in \"{folder}\" failed after {attempts} attempts: {source}")]
pub struct DedupError {
    pub folder: String,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// What the pipeline does with a batch whose existence check failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupFallback {
    /// Deliver nothing from the batch this run. May under-deliver until the
    /// next successful run.
    #[default]
    Skip,
    /// Treat every item as new. May append duplicates.
    DeliverAll,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupFilter {
    attempts: u32,
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupFilter {
    pub fn new() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    /// The subset of `candidates` present and not deleted in `folder`.
    pub async fn existing<S: MailStore>(
        &self,
        session: &mut StoreSession<S>,
        folder: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>, DedupError> {
        let Some(any_id) = Query::any_message_id(candidates) else {
            return Ok(HashSet::new());
        };
        let query = any_id.not_deleted();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match lookup(session, folder, &query, candidates).await {
                Ok(found) => {
                    debug!(
                        "{} of {} candidates already in {}",
                        found.len(),
                        candidates.len(),
                        folder
                    );
                    return Ok(found);
                }
                Err(e) if attempt < self.attempts => {
                    warn!("Message-ID lookup in {} failed, retrying: {}", folder, e);
                }
                Err(source) => {
                    return Err(DedupError {
                        folder: folder.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

async fn lookup<S: MailStore>(
    session: &mut StoreSession<S>,
    folder: &str,
    query: &Query,
    candidates: &[String],
) -> Result<HashSet<String>, StoreError> {
    let mut selected = session.select(folder).await?;
    let handles = selected.search(query).await?;
    if handles.is_empty() {
        return Ok(HashSet::new());
    }

    let headers = selected.fetch(&handles, FetchPart::MessageIdHeader).await?;
    let wanted: HashSet<&str> = candidates.iter().map(String::as_str).collect();

    Ok(headers
        .iter()
        .filter_map(|raw| parse_message_id(raw))
        .filter(|id| wanted.contains(id.as_str()))
        .collect())
}

fn parse_message_id(raw: &[u8]) -> Option<String> {
    MessageParser::default()
        .parse(raw)?
        .message_id()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const FOLDER: &str = "RSS/Test";

    fn message(id: &str) -> String {
        format!("Message-ID: <{}>\r\nSubject: {}\r\n\r\nbody\r\n", id, id)
    }

    async fn session(store: MemoryStore) -> StoreSession<MemoryStore> {
        StoreSession::open(store).await.unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::new()
            .with_message(FOLDER, message("a"))
            .with_message(FOLDER, message("b"))
            .with_deleted_message(FOLDER, message("gone"))
            .with_message(FOLDER, message("abc"))
    }

    #[tokio::test]
    async fn test_empty_batch_needs_no_round_trip() {
        let mut session = session(seeded()).await;
        let found = DedupFilter::new().existing(&mut session, FOLDER, &[]).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(session.store().search_count(), 0);
        assert_eq!(session.store().select_count(), 0);
    }

    #[tokio::test]
    async fn test_single_candidate() {
        let mut session = session(seeded()).await;
        let filter = DedupFilter::new();

        let found = filter.existing(&mut session, FOLDER, &ids(&["a"])).await.unwrap();
        assert_eq!(found, HashSet::from(["a".to_string()]));

        let found = filter.existing(&mut session, FOLDER, &ids(&["zzz"])).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_batch_uses_one_search() {
        let mut session = session(seeded()).await;
        let found = DedupFilter::new()
            .existing(&mut session, FOLDER, &ids(&["new1", "b", "a", "new2"]))
            .await
            .unwrap();
        assert_eq!(found, HashSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(session.store().search_count(), 1);
    }

    #[tokio::test]
    async fn test_order_independent() {
        let mut session = session(seeded()).await;
        let filter = DedupFilter::new();
        let forward = filter
            .existing(&mut session, FOLDER, &ids(&["a", "b", "x"]))
            .await
            .unwrap();
        let backward = filter
            .existing(&mut session, FOLDER, &ids(&["x", "b", "a"]))
            .await
            .unwrap();
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn test_deleted_messages_do_not_count() {
        let mut session = session(seeded()).await;
        let found = DedupFilter::new()
            .existing(&mut session, FOLDER, &ids(&["gone"]))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_substring_matches_filtered_out() {
        // "ab" is a substring of "abc"; only exact ids count
        let mut session = session(seeded()).await;
        let found = DedupFilter::new()
            .existing(&mut session, FOLDER, &ids(&["ab"]))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_retries_once() {
        let mut store = seeded();
        store.fail_searches(1);
        let mut session = session(store).await;

        let found = DedupFilter::new()
            .existing(&mut session, FOLDER, &ids(&["a"]))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(session.store().search_count(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_error() {
        let mut store = seeded();
        store.fail_searches(2);
        let mut session = session(store).await;

        let err = DedupFilter::new()
            .existing(&mut session, FOLDER, &ids(&["a"]))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.folder, FOLDER);
        assert_eq!(session.store().search_count(), 2);
    }

    #[test]
    fn test_fallback_names() {
        let skip: DedupFallback = serde_yaml::from_str("skip").unwrap();
        let all: DedupFallback = serde_yaml::from_str("deliver-all").unwrap();
        assert_eq!(skip, DedupFallback::Skip);
        assert_eq!(all, DedupFallback::DeliverAll);
        assert_eq!(DedupFallback::default(), DedupFallback::Skip);
    }
}
