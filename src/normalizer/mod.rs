use chrono::Utc;
use feed_rs::model::Link;
use feed_rs::parser;

use crate::app::{Result, RssImapError};
use crate::domain::{EntryDate, RawEntry};

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed document into its entries, in document order.
    pub fn normalize(&self, body: &[u8]) -> Result<Vec<RawEntry>> {
        // Entries without a native id keep an empty one; identity falls
        // back to the link downstream
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(body)
            .map_err(|e| RssImapError::FeedParse(e.to_string()))?;

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| RawEntry {
                id: Some(entry.id).filter(|id| !id.trim().is_empty()),
                link: item_link(&entry.links),
                title: entry.title.map(|t| t.content),
                author: entry.authors.first().map(|a| a.name.clone()),
                summary: entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body)),
                published: entry
                    .published
                    .map(|dt| EntryDate::parsed(dt.with_timezone(&Utc))),
                updated: entry
                    .updated
                    .map(|dt| EntryDate::parsed(dt.with_timezone(&Utc))),
                created: None,
            })
            .collect();

        Ok(entries)
    }
}

/// The entry's page: the first `alternate` link (a link without `rel` is
/// one), else whatever link comes first.
fn item_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}
