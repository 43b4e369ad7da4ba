//! Entry translation: identity derivation and message rendering.
//!
//! ```text
//! (FeedConfig, RawEntry) → message id + RenderedMessage → FeedItem
//! ```

mod date;
mod html;

pub use date::{format_date, render_date, reparse, DATE_FORMAT};
pub use html::strip_tags;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use thiserror::Error;

use crate::domain::{FeedConfig, FeedItem, RawEntry, RenderedMessage};

/// `From` header used when an entry names no author.
pub const UNKNOWN_AUTHOR: &str = "(Author Not Provided)";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationCause {
    #[error("entry has no title")]
    MissingTitle,

    #[error("rendered subject is blank")]
    BlankSubject,

    #[error("rendered date is blank")]
    BlankDate,
}

/// An entry that could not be rendered. Keeps the entry for diagnostics.
#[derive(Error, Debug, Clone)]
#[error("cannot translate entry {:?}: {cause}", .entry.display_title())]
pub struct TranslationError {
    pub entry: Box<RawEntry>,
    #[source]
    pub cause: TranslationCause,
}

impl TranslationError {
    fn new(entry: RawEntry, cause: TranslationCause) -> Self {
        Self {
            entry: Box::new(entry),
            cause,
        }
    }
}

/// Translate one entry, dating undated entries with the current time.
pub fn translate(feed: &Arc<FeedConfig>, entry: RawEntry) -> Result<FeedItem, TranslationError> {
    translate_at(feed, entry, Utc::now())
}

pub fn translate_at(
    feed: &Arc<FeedConfig>,
    entry: RawEntry,
    now: DateTime<Utc>,
) -> Result<FeedItem, TranslationError> {
    let Some(title) = entry.title.as_deref() else {
        return Err(TranslationError::new(entry, TranslationCause::MissingTitle));
    };

    let subject = header_text(&feed.subject(strip_tags(title).trim()));
    if subject.is_empty() {
        return Err(TranslationError::new(entry, TranslationCause::BlankSubject));
    }

    let date = header_text(&render_date(&entry, now));
    if date.is_empty() {
        return Err(TranslationError::new(entry, TranslationCause::BlankDate));
    }

    let message_id = message_id(&feed.name, &entry);
    let from = entry
        .author
        .as_deref()
        .map(header_text)
        .filter(|author| !author.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let message = RenderedMessage {
        message_id: message_id.clone(),
        subject,
        from,
        date,
        html_body: render_body(&entry),
    };

    Ok(FeedItem {
        feed: Arc::clone(feed),
        entry,
        message_id,
        message,
    })
}

/// Canonical identity of an entry within a feed.
///
/// Native id, else link, else `name / title AT date`, canonicalised so it
/// can be used in a 7-bit search predicate.
pub fn message_id(feed_name: &str, entry: &RawEntry) -> String {
    let raw = match non_empty(&entry.id).or(non_empty(&entry.link)) {
        Some(id) => id.to_string(),
        None => format!(
            "{} / {} AT {}",
            feed_name,
            entry.title.as_deref().unwrap_or_default(),
            entry
                .first_date()
                .map(|d| d.text.as_str())
                .unwrap_or("No date")
        ),
    };
    canonicalize_id(&raw)
}

/// Replace spaces and every non-ASCII byte with `_`.
pub fn canonicalize_id(raw: &str) -> String {
    let mut id = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ' ' {
            id.push('_');
        } else if c.is_ascii() {
            id.push(c);
        } else {
            id.extend(std::iter::repeat('_').take(c.len_utf8()));
        }
    }
    id
}

fn render_body(entry: &RawEntry) -> String {
    let mut body = String::new();
    if let Some(link) = non_empty(&entry.link) {
        body.push_str(&format!(
            "<p>Item Link: <a href=\"{}\">{}</a></p>",
            encode_double_quoted_attribute(link),
            encode_text(link)
        ));
    }
    if let Some(summary) = non_empty(&entry.summary) {
        if !body.is_empty() {
            body.push_str("<br>");
        }
        body.push_str(summary);
    }
    body
}

/// Collapse every whitespace run, line breaks included, into one space so
/// feed text cannot end or add header lines.
pub fn header_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
