use std::sync::Arc;

use mail_builder::headers::raw::Raw;
use mail_builder::headers::text::Text;
use mail_builder::MessageBuilder;
use serde::{Deserialize, Serialize};

use crate::domain::{FeedConfig, RawEntry};

/// Headers and body of the message an entry is delivered as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub html_body: String,
}

impl RenderedMessage {
    /// Serialise to RFC 5322 bytes ready for APPEND.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        MessageBuilder::new()
            .message_id(self.message_id.as_str())
            .header("From", Text::new(self.from.as_str()))
            .header("Date", Raw::new(self.date.as_str()))
            .subject(self.subject.as_str())
            .html_body(self.html_body.as_str())
            .write_to_vec()
    }
}

/// An entry translated for delivery into its feed's folder.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub feed: Arc<FeedConfig>,
    pub entry: RawEntry,
    pub message_id: String,
    pub message: RenderedMessage,
}

impl FeedItem {
    pub fn subject(&self) -> &str {
        &self.message.subject
    }
}
