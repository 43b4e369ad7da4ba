//! Feed definitions stored as messages in the control folder.

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, info, warn};

use crate::config::{resolve, Resolved, Settings, SyncSettings};
use crate::store::{MailStore, Query, StoreError, StoreSession};

/// Part name marking a configuration attachment.
const FOLDERS_PART: &str = "Folders";

/// Configuration texts carried by one raw control message.
///
/// A single-part message contributes its body. A multipart message
/// contributes every top-level part whose `name` parameter contains
/// `Folders`, or, when none does, its first unnamed `text/plain` part.
pub fn config_texts(raw: &[u8]) -> Vec<String> {
    let Some(message) = MessageParser::default().parse(raw) else {
        warn!("Skipping unparsable control message");
        return Vec::new();
    };
    let Some(root) = message.part(0) else {
        return Vec::new();
    };

    let PartType::Multipart(children) = &root.body else {
        return vec![part_text(root)];
    };
    let parts: Vec<&MessagePart> = children.iter().filter_map(|&id| message.part(id)).collect();

    let named: Vec<String> = parts
        .iter()
        .filter(|part| part_name(part).is_some_and(|n| n.contains(FOLDERS_PART)))
        .map(|part| part_text(part))
        .collect();
    if !named.is_empty() {
        return named;
    }

    parts
        .iter()
        .find(|part| part_name(part).is_none() && is_plain_text(part))
        .map(|part| vec![part_text(part)])
        .unwrap_or_default()
}

/// Read every configuration text in the control folder, newest message
/// first. The folder is created when missing.
pub async fn read_config_texts<S: MailStore>(
    session: &mut StoreSession<S>,
    sync: &SyncSettings,
) -> Result<Vec<String>, StoreError> {
    if session.create_and_subscribe(&sync.control_folder).await? {
        info!("Created empty control folder {}", sync.control_folder);
        return Ok(Vec::new());
    }

    let query = Query::subject(sync.config_marker.as_str()).not_deleted();
    let messages = session.fetch_messages(&sync.control_folder, &query).await?;
    debug!(
        "{} configuration messages in {}",
        messages.len(),
        sync.control_folder
    );

    Ok(messages.iter().flat_map(|raw| config_texts(raw)).collect())
}

/// Read and resolve the feed definitions.
pub async fn load_feeds<S: MailStore>(
    session: &mut StoreSession<S>,
    settings: &Settings,
) -> Result<Resolved, StoreError> {
    let texts = read_config_texts(session, &settings.sync).await?;
    let resolved = resolve(&texts, &settings.defaults);
    info!(
        "Resolved {} feeds from {} configuration texts ({} documents rejected)",
        resolved.feeds.len(),
        texts.len(),
        resolved.rejected.len()
    );
    Ok(resolved)
}

fn part_name<'a>(part: &'a MessagePart) -> Option<&'a str> {
    part.content_type().and_then(|ct| ct.attribute("name"))
}

fn is_plain_text(part: &MessagePart) -> bool {
    // No Content-Type means text/plain
    part.content_type().map_or(true, |ct| {
        ct.ctype().eq_ignore_ascii_case("text")
            && ct.subtype().map_or(true, |s| s.eq_ignore_ascii_case("plain"))
    })
}

fn part_text(part: &MessagePart) -> String {
    match part.text_contents() {
        Some(text) => text.to_string(),
        None => String::from_utf8_lossy(part.contents()).into_owned(),
    }
}
