use chrono::{DateTime, Utc};

use crate::domain::RawEntry;
use crate::translator::html::strip_tags;

/// Human-readable format of the `Date` header.
pub const DATE_FORMAT: &str = "%A, %b %d %Y %H:%M:%S %Z";

/// Render the `Date` header for an entry.
///
/// Uses the first date field present (published, updated, created). Its
/// pre-parsed timestamp wins; otherwise the text is re-parsed with markup
/// stripped. Text that still does not parse is used as-is. Entries without
/// any date get `now`.
pub fn render_date(entry: &RawEntry, now: DateTime<Utc>) -> String {
    let Some(date) = entry.first_date() else {
        return format_date(now);
    };

    let text = strip_tags(&date.text);
    match date.parsed.or_else(|| reparse(&text)) {
        Some(dt) => format_date(dt),
        None => text.trim().to_string(),
    }
}

pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

/// Best-effort parse of a feed date string.
pub fn reparse(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
