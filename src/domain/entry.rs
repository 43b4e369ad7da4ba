use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One date field of an entry: the text the feed carried and, when the
/// feed parser understood it, the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDate {
    pub text: String,
    pub parsed: Option<DateTime<Utc>>,
}

impl EntryDate {
    pub fn parsed(dt: DateTime<Utc>) -> Self {
        Self {
            text: dt.to_rfc2822(),
            parsed: Some(dt),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parsed: None,
        }
    }
}

/// A syndicated entry as delivered by the feed source, before translation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub published: Option<EntryDate>,
    pub updated: Option<EntryDate>,
    pub created: Option<EntryDate>,
}

impl RawEntry {
    /// First date field present, in published, updated, created order.
    pub fn first_date(&self) -> Option<&EntryDate> {
        self.published
            .as_ref()
            .or(self.updated.as_ref())
            .or(self.created.as_ref())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_first_date_prefers_published() {
        let entry = RawEntry {
            published: Some(EntryDate::text("p")),
            updated: Some(EntryDate::text("u")),
            created: Some(EntryDate::text("c")),
            ..Default::default()
        };
        assert_eq!(entry.first_date().map(|d| d.text.as_str()), Some("p"));
    }

    #[test]
    fn test_first_date_falls_back_to_created() {
        let entry = RawEntry {
            created: Some(EntryDate::text("c")),
            ..Default::default()
        };
        assert_eq!(entry.first_date().map(|d| d.text.as_str()), Some("c"));
        assert!(RawEntry::default().first_date().is_none());
    }

    #[test]
    fn test_parsed_date_keeps_text() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let date = EntryDate::parsed(dt);
        assert_eq!(date.parsed, Some(dt));
        let reparsed = DateTime::parse_from_rfc2822(&date.text).unwrap();
        assert_eq!(reparsed.with_timezone(&Utc), dt);
    }
}
