use serde::{Deserialize, Serialize};

/// Placeholder replaced by the feed name in both templates.
pub const NAME_PLACEHOLDER: &str = "{name}";
/// Placeholder replaced by the stripped entry title in the subject template.
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// A fully resolved feed definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub folder_template: String,
    pub subject_template: String,
}

impl FeedConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        folder_template: impl Into<String>,
        subject_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            folder_template: folder_template.into(),
            subject_template: subject_template.into(),
        }
    }

    /// Store folder this feed's items are delivered to.
    pub fn folder(&self) -> String {
        fill(&self.folder_template, &[(NAME_PLACEHOLDER, self.name.as_str())])
    }

    /// Subject line for an item whose plain-text title is `title`.
    pub fn subject(&self, title: &str) -> String {
        fill(
            &self.subject_template,
            &[(NAME_PLACEHOLDER, self.name.as_str()), (SUBJECT_PLACEHOLDER, title)],
        )
    }
}

/// Substitute placeholders in one left-to-right pass. Substituted values are
/// never expanded again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while let Some(c) = rest.chars().next() {
        for (placeholder, value) in values {
            if let Some(tail) = rest.strip_prefix(placeholder) {
                out.push_str(value);
                rest = tail;
                continue 'scan;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
