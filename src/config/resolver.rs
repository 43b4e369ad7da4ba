//! Resolution of feed definition documents into [`FeedConfig`]s.
//!
//! Each configuration text is a YAML stream. A document is one of:
//!
//! ```yaml
//! # a bare entry
//! Name: Rust Blog
//! URL: https://blog.rust-lang.org/feed.xml
//! ---
//! # a list of entries
//! Items:
//!   - {Name: Foo, URL: https://foo}
//! ---
//! # new running defaults for the rest of this text
//! Configuration: {FolderTemplate: 'Feeds/{name}'}
//! ---
//! # templates scoped to the paired items only
//! Configuration: {SubjectTemplate: '[{name}] {subject}'}
//! Items:
//!   - {Name: Bar, URL: https://bar}
//! ```
//!
//! Template priority for an entry: its own fields, then a paired
//! `Configuration`, then the running defaults, which start each text as the
//! [`AppDefaults`].

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::config::{AppDefaults, ConfigError, DocumentLocation};
use crate::domain::FeedConfig;

/// Outcome of resolving a set of configuration texts.
#[derive(Debug, Default)]
pub struct Resolved {
    /// Feeds in text order, then document order, then list order.
    pub feeds: Vec<FeedConfig>,
    /// One error per document that contributed nothing.
    pub rejected: Vec<ConfigError>,
}

/// Template fields given by an entry or a `Configuration` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOverrides {
    pub folder_template: Option<String>,
    pub subject_template: Option<String>,
}

impl TemplateOverrides {
    fn from_mapping(mapping: &Mapping) -> Self {
        Self {
            folder_template: lookup(mapping, "foldertemplate").and_then(text),
            subject_template: lookup(mapping, "subjecttemplate").and_then(text),
        }
    }

    /// `base` with these overrides laid on top.
    pub fn over(&self, base: &AppDefaults) -> AppDefaults {
        AppDefaults {
            folder_template: self
                .folder_template
                .clone()
                .unwrap_or_else(|| base.folder_template.clone()),
            subject_template: self
                .subject_template
                .clone()
                .unwrap_or_else(|| base.subject_template.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub name: String,
    pub url: String,
    pub overrides: TemplateOverrides,
}

impl FeedEntry {
    fn from_value(value: &Value, location: DocumentLocation) -> Result<Self, ConfigError> {
        let mapping = as_mapping(value, location)?;
        let required = |key: &str, field: &'static str| {
            lookup(mapping, key)
                .and_then(text)
                .ok_or(ConfigError::MissingField { location, field })
        };

        Ok(Self {
            name: required("name", "Name")?,
            url: required("url", "URL")?,
            overrides: TemplateOverrides::from_mapping(mapping),
        })
    }

    fn resolve(
        &self,
        running: &AppDefaults,
        location: DocumentLocation,
    ) -> Result<FeedConfig, ConfigError> {
        let templates = self.overrides.over(running);
        let empty = |template: &'static str| ConfigError::EmptyTemplate {
            location,
            feed: self.name.clone(),
            template,
        };
        if templates.folder_template.trim().is_empty() {
            return Err(empty("FolderTemplate"));
        }
        if templates.subject_template.trim().is_empty() {
            return Err(empty("SubjectTemplate"));
        }

        Ok(FeedConfig::new(
            self.name.clone(),
            self.url.clone(),
            templates.folder_template,
            templates.subject_template,
        ))
    }
}

/// One parsed YAML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDocument {
    Entry(FeedEntry),
    Items(Vec<FeedEntry>),
    Configuration(TemplateOverrides),
    Scoped {
        configuration: TemplateOverrides,
        items: Vec<FeedEntry>,
    },
}

/// What a document does to the fold.
enum Step {
    Defaults(AppDefaults),
    Feeds(Vec<FeedConfig>),
}

impl ConfigDocument {
    pub fn from_value(value: &Value, location: DocumentLocation) -> Result<Self, ConfigError> {
        let mapping = as_mapping(value, location)?;

        let configuration = lookup(mapping, "configuration")
            .map(|v| match v {
                Value::Null => Ok(TemplateOverrides::default()),
                v => as_mapping(v, location).map(TemplateOverrides::from_mapping),
            })
            .transpose()?;

        let items = lookup(mapping, "items")
            .map(|v| match v {
                Value::Null => Ok(Vec::new()),
                Value::Sequence(seq) => seq
                    .iter()
                    .map(|item| FeedEntry::from_value(item, location))
                    .collect::<Result<Vec<_>, _>>(),
                other => Err(ConfigError::NotAList {
                    location,
                    key: "Items",
                    found: kind(other),
                }),
            })
            .transpose()?;

        Ok(match (configuration, items) {
            (Some(configuration), Some(items)) => Self::Scoped {
                configuration,
                items,
            },
            (Some(configuration), None) => Self::Configuration(configuration),
            (None, Some(items)) => Self::Items(items),
            (None, None) => Self::Entry(FeedEntry::from_value(value, location)?),
        })
    }

    /// Resolve against the running defaults. Every entry must resolve for
    /// the document to contribute.
    fn step(&self, running: &AppDefaults, location: DocumentLocation) -> Result<Step, ConfigError> {
        let resolve_all = |items: &[FeedEntry], base: &AppDefaults| {
            items
                .iter()
                .map(|item| item.resolve(base, location))
                .collect::<Result<Vec<_>, _>>()
        };

        match self {
            Self::Configuration(overrides) => Ok(Step::Defaults(overrides.over(running))),
            Self::Entry(entry) => Ok(Step::Feeds(vec![entry.resolve(running, location)?])),
            Self::Items(items) => Ok(Step::Feeds(resolve_all(items, running)?)),
            Self::Scoped {
                configuration,
                items,
            } => Ok(Step::Feeds(resolve_all(items, &configuration.over(running))?)),
        }
    }
}

/// Parse one text into its non-empty documents.
///
/// A YAML syntax error is reported once and ends the text: documents after
/// it are not read.
pub fn parse_documents(
    text: &str,
    text_index: usize,
) -> Vec<(DocumentLocation, Result<ConfigDocument, ConfigError>)> {
    let mut documents = Vec::new();

    for (i, deserializer) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let location = DocumentLocation {
            text: text_index,
            document: i + 1,
        };

        match Value::deserialize(deserializer) {
            Ok(Value::Null) => continue,
            Ok(value) => documents.push((location, ConfigDocument::from_value(&value, location))),
            Err(source) => {
                documents.push((location, Err(ConfigError::Yaml { location, source })));
                break;
            }
        }
    }

    documents
}

/// Resolve configuration texts into feeds.
///
/// The running defaults start as `defaults` for every text; a
/// `Configuration`-only document replaces them for the documents after it in
/// the same text.
pub fn resolve<T: AsRef<str>>(texts: &[T], defaults: &AppDefaults) -> Resolved {
    let mut resolved = Resolved::default();

    for (i, text) in texts.iter().enumerate() {
        parse_documents(text.as_ref(), i + 1).into_iter().fold(
            defaults.clone(),
            |running, (location, document)| match document
                .and_then(|d| d.step(&running, location))
            {
                Ok(Step::Defaults(next)) => {
                    debug!("{}: running defaults now {:?}", location, next);
                    next
                }
                Ok(Step::Feeds(feeds)) => {
                    resolved.feeds.extend(feeds);
                    running
                }
                Err(e) => {
                    warn!("Rejected configuration document: {}", e);
                    resolved.rejected.push(e);
                    running
                }
            },
        );
    }

    resolved
}

/// Keys compare ignoring case, whitespace, `_` and `-`.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Value of the first key in `mapping` matching the already-normalized `key`.
fn lookup<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping
        .iter()
        .find(|(k, _)| k.as_str().is_some_and(|k| normalize_key(k) == key))
        .map(|(_, v)| v)
}

/// Scalar value as non-blank text.
fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.trim().is_empty()).then_some(s)
}

fn as_mapping(value: &Value, location: DocumentLocation) -> Result<&Mapping, ConfigError> {
    match value {
        Value::Mapping(m) => Ok(m),
        other => Err(ConfigError::NotAMapping {
            location,
            found: kind(other),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRECEDENCE: &str = r#"
Configuration: {FolderTemplate: BaseFolderTemplate, SubjectTemplate: BaseSubjectTemplate}
Items:
  - {Name: Foo, URL: https://foo}
  - {Name: Bar, URL: https://bar, FolderTemplate: 'Folder{template}', SubjectTemplate: 'Subject For {name}'}
---
Configuration: {FolderTemplate: FolderTemplateTwo, SubjectTemplate: SubjectTemplateTwo}
---
Configuration: {FolderTemplate: TTT, SubjectTemplate: SSS}
Items:
  - {Name: FooThree, URL: https://FooThree}
---
Items:
  - {Name: FooTwo, URL: https://FooTwo}
"#;

    fn defaults() -> AppDefaults {
        AppDefaults::default()
    }

    fn names(resolved: &Resolved) -> Vec<&str> {
        resolved.feeds.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_template_precedence() {
        let separate = "{Name: Separate, URL: https://separate}";
        let resolved = resolve(&[PRECEDENCE, separate], &defaults());

        assert!(resolved.rejected.is_empty(), "{:?}", resolved.rejected);
        assert_eq!(
            resolved.feeds,
            vec![
                FeedConfig::new("Foo", "https://foo", "BaseFolderTemplate", "BaseSubjectTemplate"),
                FeedConfig::new("Bar", "https://bar", "Folder{template}", "Subject For {name}"),
                FeedConfig::new("FooThree", "https://FooThree", "TTT", "SSS"),
                FeedConfig::new(
                    "FooTwo",
                    "https://FooTwo",
                    "FolderTemplateTwo",
                    "SubjectTemplateTwo"
                ),
                FeedConfig::new("Separate", "https://separate", "RSS/{name}", "{subject}"),
            ]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let first = resolve(&[PRECEDENCE], &defaults());
        let second = resolve(&[PRECEDENCE], &defaults());
        assert_eq!(first.feeds, second.feeds);
    }

    #[test]
    fn test_configuration_only_affects_later_documents() {
        let text = "Name: Early\nURL: e\n---\nConfiguration:\n  FolderTemplate: Late/{name}\n---\nName: Late\nURL: l\n";
        let resolved = resolve(&[text], &defaults());
        assert_eq!(resolved.feeds[0].folder_template, "RSS/{name}");
        assert_eq!(resolved.feeds[1].folder_template, "Late/{name}");
        // untouched field keeps the running value
        assert_eq!(resolved.feeds[1].subject_template, "{subject}");
    }

    #[test]
    fn test_key_matching_ignores_case_and_spacing() {
        let text = r#"
configuration:
  Folder Template: A/{name}
  subject_template: "[{name}] {subject}"
items:
  - name: One
    url: https://one
  - NAME: Two
    Url: https://two
    folder-template: B/{name}
"#;
        let resolved = resolve(&[text], &defaults());
        assert_eq!(resolved.feeds.len(), 2);
        assert_eq!(resolved.feeds[0].folder_template, "A/{name}");
        assert_eq!(resolved.feeds[0].subject_template, "[{name}] {subject}");
        assert_eq!(resolved.feeds[1].folder_template, "B/{name}");
    }

    #[test]
    fn test_bare_entry_with_own_templates() {
        let text = "Name: Solo\nURL: https://solo\nFolderTemplate: Solo\n";
        let resolved = resolve(&[text], &defaults());
        assert_eq!(
            resolved.feeds,
            vec![FeedConfig::new("Solo", "https://solo", "Solo", "{subject}")]
        );
    }

    #[test]
    fn test_missing_fields_reject_document_only() {
        let text = "Items:\n  - {Name: Good, URL: g}\n  - {Name: NoUrl}\n---\nURL: x\n---\nName: After\nURL: a\n";
        let resolved = resolve(&[text], &defaults());

        assert_eq!(names(&resolved), vec!["After"]);
        assert_eq!(resolved.rejected.len(), 2);
        assert!(matches!(
            resolved.rejected[0],
            ConfigError::MissingField { field: "URL", location: DocumentLocation { text: 1, document: 1 } }
        ));
        assert!(matches!(
            resolved.rejected[1],
            ConfigError::MissingField { field: "Name", .. }
        ));
    }

    #[test]
    fn test_non_mapping_documents_rejected() {
        let text = "- just\n- a list\n---\nItems: nope\n---\nItems: [plain]\n";
        let resolved = resolve(&[text], &defaults());
        assert!(resolved.feeds.is_empty());
        assert!(matches!(resolved.rejected[0], ConfigError::NotAMapping { found: "a list", .. }));
        assert!(matches!(resolved.rejected[1], ConfigError::NotAList { key: "Items", .. }));
        assert!(matches!(resolved.rejected[2], ConfigError::NotAMapping { found: "a string", .. }));
    }

    #[test]
    fn test_syntax_error_abandons_rest_of_text() {
        let broken = "Name: A\nURL: a\n---\nName: [unclosed\n---\nName: C\nURL: c\n";
        let other = "Name: D\nURL: d\n";
        let resolved = resolve(&[broken, other], &defaults());

        assert_eq!(names(&resolved), vec!["A", "D"]);
        assert_eq!(resolved.rejected.len(), 1);
        assert!(matches!(resolved.rejected[0], ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_empty_documents_skipped() {
        let text = "---\n---\nName: Only\nURL: o\n---\n";
        let documents = parse_documents(text, 1);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].0, DocumentLocation { text: 1, document: 3 });

        assert!(resolve(&[""], &defaults()).feeds.is_empty());
        assert!(resolve(&[""], &defaults()).rejected.is_empty());
    }

    #[test]
    fn test_blank_override_treated_as_absent() {
        let text = "Configuration: {FolderTemplate: '  '}\nItems:\n  - {Name: X, URL: x}\n";
        let resolved = resolve(&[text], &defaults());
        assert_eq!(resolved.feeds[0].folder_template, "RSS/{name}");
    }

    #[test]
    fn test_empty_effective_template_rejected() {
        let blank = AppDefaults {
            folder_template: String::new(),
            subject_template: "{subject}".to_string(),
        };
        let resolved = resolve(&["Name: X\nURL: x\n"], &blank);
        assert!(resolved.feeds.is_empty());
        assert!(matches!(
            resolved.rejected[0],
            ConfigError::EmptyTemplate { template: "FolderTemplate", .. }
        ));
    }

    #[test]
    fn test_parse_scoped_document() {
        let value: Value =
            serde_yaml::from_str("Configuration: {SubjectTemplate: S}\nItems: []\n").unwrap();
        let location = DocumentLocation { text: 1, document: 1 };
        assert_eq!(
            ConfigDocument::from_value(&value, location).unwrap(),
            ConfigDocument::Scoped {
                configuration: TemplateOverrides {
                    folder_template: None,
                    subject_template: Some("S".to_string()),
                },
                items: Vec::new(),
            }
        );
    }

    #[test]
    fn test_numeric_names_accepted() {
        let resolved = resolve(&["Name: 1984\nURL: https://orwell\n"], &defaults());
        assert_eq!(resolved.feeds[0].name, "1984");
    }
}
