/// Header carrying the deduplication key.
pub const MESSAGE_ID_HEADER: &str = "Message-ID";

/// A search predicate, rendered to IMAP SEARCH syntax by [`Query::to_imap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    /// Header `name` contains `value` (case-insensitive).
    Header { name: String, value: String },
    /// Subject contains the text (case-insensitive).
    Subject(String),
    Deleted,
    Not(Box<Query>),
    Or(Box<Query>, Box<Query>),
    And(Vec<Query>),
}

impl Query {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn subject(text: impl Into<String>) -> Self {
        Self::Subject(text.into())
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn or(self, other: Query) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Query) -> Self {
        match self {
            Self::And(mut terms) => {
                terms.push(other);
                Self::And(terms)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Restrict to messages not flagged `\Deleted`.
    pub fn not_deleted(self) -> Self {
        self.and(Self::Deleted.negate())
    }

    /// OR of all `queries`, built as a balanced tree to keep nesting shallow.
    /// `None` when `queries` is empty.
    pub fn any_of(queries: Vec<Query>) -> Option<Self> {
        fn build(mut queries: Vec<Query>) -> Query {
            if queries.len() == 1 {
                return queries.remove(0);
            }
            let right = queries.split_off(queries.len() / 2);
            build(queries).or(build(right))
        }

        if queries.is_empty() {
            None
        } else {
            Some(build(queries))
        }
    }

    /// Messages whose Message-ID matches any of `ids`.
    pub fn any_message_id<S: AsRef<str>>(ids: &[S]) -> Option<Self> {
        Self::any_of(
            ids.iter()
                .map(|id| Self::header(MESSAGE_ID_HEADER, id.as_ref()))
                .collect(),
        )
    }

    pub fn to_imap(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Header { name, value } => format!("HEADER {} {}", quote(name), quote(value)),
            Self::Subject(text) => format!("SUBJECT {}", quote(text)),
            Self::Deleted => "DELETED".to_string(),
            Self::Not(inner) => format!("NOT {}", inner.to_imap_nested()),
            Self::Or(left, right) => {
                format!("OR {} {}", left.to_imap_nested(), right.to_imap_nested())
            }
            Self::And(terms) => terms
                .iter()
                .map(Query::to_imap_nested)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn to_imap_nested(&self) -> String {
        match self {
            Self::And(terms) if terms.len() > 1 => format!("({})", self.to_imap()),
            _ => self.to_imap(),
        }
    }
}

/// IMAP quoted string. CR and LF cannot appear in a quoted string and are
/// dropped.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\r' | '\n' => {}
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_header() {
        let q = Query::header("Message-ID", "abc");
        assert_eq!(q.to_imap(), "HEADER \"Message-ID\" \"abc\"");
    }

    #[test]
    fn test_not_deleted() {
        let q = Query::subject("rss-imap").not_deleted();
        assert_eq!(q.to_imap(), "SUBJECT \"rss-imap\" NOT DELETED");
    }

    #[test]
    fn test_any_message_id_empty() {
        let ids: Vec<String> = vec![];
        assert!(Query::any_message_id(&ids).is_none());
    }

    #[test]
    fn test_any_message_id_single() {
        let q = Query::any_message_id(&["a"]).unwrap();
        assert_eq!(q, Query::header(MESSAGE_ID_HEADER, "a"));
    }

    #[test]
    fn test_any_message_id_balanced() {
        let q = Query::any_message_id(&["a", "b", "c", "d"]).unwrap().not_deleted();
        assert_eq!(
            q.to_imap(),
            "OR OR HEADER \"Message-ID\" \"a\" HEADER \"Message-ID\" \"b\" \
             OR HEADER \"Message-ID\" \"c\" HEADER \"Message-ID\" \"d\" NOT DELETED"
        );
    }

    #[test]
    fn test_nested_and_parenthesised() {
        let q = Query::subject("x")
            .and(Query::Deleted)
            .or(Query::All)
            .negate();
        assert_eq!(q.to_imap(), "NOT OR (SUBJECT \"x\" DELETED) ALL");
    }

    #[test]
    fn test_quoting() {
        let q = Query::subject("say \"hi\" \\ bye\r\n");
        assert_eq!(q.to_imap(), "SUBJECT \"say \\\"hi\\\" \\\\ bye\"");
    }
}
