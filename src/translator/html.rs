use html_escape::decode_html_entities;

/// Drop markup from `text`, keeping only character data with character
/// references decoded.
///
/// A `<` only opens a tag when followed by a letter, `/`, `!` or `?`, so
/// plain comparisons such as `a < b` survive. Quoted attribute values may
/// contain `>`.
pub fn strip_tags(text: &str) -> String {
    let mut data = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '<' {
            data.push(c);
            continue;
        }

        let opens_tag = chars
            .peek()
            .is_some_and(|&n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?'));
        if !opens_tag {
            data.push(c);
            continue;
        }

        if chars.peek() == Some(&'!') && skip_comment(&mut chars) {
            continue;
        }

        let mut quote: Option<char> = None;
        for t in chars.by_ref() {
            match quote {
                Some(q) if t == q => quote = None,
                Some(_) => {}
                None if t == '"' || t == '\'' => quote = Some(t),
                None if t == '>' => break,
                None => {}
            }
        }
    }

    decode_html_entities(&data).into_owned()
}

/// Consume a `<!-- ... -->` comment if one starts at the cursor (the `<`
/// already taken). Returns false, consuming nothing past `!`, otherwise.
fn skip_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let mut lookahead = chars.clone();
    if lookahead.next() != Some('!') || lookahead.next() != Some('-') || lookahead.next() != Some('-') {
        return false;
    }

    let mut dashes = 0;
    for c in lookahead.by_ref() {
        match c {
            '-' => dashes += 1,
            '>' if dashes >= 2 => break,
            _ => dashes = 0,
        }
    }
    *chars = lookahead;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(strip_tags("Hello world"), "Hello world");
        assert_eq!(strip_tags(""), "");
    }

    #[test]
    fn test_strips_tags() {
        assert_eq!(strip_tags("<b>Bold</b> and <i>italic</i>"), "Bold and italic");
        assert_eq!(strip_tags("<p class=\"x\">One</p><br/>Two"), "OneTwo");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(strip_tags("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(strip_tags("&lt;not a tag&gt;"), "<not a tag>");
        assert_eq!(strip_tags("caf&#233;"), "café");
    }

    #[test]
    fn test_lone_angle_bracket_is_data() {
        assert_eq!(strip_tags("a < b"), "a < b");
        assert_eq!(strip_tags("1 <2"), "1 <2");
    }

    #[test]
    fn test_quoted_attribute_with_gt() {
        assert_eq!(strip_tags("<a title=\"a > b\">link</a>"), "link");
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(strip_tags("before<!-- <b>hidden</b> -->after"), "beforeafter");
        assert_eq!(strip_tags("<!DOCTYPE html>text"), "text");
    }

    #[test]
    fn test_unterminated_tag_drops_rest() {
        assert_eq!(strip_tags("text <b"), "text ");
    }
}
