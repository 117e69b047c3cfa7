//! Plain text to HTML fragment conversion.

/// Convert user-supplied text into HTML-safe text.
///
/// The five HTML meta-characters are entity-escaped and every line break
/// (`\r\n`, `\r` or `\n`) becomes `<br>` followed by a newline. `None`
/// yields an empty string.
pub fn text_to_html(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("<br>\n");
            }
            '\n' => out.push_str("<br>\n"),
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> String {
        text_to_html(Some(s))
    }

    #[test]
    fn test_escapes_meta_characters() {
        assert_eq!(html("5 < 10"), "5 &lt; 10");
        assert_eq!(html("a > b"), "a &gt; b");
        assert_eq!(html("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(html(r#"He said "hello""#), "He said &quot;hello&quot;");
        assert_eq!(html("It's working"), "It&#039;s working");
    }

    #[test]
    fn test_prevents_script_injection() {
        let result = html(r#"<script>alert("XSS")</script>"#);
        assert!(!result.contains("<script>"));
        assert_eq!(
            result,
            "&lt;script&gt;alert(&quot;XSS&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_leaves_other_punctuation() {
        assert_eq!(html("!#$%()*+,-./:;=?@[]^_{|}~\\`"), "!#$%()*+,-./:;=?@[]^_{|}~\\`");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(html("a\nb"), "a<br>\nb");
        assert_eq!(html("a\r\nb"), "a<br>\nb");
        assert_eq!(html("a\rb"), "a<br>\nb");
        assert_eq!(html("a\n\nb"), "a<br>\n<br>\nb");
        assert_eq!(html("a\r\rb"), "a<br>\n<br>\nb");
        assert!(!html("x\ry\r\nz").contains('\r'));
    }

    #[test]
    fn test_unicode_passes_through() {
        assert_eq!(html("café © 日本語 🎉"), "café © 日本語 🎉");
        // combining acute accent after a meta-character
        assert_eq!(html("<\u{0301}"), "&lt;\u{0301}");
    }

    #[test]
    fn test_none_and_empty() {
        assert_eq!(text_to_html(None), "");
        assert_eq!(html(""), "");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let plain = "Just a plain sentence, nothing special.";
        assert_eq!(html(plain), plain);
        assert_eq!(html(&html(plain)), plain);
    }

    #[test]
    fn test_no_raw_meta_characters_survive() {
        let input = "<a href='x'>\"&\"</a>\r\nline2\rline3";
        let output = html(input);
        let without_breaks = output.replace("<br>", "");
        assert!(!without_breaks.contains('<'));
        assert!(!without_breaks.contains('>'));
        assert!(!without_breaks.contains('"'));
        assert!(!without_breaks.contains('\''));
        assert_eq!(output.matches("<br>\n").count(), 2);
    }
}
