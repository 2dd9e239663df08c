//! HTML escaping matched byte-for-byte to the wire contract.
//!
//! The table is the conservative five-character set; `'` becomes `&#39;` so
//! escaped output is safe in single-quoted attribute positions too.

use std::io::{self, Write};

/// Write `value` with `& < > " '` escaped.
pub fn escape_html(value: &str, sink: &mut impl Write) -> io::Result<()> {
    let mut last = 0;
    for (i, byte) in value.bytes().enumerate() {
        let entity: &str = match byte {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\'' => "&#39;",
            _ => continue,
        };
        sink.write_all(value[last..i].as_bytes())?;
        sink.write_all(entity.as_bytes())?;
        last = i + 1;
    }
    sink.write_all(value[last..].as_bytes())
}

/// `href`/`src` values with a `javascript:` scheme are neutered to `#`.
/// The check tolerates leading whitespace and any case. Byte offset 11 is
/// only a char boundary when the prefix is ASCII; anything multibyte there
/// cannot spell `javascript:` and passes through.
pub fn sanitize_url(value: &str) -> &str {
    let trimmed = value.trim_start();
    if trimmed.len() >= 11
        && trimmed.is_char_boundary(11)
        && trimmed[..11].eq_ignore_ascii_case("javascript:")
    {
        "#"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(s: &str) -> String {
        let mut out = Vec::new();
        escape_html(s, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn all_five_characters() {
        assert_eq!(escaped(r#"<a href="x">&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn passthrough_is_untouched() {
        assert_eq!(escaped("plain text, no entities"), "plain text, no entities");
    }

    #[test]
    fn javascript_urls_are_neutered() {
        assert_eq!(sanitize_url("javascript:alert(1)"), "#");
        assert_eq!(sanitize_url("  JaVaScRiPt:alert(1)"), "#");
        assert_eq!(sanitize_url("https://example.com"), "https://example.com");
        assert_eq!(sanitize_url("javascript"), "javascript");
    }

    #[test]
    fn multibyte_near_the_scheme_is_not_a_match() {
        // `é` spans bytes 10..12, putting offset 11 mid-character.
        assert_eq!(sanitize_url("javascript\u{e9}:x"), "javascript\u{e9}:x");
        assert_eq!(sanitize_url("héllo-world:x"), "héllo-world:x");
        assert_eq!(sanitize_url("日本語のリンクtarget"), "日本語のリンクtarget");
    }
}
