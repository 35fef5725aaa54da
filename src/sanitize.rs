//! Allow-list filter for the restricted HTML subset the channel renderer accepts.
//!
//! The input is lexed into text and tags. Each tag is classified by its parsed
//! name instead of by a textual prefix. Only hyperlink anchors and inline code
//! spans survive, and every other tag is dropped while its inner text stays.
//! An angle bracket that is not part of a well-formed tag is escaped. This
//! guarantees that every `<` in the output opens a kept tag, which makes the
//! filter idempotent.

use std::sync::LazyLock;

use regex::Regex;

// A tag name follows `<` or `</` directly; `< a` is text. Runs to the first `>`.
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<(?:/?[A-Za-z]|!|\?)[^<>]*>").unwrap());
static HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(^|\s)href\s*=").unwrap());

/// Strip every tag except `<a href=...>`, `</a>`, `<code>` and `</code>`.
pub fn clean_up_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(['<', '>']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with('>') {
            out.push_str("&gt;");
            rest = &rest[1..];
            continue;
        }

        match TAG.find(rest) {
            Some(tag) => {
                if is_allowed(tag.as_str()) {
                    out.push_str(tag.as_str());
                }
                rest = &rest[tag.end()..];
            }
            None => {
                out.push_str("&lt;");
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for the HTML parse mode, including quotes so it is safe in attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_allowed(tag: &str) -> bool {
    let inner = &tag[1..tag.len() - 1];
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(stripped) => (true, stripped),
        None => (false, inner),
    };

    let name_end = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    let (name, attrs) = inner.split_at(name_end);

    match name.to_ascii_lowercase().as_str() {
        "a" if closing => true,
        "a" => HREF.is_match(attrs),
        "code" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn keeps_anchor_drops_div_and_script() {
        let html = "<div>hi <a href='x'>link</a> <script>bad()</script></div>";
        assert_eq!(clean_up_html(html), "hi <a href='x'>link</a> bad()");
    }

    #[test]
    fn keeps_code_spans() {
        let html = "<p>Run <code>pacman -Syu</code> now.</p>";
        assert_eq!(clean_up_html(html), "Run <code>pacman -Syu</code> now.");
    }

    #[test]
    fn drops_anchor_without_href() {
        assert_eq!(clean_up_html("<a name=\"top\">top</a>"), "top</a>");
    }

    #[test]
    fn classifies_by_name_not_prefix() {
        // `abbr` and `codeblock` start with allowed names but are different tags.
        assert_eq!(clean_up_html("<abbr>HTML</abbr>"), "HTML");
        assert_eq!(clean_up_html("<codeblock>x</codeblock>"), "x");
        assert_eq!(clean_up_html("<address href='x'>y</address>"), "y");
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        assert_eq!(clean_up_html("<A HREF=\"x\">l</A>"), "<A HREF=\"x\">l</A>");
        assert_eq!(clean_up_html("<B>bold</B>"), "bold");
    }

    #[test]
    fn escapes_stray_brackets() {
        assert_eq!(clean_up_html("1 < 2 and 3 > 2"), "1 &lt; 2 and 3 &gt; 2");
        assert_eq!(clean_up_html("<<b>a>"), "&lt;a&gt;");
    }

    #[test]
    fn removes_comments_and_self_closing_tags() {
        assert_eq!(clean_up_html("a<br/>b<!-- note -->c"), "abc");
    }

    #[test]
    fn space_after_bracket_is_not_a_tag() {
        assert_eq!(
            clean_up_html("x < a href='y'>z</ a> < code>q"),
            "x &lt; a href='y'&gt;z&lt;/ a&gt; &lt; code&gt;q"
        );
    }

    #[test]
    fn escape_html_covers_markup_and_quotes() {
        assert_eq!(escape_html("foo <bar> & \"baz\""), "foo &lt;bar&gt; &amp; &quot;baz&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_up_html("nothing to see &amp; here"), "nothing to see &amp; here");
    }

    proptest! {
        #[test]
        fn applying_twice_equals_applying_once(s in r"[<>a-z/ ='\x22]{0,40}") {
            let once = clean_up_html(&s);
            prop_assert_eq!(clean_up_html(&once), once);
        }

        #[test]
        fn output_has_no_unknown_tags(s in r"(<(div|p|b|script|a href='x'|/a|code|/code)>|[a-z ]){0,20}") {
            let out = clean_up_html(&s);
            for tag in ["<div>", "<p>", "<b>", "<script>"] {
                prop_assert!(!out.contains(tag));
            }
        }
    }
}
