//! Light surgery on rich markup fragments: serialize a container's children
//! minus a few dropped elements, strip tags, escape text. Deliberately not a
//! general DOM layer; extraction keeps the fragments opaque.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
static TRAILING_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</([a-zA-Z][a-zA-Z0-9]*)>\s*$").unwrap());

/// Escape a string for use in HTML text or attribute position.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Plain text of an element: every text node whitespace-collapsed, empty
/// nodes dropped, the rest joined with `sep`. With `"\n\n"` this keeps
/// paragraph structure; with `" "` it flattens to one matching line.
pub fn collapsed_text(el: ElementRef, sep: &str) -> String {
    el.text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Serialize the inner markup of `el`, skipping any child element for which
/// `drop` returns true. Text and non-element nodes pass through.
pub fn inner_html_without(el: ElementRef, drop: &mut dyn FnMut(&ElementRef) -> bool) -> String {
    let mut out = String::new();
    for node in el.children() {
        if let Some(child) = ElementRef::wrap(node) {
            if drop(&child) {
                continue;
            }
            out.push_str(&child.html());
        } else if let Some(text) = node.value().as_text() {
            out.push_str(&escape(text));
        }
        // comments, processing instructions: dropped
    }
    out.trim().to_string()
}

/// Remove all `<img ...>` tags from a fragment. Images are rendered once via
/// the record's image lists, never inline from rich markup.
pub fn strip_img_tags(html: &str) -> String {
    IMG_TAG_RE.replace_all(html, "").into_owned()
}

/// Drop a trailing closing tag that has no matching opener in the fragment
/// (a scrape artifact). Parsed fragments are already balanced; this guards
/// fragments assembled by string surgery.
pub fn strip_stray_close(html: &str) -> String {
    let trimmed = html.trim_end();
    if let Some(caps) = TRAILING_CLOSE_RE.captures(trimmed) {
        let tag = caps[1].to_lowercase();
        let lower = trimmed.to_lowercase();
        // An opener is `<tag` followed by a delimiter, so `<pre>` does not
        // count as an opener for `p`.
        let opens = lower
            .match_indices(&format!("<{tag}"))
            .filter(|(i, m)| {
                lower[i + m.len()..]
                    .bytes()
                    .next()
                    .is_some_and(|b| b == b'>' || b == b'/' || b.is_ascii_whitespace())
            })
            .count();
        let closes = lower.matches(&format!("</{tag}>")).count();
        if closes > opens {
            return trimmed[..caps.get(0).unwrap().start()].trim_end().to_string();
        }
    }
    trimmed.to_string()
}

/// True for h1..h6.
pub fn is_header(el: &ElementRef) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

// ── Tests ──
