//! Minimal HTML flattening for search result pages
//!
//! The engines only need plain text to run pattern extraction over, so this
//! is a tag stripper and entity decoder, not a parser. Script and style
//! bodies are dropped entirely since their contents would pollute keyword
//! scanning.

/// Strip tags and flatten a search results page to whitespace-normalized text
pub fn flatten(html: &str) -> String {
    let without_blocks = drop_element_bodies(html, &["script", "style", "noscript"]);
    let text = strip_tags(&without_blocks);
    normalize_ws(&decode_entities(&text))
}

/// Remove `<tag ...>...</tag>` blocks wholesale, case-insensitively
fn drop_element_bodies(html: &str, tags: &[&str]) -> String {
    let mut out = html.to_string();
    for tag in tags {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);
        loop {
            // ASCII folding keeps byte offsets valid for replace_range below
            let lower = out.to_ascii_lowercase();
            let Some(start) = lower.find(&open) else { break };
            let Some(end_rel) = lower[start..].find(&close) else {
                // Unterminated block: drop the rest of the document
                out.truncate(start);
                break;
            };
            out.replace_range(start..start + end_rel + close.len(), " ");
        }
    }
    out
}

/// Drop everything between `<` and `>`
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Tag boundaries separate words in the flattened text
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode the handful of entities that actually show up in result pages
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&middot;", "·")
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
