// ABOUTME: Generic DOM cleaners run over content working copies: junk tags, spacer images, presentational attrs.
// ABOUTME: Also removes empty nodes bottom-up, resolves relative links and owns the unlikely-candidate patterns.

use std::collections::HashSet;

use dom_query::{Document, Matcher, NodeId, NodeRef, Selection};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{class_and_id, has_descendant_tag, tag_name};

// Video embeds that survive iframe stripping
const KEEP_IFRAMES: &[&str] = &[
    r#"iframe[src^="https://www.youtube.com"]"#,
    r#"iframe[src^="https://www.youtube-nocookie.com"]"#,
    r#"iframe[src^="http://www.youtube.com"]"#,
    r#"iframe[src^="https://player.vimeo"]"#,
    r#"iframe[src^="http://player.vimeo"]"#,
];

// Tags stripped from content output
const STRIP_OUTPUT_TAGS: &[&str] = &[
    "title", "script", "noscript", "link", "style", "template", "embed", "iframe", "object",
];

// Attributes that only carry presentation
const REMOVE_ATTRS: &[&str] = &["style", "align"];

// Elements that count as content even without text
const MEDIA_TAGS: &[&str] = &[
    "img", "picture", "video", "audio", "iframe", "svg", "canvas", "source", "embed", "object",
];

// Elements never removed for being empty
const KEEP_EMPTY_TAGS: &[&str] = &[
    "br", "hr", "img", "picture", "video", "audio", "iframe", "source", "svg", "canvas", "td",
    "th", "tr", "col", "colgroup", "input", "wbr", "body", "html", "head",
];

static SPACER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)transparent|spacer|blank").unwrap());

// Unlikely candidate patterns
pub static CANDIDATES_BLACKLIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(ad-break|ad-banner|adbox|advert|addthis|agegate|aux|blogger-labels|combx|comment|conversation|disqus|entry-unrelated|extra|foot|header|hidden|loader|login|menu|meta|nav|outbrain|pager|pagination|predicta|popup|printfriendly|related|remark|rss|share|shoutbox|sidebar|sociable|sponsor|taboola|tools)").unwrap()
});
pub static CANDIDATES_WHITELIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(and|article|body|blogindex|column|content|entry-content-asset|format|hfeed|hentry|hatom|main|page|posts|shadow)").unwrap()
});

static CAPTION_HINTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)caption|credit|wp-caption").unwrap());

// Segments whose whitespace is significant
static PRESERVE_WS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<code\b.*?</code>|<textarea\b.*?</textarea>").unwrap()
});
static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Returns true if class/id match the negative pattern without the positive one.
pub fn is_unlikely_candidate(node: &NodeRef) -> bool {
    if tag_name(node).as_deref() == Some("a") {
        return false;
    }
    let hints = class_and_id(node);
    if hints.is_empty() || CANDIDATES_WHITELIST.is_match(&hints) {
        return false;
    }
    CANDIDATES_BLACKLIST.is_match(&hints)
}

/// Returns true if the node looks like a caption of at most `max_len` characters.
pub fn is_caption(node: &NodeRef, max_len: usize) -> bool {
    let is_caption_tag = matches!(tag_name(node).as_deref(), Some("figcaption" | "caption"));
    if !is_caption_tag && !CAPTION_HINTS_RE.is_match(&class_and_id(node)) {
        return false;
    }
    super::node_text(node).chars().count() <= max_len
}

/// Check if image should be removed (spacer, no source, or too small)
pub fn should_remove_image(node: &NodeRef) -> bool {
    let src = node.attr("src");
    match src {
        Some(ref src) if SPACER_RE.is_match(src) => return true,
        None if !node.has_attr("srcset") => return true,
        _ => {}
    }

    let height = node
        .attr("height")
        .and_then(|h| h.trim().parse::<i32>().ok())
        .unwrap_or(20);
    let width = node
        .attr("width")
        .and_then(|w| w.trim().parse::<i32>().ok())
        .unwrap_or(20);

    height < 10 || width < 10
}

/// Run the full generic cleanup pass over the document's body.
pub fn clean_content(doc: &Document, base_url: Option<&Url>) {
    let body = doc.select("body");
    strip_junk_tags(&body);
    strip_bad_images(&body);
    for attr in REMOVE_ATTRS {
        body.select(&format!("[{}]", attr)).remove_attr(attr);
    }
    if let Some(base) = base_url {
        resolve_relative_urls(&body, base);
    }
    remove_empty_nodes(&body);
}

fn kept_iframes(root: &Selection<'_>) -> HashSet<NodeId> {
    KEEP_IFRAMES
        .iter()
        .filter_map(|css| Matcher::new(css).ok())
        .flat_map(|m| root.select_matcher(&m).nodes().iter().map(|n| n.id).collect::<Vec<_>>())
        .collect()
}

/// Remove script, style and other non-content tags, keeping video embeds.
pub fn strip_junk_tags(root: &Selection<'_>) {
    let keep = kept_iframes(root);
    for tag in STRIP_OUTPUT_TAGS {
        for node in root.select(tag).nodes().to_vec() {
            if !keep.contains(&node.id) {
                node.remove_from_parent();
            }
        }
    }
}

fn strip_bad_images(root: &Selection<'_>) {
    for node in root.select("img").nodes().to_vec() {
        if should_remove_image(&node) {
            node.remove_from_parent();
        }
    }
}

/// Resolve relative `href`, `src` and `srcset` values against `base`.
pub fn resolve_relative_urls(root: &Selection<'_>, base: &Url) {
    for attr in ["href", "src"] {
        for el in root.select(&format!("[{}]", attr)).iter() {
            let Some(value) = el.attr(attr) else { continue };
            if let Some(resolved) = resolve_one(base, &value) {
                el.set_attr(attr, &resolved);
            }
        }
    }
    for el in root.select("[srcset]").iter() {
        let Some(value) = el.attr("srcset") else { continue };
        let rewritten: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|candidate| {
                let mut parts = candidate.splitn(2, char::is_whitespace);
                let url = parts.next().unwrap_or_default();
                let descriptor = parts.next().map(str::trim).unwrap_or_default();
                let url = resolve_one(base, url).unwrap_or_else(|| url.to_string());
                if descriptor.is_empty() {
                    url
                } else {
                    format!("{} {}", url, descriptor)
                }
            })
            .collect();
        el.set_attr("srcset", &rewritten.join(", "));
    }
}

fn resolve_one(base: &Url, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with("mailto:") {
        return None;
    }
    base.join(value).ok().map(|u| u.to_string())
}

/// Remove elements with no text and no media, innermost first.
pub fn remove_empty_nodes(root: &Selection<'_>) {
    let Some(root_node) = root.nodes().first().copied() else {
        return;
    };
    let mut nodes = root_node.descendants();
    nodes.reverse();
    for node in nodes {
        let Some(tag) = tag_name(&node) else { continue };
        if KEEP_EMPTY_TAGS.contains(&tag.as_str()) {
            continue;
        }
        if node.text().trim().is_empty() && !has_descendant_tag(&node, MEDIA_TAGS) {
            node.remove_from_parent();
        }
    }
}

/// Collapse whitespace runs in serialized HTML, leaving pre/code/textarea untouched.
pub fn normalize_html_whitespace(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in PRESERVE_WS_RE.find_iter(html) {
        out.push_str(&WS_RUN_RE.replace_all(&html[last..m.start()], " "));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&WS_RUN_RE.replace_all(&html[last..], " "));
    out.trim().to_string()
}
