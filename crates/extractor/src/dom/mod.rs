// ABOUTME: DOM helpers layered over dom_query: parsing, meta normalisation, text and link-density utilities.
// ABOUTME: Hosts the scoring engine and the generic cleaners as submodules.

//! DOM utilities for HTML document inspection and manipulation.
//!
//! The parsed document itself comes from `dom_query`; this module adds the
//! handful of node-level measurements the extractors and the scoring engine
//! share, plus helpers to build private working copies of a subtree.

pub mod cleaners;
pub mod scoring;

pub use dom_query::Document;
use dom_query::NodeRef;

/// Parse an HTML page into a document ready for extraction.
///
/// Meta tags are normalised so that `content` is also readable as `value`
/// and `property` as `name`, which lets rules written against either
/// convention match.
pub fn parse_document(html: &str) -> Document {
    let doc = Document::from(html);
    normalize_meta_tags(&doc);
    doc
}

/// Mirror `content` into `value` and `property` into `name` on meta tags.
pub fn normalize_meta_tags(doc: &Document) {
    for meta in doc.select("meta").iter() {
        if let Some(content) = meta.attr("content") {
            if !meta.has_attr("value") {
                meta.set_attr("value", &content);
            }
        }
        if let Some(property) = meta.attr("property") {
            if !meta.has_attr("name") {
                meta.set_attr("name", &property);
            }
        }
    }
}

/// Parse an HTML fragment into a standalone document whose `<body>` holds it.
pub fn fragment_document(html: &str) -> Document {
    Document::from(format!("<html><head></head><body>{}</body></html>", html).as_str())
}

/// Serialize the children of the working document's `<body>`.
pub fn body_inner_html(doc: &Document) -> String {
    doc.select("body").inner_html().to_string()
}

/// Lowercased tag name of an element node.
pub fn tag_name(node: &NodeRef) -> Option<String> {
    if !node.is_element() {
        return None;
    }
    node.node_name().map(|n| n.to_ascii_lowercase())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised text of a node and all its descendants.
pub fn node_text(node: &NodeRef) -> String {
    normalize_spaces(&node.text())
}

/// Normalised text of a node's own text children, ignoring nested elements.
pub fn direct_text(node: &NodeRef) -> String {
    let mut text = String::new();
    for child in node.children() {
        if child.is_text() {
            text.push_str(&child.text());
            text.push(' ');
        }
    }
    normalize_spaces(&text)
}

/// Ratio of anchor text length to total text length, in characters.
///
/// Nodes without text have a density of zero.
pub fn link_density(node: &NodeRef) -> f64 {
    let total = node_text(node).chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = node
        .descendants()
        .iter()
        .filter(|d| tag_name(d).as_deref() == Some("a"))
        .map(|a| node_text(a).chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

/// Returns true if the node has a descendant element with one of the given tags.
pub fn has_descendant_tag(node: &NodeRef, tags: &[&str]) -> bool {
    node.descendants()
        .iter()
        .filter_map(tag_name)
        .any(|t| tags.contains(&t.as_str()))
}

/// Class and id attributes joined with a space, for keyword matching.
pub fn class_and_id(node: &NodeRef) -> String {
    let class = node.attr("class").map(|c| c.to_string()).unwrap_or_default();
    let id = node.attr("id").map(|i| i.to_string()).unwrap_or_default();
    format!("{} {}", class, id).trim().to_string()
}
