// ABOUTME: Selector engine: resolves a FieldSpec's ordered alternatives against a document.
// ABOUTME: Handles literals, text/HTML reads, attribute reads with meta pseudo-attributes, and all-of groups.

//! Selector-based field extraction.
//!
//! Key behaviors:
//! - Alternatives are tried in order; the first one yielding a non-empty,
//!   valid value wins.
//! - Text extraction normalizes whitespace; HTML extraction returns the
//!   matched element's outer HTML.
//! - `allow_multiple`: when true, returns every match of the winning
//!   alternative in document order; when false, only the first.
//! - A malformed selector fails its alternative only.

use dom_query::{Document, Selection};

use crate::dom::normalize_spaces;
use crate::extractors::compiled::get_or_compile;
use crate::extractors::rules::{FieldSpec, SelectorAlternative};
use crate::result::FieldValue;

const MEDIA: &str = "img, video, iframe, picture";

/// Resolves a field spec against a document.
///
/// Returns `None` only when every alternative fails.
pub fn select_field(doc: &Document, spec: &FieldSpec, extract_html: bool) -> Option<FieldValue> {
    for alt in &spec.selectors {
        let values: Vec<String> = match alt {
            SelectorAlternative::Literal(value) => {
                if spec.accepts(value) {
                    return Some(FieldValue::Single(value.clone()));
                }
                continue;
            }
            SelectorAlternative::Simple(css) => matches(doc, css)
                .iter()
                .filter_map(|el| read_node(el, extract_html))
                .collect(),
            SelectorAlternative::WithAttribute(css, attr) => matches(doc, css)
                .iter()
                .filter_map(|el| read_attr(el, attr))
                .collect(),
            SelectorAlternative::AllOf(parts) => {
                all_of(doc, parts, extract_html).into_iter().collect()
            }
        };

        let mut valid = values.into_iter().filter(|v| spec.accepts(v));
        if spec.allow_multiple {
            let all: Vec<String> = valid.collect();
            if !all.is_empty() {
                return Some(FieldValue::Multiple(all));
            }
        } else if let Some(first) = valid.next() {
            return Some(FieldValue::Single(first));
        }
    }
    None
}

/// Convenience wrapper returning only the first selected string.
pub fn select_first(doc: &Document, spec: &FieldSpec, extract_html: bool) -> Option<String> {
    select_field(doc, spec, extract_html).and_then(FieldValue::into_first)
}

/// Returns the outer HTML of the content nodes picked by the first
/// matching alternative, in the order they should be concatenated.
///
/// Literals are ignored; an all-of group yields one fragment per
/// sub-selector in listed order. Validity checks run against the text of
/// the fragments so that an empty container does not win. Media-only
/// nodes have no text and are kept as they are.
pub fn select_content_nodes(doc: &Document, spec: &FieldSpec) -> Option<Vec<String>> {
    let usable = |text: &str, media: bool| {
        if text.is_empty() {
            media
        } else {
            spec.accepts(text)
        }
    };
    for alt in &spec.selectors {
        let fragments: Vec<String> = match alt {
            SelectorAlternative::Literal(_) | SelectorAlternative::WithAttribute(..) => continue,
            SelectorAlternative::Simple(css) => {
                let found: Vec<String> = matches(doc, css)
                    .iter()
                    .filter(|el| usable(&normalize_spaces(&el.text()), has_media(el)))
                    .map(|el| el.html().to_string())
                    .collect();
                if spec.allow_multiple {
                    found
                } else {
                    found.into_iter().take(1).collect()
                }
            }
            SelectorAlternative::AllOf(parts) => {
                let mut group = Vec::with_capacity(parts.len());
                let mut text = Vec::with_capacity(parts.len());
                let mut media = false;
                for css in parts {
                    let sel = matches(doc, css);
                    let Some(first) = sel.first() else {
                        group.clear();
                        break;
                    };
                    let piece = normalize_spaces(&first.text());
                    if !piece.is_empty() {
                        text.push(piece);
                    }
                    media |= has_media(first);
                    group.push(first.html().to_string());
                }
                if group.is_empty() || !usable(&text.join(" "), media) {
                    continue;
                }
                group
            }
        };
        if !fragments.is_empty() {
            return Some(fragments);
        }
    }
    None
}

/// Matches a CSS selector, returning no elements for malformed ones.
fn matches<'a>(doc: &'a Document, css: &str) -> Vec<Selection<'a>> {
    match get_or_compile(css) {
        Ok(matcher) => doc.select_matcher(&matcher).iter().collect(),
        Err(_) => Vec::new(),
    }
}

/// Reads a single element as text or outer HTML.
///
/// Meta elements have no text, so their `content`/`value` is read instead.
fn read_node(el: &Selection<'_>, extract_html: bool) -> Option<String> {
    if is_meta(el) {
        return read_attr(el, "content");
    }
    let value = if extract_html {
        el.html().trim().to_string()
    } else {
        normalize_spaces(&el.text())
    };
    (!value.is_empty()).then_some(value)
}

/// Reads an attribute, treating `content` and `value` as interchangeable on meta tags.
fn read_attr(el: &Selection<'_>, attr: &str) -> Option<String> {
    let direct = el.attr(attr).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if direct.is_some() || !is_meta(el) {
        return direct;
    }
    let alternate = match attr {
        "content" => "value",
        "value" => "content",
        _ => return None,
    };
    el.attr(alternate)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_meta(el: &Selection<'_>) -> bool {
    el.nodes()
        .first()
        .and_then(|n| n.node_name())
        .is_some_and(|name| name.eq_ignore_ascii_case("meta"))
}

/// Every sub-selector must match; the first match of each is concatenated.
///
/// A matched node with no text still counts as a match and adds nothing.
fn all_of(doc: &Document, parts: &[String], extract_html: bool) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let mut pieces = Vec::with_capacity(parts.len());
    for css in parts {
        let sel = matches(doc, css);
        let first = sel.first()?;
        if let Some(piece) = read_node(first, extract_html) {
            pieces.push(piece);
        }
    }
    if extract_html {
        Some(format!("<div>{}</div>", pieces.concat()))
    } else {
        Some(pieces.join(" "))
    }
}

/// True if the element is, or contains, an image or embedded media.
fn has_media(el: &Selection<'_>) -> bool {
    el.is(MEDIA) || el.select(MEDIA).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use crate::extractors::rules::FieldPattern;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html>
        <head>
            <title>Test Page</title>
            <meta property="og:title" content="OG Title">
            <meta name="author" value="Jane Roe">
        </head>
        <body>
            <h1>  Main   Title  </h1>
            <h2 class="kicker">Kicker</h2>
            <img class="hero" src="/images/hero.jpg" alt="Hero Image">
            <ul class="items">
                <li>Item One</li>
                <li>Item Two</li>
                <li>Item Three</li>
            </ul>
            <div class="empty"></div>
            <p class="intro">Hello <b>world</b></p>
        </body>
        </html>
    "#;

    fn doc() -> Document {
        parse_document(SAMPLE_HTML)
    }

    fn spec(alts: Vec<SelectorAlternative>) -> FieldSpec {
        FieldSpec::new(alts)
    }

    #[test]
    fn text_is_whitespace_normalized() {
        let fs = spec(vec![SelectorAlternative::simple("h1")]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Main Title"));
    }

    #[test]
    fn first_alternative_wins_when_both_match() {
        let fs = spec(vec![
            SelectorAlternative::simple("h2.kicker"),
            SelectorAlternative::simple("h1"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Kicker"));
    }

    #[test]
    fn empty_match_falls_through() {
        let fs = spec(vec![
            SelectorAlternative::simple("div.empty"),
            SelectorAlternative::simple("p.intro"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Hello world"));
    }

    #[test]
    fn literal_returns_immediately() {
        let fs = spec(vec![
            SelectorAlternative::literal("Staff"),
            SelectorAlternative::simple("h1"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Staff"));
    }

    #[test]
    fn attribute_read_and_missing_attribute_fails() {
        let fs = spec(vec![
            SelectorAlternative::attr("img.hero", "data-src"),
            SelectorAlternative::attr("img.hero", "src"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("/images/hero.jpg"));
    }

    #[test]
    fn meta_pseudo_attributes_are_interchangeable() {
        let raw = Document::from(SAMPLE_HTML);
        let fs = spec(vec![SelectorAlternative::attr("meta[name=author]", "content")]);
        assert_eq!(select_first(&raw, &fs, false).as_deref(), Some("Jane Roe"));

        let fs = spec(vec![SelectorAlternative::attr(r#"meta[property="og:title"]"#, "value")]);
        assert_eq!(select_first(&raw, &fs, false).as_deref(), Some("OG Title"));
    }

    #[test]
    fn allow_multiple_keeps_document_order() {
        let fs = spec(vec![SelectorAlternative::simple("ul.items li")]).allow_multiple(true);
        assert_eq!(
            select_field(&doc(), &fs, false),
            Some(FieldValue::Multiple(vec![
                "Item One".into(),
                "Item Two".into(),
                "Item Three".into(),
            ]))
        );
    }

    #[test]
    fn all_of_concatenates_in_listed_order() {
        let fs = spec(vec![SelectorAlternative::all_of(["h2.kicker", "h1"])]);
        assert_eq!(
            select_first(&doc(), &fs, false).as_deref(),
            Some("Kicker Main Title")
        );
        let html = select_first(&doc(), &fs, true).unwrap();
        assert!(html.starts_with("<div><h2"), "{}", html);
        assert!(html.find("Kicker").unwrap() < html.find("Main").unwrap());
    }

    #[test]
    fn all_of_is_atomic() {
        let fs = spec(vec![
            SelectorAlternative::all_of(["h1", "figure.missing"]),
            SelectorAlternative::simple("h2.kicker"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Kicker"));
    }

    #[test]
    fn all_of_counts_a_matched_node_without_text() {
        let fs = spec(vec![
            SelectorAlternative::all_of(["img.hero", "h1"]),
            SelectorAlternative::simple("h2.kicker"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Main Title"));
    }

    #[test]
    fn malformed_selector_skips_alternative() {
        let fs = spec(vec![
            SelectorAlternative::simple("h1[[["),
            SelectorAlternative::simple("h1"),
        ]);
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Main Title"));
    }

    #[test]
    fn validity_filters_values() {
        let fs = spec(vec![SelectorAlternative::simple("ul.items li")])
            .pattern(FieldPattern::new("Two").unwrap());
        assert_eq!(select_first(&doc(), &fs, false).as_deref(), Some("Item Two"));

        let fs = spec(vec![SelectorAlternative::simple("h1")]).max_length(4);
        assert_eq!(select_field(&doc(), &fs, false), None);
    }

    #[test]
    fn html_extraction_returns_outer_html() {
        let fs = spec(vec![SelectorAlternative::simple("p.intro")]);
        assert_eq!(
            select_first(&doc(), &fs, true).as_deref(),
            Some(r#"<p class="intro">Hello <b>world</b></p>"#)
        );
    }

    #[test]
    fn content_nodes_fall_through_missing_groups() {
        let d = Document::from(r#"<div class="body"><p>Body text</p></div>"#);
        let fs = spec(vec![
            SelectorAlternative::all_of(["figure.hero", ".body"]),
            SelectorAlternative::simple(".body"),
        ]);
        assert_eq!(
            select_content_nodes(&d, &fs),
            Some(vec![r#"<div class="body"><p>Body text</p></div>"#.to_string()])
        );
    }

    #[test]
    fn content_nodes_keep_group_order() {
        let d = Document::from(
            r#"<div class="body"><p>Body</p></div><figure class="hero"><img src="a.jpg"></figure>"#,
        );
        let fs = spec(vec![SelectorAlternative::all_of(["figure.hero", ".body"])]);
        let nodes = select_content_nodes(&d, &fs).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].starts_with("<figure"));
        assert!(nodes[1].starts_with(r#"<div class="body">"#));
    }

    #[test]
    fn media_only_content_node_is_kept() {
        let d = Document::from(
            r#"<figure class="gallery"><img src="a.jpg"><img src="b.jpg"></figure>
               <div class="empty"><span> </span></div>"#,
        );
        let fs = spec(vec![
            SelectorAlternative::simple("div.empty"),
            SelectorAlternative::simple("figure.gallery"),
        ]);
        let nodes = select_content_nodes(&d, &fs).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].starts_with(r#"<figure class="gallery">"#), "{}", nodes[0]);
    }
}
