// ABOUTME: Derived result fields: excerpt, word count, text direction and URL resolution.
// ABOUTME: These run after selection and never fail; missing inputs give empty values.

use dom_query::Document;
use url::Url;

use crate::dom::{fragment_document, normalize_spaces};

pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";
pub const AUTHOR: &str = "author";
pub const DATE_PUBLISHED: &str = "date_published";
pub const LEAD_IMAGE_URL: &str = "lead_image_url";
pub const DEK: &str = "dek";
pub const NEXT_PAGE_URL: &str = "next_page_url";
pub const EXCERPT: &str = "excerpt";

/// Maximum excerpt length in characters, before the ellipsis.
pub const EXCERPT_CHARS: usize = 200;

/// Share of RTL letters at or above which text reads right-to-left.
const RTL_THRESHOLD: f64 = 0.30;

/// Normalised plain text of an HTML fragment.
pub fn content_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let doc = fragment_document(html);
    normalize_spaces(&doc.select("body").text())
}

/// First [`EXCERPT_CHARS`] characters of `text`, cut at a word boundary
/// when one is near and ellipsised when shortened.
pub fn excerpt_from_text(text: &str) -> Option<String> {
    let text = normalize_spaces(text);
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= EXCERPT_CHARS {
        return Some(text);
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > EXCERPT_CHARS / 2 => &cut[..idx],
        _ => cut.as_str(),
    };
    Some(format!("{}…", trimmed.trim_end()))
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Text direction of a page.
///
/// Priority:
/// 1. `dir` attribute on `<html>`
/// 2. `dir` attribute on `<body>`
/// 3. `"rtl"` when at least 30% of the letters in `text` are Hebrew or Arabic
///
/// Returns `"rtl"` or `"ltr"`.
pub fn detect_direction(doc: &Document, text: &str) -> String {
    for tag in ["html", "body"] {
        if let Some(dir) = doc.select(tag).attr("dir") {
            let dir = dir.trim().to_ascii_lowercase();
            if dir == "rtl" || dir == "ltr" {
                return dir;
            }
        }
    }

    let mut letters = 0u32;
    let mut rtl = 0u32;
    for ch in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if is_rtl_char(ch) {
            rtl += 1;
        }
    }
    if letters > 0 && (rtl as f64 / letters as f64) >= RTL_THRESHOLD {
        "rtl".to_string()
    } else {
        "ltr".to_string()
    }
}

/// Hebrew or Arabic code point.
pub fn is_rtl_char(ch: char) -> bool {
    let code = ch as u32;
    // Hebrew: U+0590..U+05FF, U+FB1D..U+FB4F
    // Arabic: U+0600..U+06FF, U+0750..U+077F, U+08A0..U+08FF, U+FB50..U+FDFF, U+FE70..U+FEFF
    (0x0590..=0x05FF).contains(&code)
        || (0xFB1D..=0xFB4F).contains(&code)
        || (0x0600..=0x06FF).contains(&code)
        || (0x0750..=0x077F).contains(&code)
        || (0x08A0..=0x08FF).contains(&code)
        || (0xFB50..=0xFDFF).contains(&code)
        || (0xFE70..=0xFEFF).contains(&code)
}

/// Resolve a possibly relative URL against the page URL.
///
/// Values that do not form a valid URL are dropped.
pub fn resolve_url(base: &Url, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    base.join(value).ok().map(|u| u.to_string())
}

/// Resolve a next-page link, dropping links back to the page itself.
pub fn resolve_next_page(base: &Url, value: &str) -> Option<String> {
    let resolved = base.join(value.trim()).ok()?;
    let mut page = base.clone();
    page.set_fragment(None);
    let mut next = resolved.clone();
    next.set_fragment(None);
    if next == page {
        return None;
    }
    Some(resolved.to_string())
}
