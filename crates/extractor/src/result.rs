// ABOUTME: ExtractResult struct holding every field produced for one page, plus the FieldValue type.
// ABOUTME: The field set is fixed: empty fields are present as null/empty rather than omitted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A selected field value: one string, or every match when a field allows several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FieldValue {
    /// The first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Single(s) => Some(s.as_str()),
            FieldValue::Multiple(v) => v.first().map(String::as_str),
        }
    }

    /// Consumes the value, keeping only the first string.
    pub fn into_first(self) -> Option<String> {
        match self {
            FieldValue::Single(s) => Some(s),
            FieldValue::Multiple(v) => v.into_iter().next(),
        }
    }

    /// All values in order.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            FieldValue::Single(s) => vec![s],
            FieldValue::Multiple(v) => v,
        }
    }
}

/// The result of extracting a page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractResult {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    /// Raw published-date string as found on the page.
    pub date_published: Option<String>,
    pub lead_image_url: Option<String>,
    pub dek: Option<String>,
    pub next_page_url: Option<String>,
    pub url: String,
    pub domain: String,
    pub excerpt: Option<String>,
    pub word_count: usize,
    /// `"ltr"` or `"rtl"`.
    pub direction: String,
    /// Site-declared extra fields in declaration order; `None` when nothing matched.
    pub extended: IndexMap<String, Option<FieldValue>>,
}

impl ExtractResult {
    /// Returns true if the result has no meaningful content.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}
