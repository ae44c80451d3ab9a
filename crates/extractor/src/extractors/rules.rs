// ABOUTME: Declarative rule model: selector alternatives, field specs, content specs and per-site rule sets.
// ABOUTME: Deserializes the compact JSON rule format (strings, [sel, attr] pairs, all_of groups, literals).

//! Rule definitions for site-specific extraction.
//!
//! A [`RuleSet`] describes, per field, an ordered list of selector
//! alternatives. The first alternative that produces a non-empty, valid value
//! wins. The content field additionally carries transforms, a removal list and
//! a switch for the generic cleaner.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::extractors::transforms::Transform;

/// One way of producing a field value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSelector")]
pub enum SelectorAlternative {
    /// A fixed value returned without touching the document.
    Literal(String),
    /// Text (or outer HTML) of the matching elements.
    Simple(String),
    /// The named attribute of the matching elements.
    WithAttribute(String, String),
    /// Every sub-selector must match; results are joined in listed order.
    AllOf(Vec<String>),
}

impl SelectorAlternative {
    pub fn literal(value: impl Into<String>) -> Self {
        SelectorAlternative::Literal(value.into())
    }

    pub fn simple(selector: impl Into<String>) -> Self {
        SelectorAlternative::Simple(selector.into())
    }

    pub fn attr(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        SelectorAlternative::WithAttribute(selector.into(), attr.into())
    }

    pub fn all_of<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectorAlternative::AllOf(selectors.into_iter().map(Into::into).collect())
    }

    /// CSS selectors this alternative queries.
    pub fn selectors(&self) -> Vec<&str> {
        match self {
            SelectorAlternative::Literal(_) => Vec::new(),
            SelectorAlternative::Simple(s) | SelectorAlternative::WithAttribute(s, _) => {
                vec![s.as_str()]
            }
            SelectorAlternative::AllOf(parts) => parts.iter().map(String::as_str).collect(),
        }
    }

    /// Inside a content spec an attribute pair makes no sense, so a
    /// two-element array is read as a group.
    fn into_content_alternative(self) -> Self {
        match self {
            SelectorAlternative::WithAttribute(a, b) => SelectorAlternative::AllOf(vec![a, b]),
            other => other,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Css(String),
    Array(Vec<String>),
    AllOf { all_of: Vec<String> },
    Literal { literal: String },
}

impl From<RawSelector> for SelectorAlternative {
    fn from(raw: RawSelector) -> Self {
        match raw {
            RawSelector::Css(s) => SelectorAlternative::Simple(s),
            RawSelector::Array(mut parts) if parts.len() == 2 => {
                let attr = parts.pop().unwrap_or_default();
                let sel = parts.pop().unwrap_or_default();
                SelectorAlternative::WithAttribute(sel, attr)
            }
            RawSelector::Array(parts) => SelectorAlternative::AllOf(parts),
            RawSelector::AllOf { all_of } => SelectorAlternative::AllOf(all_of),
            RawSelector::Literal { literal } => SelectorAlternative::Literal(literal),
        }
    }
}

/// A regex a field value must match to count as valid.
#[derive(Clone)]
pub struct FieldPattern(Regex);

impl FieldPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(FieldPattern)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPattern").field(&self.0.as_str()).finish()
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPattern::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Configuration for extracting a single field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    /// Alternatives tried in order.
    #[serde(default)]
    pub selectors: Vec<SelectorAlternative>,
    /// Return every match of the winning alternative instead of the first.
    #[serde(default)]
    pub allow_multiple: bool,
    /// Minimum length in characters for a value to count.
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum length in characters for a value to count.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Regex a value must match to count.
    #[serde(default)]
    pub pattern: Option<FieldPattern>,
}

impl FieldSpec {
    pub fn new(selectors: Vec<SelectorAlternative>) -> Self {
        Self {
            selectors,
            ..Default::default()
        }
    }

    pub fn allow_multiple(mut self, yes: bool) -> Self {
        self.allow_multiple = yes;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn pattern(mut self, pattern: FieldPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Returns true if a candidate value passes the length and pattern checks.
    pub fn accepts(&self, value: &str) -> bool {
        if value.trim().is_empty() {
            return false;
        }
        let len = value.chars().count();
        if self.min_length.is_some_and(|min| len < min) {
            return false;
        }
        if self.max_length.is_some_and(|max| len > max) {
            return false;
        }
        if let Some(ref pattern) = self.pattern {
            return pattern.is_match(value);
        }
        true
    }
}

/// Configuration for extracting the main content body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawContentFieldSpec")]
pub struct ContentFieldSpec {
    pub field: FieldSpec,
    /// Selectors whose matches are removed from the content.
    pub clean: Vec<String>,
    /// Transforms applied in declaration order, keyed by selector.
    pub transforms: IndexMap<String, Transform>,
    /// Run the generic cleaner after transforms and removals.
    pub default_cleaner: bool,
}

impl ContentFieldSpec {
    pub fn new(selectors: Vec<SelectorAlternative>) -> Self {
        Self {
            field: FieldSpec::new(selectors),
            clean: Vec::new(),
            transforms: IndexMap::new(),
            default_cleaner: true,
        }
    }

    pub fn clean<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clean.extend(selectors.into_iter().map(Into::into));
        self
    }

    pub fn transform(mut self, selector: impl Into<String>, transform: Transform) -> Self {
        self.transforms.insert(selector.into(), transform);
        self
    }

    pub fn default_cleaner(mut self, yes: bool) -> Self {
        self.default_cleaner = yes;
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct RawContentFieldSpec {
    #[serde(flatten)]
    field: FieldSpec,
    #[serde(default)]
    clean: Vec<String>,
    #[serde(default)]
    transforms: IndexMap<String, Transform>,
    #[serde(default = "default_true")]
    default_cleaner: bool,
}

impl From<RawContentFieldSpec> for ContentFieldSpec {
    fn from(raw: RawContentFieldSpec) -> Self {
        let mut field = raw.field;
        field.selectors = field
            .selectors
            .into_iter()
            .map(SelectorAlternative::into_content_alternative)
            .collect();
        Self {
            field,
            clean: raw.clean,
            transforms: raw.transforms,
            default_cleaner: raw.default_cleaner,
        }
    }
}

/// A complete rule set for one site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSet {
    /// Primary domain; the unique key in a registry.
    pub domain: String,
    /// Further hostnames that share this rule set.
    #[serde(default)]
    pub supported_domains: Vec<String>,
    #[serde(default)]
    pub title: Option<FieldSpec>,
    #[serde(default)]
    pub author: Option<FieldSpec>,
    #[serde(default)]
    pub date_published: Option<FieldSpec>,
    #[serde(default)]
    pub lead_image_url: Option<FieldSpec>,
    #[serde(default)]
    pub dek: Option<FieldSpec>,
    #[serde(default)]
    pub next_page_url: Option<FieldSpec>,
    #[serde(default)]
    pub excerpt: Option<FieldSpec>,
    #[serde(default)]
    pub content: Option<ContentFieldSpec>,
    /// Site-specific extra fields, reported in declaration order.
    #[serde(default)]
    pub extend: IndexMap<String, FieldSpec>,
}

impl RuleSet {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Looks up the spec for a standard metadata field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        match name {
            "title" => self.title.as_ref(),
            "author" => self.author.as_ref(),
            "date_published" => self.date_published.as_ref(),
            "lead_image_url" => self.lead_image_url.as_ref(),
            "dek" => self.dek.as_ref(),
            "next_page_url" => self.next_page_url.as_ref(),
            "excerpt" => self.excerpt.as_ref(),
            "content" => self.content.as_ref().map(|c| &c.field),
            _ => self.extend.get(name),
        }
    }

    /// Every CSS selector the rule set can query, for precompilation.
    pub fn selectors(&self) -> Vec<&str> {
        let fields = [
            &self.title,
            &self.author,
            &self.date_published,
            &self.lead_image_url,
            &self.dek,
            &self.next_page_url,
            &self.excerpt,
        ];
        let mut out: Vec<&str> = fields
            .into_iter()
            .flatten()
            .chain(self.extend.values())
            .flat_map(|f| f.selectors.iter().flat_map(|s| s.selectors()))
            .collect();
        if let Some(ref content) = self.content {
            out.extend(content.field.selectors.iter().flat_map(|s| s.selectors()));
            out.extend(content.clean.iter().map(String::as_str));
            out.extend(content.transforms.keys().map(String::as_str));
        }
        out
    }
}
