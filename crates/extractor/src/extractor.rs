// ABOUTME: The Extractor: resolves a rule set for a page and drives every field through selection, cleaning and scoring.
// ABOUTME: Always assembles the fixed ExtractResult field set; only a bad URL to extract_html is an error.

use std::sync::Arc;

use dom_query::Document;
use indexmap::IndexMap;
use tracing::{debug, warn};
use url::Url;

use crate::dom::parse_document;
use crate::dom::scoring::{extract_main_content, ScoringConfig};
use crate::error::{ExtractError, Result};
use crate::extractors::content::{self, Pipeline};
use crate::extractors::fields::{
    self, content_text, detect_direction, excerpt_from_text, resolve_next_page, resolve_url,
    word_count,
};
use crate::extractors::generic::generic_rule_set;
use crate::extractors::loader::load_builtin_registry;
use crate::extractors::resolver::{Resolver, RuleSetRef};
use crate::extractors::rules::RuleSet;
use crate::extractors::select::{select_field, select_first};
use crate::options::{ExtractOptions, ExtractorBuilder};
use crate::result::{ExtractResult, FieldValue};

/// Resolution state of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    TryRuleSet,
    TryGeneric,
    Done,
}

/// Long-lived extraction engine: a rule source, scoring constants and resolver settings.
#[derive(Debug, Clone)]
pub struct Extractor {
    resolver: Resolver,
    scoring: ScoringConfig,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Create a new ExtractorBuilder.
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    /// An extractor over the builtin rules with default settings.
    pub fn new() -> Self {
        ExtractorBuilder::new().build()
    }

    pub(crate) fn from_builder(builder: ExtractorBuilder) -> Self {
        let source = builder
            .source
            .unwrap_or_else(|| Arc::new(load_builtin_registry()));
        Self {
            resolver: Resolver::new(source, builder.resolver),
            scoring: builder.scoring,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Pick the rule set for a page, probing detectors against the document.
    pub fn resolve(&self, hostname: &str, doc: &Document) -> RuleSetRef {
        self.resolver.resolve(hostname, doc)
    }

    /// Pick the rule set from the hostname alone.
    pub fn resolve_host(&self, hostname: &str) -> RuleSetRef {
        self.resolver.resolve_host(hostname)
    }

    /// Pick the rule set, running detector probes concurrently.
    pub async fn resolve_concurrent(&self, hostname: &str, html: Arc<str>) -> RuleSetRef {
        self.resolver.resolve_concurrent(hostname, html).await
    }

    /// Parse, resolve and extract in one call.
    ///
    /// Fails only when `url` is empty or malformed.
    pub fn extract_html(
        &self,
        html: &str,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<ExtractResult> {
        if url.trim().is_empty() {
            return Err(ExtractError::invalid_url(url, "ExtractHTML"));
        }
        let page = Url::parse(url).map_err(|e| {
            ExtractError::invalid_url(url, "ExtractHTML").with_source(anyhow::Error::new(e))
        })?;
        let doc = parse_document(html);
        let rule_set = self.resolve(page.host_str().unwrap_or_default(), &doc);
        Ok(self.extract(&doc, &page, &rule_set, options))
    }

    /// Extract every field of a parsed page with the given rule set.
    ///
    /// The document is only read; content processing runs on private copies.
    /// Empty fields are reported as empty, never as errors.
    pub fn extract(
        &self,
        doc: &Document,
        url: &Url,
        rule_set: &RuleSetRef,
        options: &ExtractOptions,
    ) -> ExtractResult {
        let domain = url
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .unwrap_or_default();
        let rules = &rule_set.rule_set;

        let mut result = ExtractResult {
            url: url.to_string(),
            domain,
            ..Default::default()
        };

        if !options.content_only {
            let field = |name: &str| self.select_metadata(doc, rules, name, options);
            result.title = field(fields::TITLE).unwrap_or_default();
            result.author = field(fields::AUTHOR);
            result.date_published = field(fields::DATE_PUBLISHED);
            result.lead_image_url =
                field(fields::LEAD_IMAGE_URL).and_then(|v| resolve_url(url, &v));
            result.dek = field(fields::DEK);
            result.next_page_url =
                field(fields::NEXT_PAGE_URL).and_then(|v| resolve_next_page(url, &v));
            result.excerpt = field(fields::EXCERPT);
        }
        result.extended = self.extract_extended(doc, rules, options);

        let content_html = self.extract_content(doc, rule_set, url, options);
        let text = content_text(&content_html);
        if !options.content_only && result.excerpt.is_none() {
            result.excerpt = excerpt_from_text(&text);
        }
        result.word_count = word_count(&text);
        result.direction = detect_direction(doc, &format!("{} {}", result.title, text));
        result.content = if options.wants_html(fields::CONTENT) {
            content_html
        } else {
            text
        };

        debug!(
            url = %result.url,
            rule_set = rule_set.domain(),
            tier = ?rule_set.tier,
            words = result.word_count,
            empty = result.is_empty(),
            "extracted page"
        );
        result
    }

    /// Runs one metadata field through the site rule set, then the Generic one.
    fn select_metadata(
        &self,
        doc: &Document,
        rules: &Arc<RuleSet>,
        name: &str,
        options: &ExtractOptions,
    ) -> Option<String> {
        let html = options.wants_html(name);
        let generic = generic_rule_set();
        let mut state = FieldState::TryRuleSet;
        loop {
            state = match state {
                FieldState::TryRuleSet => {
                    let found = rules
                        .field(name)
                        .and_then(|spec| select_first(doc, spec, html));
                    if found.is_some() {
                        return found;
                    }
                    if Arc::ptr_eq(rules, &generic) {
                        FieldState::Done
                    } else {
                        FieldState::TryGeneric
                    }
                }
                FieldState::TryGeneric => {
                    let found = generic
                        .field(name)
                        .and_then(|spec| select_first(doc, spec, html));
                    if found.is_some() {
                        return found;
                    }
                    FieldState::Done
                }
                FieldState::Done => {
                    let err = ExtractError::empty_field(name);
                    debug!(rule_set = %rules.domain, error = %err, "field left empty");
                    return None;
                }
            };
        }
    }

    /// Every declared extended field, in declaration order.
    fn extract_extended(
        &self,
        doc: &Document,
        rules: &RuleSet,
        options: &ExtractOptions,
    ) -> IndexMap<String, Option<FieldValue>> {
        rules
            .extend
            .iter()
            .map(|(name, spec)| {
                let value = if options.content_only {
                    None
                } else {
                    select_field(doc, spec, options.wants_html(name))
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Site content spec first; scoring when it yields nothing, is skipped,
    /// or the rule set is Generic.
    fn extract_content(
        &self,
        doc: &Document,
        rule_set: &RuleSetRef,
        url: &Url,
        options: &ExtractOptions,
    ) -> String {
        let spec = rule_set.rule_set.content.as_ref();
        if !options.force_fallback && !rule_set.is_generic() {
            if let Some(html) = spec.and_then(|s| content::extract_content(doc, s, Some(url))) {
                return html;
            }
            debug!(rule_set = rule_set.domain(), "site content empty; scoring");
        }

        match extract_main_content(doc, &self.scoring) {
            Ok(Some(html)) => {
                let pipeline = match spec {
                    Some(s) => Pipeline::from_spec(s, Some(url)).with_default_cleaner(true),
                    None => Pipeline::generic(Some(url)),
                };
                pipeline.process(&html)
            }
            Ok(None) => {
                let err = ExtractError::not_found("ScoreContent");
                debug!(url = %url, error = %err, "no content found");
                String::new()
            }
            Err(err) => {
                warn!(url = %url, error = %err, "content scoring abandoned");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::registry::Registry;
    use crate::extractors::resolver::MatchTier;
    use crate::extractors::rules::{ContentFieldSpec, FieldSpec, SelectorAlternative};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const ARTICLE: &str = r#"<html><head>
        <title>Page Title</title>
        <meta property="og:title" content="OG Title">
        <meta name="author" content="Jane Roe">
        <meta property="og:image" content="/img/lead.jpg">
        </head><body>
        <nav><a href="/">Home</a> <a href="/news">News</a></nav>
        <article>
        <h1>Headline</h1>
        <p>First paragraph of the story, which runs long enough to be scored, with commas.</p>
        <p>Second paragraph of the story, also long enough to count toward the score.</p>
        </article>
        <a rel="next" href="?page=2">Next</a>
        </body></html>"#;

    fn extractor_with(rule_set: RuleSet) -> Extractor {
        let mut reg = Registry::new();
        reg.register(rule_set);
        Extractor::builder().registry(reg).build()
    }

    fn url() -> Url {
        Url::parse("https://site.example/story").unwrap()
    }

    #[test]
    fn generic_fills_metadata_and_scores_content() {
        let ex = extractor_with(RuleSet::new("other.example"));
        let doc = parse_document(ARTICLE);
        let rs = ex.resolve("site.example", &doc);
        assert_eq!(rs.tier, MatchTier::Generic);

        let result = ex.extract(&doc, &url(), &rs, &ExtractOptions::default());
        assert_eq!(result.title, "OG Title");
        assert_eq!(result.author.as_deref(), Some("Jane Roe"));
        assert_eq!(result.lead_image_url.as_deref(), Some("https://site.example/img/lead.jpg"));
        assert_eq!(
            result.next_page_url.as_deref(),
            Some("https://site.example/story?page=2")
        );
        assert!(result.content.contains("First paragraph"));
        assert!(!result.content.contains("Home"));
        assert_eq!(result.domain, "site.example");
        assert_eq!(result.direction, "ltr");
        assert!(result.word_count > 20);
        assert!(result.excerpt.unwrap().contains("First paragraph"));
    }

    #[test]
    fn site_field_wins_then_generic_fills_gaps() {
        let mut rs = RuleSet::new("site.example");
        rs.title = Some(FieldSpec::new(vec![SelectorAlternative::simple("h1")]));
        let ex = extractor_with(rs);
        let doc = parse_document(ARTICLE);
        let resolved = ex.resolve("site.example", &doc);
        assert_eq!(resolved.tier, MatchTier::Hostname);

        let result = ex.extract(&doc, &url(), &resolved, &ExtractOptions::default());
        assert_eq!(result.title, "Headline");
        assert_eq!(result.author.as_deref(), Some("Jane Roe"));
    }

    #[test]
    fn site_content_spec_is_used_unless_forced() {
        let mut rs = RuleSet::new("site.example");
        rs.content = Some(
            ContentFieldSpec::new(vec![SelectorAlternative::simple("article")]).clean(["h1"]),
        );
        let ex = extractor_with(rs);
        let doc = parse_document(ARTICLE);
        let resolved = ex.resolve_host("site.example");

        let site = ex.extract(&doc, &url(), &resolved, &ExtractOptions::default());
        assert!(site.content.starts_with("<article>"), "{}", site.content);
        assert!(!site.content.contains("Headline"));

        let forced = ex.extract(
            &doc,
            &url(),
            &resolved,
            &ExtractOptions::new().force_fallback(true),
        );
        assert!(forced.content.contains("First paragraph"));
        // site clean list still applies to scored content
        assert!(!forced.content.contains("Headline"));
    }

    #[test]
    fn content_only_leaves_metadata_empty() {
        let mut rs = RuleSet::new("site.example");
        rs.extend.insert(
            "kicker".into(),
            FieldSpec::new(vec![SelectorAlternative::simple("h1")]),
        );
        let ex = extractor_with(rs);
        let doc = parse_document(ARTICLE);
        let resolved = ex.resolve_host("site.example");
        let result = ex.extract(
            &doc,
            &url(),
            &resolved,
            &ExtractOptions::new().content_only(true),
        );
        assert_eq!(result.title, "");
        assert_eq!(result.author, None);
        assert_eq!(result.excerpt, None);
        assert_eq!(result.extended.get("kicker"), Some(&None));
        assert!(result.content.contains("First paragraph"));
    }

    #[test]
    fn content_as_text_when_requested() {
        let ex = extractor_with(RuleSet::new("other.example"));
        let doc = parse_document(ARTICLE);
        let rs = ex.resolve_host("site.example");
        let result = ex.extract(
            &doc,
            &url(),
            &rs,
            &ExtractOptions::new().extract_html("content", false),
        );
        assert!(!result.content.contains('<'));
        assert!(result.content.contains("First paragraph"));
    }

    #[test]
    fn nothing_found_gives_empty_fields() {
        let ex = extractor_with(RuleSet::new("other.example"));
        let doc = parse_document("<html><body><script>x()</script></body></html>");
        let rs = ex.resolve("site.example", &doc);
        let result = ex.extract(&doc, &url(), &rs, &ExtractOptions::default());
        assert_eq!(result.title, "");
        assert_eq!(result.content, "");
        assert_eq!(result.excerpt, None);
        assert_eq!(result.word_count, 0);
        assert_eq!(result.direction, "ltr");
    }

    #[test]
    fn unnormalised_meta_still_reaches_generic_fields() {
        let ex = extractor_with(RuleSet::new("other.example"));
        let doc = Document::from(ARTICLE);
        let rs = ex.resolve_host("site.example");
        let result = ex.extract(&doc, &url(), &rs, &ExtractOptions::default());
        assert_eq!(result.title, "OG Title");
        assert_eq!(result.lead_image_url.as_deref(), Some("https://site.example/img/lead.jpg"));
        assert_eq!(result.author.as_deref(), Some("Jane Roe"));
    }

    #[test]
    fn scoring_timeout_leaves_content_empty() {
        let ex = Extractor::builder()
            .registry(Registry::new())
            .scoring_budget(Duration::ZERO)
            .build();
        let doc = parse_document(ARTICLE);
        let rs = ex.resolve_host("site.example");
        let result = ex.extract(&doc, &url(), &rs, &ExtractOptions::default());
        assert_eq!(result.content, "");
        assert_eq!(result.word_count, 0);
        assert_eq!(result.title, "OG Title");
        assert_eq!(result.author.as_deref(), Some("Jane Roe"));
        assert_eq!(
            result.next_page_url.as_deref(),
            Some("https://site.example/story?page=2")
        );
    }

    #[test]
    fn extract_html_rejects_bad_urls() {
        let ex = extractor_with(RuleSet::new("other.example"));
        let opts = ExtractOptions::default();
        assert!(ex.extract_html(ARTICLE, "", &opts).unwrap_err().is_invalid_url());
        assert!(ex.extract_html(ARTICLE, "not a url", &opts).unwrap_err().is_invalid_url());
        assert!(ex.extract_html(ARTICLE, "https://site.example/a", &opts).is_ok());
    }
}
