// ABOUTME: Per-call ExtractOptions and the ExtractorBuilder for long-lived Extractor configuration.
// ABOUTME: ExtractorBuilder provides a fluent API over the rule source, scoring constants and resolver settings.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::dom::scoring::ScoringConfig;
use crate::extractor::Extractor;
use crate::extractors::fields::CONTENT;
use crate::extractors::registry::{Registry, RuleSource};
use crate::extractors::resolver::ResolverConfig;

/// Options for a single extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Extract only the content field; metadata fields stay empty.
    pub content_only: bool,
    /// Skip the rule set's content spec and go straight to scoring.
    pub force_fallback: bool,
    /// Fields returned as HTML rather than normalised text.
    pub html_fields: HashSet<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            content_only: false,
            force_fallback: false,
            html_fields: HashSet::from([CONTENT.to_string()]),
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_only(mut self, yes: bool) -> Self {
        self.content_only = yes;
        self
    }

    pub fn force_fallback(mut self, yes: bool) -> Self {
        self.force_fallback = yes;
        self
    }

    /// Return `field` as HTML (`true`) or as text (`false`).
    pub fn extract_html(mut self, field: impl Into<String>, yes: bool) -> Self {
        let field = field.into();
        if yes {
            self.html_fields.insert(field);
        } else {
            self.html_fields.remove(&field);
        }
        self
    }

    /// True if `field` should be returned as HTML.
    pub fn wants_html(&self, field: &str) -> bool {
        self.html_fields.contains(field)
    }
}

/// Builder for constructing Extractor instances with custom configuration.
#[derive(Clone, Default)]
pub struct ExtractorBuilder {
    pub(crate) source: Option<Arc<dyn RuleSource>>,
    pub(crate) scoring: ScoringConfig,
    pub(crate) resolver: ResolverConfig,
}

impl std::fmt::Debug for ExtractorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorBuilder")
            .field("custom_source", &self.source.is_some())
            .field("scoring", &self.scoring)
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl ExtractorBuilder {
    /// Create a new ExtractorBuilder using the builtin rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a registry instead of the builtin rules.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.source = Some(Arc::new(registry));
        self
    }

    /// Use any rule source instead of the builtin rules.
    pub fn rule_source(mut self, source: Arc<dyn RuleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the scoring constants.
    pub fn scoring(mut self, config: ScoringConfig) -> Self {
        self.scoring = config;
        self
    }

    /// Bound scoring time per document.
    pub fn scoring_budget(mut self, budget: Duration) -> Self {
        self.scoring.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    /// Set the concurrent resolver settings.
    pub fn resolver(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }

    /// Set the maximum number of detector probe workers.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.resolver.max_workers = workers;
        self
    }

    /// Set the deadline for concurrent detector probing.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.resolver.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Build the Extractor with the configured options.
    pub fn build(self) -> Extractor {
        Extractor::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_html_by_default() {
        let opts = ExtractOptions::default();
        assert!(opts.wants_html("content"));
        assert!(!opts.wants_html("title"));
        assert!(!opts.content_only);
        assert!(!opts.force_fallback);
    }

    #[test]
    fn html_fields_toggle() {
        let opts = ExtractOptions::new()
            .extract_html("content", false)
            .extract_html("kicker", true);
        assert!(!opts.wants_html("content"));
        assert!(opts.wants_html("kicker"));
    }

    #[test]
    fn builder_sets_resolver_and_scoring() {
        let builder = ExtractorBuilder::new()
            .max_workers(3)
            .probe_timeout(Duration::from_millis(250))
            .scoring_budget(Duration::from_millis(40));
        assert_eq!(builder.resolver.max_workers, 3);
        assert_eq!(builder.resolver.probe_timeout_ms, 250);
        assert_eq!(builder.scoring.time_budget_ms, Some(40));
        assert!(builder.source.is_none());
    }
}
