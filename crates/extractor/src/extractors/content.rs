// ABOUTME: Transform/clean pipeline applied to content fragments on a private working document.
// ABOUTME: Runs declared transforms in order, prunes clean-list matches, then the optional generic cleaner.

//! Content extraction and post-processing.
//!
//! Key behaviors:
//! - Content nodes are serialized out of the source document and re-parsed
//!   into a working document, so the source is never mutated.
//! - Transforms run in declaration order. Each one re-queries the live tree,
//!   so a rename can expose or hide matches for a later selector.
//! - Clean selectors run after every transform.
//! - The generic cleaner runs last and also normalizes whitespace.
//! - A failing transform is logged and skipped; the rest still run.

use dom_query::{Document, Selection};
use indexmap::IndexMap;
use tracing::{debug, warn};
use url::Url;

use crate::dom::cleaners::{clean_content, normalize_html_whitespace};
use crate::dom::{body_inner_html, fragment_document, normalize_spaces};
use crate::error::ExtractError;
use crate::extractors::compiled::get_or_compile;
use crate::extractors::rules::ContentFieldSpec;
use crate::extractors::select::select_content_nodes;
use crate::extractors::transforms::Transform;

/// The post-processing steps for one content field.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    pub transforms: Option<&'a IndexMap<String, Transform>>,
    pub clean: &'a [String],
    pub default_cleaner: bool,
    pub base_url: Option<&'a Url>,
}

impl<'a> Pipeline<'a> {
    /// The steps declared by a content spec.
    pub fn from_spec(spec: &'a ContentFieldSpec, base_url: Option<&'a Url>) -> Self {
        Self {
            transforms: Some(&spec.transforms),
            clean: &spec.clean,
            default_cleaner: spec.default_cleaner,
            base_url,
        }
    }

    /// Only the generic cleaner.
    pub fn generic(base_url: Option<&'a Url>) -> Self {
        Self {
            transforms: None,
            clean: &[],
            default_cleaner: true,
            base_url,
        }
    }

    pub fn with_default_cleaner(mut self, yes: bool) -> Self {
        self.default_cleaner = yes;
        self
    }

    /// Runs the pipeline over an HTML fragment and returns the serialized result.
    pub fn process(&self, fragment: &str) -> String {
        let doc = fragment_document(fragment);
        self.process_document(&doc);
        let html = body_inner_html(&doc);
        if self.default_cleaner {
            normalize_html_whitespace(&html)
        } else {
            html.trim().to_string()
        }
    }

    /// Runs the pipeline in place over a working document's body.
    pub fn process_document(&self, doc: &Document) {
        if let Some(transforms) = self.transforms {
            apply_transforms(doc, transforms);
        }
        apply_clean(doc, self.clean);
        if self.default_cleaner {
            clean_content(doc, self.base_url);
        }
    }
}

fn apply_transforms(doc: &Document, transforms: &IndexMap<String, Transform>) {
    let body = doc.select("body");
    for (css, transform) in transforms {
        let Ok(matcher) = get_or_compile(css) else {
            continue;
        };
        let targets = body.select_matcher(&matcher).nodes().to_vec();
        // innermost first, so nested matches survive outer replacements
        for node in targets.into_iter().rev() {
            let target = Selection::from(node);
            if let Err(err) = transform.apply(&target) {
                let err = ExtractError::transform(css.as_str(), err.detail);
                warn!(transform = transform.label(), error = %err, "transform failed on node");
                continue;
            }
        }
    }
}

fn apply_clean(doc: &Document, clean: &[String]) {
    let body = doc.select("body");
    for css in clean {
        if let Ok(matcher) = get_or_compile(css) {
            body.select_matcher(&matcher).remove();
        }
    }
}

/// Selects content with a site spec and runs its pipeline.
///
/// Returns `None` when no alternative matches or the processed content has
/// no text and no media left.
pub fn extract_content(
    doc: &Document,
    spec: &ContentFieldSpec,
    base_url: Option<&Url>,
) -> Option<String> {
    let fragments = select_content_nodes(doc, &spec.field)?;
    let fragment = join_fragments(fragments);
    let processed = Pipeline::from_spec(spec, base_url).process(&fragment);
    if is_blank_content(&processed) {
        debug!("site content selector matched but nothing survived cleaning");
        return None;
    }
    Some(processed)
}

/// One fragment stays as is; several are wrapped in a single `<div>`.
pub fn join_fragments(mut fragments: Vec<String>) -> String {
    if fragments.len() == 1 {
        return fragments.pop().unwrap_or_default();
    }
    format!("<div>{}</div>", fragments.concat())
}

/// Returns true if serialized content has neither text nor media.
pub fn is_blank_content(html: &str) -> bool {
    if html.trim().is_empty() {
        return true;
    }
    let doc = fragment_document(html);
    let body = doc.select("body");
    normalize_spaces(&body.text()).is_empty() && !body.select("img, video, iframe, picture").exists()
}
