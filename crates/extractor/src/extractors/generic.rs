// ABOUTME: The built-in Generic rule set: meta-tag and common-markup selector lists for every metadata field.
// ABOUTME: Used when no site rule set matches and as the per-field fallback for site rule sets.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::extractors::rules::{FieldSpec, RuleSet, SelectorAlternative};

/// Domain key reported for the Generic rule set.
pub const GENERIC_DOMAIN: &str = "*";

const TITLE_META: &[&str] = &[
    "tweetmeme-title",
    "dc.title",
    "rbtitle",
    "headline",
    "og:title",
    "twitter:title",
];

const TITLE_SELECTORS: &[&str] = &[
    ".hentry .entry-title",
    "h1#articleHeader",
    "h1.articleHeader",
    "h1.article",
    ".instapaper_title",
    "article h1",
    ".entry-title",
    "#entry-title",
    ".articleTitle",
    "h1.title",
    "h1",
    "title",
];

const AUTHOR_META: &[&str] = &[
    "byl",
    "clmst",
    "dc.author",
    "dcsext.author",
    "dc.creator",
    "rbauthors",
    "authors",
    "author",
    "article:author",
];

const AUTHOR_SELECTORS: &[&str] = &[
    ".entry .entry-author",
    ".author.vcard .fn",
    ".author .vcard .fn",
    ".byline.vcard .fn",
    ".byline .vcard .fn",
    ".byline .by .author",
    ".byline .by",
    ".byline .author",
    ".post-author.vcard",
    ".post-author .vcard",
    "a[rel=author]",
    "#by_author",
    ".by_author",
    "#entryAuthor",
    ".entryAuthor",
    ".byline a[href*=author]",
    "#author .authorname",
    ".author .authorname",
    "#author",
    ".author",
    ".articleauthor",
    ".ArticleAuthor",
    ".byline",
    "[itemprop=author]",
];

const DATE_META: &[&str] = &[
    "article:published_time",
    "displaydate",
    "dc.date",
    "dc.date.issued",
    "rbpubdate",
    "publish_date",
    "pub_date",
    "pagedate",
    "pubdate",
    "revision_date",
    "doc_date",
    "date_created",
    "content_create_date",
    "lastupdate",
    "lastmodified",
    "pdate",
    "ptime",
    "date",
];

const DATE_ATTR_SELECTORS: &[(&str, &str)] = &[
    ("time[itemprop=datePublished]", "datetime"),
    ("[itemprop=datePublished]", "content"),
    ("time[pubdate]", "datetime"),
    ("abbr.published", "title"),
];

const DATE_SELECTORS: &[&str] = &[
    ".hentry .dtstamp.published",
    ".hentry .published",
    ".hentry .dtstamp.updated",
    ".hentry .updated",
    ".single .published",
    ".meta .published",
    ".meta .postDate",
    ".entry-date",
    ".byline .date",
    ".postmetadata .date",
    ".article_datetime",
    ".date-header",
    ".story-date",
    ".dateStamp",
    "#story .datetime",
    ".dateline",
    ".pubdate",
];

const LEAD_IMAGE_META: &[&str] = &["og:image", "twitter:image", "image_src"];

const EXCERPT_META: &[&str] = &["og:description", "twitter:description", "description"];

/// Maximum author length; longer matches are bylines swallowing whole paragraphs.
const AUTHOR_MAX_LENGTH: usize = 300;

static GENERIC_RULE_SET: Lazy<Arc<RuleSet>> = Lazy::new(|| Arc::new(build_generic()));

/// Shared handle to the Generic rule set.
pub fn generic_rule_set() -> Arc<RuleSet> {
    Arc::clone(&GENERIC_RULE_SET)
}

/// Returns true if the rule set is the built-in Generic one.
pub fn is_generic(rule_set: &Arc<RuleSet>) -> bool {
    Arc::ptr_eq(rule_set, &GENERIC_RULE_SET)
}

// Documents that skipped meta normalisation still carry `property`.
fn meta<'a>(names: &'a [&'a str]) -> impl Iterator<Item = SelectorAlternative> + 'a {
    names.iter().flat_map(|name| {
        ["name", "property"]
            .map(|key| SelectorAlternative::attr(format!("meta[{}=\"{}\"]", key, name), "value"))
    })
}

fn simple<'a>(selectors: &'a [&'a str]) -> impl Iterator<Item = SelectorAlternative> + 'a {
    selectors.iter().map(|s| SelectorAlternative::simple(*s))
}

fn build_generic() -> RuleSet {
    let title = FieldSpec::new(meta(TITLE_META).chain(simple(TITLE_SELECTORS)).collect());

    let author = FieldSpec::new(meta(AUTHOR_META).chain(simple(AUTHOR_SELECTORS)).collect())
        .max_length(AUTHOR_MAX_LENGTH);

    let date_published = FieldSpec::new(
        meta(DATE_META)
            .chain(
                DATE_ATTR_SELECTORS
                    .iter()
                    .map(|(sel, attr)| SelectorAlternative::attr(*sel, *attr)),
            )
            .chain(simple(DATE_SELECTORS))
            .collect(),
    );

    let lead_image_url = FieldSpec::new(
        meta(LEAD_IMAGE_META)
            .chain([
                SelectorAlternative::attr("link[rel=image_src]", "href"),
                SelectorAlternative::attr("article img", "src"),
            ])
            .collect(),
    );

    let next_page_url = FieldSpec::new(vec![
        SelectorAlternative::attr("link[rel=next]", "href"),
        SelectorAlternative::attr("a[rel=next]", "href"),
    ]);

    let excerpt = FieldSpec::new(meta(EXCERPT_META).collect());

    RuleSet {
        domain: GENERIC_DOMAIN.to_string(),
        title: Some(title),
        author: Some(author),
        date_published: Some(date_published),
        lead_image_url: Some(lead_image_url),
        next_page_url: Some(next_page_url),
        excerpt: Some(excerpt),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::compiled::precompile_selectors;

    #[test]
    fn generic_is_a_singleton() {
        let a = generic_rule_set();
        let b = generic_rule_set();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(is_generic(&a));
        assert!(!is_generic(&Arc::new(RuleSet::new("example.com"))));
    }

    #[test]
    fn generic_selectors_all_compile() {
        let generic = generic_rule_set();
        assert!(precompile_selectors(generic.selectors()).is_empty());
    }

    #[test]
    fn generic_has_no_content_or_dek() {
        let generic = generic_rule_set();
        assert!(generic.content.is_none());
        assert!(generic.dek.is_none());
        assert_eq!(generic.author.as_ref().unwrap().max_length, Some(300));
    }
}
