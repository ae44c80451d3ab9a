// ABOUTME: Process-wide cache of compiled CSS selectors shared by every rule set.
// ABOUTME: Invalid selectors are cached as failures and reported once as MalformedSelector.

//! Selector caching for repeated DOM queries.
//!
//! Rule tables repeat the same selectors across thousands of extractions, and
//! compiling a selector costs more than matching it. Compiled matchers are
//! kept for the life of the process; a selector that fails to compile is
//! remembered too, so the warning for it is logged only once.

use std::collections::HashMap;
use std::sync::RwLock;

use dom_query::Matcher;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::ExtractError;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Matcher>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector.
///
/// Returns `MalformedSelector` for selectors the matcher rejects; callers skip
/// the alternative that declared it and carry on.
pub fn get_or_compile(css: &str) -> Result<Matcher, ExtractError> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached
                .clone()
                .ok_or_else(|| ExtractError::malformed_selector(css));
        }
    }

    let compiled = Matcher::new(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    // another thread may have compiled it while we waited
    if let Some(cached) = cache.get(css) {
        return cached
            .clone()
            .ok_or_else(|| ExtractError::malformed_selector(css));
    }
    if compiled.is_none() {
        warn!(selector = css, "skipping malformed selector");
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled.ok_or_else(|| ExtractError::malformed_selector(css))
}

/// Compiles a batch of selectors into the cache and returns the ones that failed.
///
/// Called after a registry is built so that bad rule data is reported up
/// front instead of on the first page that exercises it.
pub fn precompile_selectors<I, S>(selectors: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut failed = Vec::new();
    for css in selectors {
        let css = css.as_ref();
        if get_or_compile(css).is_err() {
            failed.push(css.to_string());
        }
    }
    failed
}
