// ABOUTME: Loader for rule-set registries from the embedded JSON table or a file on disk.
// ABOUTME: Provides load_builtin_registry() to initialize the default Registry.

//! Rule-set registry loader.
//!
//! The crate ships a small embedded rule table covering a few well-known
//! sites and the content detectors for hosted platforms. Larger tables can be
//! loaded from disk with [`load_registry_file`].

use std::path::Path;

use tracing::warn;

use crate::error::{ExtractError, Result};
use crate::extractors::registry::Registry;

/// Embedded JSON containing the builtin rule sets and detectors.
const BUILTIN_RULES_JSON: &str = include_str!("../../data/rules.json");

/// Loads the builtin registry from embedded JSON.
///
/// # Panics
///
/// Panics if the embedded JSON is malformed or cannot be deserialized.
pub fn load_builtin_registry() -> Registry {
    let registry = Registry::from_json(BUILTIN_RULES_JSON).expect("failed to parse builtin rules");
    for selector in registry.precompile() {
        warn!(selector = %selector, "builtin rule uses a malformed selector");
    }
    registry
}

/// Loads a registry from a JSON file.
pub fn load_registry_file(path: impl AsRef<Path>) -> Result<Registry> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        ExtractError::registry(format!("cannot read {}", path.display())).with_source(e.into())
    })?;
    let registry = Registry::from_json(&json)?;
    for selector in registry.precompile() {
        warn!(selector = %selector, path = %path.display(), "rule uses a malformed selector");
    }
    Ok(registry)
}
