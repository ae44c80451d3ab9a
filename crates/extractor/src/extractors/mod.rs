// ABOUTME: Rule-driven extraction: rule types, registry, resolver, selector engine and content pipeline.
// ABOUTME: Also holds the Generic rule set and the derived-field helpers the Extractor assembles results with.

//! Extraction building blocks.
//!
//! Submodules:
//! - `rules`: declarative rule sets, field specs and selector alternatives.
//! - `registry` / `loader`: rule-set storage and the embedded rule table.
//! - `resolver`: picks the rule set for a page.
//! - `select`: resolves a field spec against a document.
//! - `content` / `transforms`: the transform and clean pipeline.
//! - `generic`: the fallback rule set.

pub mod compiled;
pub mod content;
pub mod fields;
pub mod generic;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod select;
pub mod transforms;
