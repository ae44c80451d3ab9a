// ABOUTME: Main library entry point for the digests article extractor.
// ABOUTME: Re-exports the public API: Extractor, ExtractorBuilder, ExtractOptions, ExtractResult, ExtractError, rule types.

//! Rule-driven article extraction.
//!
//! Given a parsed page and its URL, the crate picks a site rule set (by
//! hostname, base domain or content detector, falling back to a built-in
//! Generic one), runs each field's selectors, cleans the content through a
//! transform pipeline, and falls back to readability-style scoring when no
//! selector yields content.
//!
//! # Example
//!
//! ```no_run
//! use digests_extractor::{ExtractError, ExtractOptions, Extractor};
//!
//! fn main() -> Result<(), ExtractError> {
//!     let extractor = Extractor::new();
//!     let html = "<html><body><article><p>Hello</p></article></body></html>";
//!     let result = extractor.extract_html(html, "https://example.com/a", &ExtractOptions::default())?;
//!     println!("{}", result.content);
//!     Ok(())
//! }
//! ```

pub mod dom;
pub mod error;
pub mod extractor;
pub mod extractors;
pub mod options;
pub mod result;

pub use crate::dom::parse_document;
pub use crate::dom::scoring::ScoringConfig;
pub use crate::error::{ErrorCode, ExtractError, Result};
pub use crate::extractor::Extractor;
pub use crate::extractors::loader::{load_builtin_registry, load_registry_file};
pub use crate::extractors::registry::{Detector, Registry, RuleSource};
pub use crate::extractors::resolver::{MatchTier, ResolverConfig, RuleSetRef};
pub use crate::extractors::rules::{ContentFieldSpec, FieldSpec, RuleSet, SelectorAlternative};
pub use crate::extractors::transforms::{NodeMutator, Transform, TransformSpec};
pub use crate::options::{ExtractOptions, ExtractorBuilder};
pub use crate::result::{ExtractResult, FieldValue};
