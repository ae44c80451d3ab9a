// ABOUTME: Rule-set registry keyed by domain, with alias domains and ordered content detectors.
// ABOUTME: Exposes the RuleSource trait the resolver consults; Registry is the in-memory implementation.

//! Registry of site rule sets.
//!
//! Each [`RuleSet`] is stored once behind an [`Arc`]; its primary domain and
//! every supported domain map to that same allocation. Detectors are kept in
//! registration order, which is the order the resolver probes them in.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::extractors::compiled::precompile_selectors;
use crate::extractors::rules::RuleSet;

/// A content-sniffing rule: if `probe` matches the document, `rule_set` applies.
#[derive(Debug, Clone)]
pub struct Detector {
    pub probe: String,
    pub rule_set: Arc<RuleSet>,
}

/// Where the resolver gets its rule sets from.
pub trait RuleSource: Send + Sync {
    /// The rule set registered for exactly this hostname, if any.
    fn lookup(&self, hostname: &str) -> Option<Arc<RuleSet>>;

    /// Content detectors in priority order.
    fn detectors(&self) -> Vec<Detector>;
}

/// In-memory rule-set store.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    map: HashMap<String, Arc<RuleSet>>,
    detectors: Vec<Detector>,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    rule_sets: Vec<RuleSet>,
    #[serde(default)]
    detectors: Vec<DetectorEntry>,
}

#[derive(Deserialize)]
struct DetectorEntry {
    selector: String,
    domain: String,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule set under its primary and supported domains.
    ///
    /// Registering a domain again replaces the earlier rule set under every
    /// key it held. An alias never displaces another rule set's primary domain.
    pub fn register(&mut self, rule_set: RuleSet) -> Arc<RuleSet> {
        let shared = Arc::new(rule_set);
        let primary = normalize_host(&shared.domain);
        let replaced = self
            .map
            .get(&primary)
            .filter(|existing| normalize_host(&existing.domain) == primary)
            .cloned();
        if let Some(old) = replaced {
            debug!(domain = %primary, "replacing registered rule set");
            self.map.retain(|_, rs| !Arc::ptr_eq(rs, &old));
            for detector in &mut self.detectors {
                if Arc::ptr_eq(&detector.rule_set, &old) {
                    detector.rule_set = Arc::clone(&shared);
                }
            }
        }
        self.map.insert(primary, Arc::clone(&shared));
        for alias in &shared.supported_domains {
            let alias = normalize_host(alias);
            let taken = self
                .map
                .get(&alias)
                .is_some_and(|existing| normalize_host(&existing.domain) == alias);
            if taken {
                debug!(alias = %alias, "alias shadows a primary domain; skipped");
                continue;
            }
            self.map.insert(alias, Arc::clone(&shared));
        }
        shared
    }

    /// Appends a detector that selects `rule_set` when `probe` matches.
    pub fn add_detector(&mut self, probe: impl Into<String>, rule_set: Arc<RuleSet>) {
        self.detectors.push(Detector {
            probe: probe.into(),
            rule_set,
        });
    }

    /// Appends a detector for a rule set that is already registered.
    pub fn register_detector(&mut self, probe: impl Into<String>, domain: &str) -> Result<()> {
        let rule_set = self
            .get(domain)
            .ok_or_else(|| ExtractError::registry(format!("detector targets unknown domain {}", domain)))?;
        self.add_detector(probe, rule_set);
        Ok(())
    }

    /// Looks up a rule set by hostname.
    pub fn get(&self, hostname: &str) -> Option<Arc<RuleSet>> {
        self.map.get(&normalize_host(hostname)).cloned()
    }

    /// Returns the number of registered domain mappings, aliases included.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no rule sets are registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Builds a registry from JSON of the form
    /// `{"rule_sets": [...], "detectors": [{"selector": .., "domain": ..}]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json)
            .map_err(|e| ExtractError::registry("malformed rule data").with_source(e.into()))?;

        let mut registry = Registry::new();
        for rule_set in file.rule_sets {
            if rule_set.domain.trim().is_empty() {
                return Err(ExtractError::registry("rule set without a domain"));
            }
            registry.register(rule_set);
        }
        for entry in file.detectors {
            registry.register_detector(entry.selector, &entry.domain)?;
        }
        Ok(registry)
    }

    /// Compiles every selector in the registry, returning those that failed.
    ///
    /// Failures are not fatal: the affected alternatives and detectors are
    /// skipped at extraction time.
    pub fn precompile(&self) -> Vec<String> {
        let mut selectors: Vec<&str> = self.map.values().flat_map(|rs| rs.selectors()).collect();
        selectors.extend(self.detectors.iter().map(|d| d.probe.as_str()));
        selectors.sort_unstable();
        selectors.dedup();
        precompile_selectors(selectors)
    }
}

impl RuleSource for Registry {
    fn lookup(&self, hostname: &str) -> Option<Arc<RuleSet>> {
        self.get(hostname)
    }

    fn detectors(&self) -> Vec<Detector> {
        self.detectors.clone()
    }
}

/// Lowercases a hostname and strips a trailing root dot.
pub fn normalize_host(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_ascii_lowercase()
}
