// ABOUTME: Rule-set resolution: exact hostname, base domain, ordered content detectors, then Generic.
// ABOUTME: Offers a synchronous resolver and a concurrent one with bounded probe workers, a deadline and cancellation.

//! Choosing the rule set for a page.
//!
//! Priority, first hit wins:
//! 1. exact hostname
//! 2. base domain (last two dot-separated labels)
//! 3. content detectors, in registration order
//! 4. the built-in Generic rule set
//!
//! The concurrent variant runs detector probes on blocking workers, but the
//! winner is still picked by priority: a hit is accepted only once every
//! higher-priority probe has missed. [`ProbeMerge`] holds that rule.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dom_query::Document;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dom::parse_document;
use crate::error::ExtractError;
use crate::extractors::compiled::get_or_compile;
use crate::extractors::generic::{generic_rule_set, is_generic};
use crate::extractors::registry::{normalize_host, Detector, RuleSource};
use crate::extractors::rules::RuleSet;

/// Which resolution tier produced a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchTier {
    Hostname,
    BaseDomain,
    /// Index of the detector in registration order.
    Detector(usize),
    Generic,
}

/// A resolved rule set and how it was found.
#[derive(Debug, Clone)]
pub struct RuleSetRef {
    pub rule_set: Arc<RuleSet>,
    pub tier: MatchTier,
}

impl RuleSetRef {
    pub fn generic() -> Self {
        Self {
            rule_set: generic_rule_set(),
            tier: MatchTier::Generic,
        }
    }

    pub fn is_generic(&self) -> bool {
        self.tier == MatchTier::Generic || is_generic(&self.rule_set)
    }

    pub fn domain(&self) -> &str {
        &self.rule_set.domain
    }
}

/// Settings for the concurrent resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on probe workers.
    pub max_workers: usize,
    /// Deadline for the whole probe fan-out.
    pub probe_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            probe_timeout_ms: 2_000,
        }
    }
}

impl ResolverConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// The last two dot-separated labels of a hostname.
pub fn base_domain(hostname: &str) -> String {
    let host = normalize_host(hostname);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    labels[labels.len() - 2..].join(".")
}

/// How one detector probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Hit,
    Miss,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Hit,
    Miss,
}

/// Priority-ordered merge of probe outcomes.
///
/// Slot 0 has the highest priority. Outcomes may be recorded in any order;
/// [`ProbeMerge::winner`] only confirms a hit once every slot before it
/// has missed.
#[derive(Debug, Clone)]
pub struct ProbeMerge {
    slots: Vec<Slot>,
}

impl ProbeMerge {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![Slot::Pending; len],
        }
    }

    /// Record a probe result. Cancelled and timed-out probes count as misses.
    pub fn record(&mut self, index: usize, outcome: ProbeOutcome) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = match outcome {
                ProbeOutcome::Hit => Slot::Hit,
                _ => Slot::Miss,
            };
        }
    }

    /// The confirmed winner, if the outcome is already decided.
    pub fn winner(&self) -> Option<usize> {
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Hit => return Some(i),
                Slot::Miss => continue,
                Slot::Pending => return None,
            }
        }
        None
    }

    /// True once no slot is pending.
    pub fn is_settled(&self) -> bool {
        !self.slots.contains(&Slot::Pending)
    }

    /// Highest-priority completed hit, treating pending probes as elapsed.
    pub fn best_completed(&self) -> Option<usize> {
        self.slots.iter().position(|s| *s == Slot::Hit)
    }
}

/// Resolves hostnames and documents to rule sets.
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn RuleSource>,
    config: ResolverConfig,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("config", &self.config).finish()
    }
}

impl Resolver {
    pub fn new(source: Arc<dyn RuleSource>, config: ResolverConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Hostname and base-domain tiers, in priority order.
    fn host_candidates(&self, hostname: &str) -> Vec<(MatchTier, Option<Arc<RuleSet>>)> {
        let host = normalize_host(hostname);
        let base = base_domain(&host);
        let mut out = vec![(MatchTier::Hostname, self.source.lookup(&host))];
        if base != host {
            out.push((MatchTier::BaseDomain, self.source.lookup(&base)));
        }
        out
    }

    /// Resolution without a document: hostname, base domain, then Generic.
    pub fn resolve_host(&self, hostname: &str) -> RuleSetRef {
        let found = self
            .host_candidates(hostname)
            .into_iter()
            .find_map(|(tier, rs)| rs.map(|rule_set| RuleSetRef { rule_set, tier }))
            .unwrap_or_else(RuleSetRef::generic);
        debug!(hostname, tier = ?found.tier, domain = found.domain(), "resolved rule set");
        found
    }

    /// Full resolution, probing detectors against the document. Never fails.
    pub fn resolve(&self, hostname: &str, doc: &Document) -> RuleSetRef {
        let by_host = self.resolve_host(hostname);
        if !by_host.is_generic() {
            return by_host;
        }
        for (index, detector) in self.source.detectors().into_iter().enumerate() {
            let Ok(matcher) = get_or_compile(&detector.probe) else {
                continue;
            };
            if doc.select_matcher(&matcher).exists() {
                debug!(hostname, detector = index, domain = %detector.rule_set.domain, "detector matched");
                return RuleSetRef {
                    rule_set: detector.rule_set,
                    tier: MatchTier::Detector(index),
                };
            }
        }
        RuleSetRef::generic()
    }

    /// Concurrent resolution using the configured probe timeout.
    pub async fn resolve_concurrent(&self, hostname: &str, html: Arc<str>) -> RuleSetRef {
        self.resolve_concurrent_within(hostname, html, self.config.probe_timeout())
            .await
    }

    /// Concurrent resolution under an explicit deadline.
    ///
    /// Detector probes run on at most `max_workers` blocking workers, each
    /// parsing its own copy of `html`. On deadline expiry the best completed
    /// hit is used, else Generic.
    pub async fn resolve_concurrent_within(
        &self,
        hostname: &str,
        html: Arc<str>,
        deadline: Duration,
    ) -> RuleSetRef {
        let mut candidates: Vec<(MatchTier, Arc<RuleSet>)> = Vec::new();
        let mut merge_slots: Vec<Option<bool>> = Vec::new();
        for (tier, found) in self.host_candidates(hostname) {
            merge_slots.push(Some(found.is_some()));
            candidates.push((tier, found.unwrap_or_else(generic_rule_set)));
        }
        let detectors: Arc<Vec<Detector>> = Arc::new(self.source.detectors());
        let first_detector = candidates.len();
        for (i, d) in detectors.iter().enumerate() {
            merge_slots.push(None);
            candidates.push((MatchTier::Detector(i), Arc::clone(&d.rule_set)));
        }

        let mut merge = ProbeMerge::new(candidates.len());
        for (i, settled) in merge_slots.iter().enumerate() {
            if let Some(hit) = settled {
                merge.record(i, if *hit { ProbeOutcome::Hit } else { ProbeOutcome::Miss });
            }
        }
        if let Some(i) = merge.winner() {
            return pick(hostname, &candidates, i);
        }

        let started = Instant::now();
        let probe_deadline = started + deadline;
        let token = CancellationToken::new();
        let workers = detectors.len().min(self.config.max_workers.max(1));
        let (tx, mut rx) = mpsc::channel::<(usize, ProbeOutcome)>(detectors.len().max(1));
        let next = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let html = Arc::clone(&html);
            let detectors = Arc::clone(&detectors);
            let next = Arc::clone(&next);
            let token = token.child_token();
            let tx = tx.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                probe_worker(&html, &detectors, &next, &token, probe_deadline, &tx)
            }));
        }
        drop(tx);

        let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(probe_deadline));
        tokio::pin!(sleep);
        let mut timed_out = false;
        loop {
            if merge.winner().is_some() || merge.is_settled() {
                break;
            }
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some((i, outcome)) => merge.record(first_detector + i, outcome),
                    None => break,
                },
                _ = &mut sleep => {
                    timed_out = true;
                    break;
                }
            }
        }
        token.cancel();

        let chosen = if timed_out {
            let err = ExtractError::timeout(
                "ResolveConcurrent",
                format!("{} probes after {:?}", detectors.len(), started.elapsed()),
            );
            warn!(hostname, error = %err, "probe deadline elapsed; using best completed hit");
            merge.best_completed()
        } else {
            // workers see the cancelled token at their next node visit
            futures::future::join_all(handles).await;
            merge.winner()
        };
        match chosen {
            Some(i) => pick(hostname, &candidates, i),
            None => RuleSetRef::generic(),
        }
    }
}

fn pick(hostname: &str, candidates: &[(MatchTier, Arc<RuleSet>)], index: usize) -> RuleSetRef {
    let (tier, rule_set) = &candidates[index];
    debug!(hostname, tier = ?tier, domain = %rule_set.domain, "resolved rule set concurrently");
    RuleSetRef {
        rule_set: Arc::clone(rule_set),
        tier: *tier,
    }
}

/// Pull detector indices off the shared counter until none remain or the
/// token is cancelled. The document is parsed on first use.
fn probe_worker(
    html: &str,
    detectors: &[Detector],
    next: &AtomicUsize,
    token: &CancellationToken,
    deadline: Instant,
    tx: &mpsc::Sender<(usize, ProbeOutcome)>,
) {
    let mut doc: Option<Document> = None;
    loop {
        if token.is_cancelled() {
            return;
        }
        let index = next.fetch_add(1, Ordering::SeqCst);
        let Some(detector) = detectors.get(index) else {
            return;
        };
        let doc = doc.get_or_insert_with(|| parse_document(html));
        let outcome = run_probe(doc, &detector.probe, token, deadline);
        if tx.blocking_send((index, outcome)).is_err() {
            return;
        }
    }
}

/// Match one probe selector, checking cancellation and the deadline between node visits.
pub fn run_probe(
    doc: &Document,
    probe: &str,
    token: &CancellationToken,
    deadline: Instant,
) -> ProbeOutcome {
    let Ok(matcher) = get_or_compile(probe) else {
        return ProbeOutcome::Miss;
    };
    for node in doc.root().descendants() {
        if token.is_cancelled() {
            return ProbeOutcome::Cancelled;
        }
        if Instant::now() >= deadline {
            return ProbeOutcome::TimedOut;
        }
        if node.is_element() && node.is_match(&matcher) {
            return ProbeOutcome::Hit;
        }
    }
    ProbeOutcome::Miss
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::registry::Registry;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(RuleSet {
            domain: "www.example.com".into(),
            ..Default::default()
        });
        reg.register(RuleSet {
            domain: "example.org".into(),
            ..Default::default()
        });
        let medium = reg.register(RuleSet::new("medium.com"));
        let blogger = reg.register(RuleSet::new("blogger.com"));
        reg.add_detector(r#"meta[name="generator"][value="blogger"]"#, blogger);
        reg.add_detector(r#"meta[name="al:ios:app_name"][value="Medium"]"#, medium);
        reg
    }

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(registry()), ResolverConfig::default())
    }

    #[test]
    fn base_domain_takes_last_two_labels() {
        assert_eq!(base_domain("a.b.example.co"), "example.co");
        assert_eq!(base_domain("Example.com."), "example.com");
        assert_eq!(base_domain("localhost"), "localhost");
    }

    #[test]
    fn exact_then_base_then_generic() {
        let r = resolver();
        assert_eq!(r.resolve_host("www.example.com").tier, MatchTier::Hostname);
        let by_base = r.resolve_host("blog.example.org");
        assert_eq!(by_base.tier, MatchTier::BaseDomain);
        assert_eq!(by_base.domain(), "example.org");
        assert!(r.resolve_host("unknown.net").is_generic());
        assert!(r.resolve_host("").is_generic());
    }

    #[test]
    fn detectors_follow_registration_order() {
        let r = resolver();
        let doc = Document::from(
            r#"<html><head>
            <meta name="al:ios:app_name" value="Medium">
            <meta name="generator" value="blogger">
            </head></html>"#,
        );
        let found = r.resolve("custom-blog.net", &doc);
        assert_eq!(found.tier, MatchTier::Detector(0));
        assert_eq!(found.domain(), "blogger.com");
    }

    #[test]
    fn hostname_beats_detectors() {
        let r = resolver();
        let doc = Document::from(r#"<meta name="generator" value="blogger">"#);
        assert_eq!(r.resolve("www.example.com", &doc).tier, MatchTier::Hostname);
    }

    #[test]
    fn malformed_detector_is_skipped() {
        let mut reg = Registry::new();
        let target = reg.register(RuleSet::new("medium.com"));
        reg.add_detector("meta[[[", Arc::clone(&target));
        reg.add_detector("article", target);
        let r = Resolver::new(Arc::new(reg), ResolverConfig::default());
        let doc = Document::from("<article>x</article>");
        assert_eq!(r.resolve("x.net", &doc).tier, MatchTier::Detector(1));
    }

    #[test]
    fn merge_waits_for_higher_priority() {
        let mut merge = ProbeMerge::new(3);
        merge.record(2, ProbeOutcome::Hit);
        assert_eq!(merge.winner(), None);
        merge.record(0, ProbeOutcome::Miss);
        assert_eq!(merge.winner(), None);
        merge.record(1, ProbeOutcome::Hit);
        assert_eq!(merge.winner(), Some(1));
    }

    #[test]
    fn merge_treats_timeouts_as_misses() {
        let mut merge = ProbeMerge::new(3);
        merge.record(0, ProbeOutcome::TimedOut);
        merge.record(1, ProbeOutcome::Cancelled);
        merge.record(2, ProbeOutcome::Hit);
        assert_eq!(merge.winner(), Some(2));
        assert!(merge.is_settled());
    }

    #[test]
    fn best_completed_ignores_pending() {
        let mut merge = ProbeMerge::new(3);
        merge.record(2, ProbeOutcome::Hit);
        assert_eq!(merge.winner(), None);
        assert_eq!(merge.best_completed(), Some(2));
        assert!(!merge.is_settled());
    }

    #[test]
    fn cancelled_probe_stops() {
        let doc = Document::from("<div><p>a</p></div>");
        let token = CancellationToken::new();
        token.cancel();
        let far = Instant::now() + Duration::from_secs(60);
        assert_eq!(run_probe(&doc, "p", &token, far), ProbeOutcome::Cancelled);

        let live = CancellationToken::new();
        assert_eq!(run_probe(&doc, "p", &live, far), ProbeOutcome::Hit);
        assert_eq!(run_probe(&doc, "table", &live, far), ProbeOutcome::Miss);
        assert_eq!(run_probe(&doc, "p", &live, Instant::now()), ProbeOutcome::TimedOut);
    }
}
