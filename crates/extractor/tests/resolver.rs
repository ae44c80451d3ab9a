// ABOUTME: Integration tests for rule-set resolution, including the concurrent detector fan-out.
// ABOUTME: Checks tier priority, priority over completion order, deadline degradation and totality.

use std::sync::Arc;
use std::time::Duration;

use digests_extractor::extractors::resolver::{Resolver, ResolverConfig};
use digests_extractor::{parse_document, Extractor, MatchTier, Registry, RuleSet};

fn registry() -> Registry {
    let mut reg = Registry::new();
    let mut site = RuleSet::new("www.site.example");
    site.supported_domains = vec!["m.site.example".into()];
    reg.register(site);
    reg.register(RuleSet::new("base.example"));
    let first = reg.register(RuleSet::new("first.example"));
    let second = reg.register(RuleSet::new("second.example"));
    // first probe only matches near the end of the document
    reg.add_detector("p.end-marker", first);
    reg.add_detector("html", second);
    reg
}

fn resolver(max_workers: usize) -> Resolver {
    Resolver::new(
        Arc::new(registry()),
        ResolverConfig {
            max_workers,
            probe_timeout_ms: 10_000,
        },
    )
}

fn long_page(with_marker: bool) -> Arc<str> {
    let mut html = String::from("<html><body>");
    for i in 0..2_000 {
        html.push_str(&format!("<div class=\"row\"><span>{i}</span></div>"));
    }
    if with_marker {
        html.push_str(r#"<p class="end-marker">end</p>"#);
    }
    html.push_str("</body></html>");
    Arc::from(html.as_str())
}

#[test]
fn alias_domains_share_the_rule_set() {
    let r = resolver(2);
    let primary = r.resolve_host("www.site.example");
    let alias = r.resolve_host("M.Site.Example");
    assert_eq!(primary.tier, MatchTier::Hostname);
    assert_eq!(alias.tier, MatchTier::Hostname);
    assert!(Arc::ptr_eq(&primary.rule_set, &alias.rule_set));
}

#[test]
fn resolve_is_total() {
    let r = resolver(2);
    let doc = parse_document("<html><body></body></html>");
    for host in ["", ".", "...", "localhost", "127.0.0.1", "xn--bcher-kva.example", "a.b.c.d.e"] {
        let found = r.resolve(host, &doc);
        assert!(!found.domain().is_empty(), "host {:?}", host);
    }
    // "html" matches every parsed document, so the detector tier is reached
    assert_eq!(r.resolve("unknown.net", &doc).tier, MatchTier::Detector(1));
    assert_eq!(r.resolve_host("unknown.net").tier, MatchTier::Generic);
}

#[test]
fn base_domain_tier_sits_between_hostname_and_detectors() {
    let r = resolver(2);
    let doc = parse_document("<html></html>");
    let found = r.resolve("cdn.base.example", &doc);
    assert_eq!(found.tier, MatchTier::BaseDomain);
    assert_eq!(found.domain(), "base.example");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn higher_priority_hit_wins_even_when_slower() {
    let r = resolver(2);
    let html = long_page(true);
    for _ in 0..5 {
        let found = r.resolve_concurrent("unknown.net", Arc::clone(&html)).await;
        assert_eq!(found.tier, MatchTier::Detector(0));
        assert_eq!(found.domain(), "first.example");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lower_priority_hit_is_used_once_higher_ones_miss() {
    let r = resolver(2);
    let found = r.resolve_concurrent("unknown.net", long_page(false)).await;
    assert_eq!(found.tier, MatchTier::Detector(1));
}

#[tokio::test]
async fn single_worker_gives_the_same_winner() {
    let r = resolver(1);
    let found = r.resolve_concurrent("unknown.net", long_page(true)).await;
    assert_eq!(found.tier, MatchTier::Detector(0));
}

#[tokio::test]
async fn hostname_hit_skips_probing() {
    let r = resolver(2);
    let found = r
        .resolve_concurrent("www.site.example", long_page(true))
        .await;
    assert_eq!(found.tier, MatchTier::Hostname);
}

#[tokio::test]
async fn expired_deadline_degrades_to_generic() {
    let r = resolver(2);
    let found = r
        .resolve_concurrent_within("unknown.net", long_page(true), Duration::ZERO)
        .await;
    assert!(found.is_generic());
}

#[tokio::test]
async fn concurrent_and_sync_agree() {
    let r = resolver(4);
    let html = long_page(true);
    let doc = parse_document(&html);
    let sync = r.resolve("unknown.net", &doc);
    let concurrent = r.resolve_concurrent("unknown.net", html).await;
    assert_eq!(sync.tier, concurrent.tier);
    assert!(Arc::ptr_eq(&sync.rule_set, &concurrent.rule_set));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn builtin_meta_detectors_match_concurrently() {
    let ex = Extractor::new();
    let pages = [
        (
            r#"<html><head><meta property="al:ios:app_name" content="Medium"></head><body><h1>Post</h1></body></html>"#,
            "medium.com",
        ),
        (
            r#"<html><head><meta name="generator" content="blogger"></head><body><h1>Post</h1></body></html>"#,
            "blogger.com",
        ),
    ];
    for (html, domain) in pages {
        let doc = parse_document(html);
        let sync = ex.resolve("blog.custom-domain.io", &doc);
        let concurrent = ex
            .resolve_concurrent("blog.custom-domain.io", Arc::from(html))
            .await;
        assert_eq!(sync.domain(), domain);
        assert_eq!(concurrent.tier, sync.tier);
        assert!(Arc::ptr_eq(&sync.rule_set, &concurrent.rule_set));
    }
}
