//! End-to-end decisions for a fixed rule set and URL corpus.

use std::sync::Arc;

use smartroute_rules::rule::{ProxyProtocol, ProxyServer, RuleRecord};
use smartroute_rules::{
    CompiledRuleSource, CompiledRuleType, DecisionEngine, MatchedRuleStatus, ProfileType, Route,
    RoutingConfig, RuleSetBuilder, ScriptEmitter, SmartProfile,
};

fn proxy(port: u16) -> Arc<ProxyServer> {
    Arc::new(ProxyServer::new(format!("p{port}"), "proxy.local", port, ProxyProtocol::Http))
}

fn builder() -> RuleSetBuilder {
    let mut builder = RuleSetBuilder::new();
    builder
        .add_whitelist([RuleRecord::from_source("intranet.example.com").with_id("w1")])
        .add_rules([
            RuleRecord::from_source("example.com").with_id("r1"),
            RuleRecord::from_pattern("*://*.test.org/*").with_id("r2"),
            RuleRecord::from_source("[").with_id("broken"),
            RuleRecord::from_source("disabled.net").with_id("off").disabled(),
            RuleRecord::from_source("video.net")
                .with_id("r3")
                .with_proxy(proxy(9000)),
        ])
        .add_whitelist_subscription([RuleRecord::from_source("cdn.net").with_id("sw1")])
        .add_subscription_rules([
            RuleRecord::from_source("cdn.net").with_id("s1"),
            RuleRecord::from_source("blocked.org").with_id("s2"),
        ]);
    builder
}

fn engine(profile_type: ProfileType) -> DecisionEngine {
    let profile = SmartProfile::new("main", profile_type)
        .with_rules(builder().build())
        .with_default_proxy(proxy(8080));
    DecisionEngine::new(RoutingConfig::new(profile))
}

#[test]
fn bare_host_matches_subdomains() {
    let engine = engine(ProfileType::SmartRules);
    let d = engine.decide("http://sub.example.com/a", Some("sub.example.com"));
    assert_eq!(d.directive(), "PROXY proxy.local:8080");
    assert_eq!(d.matched_rule.unwrap().rule_id, "r1");
}

#[test]
fn wildcard_host_pattern_is_anchored() {
    let engine = engine(ProfileType::SmartRules);
    let d = engine.decide("https://api.test.org/v1", None);
    let rule = d.matched_rule.unwrap();
    assert_eq!(rule.rule_id, "r2");
    assert_eq!(rule.rule_type, CompiledRuleType::RegexHost);

    let d = engine.decide("https://test.org.evil.com/", None);
    assert_eq!(d.route, Route::Direct);
    assert!(d.matched_rule.is_none());
}

#[test]
fn smart_rules_without_rules_is_direct() {
    let profile = SmartProfile::new("empty", ProfileType::SmartRules).with_default_proxy(proxy(8080));
    let engine = DecisionEngine::new(RoutingConfig::new(profile));
    for url in ["https://a.com/", "http://b.org:8080/x", "ftp://c.net/"] {
        assert_eq!(engine.decide(url, None).route, Route::Direct);
    }
}

#[test]
fn always_enabled_whitelist_is_direct() {
    let engine = engine(ProfileType::AlwaysEnabledBypassRules);
    let d = engine.decide("https://intranet.example.com/", None);
    assert_eq!(d.route, Route::Direct);
    assert_eq!(d.status, MatchedRuleStatus::Whitelisted);

    let d = engine.decide("https://unlisted.io/", None);
    assert_eq!(d.directive(), "PROXY proxy.local:8080");
}

#[test]
fn malformed_and_disabled_rules_are_dropped() {
    let set = builder().build();
    let rules: Vec<_> = set
        .tier(CompiledRuleSource::Rules)
        .iter()
        .map(|r| r.rule_id.as_str())
        .collect();
    assert_eq!(rules, ["r1", "r2", "r3"]);
    assert_eq!(set.summary().total(), 7);
}

#[test]
fn portless_proxy_degrades_to_direct() {
    let mut broken = ProxyServer::new("broken", "proxy.local", 8080, ProxyProtocol::Http);
    broken.port = None;
    let profile = SmartProfile::new("main", ProfileType::AlwaysEnabledBypassRules)
        .with_default_proxy(Arc::new(broken));
    let engine = DecisionEngine::new(RoutingConfig::new(profile));

    assert_eq!(engine.decide("https://a.com/", None).directive(), "DIRECT");
    let script = engine.emit_script(false).unwrap();
    assert!(script.contains(r#"var DEFAULT_ROUTE = "DIRECT";"#));
}

#[test]
fn tier_precedence() {
    let engine = engine(ProfileType::SmartRules);

    // Subscription whitelist beats subscription rules.
    let d = engine.decide("https://cdn.net/lib.js", None);
    assert_eq!(d.matched_rule.unwrap().rule_id, "sw1");
    assert_eq!(d.route, Route::Direct);

    // User rules beat subscription whitelist.
    let mut builder = builder();
    builder.add_rules([RuleRecord::from_source("cdn.net").with_id("r4")]);
    let profile = SmartProfile::new("main", ProfileType::SmartRules)
        .with_rules(builder.build())
        .with_default_proxy(proxy(8080));
    let engine = DecisionEngine::new(RoutingConfig::new(profile));
    let d = engine.decide("https://cdn.net/lib.js", None);
    assert_eq!(d.matched_rule.unwrap().rule_id, "r4");

    let d = engine.decide("https://blocked.org/", None);
    assert_eq!(d.matched_rule.as_ref().unwrap().source, CompiledRuleSource::SubscriptionRules);
    assert_eq!(d.directive(), "PROXY proxy.local:8080");
}

#[test]
fn compilation_is_deterministic() {
    let a = builder().build();
    let b = builder().build();
    assert_eq!(a, b);

    let first = engine(ProfileType::SmartRules);
    let second = engine(ProfileType::SmartRules);
    for url in ["https://video.net/", "https://x.test.org/", "https://other.com/"] {
        assert_eq!(first.decide(url, None), second.decide(url, None));
    }
}

#[test]
fn script_directives_agree_with_native_decisions() {
    let profile = SmartProfile::new("main", ProfileType::SmartRules)
        .with_rules(builder().build())
        .with_default_proxy(proxy(8080));
    let script = ScriptEmitter::new(&profile, None).emit();
    let engine = DecisionEngine::new(RoutingConfig::new(profile));

    // Each rule's baked directive is the native decision for a URL it matches.
    let corpus = [
        ("https://intranet.example.com/", r#""intranet.example.com", null, "#),
        ("https://example.com/", r#""example.com", null, "#),
        ("https://video.net/", r#""video.net", null, "#),
        ("https://blocked.org/", r#""blocked.org", null, "#),
    ];
    for (url, entry) in corpus {
        let directive = engine.decide(url, None).directive();
        let line = format!("{entry}\"{directive}\"],");
        assert!(script.contains(&line), "{url}: missing {line}");
    }
}
