//! The emitted decision script, run in a JavaScript engine, must return
//! the directive of the native decision for every request.

use std::sync::Arc;

use boa_engine::{Context, Source};
use smartroute_rules::rule::{ProxyProtocol, ProxyServer, RuleKind, RuleRecord};
use smartroute_rules::{
    DecisionEngine, ProfileType, RoutingConfig, RuleSetBuilder, SmartProfile, SpecialAction,
};

const URLS: &[&str] = &[
    // Exact
    "https://exact.example/page",
    "HTTPS://EXACT.EXAMPLE/PAGE",
    "https://exact.example/page2",
    // RegexUrl
    "http://site.test/ads/123",
    "http://user@site.test/ads/9",
    "http://site.test/ads/x",
    "https://img.host/logo.PNG",
    "https://img.host/logo.png",
    "https://img.host/logo.gif",
    "http://x.org/hexA",
    "http://x.org/hexa",
    "http://x.org/a-word-b",
    "http://x.org/éword",
    "http://x.org/swordfish",
    // RegexHost
    "https://cdn7.media.net/x",
    "https://cdn.media.net/",
    "https://xcdn.media.net/",
    "https://ads42.tracker.io/p",
    "https://tracker.io/",
    // SearchUrl
    "https://prefix.example/app/main",
    "https://prefix.example/other",
    "https://root.example/",
    "https://root.example.evil.net/",
    // SearchDomain
    "https://only.example/",
    "https://sub.only.example/",
    "http://match.example/a",
    "http://www.match.example/",
    // Match pattern host wildcard
    "https://a.wild.com/x",
    "https://evil.com/a.wild.com/b",
    // SearchDomainSubdomain, ports and userinfo
    "https://www.example.com/",
    "https://example.com:443/",
    "http://example.com:80/",
    "https://example.com:8443/",
    "https://user:pw@example.com/",
    "https://notexample.com/",
    "https://example.com.evil.net/",
    "https://example.net:8443/",
    "https://a.example.net:8443/",
    "https://example.net/",
    "ftp://files.example.com:21/",
    "ws://live.example.com:80/chat",
    // SearchDomainAndPath and the subdomain fallback
    "https://docs.example.org/guide/intro",
    "https://docs.example.org/other",
    "https://en.wiki.org/page/1",
    "https://wiki.org/page",
    "https://other.net/x.wiki.org/page",
    // IPv6
    "http://[2001:db8::1]:8080/",
    "http://[2001:db8::1]/",
    "http://[2001:db8::2]:8080/",
    // Unusable rule proxy
    "https://broken.example/",
    // Subscription tiers
    "https://mirror.cn/",
    "https://www.blocked.cn/",
    // Special URLs
    "https://special.example/login",
    "https://special.example/proxy",
    "https://www.example.com/direct-me",
    "http://unmatched.test/go",
    // Nothing matches
    "http://unmatched.test/",
];

fn proxy(id: &str, host: &str, port: u16, protocol: ProxyProtocol) -> Arc<ProxyServer> {
    Arc::new(ProxyServer::new(id, host, port, protocol))
}

fn profile(profile_type: ProfileType, socks: &Arc<ProxyServer>) -> SmartProfile {
    let mut broken = ProxyServer::new("broken", "10.0.0.9", 8080, ProxyProtocol::Http);
    broken.port = None;

    let mut rules = RuleSetBuilder::new();
    rules
        .add_whitelist([
            RuleRecord::from_source("safe.example.com"),
            RuleRecord::from_source("[2001:db8::2]"),
        ])
        .add_rules([
            RuleRecord::from_pattern("https://exact.example/page").with_kind(RuleKind::Exact),
            RuleRecord::from_pattern(r"^https?://[^/]+/ads/\d+").with_kind(RuleKind::RegexUrl),
            RuleRecord::from_pattern(r"(?i)\.PNG$").with_kind(RuleKind::RegexUrl),
            RuleRecord::from_pattern(r"hex\x41$").with_kind(RuleKind::RegexUrl),
            RuleRecord::from_pattern(r"\bword\b").with_kind(RuleKind::RegexUrl),
            RuleRecord::from_pattern(r"^cdn\d*\.media\.net$").with_kind(RuleKind::RegexHost),
            RuleRecord::from_source("ads*.tracker.io"),
            RuleRecord::from_pattern("https://prefix.example/app/").with_kind(RuleKind::Url),
            RuleRecord::from_pattern("https://root.example"),
            RuleRecord::from_source("only.example").with_kind(RuleKind::Domain),
            RuleRecord::from_pattern("*://match.example/*"),
            RuleRecord::from_pattern("https://*.wild.com/*"),
            RuleRecord::from_source("example.com"),
            RuleRecord::from_source("example.net:8443"),
            RuleRecord::from_source("docs.example.org/guide"),
            RuleRecord::from_source(".wiki.org/page").with_proxy(socks.clone()),
            RuleRecord::from_source("[2001:db8::1]"),
            RuleRecord::from_source("broken.example").with_proxy(Arc::new(broken)),
        ])
        .add_whitelist_subscription([RuleRecord::from_source("mirror.cn")])
        .add_subscription_rules([RuleRecord::from_source("cn").with_proxy(socks.clone())]);

    SmartProfile::new("corpus", profile_type).with_rules(rules.build())
}

fn engine(profile_type: ProfileType) -> DecisionEngine {
    let office = proxy("office", "10.0.0.1", 3128, ProxyProtocol::Http);
    let socks = proxy("socks", "10.0.0.2", 1080, ProxyProtocol::Socks5);
    let engine = DecisionEngine::new(
        RoutingConfig::new(profile(profile_type, &socks)).with_default_proxy(office),
    );
    let special = engine.special_urls();
    special.register("https://special.example/login", SpecialAction::Direct, false);
    special.register("https://special.example/proxy", SpecialAction::Proxy(socks), false);
    special.register("https://www.example.com/direct-me", SpecialAction::Direct, false);
    special.register("http://unmatched.test/go", SpecialAction::DefaultProxy, false);
    engine
}

struct Script {
    context: Context,
}

impl Script {
    fn load(source: &str) -> Self {
        let mut context = Context::default();
        context
            .eval(Source::from_bytes(source))
            .expect("decision script evaluates");
        Self { context }
    }

    fn find_proxy(&mut self, url: &str, host: &str) -> String {
        let call = format!(
            "FindProxyForURL({}, {})",
            serde_json::to_string(url).unwrap(),
            serde_json::to_string(host).unwrap()
        );
        let value = self
            .context
            .eval(Source::from_bytes(&call))
            .expect("FindProxyForURL runs");
        value
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .expect("FindProxyForURL returns a string")
    }
}

fn assert_script_agrees(profile_type: ProfileType) {
    let engine = engine(profile_type);
    let mut script = Script::load(&engine.emit_script(false).unwrap());

    for url in URLS {
        let native = engine.decide(url, None).directive();
        assert_eq!(script.find_proxy(url, ""), native, "{profile_type:?} {url}");
    }
}

#[test]
fn smart_rules_script_agrees_with_engine() {
    assert_script_agrees(ProfileType::SmartRules);
}

#[test]
fn always_enabled_script_agrees_with_engine() {
    assert_script_agrees(ProfileType::AlwaysEnabledBypassRules);
}

#[test]
fn non_routing_profiles_agree_with_engine() {
    assert_script_agrees(ProfileType::Direct);
    assert_script_agrees(ProfileType::SystemProxy);
}

#[test]
fn caller_supplied_host_agrees_with_engine() {
    let engine = engine(ProfileType::SmartRules);
    let mut script = Script::load(&engine.emit_script(false).unwrap());

    for (url, host) in [
        ("https://www.example.com/", "www.example.com"),
        ("https://example.net:8443/", "example.net"),
        ("http://[2001:db8::1]:8080/", "[2001:db8::1]"),
        ("https://cdn7.media.net/x", "CDN7.media.net"),
        ("https://203.0.113.7/", "blocked.cn"),
    ] {
        let native = engine.decide(url, Some(host)).directive();
        assert_eq!(script.find_proxy(url, host), native, "{url} as {host}");
    }
}

#[test]
fn corpus_exercises_every_route() {
    let engine = engine(ProfileType::SmartRules);
    let directives: Vec<String> = URLS
        .iter()
        .map(|url| engine.decide(url, None).directive())
        .collect();
    for expected in ["DIRECT", "PROXY 10.0.0.1:3128", "SOCKS5 10.0.0.2:1080"] {
        assert!(directives.iter().any(|d| d == expected), "no {expected}");
    }
    assert_eq!(
        engine.decide("https://evil.com/a.wild.com/b", None).directive(),
        "DIRECT"
    );
    assert_eq!(
        engine.decide("http://x.org/hexA", None).directive(),
        "PROXY 10.0.0.1:3128"
    );
}
