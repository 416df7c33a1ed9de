//! Routing decisions and the stateless profile evaluator.

use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::matcher::{RequestInfo, find_match};
use crate::profile::{DefaultRoute, SmartProfile, TierRoute, tier_route};
use crate::rule::{CompiledRule, CompiledRuleSource, CompiledRuleType, ProxyServer};

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "proxy", rename_all = "snake_case")]
pub enum Route {
    Direct,
    Proxy(Arc<ProxyServer>),
    System,
    NoOpinion,
}

impl Route {
    /// Route through `proxy`, or directly when it is absent or unusable.
    pub fn through(proxy: Option<&Arc<ProxyServer>>) -> Self {
        match proxy {
            Some(proxy) if proxy.is_usable() => Route::Proxy(proxy.clone()),
            Some(proxy) => {
                trace!(proxy = %proxy.id, "proxy is incomplete, routing directly");
                Route::Direct
            }
            None => Route::Direct,
        }
    }

    /// The PAC directive equivalent of this route.
    pub fn directive(&self) -> String {
        match self {
            Route::Direct => "DIRECT".to_string(),
            Route::Proxy(proxy) => proxy.directive().unwrap_or_else(|| "DIRECT".to_string()),
            Route::System => "SYSTEM".to_string(),
            Route::NoOpinion => String::new(),
        }
    }

    pub fn proxy(&self) -> Option<&Arc<ProxyServer>> {
        match self {
            Route::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }
}

/// Why a decision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedRuleStatus {
    /// No rule matched; the profile's default applied.
    NoneMatched,
    /// A whitelist tier matched.
    Whitelisted,
    /// A rules tier matched.
    RuleMatched,
    /// The profile type does not evaluate rules.
    ProfileDefault,
    /// A special-URL override applied.
    SpecialUrl,
    /// Inherited from the tab's top-level request.
    PerOrigin,
    /// No profile is active.
    NoActiveProfile,
}

impl MatchedRuleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchedRuleStatus::NoneMatched => "none_matched",
            MatchedRuleStatus::Whitelisted => "whitelisted",
            MatchedRuleStatus::RuleMatched => "rule_matched",
            MatchedRuleStatus::ProfileDefault => "profile_default",
            MatchedRuleStatus::SpecialUrl => "special_url",
            MatchedRuleStatus::PerOrigin => "per_origin",
            MatchedRuleStatus::NoActiveProfile => "no_active_profile",
        }
    }
}

/// Whether the request ends up proxied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxifiedStatus {
    Proxified,
    NotProxified,
    SystemProxy,
    NoOpinion,
}

/// Identity of the rule behind a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedRule {
    pub rule_id: String,
    pub source: CompiledRuleSource,
    pub rule_type: CompiledRuleType,
    pub pattern: String,
}

impl From<&CompiledRule> for MatchedRule {
    fn from(rule: &CompiledRule) -> Self {
        Self {
            rule_id: rule.rule_id.clone(),
            source: rule.source,
            rule_type: rule.rule_type(),
            pattern: rule.pattern.clone(),
        }
    }
}

/// The engine's output for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub route: Route,
    pub status: MatchedRuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<MatchedRule>,
}

impl RoutingDecision {
    pub fn new(route: Route, status: MatchedRuleStatus) -> Self {
        Self {
            route,
            status,
            matched_rule: None,
        }
    }

    pub fn direct(status: MatchedRuleStatus) -> Self {
        Self::new(Route::Direct, status)
    }

    pub fn with_rule(mut self, rule: &CompiledRule) -> Self {
        self.matched_rule = Some(MatchedRule::from(rule));
        self
    }

    pub fn directive(&self) -> String {
        self.route.directive()
    }

    pub fn proxified(&self) -> ProxifiedStatus {
        match self.route {
            Route::Proxy(_) => ProxifiedStatus::Proxified,
            Route::Direct => ProxifiedStatus::NotProxified,
            Route::System => ProxifiedStatus::SystemProxy,
            Route::NoOpinion => ProxifiedStatus::NoOpinion,
        }
    }
}

/// Route for a profile's default when nothing matched.
pub fn default_route(route: DefaultRoute, default_proxy: Option<&Arc<ProxyServer>>) -> Route {
    match route {
        DefaultRoute::Direct => Route::Direct,
        DefaultRoute::DefaultProxy => Route::through(default_proxy),
        DefaultRoute::System => Route::System,
        DefaultRoute::NoOpinion => Route::NoOpinion,
    }
}

/// Decide a request against one profile.
///
/// A pure function of the request, the profile and the global default
/// proxy. Tiers are searched whitelist, rules, subscription whitelist,
/// subscription rules; the first tier with a match decides.
pub fn evaluate(
    profile: &SmartProfile,
    fallback_proxy: Option<&Arc<ProxyServer>>,
    req: &RequestInfo<'_>,
) -> RoutingDecision {
    let policy = profile.profile_type.policy();
    let default_proxy = profile.effective_default_proxy(fallback_proxy);

    if !policy.evaluates_rules {
        return RoutingDecision::new(
            default_route(policy.default_route, default_proxy),
            MatchedRuleStatus::ProfileDefault,
        );
    }

    for (source, rules) in profile.compiled_rules.tiers() {
        let Some(rule) = find_match(req, rules) else {
            continue;
        };
        let decision = match tier_route(source) {
            TierRoute::Direct => RoutingDecision::direct(MatchedRuleStatus::Whitelisted),
            TierRoute::RuleProxy => RoutingDecision::new(
                Route::through(rule.proxy.as_ref().or(default_proxy)),
                MatchedRuleStatus::RuleMatched,
            ),
        };
        return decision.with_rule(rule);
    }

    RoutingDecision::new(
        default_route(policy.default_route, default_proxy),
        MatchedRuleStatus::NoneMatched,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleSetBuilder;
    use crate::profile::ProfileType;
    use crate::rule::{ProxyProtocol, RuleRecord};

    fn proxy(id: &str) -> Arc<ProxyServer> {
        Arc::new(ProxyServer::new(id, format!("{id}.proxy"), 8080, ProxyProtocol::Http))
    }

    fn decide(profile: &SmartProfile, url: &str) -> RoutingDecision {
        evaluate(profile, None, &RequestInfo::new(url))
    }

    #[test]
    fn smart_rules_empty_is_direct() {
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_default_proxy(proxy("default"));
        let d = decide(&profile, "https://anything.example/");
        assert_eq!(d.route, Route::Direct);
        assert_eq!(d.status, MatchedRuleStatus::NoneMatched);
        assert_eq!(d.proxified(), ProxifiedStatus::NotProxified);
    }

    #[test]
    fn smart_rules_match_uses_default_proxy() {
        let mut rules = RuleSetBuilder::new();
        rules.add_rules([RuleRecord::from_source("example.com")]);
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "https://www.example.com/");
        assert_eq!(d.route.proxy().unwrap().id, "default");
        assert_eq!(d.status, MatchedRuleStatus::RuleMatched);
        assert_eq!(d.matched_rule.unwrap().source, CompiledRuleSource::Rules);
    }

    #[test]
    fn rule_proxy_overrides_default() {
        let mut rules = RuleSetBuilder::new();
        rules.add_rules([RuleRecord::from_source("example.com").with_proxy(proxy("special"))]);
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "https://example.com/");
        assert_eq!(d.route.proxy().unwrap().id, "special");
        assert_eq!(d.directive(), "PROXY special.proxy:8080");
    }

    #[test]
    fn always_enabled_defaults_to_proxy() {
        let mut rules = RuleSetBuilder::new();
        rules.add_whitelist([RuleRecord::from_source("example.com")]);
        let profile = SmartProfile::new("always", ProfileType::AlwaysEnabledBypassRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "http://example.com/");
        assert_eq!(d.route, Route::Direct);
        assert_eq!(d.status, MatchedRuleStatus::Whitelisted);

        let d = decide(&profile, "http://other.org/");
        assert_eq!(d.route.proxy().unwrap().id, "default");
        assert_eq!(d.status, MatchedRuleStatus::NoneMatched);
    }

    #[test]
    fn always_enabled_without_proxy_is_direct() {
        let profile = SmartProfile::new("always", ProfileType::AlwaysEnabledBypassRules);
        assert_eq!(decide(&profile, "http://other.org/").route, Route::Direct);
    }

    #[test]
    fn fallback_proxy_used_when_profile_has_none() {
        let profile = SmartProfile::new("always", ProfileType::AlwaysEnabledBypassRules);
        let global = proxy("global");
        let d = evaluate(&profile, Some(&global), &RequestInfo::new("http://x.org/"));
        assert_eq!(d.route.proxy().unwrap().id, "global");
    }

    #[test]
    fn tier_precedence() {
        let mut rules = RuleSetBuilder::new();
        rules
            .add_subscription_rules([RuleRecord::from_source("example.com").with_id("sub")])
            .add_whitelist_subscription([RuleRecord::from_source("example.com").with_id("sub-white")])
            .add_rules([RuleRecord::from_source("example.com").with_id("user")])
            .add_whitelist([RuleRecord::from_source("intranet.example.com").with_id("white")]);
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "https://intranet.example.com/");
        assert_eq!(d.matched_rule.unwrap().rule_id, "white");
        assert_eq!(d.route, Route::Direct);

        let d = decide(&profile, "https://www.example.com/");
        assert_eq!(d.matched_rule.unwrap().rule_id, "user");
        assert!(d.route.proxy().is_some());
    }

    #[test]
    fn subscription_whitelist_beats_subscription_rules() {
        let mut rules = RuleSetBuilder::new();
        rules
            .add_subscription_rules([RuleRecord::from_source("example.com").with_id("sub")])
            .add_whitelist_subscription([RuleRecord::from_source("example.com").with_id("sub-white")]);
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "https://example.com/");
        assert_eq!(d.matched_rule.unwrap().rule_id, "sub-white");
        assert_eq!(d.route, Route::Direct);
    }

    #[test]
    fn incomplete_rule_proxy_degrades_to_direct() {
        let mut broken = ProxyServer::new("broken", "proxy.local", 8080, ProxyProtocol::Http);
        broken.port = None;
        let mut rules = RuleSetBuilder::new();
        rules.add_rules([RuleRecord::from_source("example.com").with_proxy(Arc::new(broken))]);
        let profile = SmartProfile::new("smart", ProfileType::SmartRules)
            .with_rules(rules.build())
            .with_default_proxy(proxy("default"));

        let d = decide(&profile, "https://example.com/");
        assert_eq!(d.route, Route::Direct);
        assert_eq!(d.status, MatchedRuleStatus::RuleMatched);
        assert_eq!(d.directive(), "DIRECT");
    }

    #[test]
    fn non_routing_profiles() {
        let d = decide(&SmartProfile::new("d", ProfileType::Direct), "https://a.com/");
        assert_eq!(d.route, Route::Direct);
        assert_eq!(d.status, MatchedRuleStatus::ProfileDefault);

        let d = decide(&SmartProfile::new("s", ProfileType::SystemProxy), "https://a.com/");
        assert_eq!(d.route, Route::System);
        assert_eq!(d.directive(), "SYSTEM");
        assert_eq!(d.proxified(), ProxifiedStatus::SystemProxy);

        let mut rules = RuleSetBuilder::new();
        rules.add_rules([RuleRecord::from_source("a.com")]);
        let ignore = SmartProfile::new("i", ProfileType::IgnoreFailureRules).with_rules(rules.build());
        let d = decide(&ignore, "https://a.com/");
        assert_eq!(d.route, Route::NoOpinion);
        assert_eq!(d.directive(), "");
    }
}
