//! Rule, proxy and compiled-rule type definitions.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Wire protocol spoken by a proxy server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyProtocol {
    /// Keyword used in a PAC directive for this protocol.
    pub fn directive_keyword(self) -> &'static str {
        match self {
            ProxyProtocol::Http => "PROXY",
            ProxyProtocol::Https => "HTTPS",
            ProxyProtocol::Socks4 => "SOCKS4",
            ProxyProtocol::Socks5 => "SOCKS5",
        }
    }
}

/// A proxy server as stored in settings.
///
/// Host, port and protocol may each be missing in stored settings. Such a
/// server is unusable and every path that would route through it routes
/// directly instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyServer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<ProxyProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Resolve DNS through the proxy (SOCKS5 only).
    #[serde(default)]
    pub proxy_dns: bool,
}

impl ProxyServer {
    /// Create a fully specified proxy server.
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        protocol: ProxyProtocol,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            host: host.into(),
            port: Some(port),
            protocol: Some(protocol),
            username: None,
            password: None,
            proxy_dns: false,
        }
    }

    /// True when host, port and protocol are all present.
    pub fn is_usable(&self) -> bool {
        !self.host.trim().is_empty() && self.port.is_some_and(|p| p != 0) && self.protocol.is_some()
    }

    /// PAC directive for this server, e.g. `SOCKS5 10.0.0.1:1080`.
    ///
    /// Returns `None` when the server is unusable.
    pub fn directive(&self) -> Option<String> {
        if !self.is_usable() {
            return None;
        }
        let (Some(port), Some(protocol)) = (self.port, self.protocol) else {
            return None;
        };
        let host = self.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            Some(format!("{} [{host}]:{port}", protocol.directive_keyword()))
        } else {
            Some(format!("{} {host}:{port}", protocol.directive_keyword()))
        }
    }
}

/// How the text of a rule record should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Classify from the shape of the text.
    #[default]
    Auto,
    /// Host equality only.
    Domain,
    /// Host and every sub-domain.
    DomainSubdomain,
    /// `host/path` prefix on the exact host.
    DomainAndPath,
    /// `host/path` prefix on the host or any sub-domain.
    DomainSubdomainAndPath,
    /// Case-insensitive URL prefix.
    Url,
    /// Case-insensitive whole-URL equality.
    Exact,
    /// Raw regular expression tested against the host.
    RegexHost,
    /// Raw regular expression tested against the full URL.
    RegexUrl,
    /// Browser match pattern (`scheme://host/path`).
    MatchPattern,
}

/// An author-facing rule as delivered by settings or a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleRecord {
    /// Stable id; generated from the tier and position when absent.
    pub id: Option<String>,
    /// Original authored text (usually a host name).
    pub source: String,
    /// Match pattern; takes precedence over `source` when non-empty.
    pub pattern: String,
    pub kind: RuleKind,
    pub enabled: bool,
    /// Proxy override for this rule.
    pub proxy: Option<Arc<ProxyServer>>,
}

impl RuleRecord {
    /// An enabled record built from a bare host name.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            enabled: true,
            ..Self::default()
        }
    }

    /// An enabled record built from a match pattern.
    pub fn from_pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: RuleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<ProxyServer>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The text the compiler works on.
    pub fn text(&self) -> &str {
        let pattern = self.pattern.trim();
        if pattern.is_empty() {
            self.source.trim()
        } else {
            pattern
        }
    }
}

/// Compiled rule classification, ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompiledRuleType {
    Exact,
    RegexUrl,
    RegexHost,
    SearchUrl,
    SearchDomain,
    SearchDomainSubdomain,
    SearchDomainAndPath,
    SearchDomainSubdomainAndPath,
}

impl CompiledRuleType {
    /// Every type, ordered by [`code`](Self::code).
    pub const ALL: [CompiledRuleType; 8] = [
        CompiledRuleType::Exact,
        CompiledRuleType::RegexUrl,
        CompiledRuleType::RegexHost,
        CompiledRuleType::SearchUrl,
        CompiledRuleType::SearchDomain,
        CompiledRuleType::SearchDomainSubdomain,
        CompiledRuleType::SearchDomainAndPath,
        CompiledRuleType::SearchDomainSubdomainAndPath,
    ];

    /// Stable numeric code used by the decision script.
    pub fn code(self) -> u8 {
        match self {
            CompiledRuleType::Exact => 0,
            CompiledRuleType::RegexUrl => 1,
            CompiledRuleType::RegexHost => 2,
            CompiledRuleType::SearchUrl => 3,
            CompiledRuleType::SearchDomain => 4,
            CompiledRuleType::SearchDomainSubdomain => 5,
            CompiledRuleType::SearchDomainAndPath => 6,
            CompiledRuleType::SearchDomainSubdomainAndPath => 7,
        }
    }

    /// Whether the rule keys off the host and is retried with `host:port`.
    pub fn is_host_keyed(self) -> bool {
        matches!(
            self,
            CompiledRuleType::RegexHost
                | CompiledRuleType::SearchDomain
                | CompiledRuleType::SearchDomainSubdomain
                | CompiledRuleType::SearchDomainSubdomainAndPath
        )
    }
}

/// The tier a compiled rule belongs to, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompiledRuleSource {
    Whitelist,
    Rules,
    WhitelistSubscription,
    SubscriptionRules,
}

impl CompiledRuleSource {
    /// All tiers in lookup order.
    pub const ORDER: [CompiledRuleSource; 4] = [
        CompiledRuleSource::Whitelist,
        CompiledRuleSource::Rules,
        CompiledRuleSource::WhitelistSubscription,
        CompiledRuleSource::SubscriptionRules,
    ];

    pub fn is_whitelist(self) -> bool {
        matches!(
            self,
            CompiledRuleSource::Whitelist | CompiledRuleSource::WhitelistSubscription
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompiledRuleSource::Whitelist => "whitelist",
            CompiledRuleSource::Rules => "rules",
            CompiledRuleSource::WhitelistSubscription => "whitelist_subscription",
            CompiledRuleSource::SubscriptionRules => "subscription_rules",
        }
    }
}

impl fmt::Display for CompiledRuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regex that behaves the same in the native engine and in the
/// decision script.
#[derive(Debug, Clone)]
pub struct PortableRegex {
    regex: Regex,
    source: String,
    ignore_case: bool,
}

impl PortableRegex {
    pub(crate) fn new(regex: Regex, source: String, ignore_case: bool) -> Self {
        Self {
            regex,
            source,
            ignore_case,
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Expression body, without flags.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

impl PartialEq for PortableRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.ignore_case == other.ignore_case
    }
}

impl Eq for PortableRegex {}

/// The matcher of a compiled rule. Each variant carries exactly the
/// comparison key its predicate needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledMatcher {
    Exact(String),
    RegexUrl(PortableRegex),
    RegexHost(PortableRegex),
    SearchUrl(String),
    SearchDomain(String),
    SearchDomainSubdomain(String),
    SearchDomainAndPath { search: String, host: String },
    SearchDomainSubdomainAndPath { search: String, host: String },
}

impl CompiledMatcher {
    pub fn rule_type(&self) -> CompiledRuleType {
        match self {
            CompiledMatcher::Exact(_) => CompiledRuleType::Exact,
            CompiledMatcher::RegexUrl(_) => CompiledRuleType::RegexUrl,
            CompiledMatcher::RegexHost(_) => CompiledRuleType::RegexHost,
            CompiledMatcher::SearchUrl(_) => CompiledRuleType::SearchUrl,
            CompiledMatcher::SearchDomain(_) => CompiledRuleType::SearchDomain,
            CompiledMatcher::SearchDomainSubdomain(_) => CompiledRuleType::SearchDomainSubdomain,
            CompiledMatcher::SearchDomainAndPath { .. } => CompiledRuleType::SearchDomainAndPath,
            CompiledMatcher::SearchDomainSubdomainAndPath { .. } => {
                CompiledRuleType::SearchDomainSubdomainAndPath
            }
        }
    }

    /// Plain-string comparison key, if this matcher has one.
    pub fn search(&self) -> Option<&str> {
        match self {
            CompiledMatcher::Exact(s)
            | CompiledMatcher::SearchUrl(s)
            | CompiledMatcher::SearchDomain(s)
            | CompiledMatcher::SearchDomainSubdomain(s)
            | CompiledMatcher::SearchDomainAndPath { search: s, .. }
            | CompiledMatcher::SearchDomainSubdomainAndPath { search: s, .. } => Some(s),
            CompiledMatcher::RegexUrl(_) | CompiledMatcher::RegexHost(_) => None,
        }
    }

    pub fn regex(&self) -> Option<&PortableRegex> {
        match self {
            CompiledMatcher::RegexUrl(r) | CompiledMatcher::RegexHost(r) => Some(r),
            _ => None,
        }
    }

    /// Host portion of the rule, for the domain based matchers.
    pub fn host_name(&self) -> Option<&str> {
        match self {
            CompiledMatcher::SearchDomain(h) | CompiledMatcher::SearchDomainSubdomain(h) => Some(h),
            CompiledMatcher::SearchDomainAndPath { host, .. }
            | CompiledMatcher::SearchDomainSubdomainAndPath { host, .. } => Some(host),
            _ => None,
        }
    }
}

/// A rule ready for matching. Derived from a [`RuleRecord`] and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub rule_id: String,
    pub matcher: CompiledMatcher,
    pub proxy: Option<Arc<ProxyServer>>,
    pub source: CompiledRuleSource,
    /// The authored text this rule was compiled from.
    pub pattern: String,
}

impl CompiledRule {
    pub fn rule_type(&self) -> CompiledRuleType {
        self.matcher.rule_type()
    }

    pub fn host_name(&self) -> Option<&str> {
        self.matcher.host_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_per_protocol() {
        let cases = [
            (ProxyProtocol::Http, "PROXY 10.0.0.1:3128"),
            (ProxyProtocol::Https, "HTTPS 10.0.0.1:3128"),
            (ProxyProtocol::Socks4, "SOCKS4 10.0.0.1:3128"),
            (ProxyProtocol::Socks5, "SOCKS5 10.0.0.1:3128"),
        ];
        for (protocol, expected) in cases {
            let proxy = ProxyServer::new("p", "10.0.0.1", 3128, protocol);
            assert_eq!(proxy.directive().as_deref(), Some(expected));
        }
    }

    #[test]
    fn directive_brackets_ipv6() {
        let proxy = ProxyServer::new("p", "::1", 1080, ProxyProtocol::Socks5);
        assert_eq!(proxy.directive().as_deref(), Some("SOCKS5 [::1]:1080"));
    }

    #[test]
    fn incomplete_proxy_is_unusable() {
        let mut proxy = ProxyServer::new("p", "proxy.local", 8080, ProxyProtocol::Http);
        proxy.port = None;
        assert!(!proxy.is_usable());
        assert!(proxy.directive().is_none());

        let mut proxy = ProxyServer::new("p", "proxy.local", 8080, ProxyProtocol::Http);
        proxy.port = Some(0);
        assert!(!proxy.is_usable());

        let mut proxy = ProxyServer::new("p", "  ", 8080, ProxyProtocol::Http);
        assert!(!proxy.is_usable());
        proxy.host = "proxy.local".into();
        proxy.protocol = None;
        assert!(!proxy.is_usable());
    }

    #[test]
    fn record_text_prefers_pattern() {
        let mut record = RuleRecord::from_source("example.com");
        assert_eq!(record.text(), "example.com");
        record.pattern = " *://example.com/* ".into();
        assert_eq!(record.text(), "*://example.com/*");
    }

    #[test]
    fn host_keyed_types() {
        assert!(CompiledRuleType::RegexHost.is_host_keyed());
        assert!(CompiledRuleType::SearchDomain.is_host_keyed());
        assert!(CompiledRuleType::SearchDomainSubdomain.is_host_keyed());
        assert!(CompiledRuleType::SearchDomainSubdomainAndPath.is_host_keyed());
        assert!(!CompiledRuleType::Exact.is_host_keyed());
        assert!(!CompiledRuleType::RegexUrl.is_host_keyed());
        assert!(!CompiledRuleType::SearchUrl.is_host_keyed());
        assert!(!CompiledRuleType::SearchDomainAndPath.is_host_keyed());
    }

    #[test]
    fn tier_order_puts_whitelists_first() {
        let order = CompiledRuleSource::ORDER;
        assert!(order[0].is_whitelist());
        assert!(!order[1].is_whitelist());
        assert!(order[2].is_whitelist());
        assert!(!order[3].is_whitelist());
    }
}
