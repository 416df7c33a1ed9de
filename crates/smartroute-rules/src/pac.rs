//! Decision script emitter.
//!
//! Renders a profile's compiled rules and the decision table into a
//! self-contained `FindProxyForURL(url, host)` script. Directives are
//! resolved here, from [`ProfileType::policy`] and [`tier_route`], so the
//! script only has to find the first matching rule; the matching runtime
//! below mirrors `matcher` function by function.
//!
//! [`ProfileType::policy`]: crate::profile::ProfileType::policy

use std::fmt;
use std::sync::Arc;

use crate::decision::{Route, default_route};
use crate::profile::{SmartProfile, TierRoute, tier_route};
use crate::rule::{CompiledMatcher, CompiledRule, CompiledRuleType, PortableRegex, ProxyServer};
use crate::special::{SpecialAction, SpecialUrlEntry};

/// Matching runtime shared by every emitted script.
///
/// A rule is `[type, key, host, directive]`, `type` being
/// [`CompiledRuleType::code`].
const RUNTIME: &str = r#"
function defaultPort(scheme) {
  switch (scheme) {
    case "http": case "ws": return "80";
    case "https": case "wss": return "443";
    case "ftp": return "21";
  }
  return null;
}

function startsWith(s, prefix) {
  return s.substring(0, prefix.length) === prefix;
}

function isDomainOrSubdomain(host, domain) {
  if (host === domain) return true;
  var n = host.length - domain.length;
  return n > 0 && host.charAt(n - 1) === "." && host.substring(n) === domain;
}

function splitAuthority(lowerUrl) {
  var i = lowerUrl.indexOf("://");
  var scheme = i >= 0 ? lowerUrl.substring(0, i) : "";
  var rest = i >= 0 ? lowerUrl.substring(i + 3) : lowerUrl;
  var end = rest.search(/[\/?#]/);
  var authority = end >= 0 ? rest.substring(0, end) : rest;
  var at = authority.lastIndexOf("@");
  if (at >= 0) authority = authority.substring(at + 1);
  var host = authority;
  var port = null;
  if (authority.charAt(0) === "[") {
    var close = authority.indexOf("]");
    if (close >= 0) {
      host = authority.substring(0, close + 1);
      if (authority.charAt(close + 1) === ":") port = authority.substring(close + 2);
    }
  } else {
    var colon = authority.lastIndexOf(":");
    if (colon >= 0) {
      host = authority.substring(0, colon);
      port = authority.substring(colon + 1);
    }
  }
  if (port === "" || port === defaultPort(scheme)) port = null;
  return [host, port];
}

function strippedUrl(req) {
  if (req.stripped === null) {
    var i = req.lowerUrl.indexOf("://");
    req.stripped = i >= 0 ? req.lowerUrl.substring(i + 3) : req.lowerUrl;
  }
  return req.stripped;
}

function ruleMatches(rule, req, host) {
  var key = rule[1];
  switch (rule[0]) {
    case 0: return req.lowerUrl === key;
    case 1: return key.test(req.url);
    case 2: return key.test(host);
    case 3: return startsWith(req.lowerUrl, key);
    case 4: return host === key;
    case 5: return isDomainOrSubdomain(host, key);
    case 6: return startsWith(strippedUrl(req), key);
    case 7:
      var s = strippedUrl(req);
      return startsWith(s, key) ||
        (isDomainOrSubdomain(host, rule[2]) && s.indexOf("." + key) >= 0);
  }
  return false;
}

function findMatch(rules, req) {
  var i;
  for (i = 0; i < rules.length; i++) {
    if (ruleMatches(rules[i], req, req.host)) return rules[i];
  }
  if (req.hostAndPort === req.host) return null;
  for (i = 0; i < rules.length; i++) {
    if (HOST_KEYED[rules[i][0]] && ruleMatches(rules[i], req, req.hostAndPort)) return rules[i];
  }
  return null;
}

function FindProxyForURL(url, host) {
  var i;
  for (i = 0; i < SPECIAL_URLS.length; i++) {
    if (SPECIAL_URLS[i][0] === url) return SPECIAL_URLS[i][1];
  }
  var lowerUrl = url.toLowerCase();
  var parts = splitAuthority(lowerUrl);
  var h = host ? String(host).toLowerCase() : parts[0];
  var req = {
    url: url,
    lowerUrl: lowerUrl,
    host: h,
    hostAndPort: parts[1] === null ? h : h + ":" + parts[1],
    stripped: null
  };
  for (i = 0; i < TIERS.length; i++) {
    var rule = findMatch(TIERS[i], req);
    if (rule !== null) return rule[3];
  }
  return DEFAULT_ROUTE;
}
"#;

/// Emits the decision script of one profile.
pub struct ScriptEmitter<'a> {
    profile: &'a SmartProfile,
    fallback_proxy: Option<&'a Arc<ProxyServer>>,
    special_urls: &'a [(String, SpecialUrlEntry)],
}

impl<'a> ScriptEmitter<'a> {
    /// `fallback_proxy` is the global default proxy, used when the profile
    /// has none of its own.
    pub fn new(profile: &'a SmartProfile, fallback_proxy: Option<&'a Arc<ProxyServer>>) -> Self {
        Self {
            profile,
            fallback_proxy,
            special_urls: &[],
        }
    }

    /// Embed special-URL overrides. Consuming entries are skipped: a
    /// script cannot remove them after use.
    pub fn with_special_urls(mut self, special_urls: &'a [(String, SpecialUrlEntry)]) -> Self {
        self.special_urls = special_urls;
        self
    }

    pub fn emit(&self) -> String {
        self.to_string()
    }

    fn default_proxy(&self) -> Option<&'a Arc<ProxyServer>> {
        self.profile.effective_default_proxy(self.fallback_proxy)
    }

    fn rule_directive(&self, rule: &CompiledRule) -> String {
        match tier_route(rule.source) {
            TierRoute::Direct => Route::Direct.directive(),
            TierRoute::RuleProxy => {
                Route::through(rule.proxy.as_ref().or(self.default_proxy())).directive()
            }
        }
    }

    fn write_rule(&self, f: &mut fmt::Formatter<'_>, rule: &CompiledRule) -> fmt::Result {
        write!(f, "  [{}, ", rule.rule_type().code())?;
        match &rule.matcher {
            CompiledMatcher::RegexUrl(regex) | CompiledMatcher::RegexHost(regex) => {
                f.write_str(&regex_literal(regex))?
            }
            matcher => f.write_str(&js_string(matcher.search().unwrap_or_default()))?,
        }
        match rule.host_name() {
            Some(host) if rule.rule_type() == CompiledRuleType::SearchDomainSubdomainAndPath => {
                write!(f, ", {}", js_string(host))?
            }
            _ => f.write_str(", null")?,
        }
        writeln!(f, ", {}],", js_string(&self.rule_directive(rule)))
    }
}

impl fmt::Display for ScriptEmitter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profile = self.profile;
        let policy = profile.profile_type.policy();
        writeln!(
            f,
            "// smartroute decision script for profile {} ({})",
            js_comment(&profile.profile_id),
            profile.profile_type.as_str()
        )?;
        writeln!(
            f,
            "var DEFAULT_ROUTE = {};",
            js_string(&default_route(policy.default_route, self.default_proxy()).directive())
        )?;

        let host_keyed: Vec<&str> = CompiledRuleType::ALL
            .iter()
            .map(|t| if t.is_host_keyed() { "true" } else { "false" })
            .collect();
        writeln!(f, "var HOST_KEYED = [{}];", host_keyed.join(", "))?;

        writeln!(f, "var SPECIAL_URLS = [")?;
        for (url, entry) in self.special_urls.iter().filter(|(_, e)| !e.consume) {
            let route = match &entry.action {
                SpecialAction::Direct => Route::Direct,
                SpecialAction::DefaultProxy => Route::through(self.default_proxy()),
                SpecialAction::Proxy(proxy) => Route::through(Some(proxy)),
            };
            writeln!(f, "  [{}, {}],", js_string(url), js_string(&route.directive()))?;
        }
        writeln!(f, "];")?;

        let mut tiers = Vec::new();
        if policy.evaluates_rules {
            for (source, rules) in profile.compiled_rules.tiers() {
                let name = format!("TIER_{}", source.as_str().to_uppercase());
                writeln!(f, "var {name} = [")?;
                for rule in rules {
                    self.write_rule(f, rule)?;
                }
                writeln!(f, "];")?;
                tiers.push(name);
            }
        }
        writeln!(f, "var TIERS = [{}];", tiers.join(", "))?;
        f.write_str(RUNTIME)
    }
}

/// JavaScript string literal for `s`.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn js_comment(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() && !matches!(c, '\u{2028}' | '\u{2029}'))
        .collect()
}

/// JavaScript regex literal for `regex`, e.g. `/^a\/b$/i`.
fn regex_literal(regex: &PortableRegex) -> String {
    let source = regex.source();
    let mut out = String::with_capacity(source.len() + 4);
    out.push('/');
    if source.is_empty() {
        out.push_str("(?:)");
    }
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                match chars.next() {
                    Some(next) => push_regex_char(&mut out, next),
                    None => out.push('\\'),
                }
            }
            '/' => out.push_str("\\/"),
            c => push_regex_char(&mut out, c),
        }
    }
    out.push('/');
    if regex.ignore_case() {
        out.push('i');
    }
    out
}

fn push_regex_char(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\u{2028}' => out.push_str("\\u2028"),
        '\u{2029}' => out.push_str("\\u2029"),
        c => out.push(c),
    }
}
