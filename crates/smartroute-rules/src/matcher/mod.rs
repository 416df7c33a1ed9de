//! Rule matching for a single tier.
//!
//! Rules are tested in order and the first match wins; there is no "most
//! specific" resolution. When nothing matches and the URL carries a
//! non-default port, host-keyed rules get a second pass against
//! `host:port`.

pub mod domain;
pub mod request;

pub use domain::{contains_dotted, is_domain_or_subdomain};
pub use request::{RequestInfo, split_authority};

use tracing::trace;

use crate::rule::{CompiledMatcher, CompiledRule};

/// Find the first rule of `rules` matching the request.
pub fn find_match<'r>(req: &RequestInfo<'_>, rules: &'r [CompiledRule]) -> Option<&'r CompiledRule> {
    if let Some(rule) = rules.iter().find(|rule| rule_matches(rule, req, req.host())) {
        trace!(rule_id = %rule.rule_id, pattern = %rule.pattern, "rule matched");
        return Some(rule);
    }

    let host_and_port = req.host_and_port();
    if host_and_port == req.host() {
        return None;
    }
    let rule = rules
        .iter()
        .filter(|rule| rule.rule_type().is_host_keyed())
        .find(|rule| rule_matches(rule, req, host_and_port))?;
    trace!(rule_id = %rule.rule_id, pattern = %rule.pattern, host_and_port, "rule matched on host:port");
    Some(rule)
}

/// Test one rule, with `host` standing in for the request host.
fn rule_matches(rule: &CompiledRule, req: &RequestInfo<'_>, host: &str) -> bool {
    match &rule.matcher {
        CompiledMatcher::SearchDomainSubdomain(search) => is_domain_or_subdomain(host, search),
        CompiledMatcher::Exact(search) => req.lower_url() == search,
        CompiledMatcher::RegexHost(regex) => regex.is_match(host),
        CompiledMatcher::RegexUrl(regex) => regex.is_match(req.url()),
        CompiledMatcher::SearchUrl(search) => req.lower_url().starts_with(search.as_str()),
        CompiledMatcher::SearchDomain(search) => host == search,
        CompiledMatcher::SearchDomainAndPath { search, .. } => {
            req.stripped_url().starts_with(search.as_str())
        }
        CompiledMatcher::SearchDomainSubdomainAndPath {
            search,
            host: rule_host,
        } => {
            let stripped = req.stripped_url();
            stripped.starts_with(search.as_str())
                || (is_domain_or_subdomain(host, rule_host) && contains_dotted(stripped, search))
        }
    }
}
