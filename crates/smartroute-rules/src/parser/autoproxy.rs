//! AutoProxy (GFWList) parser.
//!
//! Supported subset:
//!
//! - `[AutoProxy x.y]` header and `!` comments
//! - `@@` prefix: exception, goes to the whitelist tier
//! - `||domain`: the domain and its sub-domains
//! - `|http://prefix`: URL prefix, `*` allowed
//! - `/regex/`: URL regex
//! - `.domain` and anything else: classified like an authored host
//!
//! Lines carrying `$` filter options are dropped.

use tracing::debug;

use super::ParsedSubscription;
use crate::pattern::wildcard_regex;
use crate::rule::{RuleKind, RuleRecord};

/// Parse an AutoProxy list.
pub fn parse_autoproxy(content: &str) -> ParsedSubscription {
    let mut parsed = ParsedSubscription::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
            continue;
        }

        let (line, exception) = match line.strip_prefix("@@") {
            Some(rest) => (rest.trim(), true),
            None => (line, false),
        };

        let Some(record) = parse_line(line) else {
            debug!(line, "skipping unsupported autoproxy line");
            continue;
        };
        if exception {
            parsed.whitelist.push(record);
        } else {
            parsed.rules.push(record);
        }
    }

    parsed
}

fn parse_line(line: &str) -> Option<RuleRecord> {
    if line.is_empty() {
        return None;
    }

    if let Some(regex) = line
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .filter(|regex| !regex.is_empty())
    {
        return Some(RuleRecord::from_pattern(regex).with_kind(RuleKind::RegexUrl));
    }

    if line.contains('$') {
        return None;
    }

    if let Some(domain) = line.strip_prefix("||") {
        let domain = domain.trim_end_matches(['^', '/']);
        if domain.is_empty() {
            return None;
        }
        if domain.contains(['*', '/']) {
            return Some(RuleRecord::from_source(format!(".{domain}")));
        }
        return Some(RuleRecord::from_pattern(domain).with_kind(RuleKind::DomainSubdomain));
    }

    if let Some(prefix) = line.strip_prefix('|') {
        let prefix = prefix.trim_end_matches('|');
        if prefix.is_empty() {
            return None;
        }
        if prefix.contains('*') {
            let regex = format!("^{}", wildcard_regex(&prefix.to_lowercase()));
            return Some(RuleRecord::from_pattern(regex).with_kind(RuleKind::RegexUrl));
        }
        return Some(RuleRecord::from_pattern(prefix).with_kind(RuleKind::Url));
    }

    Some(RuleRecord::from_source(line))
}
