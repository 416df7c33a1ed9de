//! Plain host-list parser.

use super::ParsedSubscription;
use crate::rule::RuleRecord;

/// Parse a plain list: one host or pattern per line.
///
/// Lines starting with `#`, `!` or `;` are comments. Empty lines are
/// skipped. Every entry goes to the rules tier.
pub fn parse_plain(content: &str) -> ParsedSubscription {
    let rules = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', '!', ';']))
        .map(RuleRecord::from_source)
        .collect();
    ParsedSubscription {
        rules,
        whitelist: Vec::new(),
    }
}
