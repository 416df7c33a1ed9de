//! Host name comparisons shared by the matchers.

/// True when `host` equals `domain` or is one of its sub-domains.
///
/// `notexample.com` is not a sub-domain of `example.com`: the suffix must
/// start on a label boundary.
pub fn is_domain_or_subdomain(host: &str, domain: &str) -> bool {
    match host.strip_suffix(domain) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// True when `haystack` contains `.` immediately followed by `needle`.
pub fn contains_dotted(haystack: &str, needle: &str) -> bool {
    haystack
        .match_indices('.')
        .any(|(i, _)| haystack[i + 1..].starts_with(needle))
}
