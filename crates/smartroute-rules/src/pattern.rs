//! Pattern compiler: turns one authored pattern into a [`CompiledMatcher`].
//!
//! Accepted inputs:
//!
//! - bare hosts (`example.com`, `*.example.com`, `example.com:8443`)
//! - host plus path (`example.com/docs`, `.example.com/docs`)
//! - browser match patterns (`*://*.example.com/*`, `https://example.com/a*`)
//! - raw regular expressions, when the record's kind asks for one
//!
//! Classification always picks the cheapest matcher that is exact for the
//! input: string compares first, regexes only when a wildcard cannot be
//! reduced to a prefix or suffix test.

use regex::RegexBuilder;

use crate::error::RulesError;
use crate::rule::{CompiledMatcher, PortableRegex, RuleKind};

const ALL_URLS: &str = "<all_urls>";
/// What a host wildcard spans in a host regex and in a URL regex.
const HOST_ANY: &str = ".*";
const URL_HOST_ANY: &str = "[^/?#]*";

/// Compile `text` according to `kind`.
pub fn compile_pattern(text: &str, kind: RuleKind) -> Result<CompiledMatcher, RulesError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RulesError::EmptyPattern);
    }
    if text.eq_ignore_ascii_case(ALL_URLS) {
        return Err(RulesError::MatchesEverything(text.to_string()));
    }

    match kind {
        RuleKind::Auto => {
            if text.contains("://") {
                compile_match_pattern(text)
            } else {
                compile_bare(text)
            }
        }
        RuleKind::MatchPattern => {
            if !text.contains("://") {
                return Err(RulesError::InvalidPattern(format!(
                    "match pattern needs a scheme: {text}"
                )));
            }
            compile_match_pattern(text)
        }
        RuleKind::Domain => {
            let host = text.to_lowercase();
            validate_host(&host, false)?;
            Ok(CompiledMatcher::SearchDomain(host))
        }
        RuleKind::DomainSubdomain => {
            let (host, _) = strip_subdomain_marker(text);
            let host = host.to_lowercase();
            validate_host(&host, false)?;
            Ok(CompiledMatcher::SearchDomainSubdomain(host))
        }
        RuleKind::DomainAndPath | RuleKind::DomainSubdomainAndPath => {
            let stripped = strip_scheme(text);
            let (host, marked) = strip_subdomain_marker(stripped);
            let (host, path) = split_path(host).ok_or_else(|| {
                RulesError::InvalidPattern(format!("expected host/path: {text}"))
            })?;
            if path.contains('*') {
                return Err(RulesError::InvalidPattern(format!(
                    "wildcards are not allowed here: {text}"
                )));
            }
            let host = host.to_lowercase();
            validate_host(&host, false)?;
            let search = format!("{host}{}", path.to_lowercase());
            if kind == RuleKind::DomainSubdomainAndPath || marked {
                Ok(CompiledMatcher::SearchDomainSubdomainAndPath { search, host })
            } else {
                Ok(CompiledMatcher::SearchDomainAndPath { search, host })
            }
        }
        RuleKind::Url => {
            reject_whitespace(text)?;
            Ok(CompiledMatcher::SearchUrl(text.to_lowercase()))
        }
        RuleKind::Exact => {
            reject_whitespace(text)?;
            Ok(CompiledMatcher::Exact(text.to_lowercase()))
        }
        RuleKind::RegexHost => Ok(CompiledMatcher::RegexHost(portable_regex(text)?)),
        RuleKind::RegexUrl => Ok(CompiledMatcher::RegexUrl(portable_regex(text)?)),
    }
}

/// Bare host or host/path, optionally with wildcards.
fn compile_bare(text: &str) -> Result<CompiledMatcher, RulesError> {
    let (rest, subdomains) = strip_subdomain_marker(text);
    let (host, path) = match split_path(rest) {
        Some((host, path)) => (host, Some(path)),
        None => (rest, None),
    };
    let host = host.to_lowercase();
    validate_host(&host, true)?;

    let wildcard = host.contains('*') || path.is_some_and(|p| p.contains('*'));
    if wildcard {
        return match path {
            None => build_regex(format!("^{}$", host_regex(&host, subdomains, HOST_ANY)))
                .map(CompiledMatcher::RegexHost),
            Some(path) => build_regex(format!(
                "^https?://{}{}$",
                host_regex(&host, subdomains, URL_HOST_ANY),
                wildcard_regex(path)
            ))
            .map(CompiledMatcher::RegexUrl),
        };
    }

    match path {
        None => Ok(CompiledMatcher::SearchDomainSubdomain(host)),
        Some(path) => {
            let search = format!("{host}{}", path.to_lowercase());
            if subdomains {
                Ok(CompiledMatcher::SearchDomainSubdomainAndPath { search, host })
            } else {
                Ok(CompiledMatcher::SearchDomainAndPath { search, host })
            }
        }
    }
}

/// `scheme://host/path` browser match pattern.
fn compile_match_pattern(text: &str) -> Result<CompiledMatcher, RulesError> {
    let (scheme, rest) = text
        .split_once("://")
        .ok_or_else(|| RulesError::InvalidPattern(text.to_string()))?;
    let scheme = scheme.to_lowercase();
    validate_scheme(&scheme, text)?;

    let (host, path) = split_path(rest).unwrap_or((rest, ""));
    let host = host.to_lowercase();
    validate_host(&host, true)?;

    // No wildcard anywhere, or a single trailing one: plain URL prefix.
    // A pathless pattern names the root path, so the prefix stops at the host.
    let star_count = text.matches('*').count();
    if star_count == 0 {
        let mut prefix = text.to_lowercase();
        if path.is_empty() {
            prefix.push('/');
        }
        return Ok(CompiledMatcher::SearchUrl(prefix));
    }
    if star_count == 1 && text.ends_with('*') && !path.is_empty() {
        let prefix = &text[..text.len() - 1];
        return Ok(CompiledMatcher::SearchUrl(prefix.to_lowercase()));
    }

    if path.is_empty() {
        return Err(RulesError::InvalidPattern(format!(
            "match pattern needs a path: {text}"
        )));
    }

    if scheme == "*" && path == "/*" {
        if host == "*" {
            return Err(RulesError::MatchesEverything(text.to_string()));
        }
        if !host.contains('*') {
            return Ok(CompiledMatcher::SearchDomain(host));
        }
        let (bare, subdomains) = strip_subdomain_marker(&host);
        let host_re = host_regex(bare, subdomains, HOST_ANY);
        return build_regex(format!("^{host_re}$")).map(CompiledMatcher::RegexHost);
    }

    let scheme_re = if scheme == "*" {
        "https?".to_string()
    } else {
        regex::escape(&scheme)
    };
    let (bare, subdomains) = strip_subdomain_marker(&host);
    let host_re = host_regex(bare, subdomains, URL_HOST_ANY);
    build_regex(format!("^{scheme_re}://{host_re}{}$", wildcard_regex(path)))
        .map(CompiledMatcher::RegexUrl)
}

fn validate_scheme(scheme: &str, text: &str) -> Result<(), RulesError> {
    if scheme == "*" {
        return Ok(());
    }
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RulesError::InvalidPattern(format!("invalid scheme: {text}")))
    }
}

/// Check that `host` is a plausible host name, IP literal or `host:port`.
fn validate_host(host: &str, allow_wildcard: bool) -> Result<(), RulesError> {
    let invalid = || RulesError::InvalidPattern(format!("invalid host: {host}"));
    if host.is_empty() {
        return Err(invalid());
    }

    if let Some(inner) = host.strip_prefix('[') {
        let (addr, rest) = inner.split_once(']').ok_or_else(invalid)?;
        if addr.is_empty() || !addr.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
            return Err(invalid());
        }
        return match rest {
            "" => Ok(()),
            port => validate_port(port.strip_prefix(':').ok_or_else(invalid)?).ok_or_else(invalid),
        };
    }

    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    let name_ok = name.chars().all(|c| {
        c.is_alphanumeric() || matches!(c, '-' | '.' | '_') || (allow_wildcard && c == '*')
    });
    if !name_ok {
        return Err(invalid());
    }
    match port {
        None => Ok(()),
        Some("*") if allow_wildcard => Ok(()),
        Some(port) => validate_port(port).ok_or_else(invalid),
    }
}

fn validate_port(port: &str) -> Option<()> {
    (!port.is_empty() && port.len() <= 5 && port.chars().all(|c| c.is_ascii_digit())).then_some(())
}

fn reject_whitespace(text: &str) -> Result<(), RulesError> {
    if text.chars().any(char::is_whitespace) {
        Err(RulesError::InvalidPattern(format!("whitespace in pattern: {text}")))
    } else {
        Ok(())
    }
}

/// Strip a leading `*.` or `.` that asks for sub-domain matching.
fn strip_subdomain_marker(text: &str) -> (&str, bool) {
    if let Some(rest) = text.strip_prefix("*.") {
        (rest, true)
    } else if let Some(rest) = text.strip_prefix('.') {
        (rest, true)
    } else {
        (text, false)
    }
}

fn strip_scheme(text: &str) -> &str {
    text.split_once("://").map_or(text, |(_, rest)| rest)
}

/// Split `host/path` into `(host, "/path")`.
fn split_path(text: &str) -> Option<(&str, &str)> {
    text.find('/').map(|i| (&text[..i], &text[i..]))
}

/// Regex for a host, with an optional "any sub-domain" prefix. `any` is
/// what a host wildcard may span.
fn host_regex(host: &str, subdomains: bool, any: &str) -> String {
    let body = wildcard_regex_with(host, any);
    if subdomains {
        format!("(?:{any}\\.)?{body}")
    } else {
        body
    }
}

/// Escape every regex metacharacter, turning `*` into `.*`.
pub(crate) fn wildcard_regex(text: &str) -> String {
    wildcard_regex_with(text, ".*")
}

fn wildcard_regex_with(text: &str, any: &str) -> String {
    text.split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(any)
}

/// Build a regex generated by this module.
fn build_regex(expr: String) -> Result<PortableRegex, RulesError> {
    let native = native_regex(&expr)?;
    let regex = RegexBuilder::new(&native).build()?;
    Ok(PortableRegex::new(regex, expr, false))
}

/// Build a user-supplied regex written in the syntax shared with the
/// decision script.
///
/// A leading `(?i)` is accepted and carried as a flag.
pub fn portable_regex(expr: &str) -> Result<PortableRegex, RulesError> {
    if expr.contains(['\n', '\r', '\u{2028}', '\u{2029}']) {
        return Err(RulesError::NonPortableRegex("line terminator".into()));
    }
    let (body, ignore_case) = match expr.strip_prefix("(?i)") {
        Some(rest) => (rest, true),
        None => (expr, false),
    };
    if body.is_empty() {
        return Err(RulesError::EmptyPattern);
    }
    let native = native_regex(body)?;
    let regex = RegexBuilder::new(&native)
        .case_insensitive(ignore_case)
        .build()?;
    Ok(PortableRegex::new(regex, body.to_string(), ignore_case))
}

const JS_DIGIT: &str = "0-9";
const JS_WORD: &str = "0-9A-Za-z_";
const JS_SPACE: &str = r"\t\n\x0B\x0C\r \xA0\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}";
/// The script's `.`: anything but a line terminator.
const JS_DOT: &str = r"[^\n\r\x{2028}\x{2029}]";

/// Rewrite a regex body in script syntax into the native engine's syntax.
///
/// Only constructs both engines read the same way are accepted. Class
/// escapes, `\b` and `.` get their script meaning (ASCII classes, ASCII
/// word boundary, no line terminators).
fn native_regex(body: &str) -> Result<String, RulesError> {
    let fail = |what: &str| RulesError::NonPortableRegex(format!("{what} in {body}"));
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 16);
    let mut in_class = false;
    // Whether a quantifier may follow, and whether one just did.
    let mut quantifiable = false;
    let mut after_quantifier = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_class {
            match c {
                '\\' => {
                    let next = *chars.get(i + 1).ok_or_else(|| fail("trailing backslash"))?;
                    // The script reads `-` next to a class escape literally.
                    let in_range = (i > 0 && chars[i - 1] == '-')
                        || (chars.get(i + 2) == Some(&'-') && chars.get(i + 3) != Some(&']'));
                    if in_range && matches!(next, 'd' | 'D' | 'w' | 'W' | 's' | 'S') {
                        return Err(fail("class escape in range"));
                    }
                    i += 2;
                    match next {
                        'd' => out.push_str(JS_DIGIT),
                        'w' => out.push_str(JS_WORD),
                        's' => out.push_str(JS_SPACE),
                        'D' => out.push_str(&format!("[^{JS_DIGIT}]")),
                        'W' => out.push_str(&format!("[^{JS_WORD}]")),
                        'S' => out.push_str(&format!("[^{JS_SPACE}]")),
                        'b' => out.push_str(r"\x08"),
                        _ => i += push_escape(&mut out, &chars, i, next).ok_or_else(|| fail("escape"))?,
                    }
                    continue;
                }
                '[' => return Err(fail("nested class")),
                ']' => {
                    in_class = false;
                    quantifiable = true;
                    out.push(']');
                }
                '&' | '~' | '-' if chars.get(i + 1) == Some(&c) => {
                    return Err(fail("class set operation"));
                }
                c => out.push(c),
            }
            i += 1;
            continue;
        }

        let is_quantifier = matches!(c, '*' | '+' | '?' | '{');
        if is_quantifier {
            if c == '?' && after_quantifier {
                // Lazy modifier.
                out.push('?');
                after_quantifier = false;
                i += 1;
                continue;
            }
            if !quantifiable {
                return Err(fail("quantifier without operand"));
            }
            if c == '{' {
                let end = braced_quantifier_end(&chars, i).ok_or_else(|| fail("brace"))?;
                out.extend(&chars[i..=end]);
                i = end + 1;
            } else {
                out.push(c);
                i += 1;
            }
            quantifiable = false;
            after_quantifier = true;
            continue;
        }
        after_quantifier = false;

        match c {
            '\\' => {
                let next = *chars.get(i + 1).ok_or_else(|| fail("trailing backslash"))?;
                i += 2;
                quantifiable = true;
                match next {
                    'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                        let set = match next.to_ascii_lowercase() {
                            'd' => JS_DIGIT,
                            'w' => JS_WORD,
                            _ => JS_SPACE,
                        };
                        let negate = if next.is_ascii_uppercase() { "^" } else { "" };
                        out.push_str(&format!("(?-i:[{negate}{set}])"));
                    }
                    'b' => {
                        if chars.get(i) == Some(&'{') {
                            return Err(fail("word boundary assertion"));
                        }
                        out.push_str(r"(?-u:\b)");
                        quantifiable = false;
                    }
                    _ => i += push_escape(&mut out, &chars, i, next).ok_or_else(|| fail("escape"))?,
                }
                continue;
            }
            '[' => {
                in_class = true;
                // A leading `]` (or `^]`) is literal in this engine but closes
                // the class in the script.
                let mut j = i + 1;
                if chars.get(j) == Some(&'^') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    return Err(fail("leading ] in class"));
                }
                out.push('[');
            }
            '(' => {
                quantifiable = false;
                if chars.get(i + 1) != Some(&'?') {
                    out.push('(');
                    i += 1;
                    continue;
                }
                let prefix = group_prefix_len(&chars, i).ok_or_else(|| fail("group syntax"))?;
                out.extend(&chars[i..i + prefix]);
                i += prefix;
                continue;
            }
            ')' => {
                quantifiable = true;
                out.push(')');
            }
            '|' | '^' | '$' => {
                quantifiable = false;
                out.push(c);
            }
            '.' => {
                quantifiable = true;
                out.push_str(JS_DOT);
            }
            '}' => {
                quantifiable = true;
                out.push_str(r"\}");
            }
            c => {
                quantifiable = true;
                out.push(c);
            }
        }
        i += 1;
    }
    if in_class {
        return Err(fail("unterminated class"));
    }
    Ok(out)
}

/// Push the native form of the escape `\next`, whose argument starts at
/// `at`. Returns how many argument characters were consumed.
fn push_escape(out: &mut String, chars: &[char], at: usize, next: char) -> Option<usize> {
    match next {
        'n' | 'r' | 't' | 'f' | 'v' => {
            out.push('\\');
            out.push(next);
            Some(0)
        }
        'x' | 'u' => {
            let len = if next == 'x' { 2 } else { 4 };
            let digits = chars.get(at..at + len)?;
            if !digits.iter().all(char::is_ascii_hexdigit) {
                return None;
            }
            out.push_str(r"\x{");
            out.extend(digits);
            out.push('}');
            Some(len)
        }
        '<' | '>' => None,
        c if c.is_ascii_punctuation() => {
            out.push('\\');
            out.push(c);
            Some(0)
        }
        _ => None,
    }
}

/// Index of the `}` closing a `{n}`, `{n,}` or `{n,m}` quantifier at `start`.
fn braced_quantifier_end(chars: &[char], start: usize) -> Option<usize> {
    let close = start + chars[start..].iter().position(|&c| c == '}')?;
    let inner: String = chars[start + 1..close].iter().collect();
    let (min, max) = match inner.split_once(',') {
        Some((min, max)) => (min, Some(max)),
        None => (inner.as_str(), None),
    };
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let valid = !min.is_empty() && digits(min) && max.is_none_or(digits);
    valid.then_some(close)
}

/// Length of a `(?:` or `(?<name>` group opener at `start`.
fn group_prefix_len(chars: &[char], start: usize) -> Option<usize> {
    match chars.get(start + 2)? {
        ':' => Some(3),
        '<' => {
            let name_start = start + 3;
            let name_len = chars[name_start..]
                .iter()
                .position(|&c| c == '>')?;
            let name = &chars[name_start..name_start + name_len];
            let valid = name.first().is_some_and(|c| c.is_ascii_alphabetic())
                && name.iter().all(|c| c.is_ascii_alphanumeric() || *c == '_');
            valid.then_some(3 + name_len + 1)
        }
        _ => None,
    }
}
