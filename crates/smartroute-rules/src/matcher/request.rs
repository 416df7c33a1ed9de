//! Per-request view of a URL used by the matchers.

use std::cell::OnceCell;

/// A request as seen by the rule matcher.
///
/// The lower-cased URL is computed once; the scheme-stripped URL only when a
/// rule needs it.
#[derive(Debug)]
pub struct RequestInfo<'a> {
    url: &'a str,
    lower_url: String,
    host: String,
    host_and_port: String,
    stripped_url: OnceCell<String>,
}

impl<'a> RequestInfo<'a> {
    /// Build from a URL alone; the host is taken from the URL's authority.
    pub fn new(url: &'a str) -> Self {
        let lower_url = url.to_lowercase();
        let (host, port) = split_authority(&lower_url);
        let host = host.to_string();
        let host_and_port = join_host_port(&host, port);
        Self {
            url,
            lower_url,
            host,
            host_and_port,
            stripped_url: OnceCell::new(),
        }
    }

    /// Build from a URL and the host name reported by the caller.
    pub fn with_host(url: &'a str, host: &str) -> Self {
        let lower_url = url.to_lowercase();
        let (_, port) = split_authority(&lower_url);
        let host = host.to_lowercase();
        let host_and_port = join_host_port(&host, port);
        Self {
            url,
            lower_url,
            host,
            host_and_port,
            stripped_url: OnceCell::new(),
        }
    }

    /// The URL as received, original case.
    pub fn url(&self) -> &str {
        self.url
    }

    pub fn lower_url(&self) -> &str {
        &self.lower_url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `host:port` when the URL carries a non-default port, else the host.
    pub fn host_and_port(&self) -> &str {
        &self.host_and_port
    }

    /// Lower-cased URL without its `scheme://` prefix.
    pub fn stripped_url(&self) -> &str {
        self.stripped_url.get_or_init(|| {
            let lower = self.lower_url.as_str();
            match lower.find("://") {
                Some(i) => lower[i + 3..].to_string(),
                None => lower.to_string(),
            }
        })
    }
}

fn join_host_port(host: &str, port: Option<&str>) -> String {
    match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Default port of the schemes the engine routes.
pub fn default_port(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" | "ws" => Some("80"),
        "https" | "wss" => Some("443"),
        "ftp" => Some("21"),
        _ => None,
    }
}

/// Split the authority of a lower-cased URL into host and explicit,
/// non-default port.
///
/// User info is dropped and IPv6 literals keep their brackets. The decision
/// script carries a line-for-line equivalent of this function.
pub fn split_authority(lower_url: &str) -> (&str, Option<&str>) {
    let (scheme, rest) = match lower_url.find("://") {
        Some(i) => (&lower_url[..i], &lower_url[i + 3..]),
        None => ("", lower_url),
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority.rfind('@').map_or(authority, |i| &authority[i + 1..]);

    let (host, port) = if authority.starts_with('[') {
        match authority.find(']') {
            Some(i) => (&authority[..=i], authority[i + 1..].strip_prefix(':')),
            None => (authority, None),
        }
    } else {
        match authority.rfind(':') {
            Some(i) => (&authority[..i], Some(&authority[i + 1..])),
            None => (authority, None),
        }
    };

    let port = port.filter(|p| !p.is_empty() && Some(*p) != default_port(scheme));
    (host, port)
}
