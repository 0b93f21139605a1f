use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

static PATTERN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.?[a-z0-9_]([a-z0-9_-]*[a-z0-9_])?(\.[a-z0-9_]([a-z0-9_-]*[a-z0-9_])?)*$")
        .expect("static pattern regex")
});

/// Host identity of a parsed URL: the host, plus `:port` when the URL names a
/// non-default port. URLs that carry no host yield `""`.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// [`host_key`] of `url`.
pub fn host_of(url: &str) -> Result<String, url::ParseError> {
    Ok(host_key(&Url::parse(url)?))
}

/// Is the host of `url` covered by `pattern`?
///
/// A bare pattern matches the host exactly. A pattern starting with `.` matches
/// strict subdomains only: `.foobar.com` covers `www.foobar.com` but neither
/// `foobar.com` nor `foofoobar.com`. Unparsable URLs never match.
pub fn matches_domain(url: &str, pattern: &str) -> bool {
    matching_pattern(url, std::slice::from_ref(&pattern)).is_some()
}

/// First pattern in `patterns` covering the host of `url`, if any.
///
/// The URL is parsed once; if that fails a diagnostic is logged and nothing matches.
pub fn matching_pattern<'a, S: AsRef<str>>(url: &str, patterns: &'a [S]) -> Option<&'a str> {
    if patterns.is_empty() {
        return None;
    }
    match host_of(url) {
        Ok(host) => first_match(&host, patterns),
        Err(e) => {
            warn!(
                action = "match",
                component = "domain_matcher",
                url = url,
                error = %e,
                "Unparsable URL, treating as non-match"
            );
            None
        }
    }
}

/// First pattern in `patterns` covering `host`.
pub fn first_match<'a, S: AsRef<str>>(host: &str, patterns: &'a [S]) -> Option<&'a str> {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .find(|pattern| host_matches(host, pattern))
}

/// Host-level half of [`matches_domain`].
pub fn host_matches(host: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern.starts_with('.') {
        return host.ends_with(pattern);
    }
    host == pattern
}

/// Bare host or `.`-prefixed host, lowercase, no scheme/port/path.
pub fn is_valid_pattern(pattern: &str) -> bool {
    PATTERN_RE.is_match(pattern)
}

pub fn has_valid_tld(domain: &str) -> bool {
    if domain.is_empty() || domain.len() < 3 || !domain.contains('.') {
        return false;
    }

    if let Some(last_dot) = domain.rfind('.') {
        if last_dot == domain.len() - 1 {
            return false;
        }
        let tld = &domain[last_dot + 1..];
        tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_lowercase())
    } else {
        false
    }
}

/// Strips a trailing `:port` from a host key, leaving IPv6 brackets alone.
fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(idx) if !host[idx..].contains(']') => &host[..idx],
        _ => host,
    }
}

/// Wider pattern suggestion for `host`: its registrable domain, dot-prefixed.
///
/// The registrable domain comes from the public suffix list, so
/// `ads.tracker.example.com` gives `.example.com` and `ads.bbc.co.uk` gives
/// `.bbc.co.uk`. Hosts that already are registrable, IP addresses and hosts
/// without a plausible TLD give `None`.
pub fn parent_pattern(host: &str) -> Option<String> {
    let host = strip_port(host);
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() || !has_valid_tld(host) {
        return None;
    }

    let registrable = psl::domain_str(host)?;
    if registrable == host {
        return None;
    }
    Some(format!(".{registrable}"))
}
