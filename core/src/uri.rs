/*
 * uri.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Divhttp, an HTTP client engine.
 *
 * Divhttp is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Divhttp is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Divhttp.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Base URL handling: a request manager is bound to one scheme/host/port, taken from a URL like
//! `https://api.example.com` (default ports per scheme) or given explicitly. Per-call targets are
//! path + query only.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use url::Url;

use crate::error::ConfigError;

/// RFC 3986 unreserved characters stay as-is; everything else is percent-encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Bytes that would split or end the request line: controls (CR, LF included) and space.
/// Existing `%XX` escapes pass through untouched.
const TARGET_UNSAFE: &AsciiSet = &CONTROLS.add(b' ');

/// Fixed host, port, and TLS flag of a request manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
        }
    }

    /// Parse a base URL. The scheme decides TLS (`https`, `wss`) and the default port.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            })?;
        let port = match parsed.port() {
            Some(p) => p,
            None => default_port(parsed.scheme())
                .ok_or_else(|| ConfigError::UnsupportedScheme(parsed.scheme().to_string()))?,
        };
        Ok(Self {
            host: host.to_string(),
            port,
            use_tls: is_secure_scheme(parsed.scheme()),
        })
    }

    /// Value for the Host header: host alone on the scheme's default port, host:port otherwise.
    pub fn host_header(&self) -> String {
        let default = if self.use_tls { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// host:port as understood by the resolver.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default port for the schemes the engine knows about.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn is_secure_scheme(scheme: &str) -> bool {
    scheme == "https" || scheme == "wss"
}

/// True if the URL's scheme implies TLS. Unparseable URLs are treated as not encrypted.
pub fn is_encrypted(url: &str) -> bool {
    Url::parse(url)
        .map(|u| is_secure_scheme(u.scheme()))
        .unwrap_or(false)
}

/// Host of a URL, or None if it does not parse.
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_string())
}

/// Explicit port of a URL, else the scheme default.
pub fn extract_port(url: &str) -> Option<u16> {
    let parsed = Url::parse(url).ok()?;
    parsed.port().or_else(|| default_port(parsed.scheme()))
}

/// Encoded path of a URL (no query), or None if it does not parse.
pub fn path_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_string())
}

/// Request target for a per-call URL: path and query are used as given, an absolute URL is
/// reduced to its path and query, and an empty URL is the root. Whitespace, control and
/// non-ASCII bytes are percent-encoded so the target stays one token on the request line.
pub fn request_target(url: &str) -> String {
    if url.is_empty() {
        return "/".to_string();
    }
    if url.contains("://") {
        if let Ok(parsed) = Url::parse(url) {
            return match parsed.query() {
                Some(q) => format!("{}?{}", parsed.path(), q),
                None => parsed.path().to_string(),
            };
        }
    }
    escape_target(url)
}

/// Percent-encode the bytes of a request target that may not appear on the request line.
pub fn escape_target(target: &str) -> String {
    utf8_percent_encode(target, TARGET_UNSAFE).to_string()
}

/// Percent-encode a query or path value, keeping only unreserved characters.
pub fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_defaults_to_443() {
        let e = Endpoint::parse("https://api.example.com").unwrap();
        assert_eq!(e, Endpoint::new("api.example.com", 443, true));
        assert_eq!(e.host_header(), "api.example.com");
    }

    #[test]
    fn explicit_port_kept_in_host_header() {
        let e = Endpoint::parse("http://localhost:8080/v1").unwrap();
        assert_eq!(e.port, 8080);
        assert!(!e.use_tls);
        assert_eq!(e.host_header(), "localhost:8080");
        assert_eq!(e.authority(), "localhost:8080");
    }

    #[test]
    fn unknown_scheme_without_port_rejected() {
        assert!(matches!(
            Endpoint::parse("gopher://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn helpers() {
        assert!(is_encrypted("wss://example.com/socket"));
        assert!(!is_encrypted("http://example.com"));
        assert!(!is_encrypted("::garbage"));
        assert_eq!(extract_host("https://a.b.c:9/x").as_deref(), Some("a.b.c"));
        assert_eq!(extract_port("ws://example.com"), Some(80));
        assert_eq!(extract_port("ftp://example.com"), Some(21));
        assert_eq!(path_from_url("https://example.com/a/b%20c?q=1").as_deref(), Some("/a/b%20c"));
    }

    #[test]
    fn request_targets() {
        assert_eq!(request_target(""), "/");
        assert_eq!(request_target("/v1/items?page=2"), "/v1/items?page=2");
        assert_eq!(request_target("https://example.com/a?b=c"), "/a?b=c");
        assert_eq!(request_target("http://example.com"), "/");
    }

    #[test]
    fn target_cannot_split_request_line() {
        let t = request_target("/a HTTP/1.1\r\nX-Injected: yes\r\nX-Pad: /");
        assert_eq!(t, "/a%20HTTP/1.1%0D%0AX-Injected:%20yes%0D%0AX-Pad:%20/");
        assert!(!t.contains(' ') && !t.contains('\r') && !t.contains('\n'));
        assert_eq!(request_target("/search?q=a%20b"), "/search?q=a%20b");
        assert_eq!(escape_target("/caf\u{e9}"), "/caf%C3%A9");
    }

    #[test]
    fn encode_keeps_unreserved() {
        assert_eq!(url_encode("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(url_encode("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(url_encode("é"), "%C3%A9");
    }
}
