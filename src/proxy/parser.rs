//! Endpoint parser for extracting connect targets from descriptors

use crate::proxy::models::{ParsedTarget, SCHEME_SEPARATOR};

/// Port assumed when a descriptor's authority carries none
pub const DEFAULT_PORT: u16 = 443;

/// Endpoint parser for descriptor strings
pub struct EndpointParser;

impl EndpointParser {
    /// Extract the host and port a descriptor points at
    ///
    /// Supports forms such as:
    /// - scheme://HOST:PORT
    /// - scheme://USER@HOST:PORT?query#name
    /// - scheme://USER@[IPV6]:PORT
    /// - scheme://HOST (port 443)
    ///
    /// Returns `None` for anything that does not yield a non-empty host and a
    /// port in 1..=65535.
    pub fn parse(descriptor: &str) -> Option<ParsedTarget> {
        let (_, rest) = descriptor.split_once(SCHEME_SEPARATOR)?;

        let authority = Self::strip_suffix_at(rest, '#');
        let authority = Self::strip_suffix_at(authority, '?');

        let authority = match authority.rfind('@') {
            Some(at) => &authority[at + 1..],
            None => authority,
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, Self::parse_port(port)?),
            None => (authority, DEFAULT_PORT),
        };

        let host = host.trim_matches(|c| c == '[' || c == ']');
        if host.is_empty() {
            return None;
        }

        Some(ParsedTarget::new(host.to_string(), port))
    }

    fn strip_suffix_at(s: &str, marker: char) -> &str {
        s.split_once(marker).map_or(s, |(head, _)| head)
    }

    fn parse_port(s: &str) -> Option<u16> {
        // u16 parsing tolerates a leading '+', which is not a port
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match s.parse::<u16>() {
            Ok(0) | Err(_) => None,
            Ok(port) => Some(port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, port: u16) -> Option<ParsedTarget> {
        Some(ParsedTarget::new(host.to_string(), port))
    }

    #[test]
    fn test_parse_host_and_port() {
        assert_eq!(
            EndpointParser::parse("trojan://x@93.184.216.34:443"),
            target("93.184.216.34", 443)
        );
        assert_eq!(
            EndpointParser::parse("ss://example.com:8388"),
            target("example.com", 8388)
        );
    }

    #[test]
    fn test_parse_strips_fragment_and_query() {
        assert_eq!(
            EndpointParser::parse("vless://id@host.example:2053?security=tls&sni=a.b#My:Node"),
            target("host.example", 2053)
        );
        assert_eq!(
            EndpointParser::parse("vless://id@host.example:2053#name?with=query"),
            target("host.example", 2053)
        );
    }

    #[test]
    fn test_parse_credentials_use_last_at() {
        assert_eq!(
            EndpointParser::parse("trojan://pa@ss@10.0.0.1:8443"),
            target("10.0.0.1", 8443)
        );
    }

    #[test]
    fn test_parse_ipv6_literal() {
        assert_eq!(
            EndpointParser::parse("vless://b@[::1]:8443#old"),
            target("::1", 8443)
        );
        assert_eq!(
            EndpointParser::parse("vless://b@[2001:db8::1]:443"),
            target("2001:db8::1", 443)
        );
    }

    #[test]
    fn test_parse_strips_brackets_from_both_ends() {
        assert_eq!(EndpointParser::parse("ss://]h[:80"), target("h", 80));
        assert_eq!(EndpointParser::parse("ss://[[fe80::1]]:80"), target("fe80::1", 80));
    }

    #[test]
    fn test_parse_default_port() {
        assert_eq!(
            EndpointParser::parse("vmess://eyJhZGQiOiIxLjIuMy40In0="),
            target("eyJhZGQiOiIxLjIuMy40In0=", DEFAULT_PORT)
        );
        assert_eq!(EndpointParser::parse("ss://example.com"), target("example.com", 443));
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        assert!(EndpointParser::parse("1.2.3.4:443").is_none());
        assert!(EndpointParser::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(EndpointParser::parse("ss://host:abc").is_none());
        assert!(EndpointParser::parse("ss://host:0").is_none());
        assert!(EndpointParser::parse("ss://host:65536").is_none());
        assert!(EndpointParser::parse("ss://host:+80").is_none());
        assert!(EndpointParser::parse("ss://host:").is_none());
    }

    #[test]
    fn test_parse_rejects_empty_host() {
        assert!(EndpointParser::parse("ss://:443").is_none());
        assert!(EndpointParser::parse("ss://user@").is_none());
        assert!(EndpointParser::parse("ss://[]:443").is_none());
        assert!(EndpointParser::parse("ss://][:443").is_none());
        assert!(EndpointParser::parse("a://]:1").is_none());
        assert!(EndpointParser::parse("ss://").is_none());
    }

    #[test]
    fn test_parse_is_total() {
        let inputs = [
            "://",
            ":///",
            "a://@:",
            "a://@@@",
            "a://[",
            "a://]:1",
            "a://#?@:",
            "x://h:1:2",
            "x://h:99999999999999999999",
            "vmess://🌐:443",
            "\u{0}://\u{0}:1",
        ];
        for input in inputs {
            if let Some(parsed) = EndpointParser::parse(input) {
                assert!(!parsed.host.is_empty(), "empty host for {input:?}");
                assert!(parsed.port >= 1, "port 0 for {input:?}");
            }
        }
    }
}
