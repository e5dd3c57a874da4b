use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component to derive a domain from.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Rejects non-HTTP(S) schemes and URLs without a host. Unless
/// `allow_private` is set, also rejects localhost and private IP ranges
/// (RFC 1918, link-local, unique local IPv6).
///
/// # Examples
///
/// ```
/// use feedsync::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml", false).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("http://192.168.1.1/feed", false).is_err());
/// assert!(validate_feed_url("http://192.168.1.1/feed", true).is_ok());
/// assert!(validate_feed_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_feed_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if allow_private {
        return Ok(url);
    }

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

/// Site host of a feed URL, used as the icon cache key.
///
/// Returns `None` for unparseable URLs and URLs without a host.
pub fn domain_of(url_str: &str) -> Option<String> {
    Url::parse(url_str.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// True if `domain` parses as a bare host (name or IP), with nothing that
/// could escape a directory when used as a file name.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.contains(['/', '\\', ':', '?', '#', '@']) {
        return false;
    }
    if domain.split('.').any(|label| label.is_empty()) {
        return false;
    }
    Host::parse(domain).is_ok()
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml", false).is_ok());
        assert!(validate_feed_url("http://news.example.org", false).is_ok());
        assert!(validate_feed_url("  https://example.com/rss  ", false).is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd", true),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_feed_url("ftp://example.com", true).is_err());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            validate_feed_url("not a url", true),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected_unless_allowed() {
        assert!(validate_feed_url("http://localhost/feed", false).is_err());
        assert!(validate_feed_url("http://127.0.0.1/feed", false).is_err());
        assert!(validate_feed_url("http://[::1]/feed", false).is_err());
        assert!(validate_feed_url("http://127.0.0.1:8080/feed", true).is_ok());
    }

    #[test]
    fn test_private_ips_rejected() {
        assert!(validate_feed_url("http://192.168.1.1/feed", false).is_err());
        assert!(validate_feed_url("http://10.0.0.1:3000/feed", false).is_err());
        assert!(validate_feed_url("http://172.16.0.1/feed", false).is_err());
        assert!(validate_feed_url("http://169.254.1.1/feed", false).is_err());
        assert!(validate_feed_url("http://[fe80::1]/feed", false).is_err());
        assert!(validate_feed_url("http://0.0.0.0/feed", false).is_err());
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(
            domain_of("https://Blog.Example.com/feed.xml").as_deref(),
            Some("blog.example.com")
        );
        assert_eq!(
            domain_of("http://127.0.0.1:9000/rss").as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("sub.example.co.uk"));
        assert!(is_valid_domain("127.0.0.1"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("../etc/passwd"));
        assert!(!is_valid_domain("example.com/evil"));
        assert!(!is_valid_domain("a..b"));
        assert!(!is_valid_domain("host:8080"));
    }
}
