//! Public endpoint model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme (and protocol name) of an encrypted endpoint
pub const SECURE_SCHEME: &str = "https";

/// A publicly accessible URL that tunnels to the local machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Public URL (e.g., "https://abc123.ngrok.io")
    pub url: String,
    /// Whether traffic to this URL is encrypted
    pub secure: bool,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(url: impl Into<String>, secure: bool) -> Self {
        Self {
            url: url.into(),
            secure,
        }
    }

    /// Create an endpoint from a URL and the protocol a provider reported
    /// for it. Any protocol other than `https` is treated as not secure.
    pub fn from_proto(url: impl Into<String>, proto: &str) -> Self {
        Self::new(url, proto == SECURE_SCHEME)
    }

    /// URL scheme, if the URL has one
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Get the raw URL string
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_proto_secure() {
        let ep = Endpoint::from_proto("https://abc.example", "https");
        assert!(ep.secure);
        assert_eq!(ep.scheme(), Some("https"));
    }

    #[test]
    fn test_from_proto_insecure() {
        let ep = Endpoint::from_proto("http://abc.example", "http");
        assert!(!ep.secure);
        assert_eq!(ep.scheme(), Some("http"));
    }

    #[test]
    fn test_unknown_proto_is_not_secure() {
        let ep = Endpoint::from_proto("tcp://0.tcp.ngrok.io:12345", "tcp");
        assert!(!ep.secure);
        let ep = Endpoint::from_proto("https://abc.example", "HTTPS");
        assert!(!ep.secure);
    }

    #[test]
    fn test_scheme_missing() {
        let ep = Endpoint::new("abc.example", false);
        assert_eq!(ep.scheme(), None);
    }

    #[test]
    fn test_display() {
        let ep = Endpoint::new("https://abc.example", true);
        assert_eq!(format!("{}", ep), "https://abc.example");
    }

    #[test]
    fn test_serde_shape() {
        let ep = Endpoint::new("https://abc.example", true);
        let json = serde_json::to_string(&ep).unwrap();
        assert_eq!(json, r#"{"url":"https://abc.example","secure":true}"#);
    }
}
