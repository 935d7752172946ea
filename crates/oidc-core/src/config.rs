//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for the protocol engine.
///
/// All fields have sensible defaults; hosts typically override the issuer
/// and the token lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Issuer identifier reported in identity-token and userinfo claims.
    pub issuer: Option<Url>,

    /// Whether the token endpoint is enabled. When disabled, authorization
    /// requests asking for `response_type=code` are rejected, since the
    /// code could never be redeemed.
    pub token_endpoint_enabled: bool,

    /// How long a cached authorization request survives the interactive
    /// sign-in detour.
    #[serde(with = "humantime_serde")]
    pub request_cache_lifetime: Duration,

    /// Default authorization-code lifetime, applied when the ticket does
    /// not carry its own expiry.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Default access-token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Default identity-token lifetime.
    #[serde(with = "humantime_serde")]
    pub identity_token_lifetime: Duration,

    /// Default refresh-token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            token_endpoint_enabled: true,
            request_cache_lifetime: Duration::from_secs(3600),
            authorization_code_lifetime: Duration::from_secs(300),
            access_token_lifetime: Duration::from_secs(3600),
            identity_token_lifetime: Duration::from_secs(1200),
            refresh_token_lifetime: Duration::from_secs(14 * 24 * 3600),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer identifier.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Url) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Enables or disables the token endpoint.
    #[must_use]
    pub fn with_token_endpoint_enabled(mut self, enabled: bool) -> Self {
        self.token_endpoint_enabled = enabled;
        self
    }

    /// Sets the request cache lifetime.
    #[must_use]
    pub fn with_request_cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.request_cache_lifetime = lifetime;
        self
    }

    /// Sets the default access-token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the default refresh-token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.token_endpoint_enabled);
        assert_eq!(config.request_cache_lifetime, Duration::from_secs(3600));
        assert_eq!(config.authorization_code_lifetime, Duration::from_secs(300));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_issuer(Url::parse("https://auth.example.com").unwrap())
            .with_token_endpoint_enabled(false)
            .with_access_token_lifetime(Duration::from_secs(600));

        assert!(!config.token_endpoint_enabled);
        assert_eq!(config.access_token_lifetime, Duration::from_secs(600));
        assert_eq!(
            config.issuer.as_ref().map(Url::as_str),
            Some("https://auth.example.com/")
        );
    }

    #[test]
    fn test_deserialize_with_humantime() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "token_endpoint_enabled": false,
                "request_cache_lifetime": "30m",
                "access_token_lifetime": "2h"
            }"#,
        )
        .unwrap();

        assert!(!config.token_endpoint_enabled);
        assert_eq!(config.request_cache_lifetime, Duration::from_secs(1800));
        assert_eq!(config.access_token_lifetime, Duration::from_secs(7200));
        // Untouched fields keep their defaults.
        assert_eq!(config.refresh_token_lifetime, Duration::from_secs(14 * 24 * 3600));
    }
}
