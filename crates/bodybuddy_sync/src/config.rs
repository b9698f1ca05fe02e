//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use crate::registry::EntityKind;
use reqwest::Url;
use std::time::Duration;

/// Base URL of the catalog API used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://wger.localhost:32768/api/v2/";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL that endpoints are resolved against.
    pub base_url: String,
    /// Static API token sent as `Authorization: Token <token>`.
    pub token: String,
    /// Request timeout. `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl SyncConfig {
    /// Creates a configuration for `base_url` with the given token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: None,
            user_agent: concat!("bodybuddy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Resolves the first page URL of `kind`.
    ///
    /// The base is treated as a directory even without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidUrl`] if the base URL cannot be parsed or
    /// the endpoint cannot be joined onto it.
    pub fn endpoint_url(&self, kind: EntityKind) -> SyncResult<Url> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| SyncError::InvalidUrl(format!("{base}: {e}")))?;
        base.join(kind.endpoint())
            .map_err(|e| SyncError::InvalidUrl(format!("{base}{}: {e}", kind.endpoint())))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = SyncConfig::new("https://wger.example/api/v2/", "secret")
            .with_timeout(Duration::from_secs(10))
            .with_user_agent("tests");

        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.user_agent, "tests");
        assert_eq!(config.authorization(), "Token secret");
    }

    #[test]
    fn endpoints_resolve_under_base() {
        let config = SyncConfig::default();
        assert_eq!(
            config.endpoint_url(EntityKind::Exercise).unwrap().as_str(),
            "http://wger.localhost:32768/api/v2/exercise?language=2"
        );

        let config = SyncConfig::new("https://wger.example/api/v2", "");
        assert_eq!(
            config.endpoint_url(EntityKind::WeightUnit).unwrap().as_str(),
            "https://wger.example/api/v2/weightunit"
        );
    }

    #[test]
    fn bad_base_is_invalid_url() {
        let config = SyncConfig::new("not a url", "");
        assert!(matches!(
            config.endpoint_url(EntityKind::Language),
            Err(SyncError::InvalidUrl(_))
        ));
    }
}
