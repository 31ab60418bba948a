use crate::cookie::Cookie;
use crate::decoder::{RawDecoder, ResponseDecoder};
use crate::header::HTTP_USER_AGENT_CHROME_PC;
use crate::layers::CheckRedirectFn;
use crate::request::Headers;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default maximum redirects followed when no redirect-check callback is set
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// TLS root certificate configuration
///
/// Only consulted when certificate verification is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Overall HTTP client configuration
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Timeout for a whole request including redirects (default: none)
    ///
    /// `Duration::ZERO` disables the timeout.
    pub timeout: Duration,

    /// Accept any server certificate (default: true)
    pub skip_verify: bool,

    /// Headers sent with every request
    pub headers: Headers,

    /// Cookies sent with every request, in order
    pub cookies: Vec<Cookie>,

    /// Redirect-check callback (default: none)
    ///
    /// When unset, redirects are followed up to `max_redirects`.
    pub check_redirect: Option<CheckRedirectFn>,

    /// Response-decoding strategy; required by `build()`
    pub decoder: Option<Arc<dyn ResponseDecoder>>,

    /// User-Agent sent when no header supplies one
    /// (default: [`HTTP_USER_AGENT_CHROME_PC`])
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Redirects followed without a callback before failing (default: 10)
    pub max_redirects: usize,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    ///
    /// Set to `None` to use hyper-util's default idle timeout.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("timeout", &self.timeout)
            .field("skip_verify", &self.skip_verify)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("check_redirect", &self.check_redirect.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("user_agent", &self.user_agent)
            .field("max_body_size", &self.max_body_size)
            .field("tls_roots", &self.tls_roots)
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            skip_verify: true,
            headers: Headers::new(),
            cookies: Vec::new(),
            check_redirect: None,
            decoder: None,
            user_agent: HTTP_USER_AGENT_CHROME_PC.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            tls_roots: TlsRootConfig::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Create configuration for testing against local mock servers
    ///
    /// Raw decoder installed, 10 second timeout, small pool.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            decoder: Some(Arc::new(RawDecoder)),
            max_body_size: 1024 * 1024, // 1 MB
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_config_defaults() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::ZERO);
        assert!(config.skip_verify);
        assert!(config.headers.is_empty());
        assert!(config.cookies.is_empty());
        assert!(config.check_redirect.is_none());
        assert!(config.decoder.is_none());
        assert_eq!(config.user_agent, HTTP_USER_AGENT_CHROME_PC);
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.tls_roots, TlsRootConfig::WebPki);
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_http_client_config_for_testing() {
        let config = HttpClientConfig::for_testing();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.decoder.is_some());
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let config = HttpClientConfig::for_testing();
        let debug = format!("{config:?}");
        assert!(debug.contains("decoder: true"));
        assert!(debug.contains("check_redirect: false"));
    }
}
