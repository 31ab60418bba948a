use crate::client::{HttpClient, InnerService};
use crate::config::{HttpClientConfig, TlsRootConfig};
use crate::cookie::Cookie;
use crate::decoder::{RawDecoder, RawResponse, ResponseDecoder};
use crate::error::HttpError;
use crate::layers::{CheckRedirectFn, RedirectAction, RedirectAttempt, RedirectPolicy};
use crate::request::{Headers, Params};
use crate::response::{Response, ResponseBody};
use crate::tls;
use bytes::Bytes;
use http::header::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::follow_redirect::FollowRedirectLayer;

/// Builder for constructing an [`HttpClient`] with a layered tower middleware stack.
///
/// A response decoder is mandatory; every other setting has a default.
/// Repeated calls to a setter keep the last value.
#[must_use]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Create a builder with a specific configuration
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Set the request timeout; `Duration::ZERO` disables it
    ///
    /// The timeout covers the whole request: connecting, redirects and
    /// reading the response body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Accept any server certificate when `true`
    pub fn skip_verify(mut self, skip_verify: bool) -> Self {
        self.config.skip_verify = skip_verify;
        self
    }

    /// Replace the persistent headers
    pub fn header(mut self, headers: Headers) -> Self {
        self.config.headers = headers;
        self
    }

    /// Replace the persistent cookies
    pub fn cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.config.cookies = cookies;
        self
    }

    /// Install a redirect-check callback
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = HttpClient::builder()
    ///     .decoder(RawDecoder)
    ///     .check_redirect(|attempt| {
    ///         if attempt.via().len() >= 3 {
    ///             RedirectAction::Reject("too many hops".to_owned())
    ///         } else {
    ///             RedirectAction::Follow
    ///         }
    ///     })
    ///     .build()?;
    /// ```
    pub fn check_redirect<F>(mut self, check: F) -> Self
    where
        F: Fn(&RedirectAttempt<'_>) -> RedirectAction + Send + Sync + 'static,
    {
        let check: CheckRedirectFn = Arc::new(check);
        self.config.check_redirect = Some(check);
        self
    }

    /// Set the response-decoding strategy
    pub fn decoder<D>(mut self, decoder: D) -> Self
    where
        D: ResponseDecoder + 'static,
    {
        self.config.decoder = Some(Arc::new(decoder));
        self
    }

    /// Set the User-Agent used when no header supplies one
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the TLS root store used when certificates are verified
    pub fn tls_roots(mut self, tls_roots: TlsRootConfig) -> Self {
        self.config.tls_roots = tls_roots;
        self
    }

    /// Set the number of redirects followed when no callback is installed
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// Set to `None` to use hyper-util's default.
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Build the HTTP client with all configured layers
    ///
    /// # Errors
    ///
    /// - [`HttpError::Configuration`] if no response decoder was set
    /// - [`HttpError::InvalidHeaderValue`] if the User-Agent is not a valid header value
    /// - [`HttpError::Tls`] if the TLS configuration cannot be built
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let config = self.config;

        let Some(decoder) = config.decoder else {
            return Err(HttpError::Configuration(
                "no response decoder set".to_owned(),
            ));
        };

        let user_agent = HeaderValue::try_from(config.user_agent)?;

        if config.skip_verify {
            tracing::warn!(
                "TLS certificate verification disabled; any server certificate is accepted"
            );
        }
        let https = build_https_connector(config.skip_verify, config.tls_roots)?;

        // Create the base hyper client with HTTP/2 support and connection pool settings
        let mut client_builder = Client::builder(TokioExecutor::new());

        // pool_timer is required for pool_idle_timeout to work
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .http2_only(false);

        if let Some(idle_timeout) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }

        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        // =======================================================================
        // Tower Layer Stack (outer to inner)
        // =======================================================================
        //
        //   [Timeout?] → Decompression → FollowRedirect → ErrorMapping → hyper_client
        //
        // The timeout layer bounds the exchange up to the response head; the
        // client applies the same timeout around decoding, which reads the body.
        //
        // The redirect policy reports TooManyRedirects/RedirectRejected as
        // HttpError, so transport errors are mapped below it.
        //
        // =======================================================================
        let redirect_policy = RedirectPolicy::new(config.check_redirect, config.max_redirects);

        let service = ServiceBuilder::new()
            .layer(DecompressionLayer::new())
            .layer(FollowRedirectLayer::with_policy(redirect_policy))
            .map_err(map_transport_error)
            .service(hyper_client)
            .map_response(map_decompression_response);

        let timeout = config.timeout;
        let service: InnerService = if timeout.is_zero() {
            BoxCloneSyncService::new(service)
        } else {
            BoxCloneSyncService::new(
                ServiceBuilder::new()
                    .layer(TimeoutLayer::new(timeout))
                    .service(service)
                    .map_err(move |e: tower::BoxError| map_tower_error(e, timeout)),
            )
        };

        Ok(HttpClient {
            service,
            headers: config.headers,
            cookies: config.cookies,
            decoder,
            user_agent,
            max_body_size: config.max_body_size,
            timeout,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a client and send a single request.
///
/// The raw decoder is installed first, then `configure` runs and may
/// override it or any other setting. A build failure is returned as a
/// [`RawResponse`] carrying the error.
///
/// # Example
///
/// ```ignore
/// let resp = do_request(Method::GET, "https://example.com/", None, None::<&()>, |b| {
///     b.timeout(Duration::from_secs(5))
/// })
/// .await;
/// ```
pub async fn do_request<B, F>(
    method: http::Method,
    url: &str,
    params: Option<&Params>,
    body: Option<&B>,
    configure: F,
) -> Box<dyn Response>
where
    B: Serialize + ?Sized,
    F: FnOnce(HttpClientBuilder) -> HttpClientBuilder,
{
    let builder = configure(HttpClientBuilder::new().decoder(RawDecoder));
    match builder.build() {
        Ok(client) => client.send_with_method(method, url, params, body).await,
        Err(e) => Box::new(RawResponse::from_error(e)),
    }
}

fn map_transport_error(err: hyper_util::client::legacy::Error) -> HttpError {
    HttpError::from(err)
}

/// Map tower errors to `HttpError` with actual timeout duration
///
/// Attempts to extract existing `HttpError` from the boxed error before
/// wrapping as `Transport`.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

/// Map the decompression response to our boxed response body type.
///
/// This converts `Response<DecompressionBody<Incoming>>` to `Response<ResponseBody>`
/// by boxing the body with appropriate error type mapping.
fn map_decompression_response<B>(response: http::Response<B>) -> http::Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    http::Response::from_parts(parts, boxed_body)
}

/// Build the HTTPS connector.
///
/// With `skip_verify` any certificate is accepted and `tls_roots` is
/// ignored. Plain `http://` URLs are always allowed.
///
/// HTTP/2 is enabled via `enable_all_versions()` which configures ALPN to
/// advertise both h2 and http/1.1.
///
/// # Errors
///
/// Returns `HttpError::Tls` if the TLS configuration cannot be built, for
/// example when `TlsRootConfig::Native` finds no usable root certificates.
fn build_https_connector(
    skip_verify: bool,
    tls_roots: TlsRootConfig,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    if skip_verify {
        let client_config = tls::skip_verify_client_config().map_err(|e| HttpError::Tls(e.into()))?;
        return Ok(hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(client_config)
            .https_or_http()
            .enable_all_versions()
            .build());
    }

    match tls_roots {
        TlsRootConfig::WebPki => {
            let provider = tls::get_crypto_provider();
            let builder = hyper_rustls::HttpsConnectorBuilder::new()
                .with_provider_and_webpki_roots(provider)
                .map_err(|e| HttpError::Tls(Box::new(e)))?;
            Ok(builder.https_or_http().enable_all_versions().build())
        }
        TlsRootConfig::Native => {
            let client_config = tls::native_roots_client_config()
                // Native returns String error; convert to boxed error for consistency
                .map_err(|e| HttpError::Tls(e.into()))?;
            Ok(hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(client_config)
                .https_or_http()
                .enable_all_versions()
                .build())
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::decoder::JsonDecoder;
    use crate::header::HTTP_USER_AGENT_CHROME_PC;
    use httpmock::prelude::*;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    /// Captures the messages of WARN events
    #[derive(Clone, Default)]
    struct WarningCapture {
        warnings: Arc<Mutex<Vec<String>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut visitor = MessageVisitor(String::new());
                event.record(&mut visitor);
                self.warnings.lock().unwrap().push(visitor.0);
            }
        }
    }

    struct MessageVisitor(String);
    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    fn warnings_during(build: impl FnOnce()) -> Vec<String> {
        let capture = WarningCapture::default();
        let warnings = capture.warnings.clone();
        let subscriber = tracing_subscriber::registry().with(capture);
        tracing::subscriber::with_default(subscriber, build);
        warnings.lock().unwrap().clone()
    }

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.timeout, Duration::ZERO);
        assert!(builder.config.skip_verify);
        assert_eq!(builder.config.user_agent, HTTP_USER_AGENT_CHROME_PC);
        assert!(builder.config.decoder.is_none());
    }

    #[test]
    fn test_builder_setters_last_write_wins() {
        let builder = HttpClientBuilder::new()
            .timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(60))
            .skip_verify(false)
            .header(Headers::from([("a".to_owned(), "1".to_owned())]))
            .header(Headers::from([("b".to_owned(), "2".to_owned())]))
            .cookies(vec![Cookie::new("x", "1")])
            .max_body_size(1024)
            .max_redirects(3)
            .tls_roots(TlsRootConfig::Native)
            .user_agent("custom/1.0");

        assert_eq!(builder.config.timeout, Duration::from_secs(60));
        assert!(!builder.config.skip_verify);
        assert_eq!(
            builder.config.headers,
            Headers::from([("b".to_owned(), "2".to_owned())])
        );
        assert_eq!(builder.config.cookies, vec![Cookie::new("x", "1")]);
        assert_eq!(builder.config.max_body_size, 1024);
        assert_eq!(builder.config.max_redirects, 3);
        assert_eq!(builder.config.tls_roots, TlsRootConfig::Native);
        assert_eq!(builder.config.user_agent, "custom/1.0");
    }

    #[tokio::test]
    async fn test_build_requires_decoder() {
        let result = HttpClientBuilder::new().build();
        match result {
            Err(HttpError::Configuration(msg)) => assert!(msg.contains("decoder")),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_with_decoder() {
        let client = HttpClientBuilder::new()
            .decoder(JsonDecoder)
            .header(Headers::from([("x-a".to_owned(), "1".to_owned())]))
            .cookies(vec![Cookie::new("c", "v")])
            .build()
            .unwrap();

        assert_eq!(client.headers().len(), 1);
        assert_eq!(client.cookies().len(), 1);
    }

    #[tokio::test]
    async fn test_build_invalid_user_agent() {
        let result = HttpClientBuilder::new()
            .decoder(RawDecoder)
            .user_agent("invalid\x00agent")
            .build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_build_with_verification() {
        let client = HttpClientBuilder::new()
            .decoder(RawDecoder)
            .skip_verify(false)
            .build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_build_native_roots() {
        let result = HttpClientBuilder::new()
            .decoder(RawDecoder)
            .skip_verify(false)
            .tls_roots(TlsRootConfig::Native)
            .build();

        // Minimal containers may have no OS certificates
        match &result {
            Ok(_) => {}
            Err(HttpError::Tls(err)) => {
                let msg = err.to_string();
                assert!(
                    msg.contains("native root") || msg.contains("certificate"),
                    "TLS error should mention certificates: {msg}"
                );
            }
            Err(other) => panic!("Unexpected error type: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_skip_verify_warning_emitted() {
        let warnings = warnings_during(|| {
            _ = HttpClientBuilder::new().decoder(RawDecoder).build();
        });
        assert!(
            warnings.iter().any(|w| w.contains("verification disabled")),
            "expected skip-verify warning, got: {warnings:?}"
        );
    }

    #[tokio::test]
    async fn test_verified_build_no_warning() {
        let warnings = warnings_during(|| {
            _ = HttpClientBuilder::new()
                .decoder(RawDecoder)
                .skip_verify(false)
                .build();
        });
        assert!(
            !warnings.iter().any(|w| w.contains("verification disabled")),
            "no skip-verify warning expected, got: {warnings:?}"
        );
    }

    #[tokio::test]
    async fn test_do_request_defaults_to_raw_decoder() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET).path("/do").query_param("k", "v");
            then.status(200).body("raw body");
        });

        let params = Params::from([("k".to_owned(), "v".to_owned())]);
        let resp = do_request(
            http::Method::GET,
            &format!("{}/do", server.base_url()),
            Some(&params),
            None::<&()>,
            |b| b.timeout(Duration::from_secs(5)),
        )
        .await;

        assert_eq!(resp.status_code(), 200);
        assert_eq!(resp.content().as_bytes(), Some(&b"raw body"[..]));
        assert!(resp.downcast_ref::<RawResponse>().is_some());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_do_request_decoder_override() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::POST).path("/do");
            then.status(200).body(r#"{"ok":true}"#);
        });

        let resp = do_request(
            http::Method::POST,
            &format!("{}/do", server.base_url()),
            None,
            Some(&serde_json::json!({"q": 1})),
            |b| b.decoder(JsonDecoder),
        )
        .await;

        assert!(resp.error().is_none(), "unexpected error: {:?}", resp.error());
        assert_eq!(resp.content().as_json().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_do_request_build_failure() {
        let resp = do_request(
            http::Method::GET,
            "http://127.0.0.1:1/",
            None,
            None::<&()>,
            |b| b.user_agent("bad\nagent"),
        )
        .await;

        assert!(matches!(resp.error(), Some(HttpError::InvalidHeaderValue(_))));
        assert_eq!(resp.status_code(), 0);
    }

    #[test]
    fn test_map_tower_error_timeout() {
        let boxed: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let result = map_tower_error(boxed, Duration::from_secs(30));
        assert!(matches!(result, HttpError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[test]
    fn test_map_tower_error_preserves_http_error() {
        let boxed: tower::BoxError = Box::new(HttpError::TooManyRedirects(4));
        let result = map_tower_error(boxed, Duration::from_secs(30));
        assert!(
            matches!(result, HttpError::TooManyRedirects(4)),
            "Should preserve inner HttpError, got: {result:?}"
        );
    }

    #[test]
    fn test_map_tower_error_wraps_unknown_as_transport() {
        let other_err: tower::BoxError = Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let result = map_tower_error(other_err, Duration::from_secs(30));

        assert!(
            matches!(result, HttpError::Transport(_)),
            "Should wrap unknown errors as Transport, got: {result:?}"
        );
    }
}
