use crate::builder::HttpClientBuilder;
use crate::cookie::Cookie;
use crate::decoder::ResponseDecoder;
use crate::error::HttpError;
use crate::request::{Headers, OnceRequest, OutgoingRequest, Params};
use crate::response::{RequestInfo, Response, ResponseBody, TransportResponse};
use bytes::Bytes;
use http::Request;
use http::header::HeaderValue;
use http_body_util::Full;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tower_http::follow_redirect::RequestUri;

/// Type-erased transport stack built by [`HttpClientBuilder::build`]
pub type InnerService =
    BoxCloneSyncService<Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// HTTP client with persistent headers and cookies
///
/// Every request returns a [`Response`] produced by the configured
/// [`ResponseDecoder`]; failures are reported through [`Response::error`]
/// rather than a `Result`.
///
/// Use [`HttpClientBuilder`] to construct instances.
///
/// # Thread Safety
///
/// `HttpClient` is `Clone + Send + Sync`. Sending only needs `&self`;
/// changing persistent headers or cookies needs `&mut self`. Per-request
/// headers and cookies go through [`OnceRequest`] instead of client state.
///
/// # Example
///
/// ```ignore
/// let mut client = HttpClient::builder().decoder(JsonDecoder).build()?;
/// client.add_header(Headers::from([("x-api-key".to_owned(), key)]));
///
/// let resp = client.get("https://api.example.com/users", None).await;
/// if let Some(err) = resp.error() {
///     tracing::warn!(error = %err, "request failed");
/// }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: InnerService,
    pub(crate) headers: Headers,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) decoder: Arc<dyn ResponseDecoder>,
    pub(crate) user_agent: HeaderValue,
    pub(crate) max_body_size: usize,
    pub(crate) timeout: Duration,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("user_agent", &self.user_agent)
            .field("max_body_size", &self.max_body_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Persistent headers sent with every request
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Persistent cookies sent with every request
    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Merge into the persistent headers; existing names are overwritten
    pub fn add_header(&mut self, headers: Headers) {
        self.headers.extend(headers);
    }

    /// Replace the persistent headers
    pub fn set_header(&mut self, headers: Headers) {
        self.headers = headers;
    }

    /// Append to the persistent cookies; duplicates are kept
    pub fn add_cookies(&mut self, cookies: Vec<Cookie>) {
        self.cookies.extend(cookies);
    }

    /// Replace the persistent cookies
    pub fn set_cookies(&mut self, cookies: Vec<Cookie>) {
        self.cookies = cookies;
    }

    /// Start a request carrying extra headers for that request only
    pub fn once_header(&self, headers: Headers) -> OnceRequest<'_> {
        OnceRequest::new(self).once_header(headers)
    }

    /// Start a request carrying extra cookies for that request only
    pub fn once_cookie(&self, cookies: Vec<Cookie>) -> OnceRequest<'_> {
        OnceRequest::new(self).once_cookie(cookies)
    }

    /// Send a GET request
    ///
    /// `params` are merged into the URL query string.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let params = Params::from([("q".to_owned(), "rust".to_owned())]);
    /// let resp = client.get("https://api.example.com/search", Some(&params)).await;
    /// assert_eq!(resp.status_code(), 200);
    /// ```
    pub async fn get(&self, url: &str, params: Option<&Params>) -> Box<dyn Response> {
        self.send_with_method(http::Method::GET, url, params, None::<&()>)
            .await
    }

    /// Send a POST request with an optional JSON body
    ///
    /// # Example
    ///
    /// ```ignore
    /// let resp = client
    ///     .post("https://api.example.com/users", None, Some(&NewUser { name: "Alice" }))
    ///     .await;
    /// ```
    pub async fn post<B>(
        &self,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        self.send_with_method(http::Method::POST, url, params, body)
            .await
    }

    /// Send a request with an arbitrary method and an optional JSON body
    pub async fn send_with_method<B>(
        &self,
        method: http::Method,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        self.dispatch(method, url, params, body, &Headers::new(), &[])
            .await
    }

    /// Run one request under the client timeout
    ///
    /// The deadline covers serialization, the exchange up to the response
    /// head and the body read done by the decoder.
    pub(crate) async fn dispatch<B>(
        &self,
        method: http::Method,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
        once_headers: &Headers,
        once_cookies: &[Cookie],
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        let exchange = self.exchange(method, url, params, body, once_headers, once_cookies);
        if self.timeout.is_zero() {
            return exchange.await;
        }

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(response) => response,
            Err(_) => {
                tracing::debug!(url, timeout = ?self.timeout, "request timed out");
                self.decoder
                    .decode(Err(HttpError::Timeout(self.timeout)))
                    .await
            }
        }
    }

    /// Serialize, build, send and decode one request
    async fn exchange<B>(
        &self,
        method: http::Method,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
        once_headers: &Headers,
        once_cookies: &[Cookie],
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        let body = match body.map(serde_json::to_vec).transpose() {
            Ok(body) => body.map(Bytes::from),
            Err(e) => return self.decoder.decode(Err(HttpError::RequestBody(e))).await,
        };

        let request = OutgoingRequest {
            method,
            url,
            params,
            body,
            headers: &self.headers,
            cookies: &self.cookies,
            once_headers,
            once_cookies,
            user_agent: &self.user_agent,
        }
        .build();

        let result = match request {
            Ok(request) => self.transmit(request).await,
            Err(e) => {
                tracing::debug!(url, error = %e, "failed to build request");
                Err(e)
            }
        };

        self.decoder.decode(result).await
    }

    async fn transmit(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<TransportResponse, HttpError> {
        let mut info = RequestInfo {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        };
        tracing::debug!(method = %info.method, uri = %info.uri, "sending request");

        let response = self.service.clone().oneshot(request).await?;
        let (parts, body) = response.into_parts();

        if let Some(RequestUri(final_uri)) = parts.extensions.get::<RequestUri>() {
            info.uri = final_uri.clone();
        }
        tracing::debug!(status = %parts.status, uri = %info.uri, "received response");

        Ok(TransportResponse {
            parts,
            body,
            request: info,
            max_body_size: self.max_body_size,
        })
    }
}
