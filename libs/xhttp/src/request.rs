use crate::client::HttpClient;
use crate::cookie::{Cookie, cookie_header};
use crate::error::{HttpError, InvalidUriKind};
use crate::header::HTTP_CONTENT_TYPE_JSON;
use crate::response::Response;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HeaderName, HeaderValue, USER_AGENT};
use http::uri::PathAndQuery;
use http::{HeaderMap, Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Header map keyed by header name; later writes to a name replace earlier ones
pub type Headers = BTreeMap<String, String>;

/// Query parameters merged into the request URL
pub type Params = BTreeMap<String, String>;

/// Everything needed to build one outgoing request
///
/// Persistent values are applied first, then the one-shot overlay.
pub struct OutgoingRequest<'a> {
    pub(crate) method: Method,
    pub(crate) url: &'a str,
    pub(crate) params: Option<&'a Params>,
    pub(crate) body: Option<Bytes>,
    pub(crate) headers: &'a Headers,
    pub(crate) cookies: &'a [Cookie],
    pub(crate) once_headers: &'a Headers,
    pub(crate) once_cookies: &'a [Cookie],
    pub(crate) user_agent: &'a HeaderValue,
}

impl OutgoingRequest<'_> {
    /// Build the `http::Request`.
    ///
    /// Header order: persistent, then one-shot (case-insensitive, last wins),
    /// then the default User-Agent if none was set. Cookies go into a single
    /// `Cookie` header after any explicit one.
    pub(crate) fn build(self) -> Result<Request<Full<Bytes>>, HttpError> {
        let mut uri = validate_url(self.url)?;
        if let Some(params) = self.params.filter(|params| !params.is_empty()) {
            uri = merge_query(uri, params)?;
        }

        let mut headers = HeaderMap::new();
        for (name, value) in self.headers.iter().chain(self.once_headers) {
            headers.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }

        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }

        if let Some(cookies) = cookie_header(self.cookies.iter().chain(self.once_cookies)) {
            let value = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{existing}; {cookies}"),
                _ => cookies,
            };
            headers.insert(COOKIE, HeaderValue::try_from(value)?);
        }

        let body = match self.body {
            Some(bytes) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTTP_CONTENT_TYPE_JSON));
                }
                bytes
            }
            None => Bytes::new(),
        };

        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(body))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Parse the URL and check it is an absolute `http`/`https` URL.
///
/// Spaces, non-ASCII bytes and the few printable characters a URI cannot
/// carry are percent-escaped in the path and query before parsing.
pub fn validate_url(url: &str) -> Result<Uri, HttpError> {
    let uri: Uri = escape_path(url)
        .parse()
        .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;

    // Require authority (host) for absolute URLs
    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }

    match uri.scheme_str() {
        Some("http" | "https") => Ok(uri),
        Some(scheme) => Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
        }),
        None => Err(HttpError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}

/// Percent-escape the bytes after the authority that are not valid in a URI.
///
/// Control characters are left alone so they still fail parsing.
fn escape_path(url: &str) -> Cow<'_, str> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let authority_start = url.find("://").map_or(0, |i| i + 3);
    let path_start = url[authority_start..]
        .find(['/', '?'])
        .map_or(url.len(), |i| authority_start + i);
    let (head, tail) = url.split_at(path_start);

    let needs_escape = |b: u8| {
        !b.is_ascii()
            || matches!(
                b,
                b' ' | b'"' | b'<' | b'>' | b'\\' | b'^' | b'`' | b'{' | b'|' | b'}'
            )
    };
    if !tail.bytes().any(needs_escape) {
        return Cow::Borrowed(url);
    }

    let mut escaped = String::with_capacity(url.len() + 16);
    escaped.push_str(head);
    for b in tail.bytes() {
        if needs_escape(b) {
            escaped.push('%');
            escaped.push(char::from(HEX[usize::from(b >> 4)]));
            escaped.push(char::from(HEX[usize::from(b & 0x0f)]));
        } else {
            escaped.push(char::from(b));
        }
    }
    Cow::Owned(escaped)
}

/// Merge `params` into the query string of `uri`.
///
/// Existing pairs are kept. All pairs are stably sorted by key, so values
/// sharing a key stay in insertion order, then form-url-encoded.
pub fn merge_query(uri: Uri, params: &Params) -> Result<Uri, HttpError> {
    let mut pairs: Vec<(String, String)> = match uri.query() {
        Some(query) => {
            serde_urlencoded::from_str(query).map_err(|e| HttpError::InvalidUri {
                url: uri.to_string(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?
        }
        None => Vec::new(),
    };
    pairs.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let query = serde_urlencoded::to_string(&pairs)?;

    let mut parts = uri.into_parts();
    let path = parts
        .path_and_query
        .as_ref()
        .map_or("/", PathAndQuery::path);
    let path_and_query =
        PathAndQuery::try_from(format!("{path}?{query}")).map_err(http::Error::from)?;
    parts.path_and_query = Some(path_and_query);

    let merged = Uri::from_parts(parts).map_err(http::Error::from)?;
    Ok(merged)
}

/// Headers and cookies that apply to exactly one request
///
/// Created by [`HttpClient::once_header`] or [`HttpClient::once_cookie`] and
/// consumed by the request method, so the overlay can never leak into a
/// later request.
///
/// # Example
///
/// ```ignore
/// let resp = client
///     .once_header(Headers::from([("x-request-id".to_owned(), "abc".to_owned())]))
///     .once_cookie(vec![Cookie::new("session", "s1")])
///     .get("https://example.com/api", None)
///     .await;
/// ```
#[must_use = "OnceRequest does nothing until a request method is called"]
#[derive(Debug)]
pub struct OnceRequest<'a> {
    client: &'a HttpClient,
    headers: Headers,
    cookies: Vec<Cookie>,
}

impl<'a> OnceRequest<'a> {
    pub(crate) fn new(client: &'a HttpClient) -> Self {
        Self {
            client,
            headers: Headers::new(),
            cookies: Vec::new(),
        }
    }

    /// Set the one-shot headers, replacing any set before
    pub fn once_header(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the one-shot cookies, replacing any set before
    pub fn once_cookie(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Send a GET request with the overlay applied
    pub async fn get(self, url: &str, params: Option<&Params>) -> Box<dyn Response> {
        self.send_with_method(Method::GET, url, params, None::<&()>)
            .await
    }

    /// Send a POST request with the overlay applied
    pub async fn post<B>(
        self,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        self.send_with_method(Method::POST, url, params, body).await
    }

    /// Send a request with an arbitrary method and the overlay applied
    pub async fn send_with_method<B>(
        self,
        method: Method,
        url: &str,
        params: Option<&Params>,
        body: Option<&B>,
    ) -> Box<dyn Response>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .dispatch(method, url, params, body, &self.headers, &self.cookies)
            .await
    }
}
