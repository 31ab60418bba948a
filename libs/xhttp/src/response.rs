use crate::cookie::{Cookie, find_response_cookie};
use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body::Frame;
use http_body_util::BodyExt;
use pin_project_lite::pin_project;
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Type alias for the boxed response body that supports decompression.
///
/// This type can hold either a raw body or a decompressed body (gzip/br/deflate).
/// The body is type-erased to allow the decompression layer to work transparently.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

pin_project! {
    /// Body wrapper that enforces size limits during streaming.
    ///
    /// Tracks bytes read and returns [`HttpError::BodyTooLarge`] once the
    /// limit is exceeded. The limit applies to decompressed bytes.
    pub struct LimitedBody {
        #[pin]
        inner: ResponseBody,
        limit: usize,
        read: usize,
    }
}

impl LimitedBody {
    /// Creates a new `LimitedBody` wrapping the given body with the specified limit.
    #[must_use]
    pub fn new(inner: ResponseBody, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }

    /// Returns the number of bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.read
    }
}

impl http_body::Body for LimitedBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    *this.read += data.len();
                    if *this.read > *this.limit {
                        return Poll::Ready(Some(Err(HttpError::BodyTooLarge {
                            limit: *this.limit,
                            actual: *this.read,
                        })));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(HttpError::Read(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Snapshot of the request that produced a response
///
/// `uri` is the final URI after redirects.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// Status line and headers of a received response, with the request behind it
#[derive(Debug)]
pub struct ResponseHead {
    pub parts: http::response::Parts,
    pub request: RequestInfo,
}

/// A response received from the transport whose body has not been read yet
///
/// Handed to [`ResponseDecoder::decode`](crate::ResponseDecoder::decode).
/// Dropping it releases the connection.
#[derive(Debug)]
pub struct TransportResponse {
    pub(crate) parts: http::response::Parts,
    pub(crate) body: ResponseBody,
    pub(crate) request: RequestInfo,
    pub(crate) max_body_size: usize,
}

impl TransportResponse {
    /// Get the response status code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// Get the response headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The request that produced this response
    #[must_use]
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Split into the response head and a size-limited body stream
    #[must_use]
    pub fn into_parts(self) -> (ResponseHead, LimitedBody) {
        let head = ResponseHead {
            parts: self.parts,
            request: self.request,
        };
        (head, LimitedBody::new(self.body, self.max_body_size))
    }

    /// Read the whole body, enforcing the configured `max_body_size`.
    ///
    /// The head is returned on both paths so decoders can keep it when the
    /// body fails.
    pub async fn read(self) -> (ResponseHead, Result<Bytes, HttpError>) {
        let (head, body) = self.into_parts();
        let bytes = body.collect().await.map(http_body_util::Collected::to_bytes);
        (head, bytes)
    }
}

/// Decoded content of a [`Response`]
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    /// Nothing was decoded
    None,
    /// Raw body bytes
    Bytes(&'a [u8]),
    /// Parsed JSON document
    Json(&'a Value),
    /// Content produced by a custom decoder
    Other(&'a (dyn Any + Send + Sync)),
}

impl<'a> Content<'a> {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Content::None)
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Content::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&'a Value> {
        match *self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Downcast custom decoder content
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        match *self {
            Content::Other(any) => any.downcast_ref(),
            _ => None,
        }
    }
}

/// Normalized response returned by every request
///
/// A response always exists, even when the request failed: check
/// [`Response::error`]. Without an underlying HTTP response the status code
/// and content length are `0` and the accessors return `None`.
pub trait Response: Send + Sync + Debug + Any {
    /// Response head, `None` when no HTTP response was received
    fn head(&self) -> Option<&ResponseHead>;

    /// Decoded content
    fn content(&self) -> Content<'_>;

    /// Error raised while building, sending or decoding the request
    fn error(&self) -> Option<&HttpError>;

    /// Downcast support for concrete response types
    fn as_any(&self) -> &dyn Any;

    fn status_code(&self) -> u16 {
        self.head().map_or(0, |head| head.parts.status.as_u16())
    }

    fn headers(&self) -> Option<&HeaderMap> {
        self.head().map(|head| &head.parts.headers)
    }

    /// First `Set-Cookie` entry with the given name
    fn cookie(&self, name: &str) -> Option<Cookie> {
        find_response_cookie(self.headers()?, name)
    }

    /// Advertised `Content-Length`, `0` when absent or unparsable
    fn content_length(&self) -> u64 {
        self.headers()
            .and_then(|headers| headers.get(http::header::CONTENT_LENGTH))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Original response status line and headers
    fn response(&self) -> Option<&http::response::Parts> {
        self.head().map(|head| &head.parts)
    }

    /// The request that produced the response
    fn request(&self) -> Option<&RequestInfo> {
        self.head().map(|head| &head.request)
    }
}

impl dyn Response {
    /// Downcast to a concrete response type
    #[must_use]
    pub fn downcast_ref<T: Response>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}
