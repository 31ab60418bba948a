//! Response-decoding strategies.
//!
//! A [`ResponseDecoder`] turns the transport outcome of a request into the
//! [`Response`] handed back to the caller. Two strategies ship with the crate:
//!
//! - [`RawDecoder`] keeps the body as bytes.
//! - [`JsonDecoder`] parses the body as a JSON document.
//!
//! Custom formats implement the trait and are installed with
//! [`HttpClientBuilder::decoder`](crate::HttpClientBuilder::decoder).

use crate::error::HttpError;
use crate::response::{Content, Response, ResponseHead, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;

/// Converts a transport result into a normalized response
#[async_trait]
pub trait ResponseDecoder: Send + Sync {
    /// Decode the outcome of one request.
    ///
    /// Receives `Err` when the request could not be built or sent. The
    /// transport response must be consumed or dropped on every path.
    async fn decode(&self, result: Result<TransportResponse, HttpError>) -> Box<dyn Response>;
}

/// Decoder keeping the response body as raw bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

/// Response produced by [`RawDecoder`]
#[derive(Debug, Default)]
pub struct RawResponse {
    error: Option<HttpError>,
    content: Option<Bytes>,
    head: Option<ResponseHead>,
}

impl RawResponse {
    /// Response carrying only an error
    #[must_use]
    pub fn from_error(error: HttpError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Body bytes, `None` when the body was not read
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// Body as UTF-8 text, invalid sequences replaced
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.content
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Response for RawResponse {
    fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    fn content(&self) -> Content<'_> {
        self.content
            .as_deref()
            .map_or(Content::None, Content::Bytes)
    }

    fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl ResponseDecoder for RawDecoder {
    async fn decode(&self, result: Result<TransportResponse, HttpError>) -> Box<dyn Response> {
        let response = match result {
            Ok(response) => response,
            Err(e) => return Box::new(RawResponse::from_error(e)),
        };

        let (head, body) = response.read().await;
        tracing::debug!(status = %head.parts.status, "decoded raw response");

        Box::new(match body {
            Ok(bytes) => RawResponse {
                error: None,
                content: Some(bytes),
                head: Some(head),
            },
            Err(e) => RawResponse {
                error: Some(e),
                content: None,
                head: Some(head),
            },
        })
    }
}

/// Decoder parsing the response body as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

/// Response produced by [`JsonDecoder`]
#[derive(Debug, Default)]
pub struct JsonResponse {
    error: Option<HttpError>,
    content: Option<Value>,
    head: Option<ResponseHead>,
}

impl JsonResponse {
    /// Response carrying only an error
    #[must_use]
    pub fn from_error(error: HttpError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Parsed document, `None` on any failure
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.content.as_ref()
    }

    /// Navigate the document by object keys and array indices.
    ///
    /// A segment that parses as an integer indexes arrays; on objects every
    /// segment is a key.
    #[must_use]
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(self.content.as_ref()?, |value, segment| match value {
                Value::Object(map) => map.get(*segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Deserialize the document into `T`, `None` if absent or mismatched
    #[must_use]
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.content.as_ref()?;
        T::deserialize(value).ok()
    }
}

impl Response for JsonResponse {
    fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    fn content(&self) -> Content<'_> {
        self.content.as_ref().map_or(Content::None, Content::Json)
    }

    fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl ResponseDecoder for JsonDecoder {
    async fn decode(&self, result: Result<TransportResponse, HttpError>) -> Box<dyn Response> {
        let response = match result {
            Ok(response) => response,
            Err(e) => return Box::new(JsonResponse::from_error(e)),
        };

        let (head, body) = response.read().await;
        tracing::debug!(status = %head.parts.status, "decoded json response");

        let parsed = body.and_then(|bytes| {
            serde_json::from_slice::<Value>(&bytes).map_err(HttpError::InvalidJson)
        });

        Box::new(match parsed {
            Ok(value) => JsonResponse {
                error: None,
                content: Some(value),
                head: Some(head),
            },
            Err(e) => JsonResponse {
                error: Some(e),
                content: None,
                head: Some(head),
            },
        })
    }
}
