#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Convenience HTTP client facade
//!
//! This crate wraps a hyper-based client with:
//! - Persistent headers and cookies sent with every request
//! - One-shot headers and cookies scoped to a single call ([`OnceRequest`])
//! - Pluggable response decoding ([`RawDecoder`], [`JsonDecoder`] or your own [`ResponseDecoder`])
//! - Automatic TLS via rustls, with certificate verification off by default
//! - Configurable timeouts and redirect handling
//! - **Transparent response decompression** (gzip, brotli, deflate)
//!
//! Requests never return `Result`: every call produces a [`Response`] and
//! failures are reported by [`Response::error`].
//!
//! # Example
//!
//! ```ignore
//! use xhttp::{HttpClient, JsonDecoder, Params};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .decoder(JsonDecoder)
//!     .build()?;
//!
//! let params = Params::from([("page".to_owned(), "2".to_owned())]);
//! let resp = client.get("https://example.com/api/items", Some(&params)).await;
//! match resp.error() {
//!     None => println!("{:?}", resp.content().as_json()),
//!     Some(err) => eprintln!("request failed: {err}"),
//! }
//!
//! // One-off request with a throwaway client
//! let resp = xhttp::do_request(http::Method::GET, "https://example.com/", None, None::<&()>, |b| b).await;
//! ```

mod builder;
mod client;
mod config;
mod cookie;
mod decoder;
mod error;
mod header;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::{HttpClientBuilder, do_request};
pub use client::HttpClient;
pub use config::{DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_REDIRECTS, HttpClientConfig, TlsRootConfig};
pub use cookie::{Cookie, SameSite};
pub use decoder::{JsonDecoder, JsonResponse, RawDecoder, RawResponse, ResponseDecoder};
pub use error::{HttpError, InvalidUriKind};
pub use header::{
    HTTP_CONTENT_TYPE_FORM_DATA, HTTP_CONTENT_TYPE_JSON, HTTP_CONTENT_TYPE_TEXT,
    HTTP_CONTENT_TYPE_XML, HTTP_USER_AGENT_CHROME_MOBILE, HTTP_USER_AGENT_CHROME_PC,
};
pub use layers::{CheckRedirectFn, RedirectAction, RedirectAttempt, RedirectPolicy};
pub use request::{Headers, OnceRequest, Params};
pub use response::{
    Content, LimitedBody, RequestInfo, Response, ResponseBody, ResponseHead, TransportResponse,
};
