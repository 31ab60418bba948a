//! Redirect policy for the HTTP client
//!
//! Every 3xx response with a `Location` is offered to [`RedirectPolicy`]:
//!
//! - With a redirect-check callback installed, the callback decides through
//!   [`RedirectAction`].
//! - Without one, redirects are followed until `max_redirects` have been
//!   followed, after which the request fails with
//!   [`HttpError::TooManyRedirects`].
//!
//! On cross-origin hops the `Authorization`, `Cookie` and
//! `Proxy-Authorization` headers are removed from the follow-up request.

use crate::error::HttpError;
use http::{Request, StatusCode, Uri, header};
use std::fmt;
use std::sync::Arc;
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

/// Headers that are stripped on cross-origin redirects to prevent credential leakage
const SENSITIVE_HEADERS: &[header::HeaderName] = &[
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// Redirect-check callback
///
/// Invoked for every redirect before it is followed.
pub type CheckRedirectFn = Arc<dyn Fn(&RedirectAttempt<'_>) -> RedirectAction + Send + Sync>;

/// Decision returned by a redirect-check callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Follow the redirect
    Follow,
    /// Do not follow; the 3xx response is handed to the decoder as-is
    Stop,
    /// Abort the request with [`HttpError::RedirectRejected`]
    Reject(String),
}

/// A redirect about to be followed
#[derive(Debug)]
pub struct RedirectAttempt<'a> {
    status: StatusCode,
    location: &'a Uri,
    via: &'a [Uri],
}

impl<'a> RedirectAttempt<'a> {
    /// Status code of the redirect response
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Target of the redirect
    #[must_use]
    pub fn location(&self) -> &'a Uri {
        self.location
    }

    /// URIs already requested in this chain, oldest first
    #[must_use]
    pub fn via(&self) -> &'a [Uri] {
        self.via
    }
}

/// Redirect policy driven by an optional [`CheckRedirectFn`]
///
/// State is per request: tower-http clones the policy for every request.
#[derive(Clone)]
pub struct RedirectPolicy {
    check: Option<CheckRedirectFn>,
    max_redirects: usize,
    via: Vec<Uri>,
    cross_origin_detected: bool,
}

impl fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectPolicy")
            .field("check", &self.check.is_some())
            .field("max_redirects", &self.max_redirects)
            .field("via", &self.via)
            .field("cross_origin_detected", &self.cross_origin_detected)
            .finish()
    }
}

impl RedirectPolicy {
    /// Create a policy; `max_redirects` only applies when `check` is `None`
    #[must_use]
    pub fn new(check: Option<CheckRedirectFn>, max_redirects: usize) -> Self {
        Self {
            check,
            max_redirects,
            via: Vec::new(),
            cross_origin_detected: false,
        }
    }

    /// Record a redirect hop and decide whether to follow it
    fn decide(
        &mut self,
        status: StatusCode,
        previous: &Uri,
        location: &Uri,
    ) -> Result<Action, HttpError> {
        self.via.push(previous.clone());

        let action = match &self.check {
            Some(check) => check(&RedirectAttempt {
                status,
                location,
                via: &self.via,
            }),
            None if self.via.len() > self.max_redirects => {
                tracing::debug!(max = self.max_redirects, "redirect limit reached");
                return Err(HttpError::TooManyRedirects(self.max_redirects));
            }
            None => RedirectAction::Follow,
        };

        match action {
            RedirectAction::Follow => {
                if !is_same_origin(previous, location) {
                    self.cross_origin_detected = true;
                    tracing::debug!(
                        original = %previous,
                        target = %location,
                        "cross-origin redirect detected"
                    );
                }
                Ok(Action::Follow)
            }
            RedirectAction::Stop => {
                tracing::debug!(target = %location, "redirect stopped by callback");
                Ok(Action::Stop)
            }
            RedirectAction::Reject(reason) => Err(HttpError::RedirectRejected {
                location: location.to_string(),
                reason,
            }),
        }
    }
}

/// Check if the redirect is to the same origin (scheme, host, port)
///
/// Missing schemes default to "https".
fn is_same_origin(original: &Uri, target: &Uri) -> bool {
    let orig_scheme = original.scheme_str().unwrap_or("https");
    let target_scheme = target.scheme_str().unwrap_or("https");

    let orig_port = original
        .port_u16()
        .unwrap_or_else(|| default_port(orig_scheme));
    let target_port = target
        .port_u16()
        .unwrap_or_else(|| default_port(target_scheme));

    orig_scheme == target_scheme
        && original.host().unwrap_or("") == target.host().unwrap_or("")
        && orig_port == target_port
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "http" => 80,
        "https" => 443,
        _ => 0,
    }
}

impl<B: Clone> Policy<B, HttpError> for RedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, HttpError> {
        self.decide(attempt.status(), attempt.previous(), attempt.location())
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if self.cross_origin_detected {
            let headers = request.headers_mut();
            for header_name in SENSITIVE_HEADERS {
                if headers.remove(header_name).is_some() {
                    tracing::debug!(header = %header_name, "stripped sensitive header on cross-origin redirect");
                }
            }
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        // 307/308 replay the original body
        Some(body.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_is_same_origin() {
        assert!(is_same_origin(
            &uri("https://example.com/foo"),
            &uri("https://example.com/bar")
        ));
        assert!(is_same_origin(
            &uri("https://example.com/foo"),
            &uri("https://example.com:443/bar")
        ));
        assert!(!is_same_origin(
            &uri("https://example.com/foo"),
            &uri("https://other.com/bar")
        ));
        assert!(!is_same_origin(
            &uri("https://example.com/foo"),
            &uri("http://example.com/bar")
        ));
        assert!(!is_same_origin(
            &uri("https://example.com/foo"),
            &uri("https://example.com:8443/bar")
        ));
    }

    #[test]
    fn test_default_policy_follows_up_to_limit() {
        let mut policy = RedirectPolicy::new(None, 2);
        let a = uri("http://example.com/a");
        let b = uri("http://example.com/b");

        assert!(matches!(
            policy.decide(StatusCode::FOUND, &a, &b),
            Ok(Action::Follow)
        ));
        assert!(matches!(
            policy.decide(StatusCode::FOUND, &b, &a),
            Ok(Action::Follow)
        ));
        assert!(matches!(
            policy.decide(StatusCode::FOUND, &a, &b),
            Err(HttpError::TooManyRedirects(2))
        ));
    }

    #[test]
    fn test_callback_sees_chain() {
        let check: CheckRedirectFn = Arc::new(|attempt: &RedirectAttempt<'_>| {
            assert_eq!(attempt.status(), StatusCode::MOVED_PERMANENTLY);
            if attempt.via().len() >= 2 {
                RedirectAction::Stop
            } else {
                RedirectAction::Follow
            }
        });
        let mut policy = RedirectPolicy::new(Some(check), 0);
        let a = uri("http://example.com/a");
        let b = uri("http://example.com/b");

        assert!(matches!(
            policy.decide(StatusCode::MOVED_PERMANENTLY, &a, &b),
            Ok(Action::Follow)
        ));
        assert!(matches!(
            policy.decide(StatusCode::MOVED_PERMANENTLY, &b, &a),
            Ok(Action::Stop)
        ));
        assert_eq!(policy.via, vec![a, b]);
    }

    #[test]
    fn test_callback_reject() {
        let check: CheckRedirectFn =
            Arc::new(|_: &RedirectAttempt<'_>| RedirectAction::Reject("nope".to_owned()));
        let mut policy = RedirectPolicy::new(Some(check), 10);

        let result = policy.decide(
            StatusCode::FOUND,
            &uri("https://example.com/"),
            &uri("https://evil.example/"),
        );
        match result {
            Err(HttpError::RedirectRejected { location, reason }) => {
                assert_eq!(location, "https://evil.example/");
                assert_eq!(reason, "nope");
            }
            other => panic!("expected RedirectRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_cross_origin_strips_sensitive_headers() {
        let mut policy = RedirectPolicy::new(None, 10);
        policy
            .decide(
                StatusCode::FOUND,
                &uri("https://example.com/"),
                &uri("https://other.com/"),
            )
            .unwrap();

        let mut request = Request::builder()
            .uri("https://other.com/")
            .header(header::AUTHORIZATION, "Bearer secret")
            .header(header::COOKIE, "a=1")
            .header(header::ACCEPT, "*/*")
            .body(())
            .unwrap();
        Policy::<(), HttpError>::on_request(&mut policy, &mut request);

        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert!(request.headers().get(header::COOKIE).is_none());
        assert!(request.headers().get(header::ACCEPT).is_some());
    }

    #[test]
    fn test_same_origin_keeps_headers() {
        let mut policy = RedirectPolicy::new(None, 10);
        policy
            .decide(
                StatusCode::FOUND,
                &uri("https://example.com/a"),
                &uri("https://example.com/b"),
            )
            .unwrap();

        let mut request = Request::builder()
            .uri("https://example.com/b")
            .header(header::COOKIE, "a=1")
            .body(())
            .unwrap();
        Policy::<(), HttpError>::on_request(&mut policy, &mut request);

        assert!(request.headers().get(header::COOKIE).is_some());
    }
}
