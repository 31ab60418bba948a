//! Request and response cookies.
//!
//! Outgoing cookies are serialized into a single `Cookie` header as
//! `name=value` pairs joined by `"; "`, in the order they were supplied.
//! Duplicate names are sent as-is.
//!
//! Response cookies are read from `Set-Cookie` headers. Parsing covers the
//! name/value pair and the common attributes (`Path`, `Domain`, `Expires`,
//! `Max-Age`, `Secure`, `HttpOnly`, `SameSite`); no expiry is enforced.

use http::HeaderMap;

/// `SameSite` attribute of a response cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// An HTTP cookie
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Raw `Expires` attribute, not interpreted
    pub expires: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// Create a cookie with only a name and a value
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Parse a single `Set-Cookie` header value.
    ///
    /// Returns `None` when the value has no `name=value` pair or the name is empty.
    /// Unknown attributes are ignored.
    #[must_use]
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };

            match (key.to_ascii_lowercase().as_str(), val) {
                ("path", Some(v)) => cookie.path = Some(v.to_owned()),
                ("domain", Some(v)) => cookie.domain = Some(v.trim_start_matches('.').to_owned()),
                ("expires", Some(v)) => cookie.expires = Some(v.to_owned()),
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
                ("samesite", Some(v)) => {
                    cookie.same_site = match v.to_ascii_lowercase().as_str() {
                        "strict" => Some(SameSite::Strict),
                        "lax" => Some(SameSite::Lax),
                        "none" => Some(SameSite::None),
                        _ => None,
                    };
                }
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                _ => {}
            }
        }

        Some(cookie)
    }

    fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Serialize cookies into a `Cookie` header value, or `None` if there are none.
pub fn cookie_header<'a>(cookies: impl IntoIterator<Item = &'a Cookie>) -> Option<String> {
    let pairs: Vec<String> = cookies.into_iter().map(Cookie::pair).collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// First `Set-Cookie` entry in `headers` whose name equals `name`.
pub fn find_response_cookie(headers: &HeaderMap, name: &str) -> Option<Cookie> {
    headers
        .get_all(http::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(Cookie::parse_set_cookie)
        .find(|cookie| cookie.name == name)
}
