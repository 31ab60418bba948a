//! Well-known header values.

/// Desktop Chrome User-Agent, sent when a request carries no `User-Agent` of its own
pub const HTTP_USER_AGENT_CHROME_PC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Mobile browser User-Agent
pub const HTTP_USER_AGENT_CHROME_MOBILE: &str = "Mozilla/5.0 (Linux; U; Android 2.2.1; zh-cn; HTC_Wildfire_A3333 Build/FRG83D) AppleWebKit/533.1 (KHTML, like Gecko) Version/4.0 Mobile Safari/533.1";

/// `Content-Type` for plain text
pub const HTTP_CONTENT_TYPE_TEXT: &str = "text/plain";

/// `Content-Type` for XML documents
pub const HTTP_CONTENT_TYPE_XML: &str = "application/xml";

/// `Content-Type` for JSON documents
pub const HTTP_CONTENT_TYPE_JSON: &str = "application/json";

/// `Content-Type` for URL-encoded forms
pub const HTTP_CONTENT_TYPE_FORM_DATA: &str = "application/x-www-form-urlencoded";

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_constants_are_valid_header_values() {
        for value in [
            HTTP_USER_AGENT_CHROME_PC,
            HTTP_USER_AGENT_CHROME_MOBILE,
            HTTP_CONTENT_TYPE_TEXT,
            HTTP_CONTENT_TYPE_XML,
            HTTP_CONTENT_TYPE_JSON,
            HTTP_CONTENT_TYPE_FORM_DATA,
        ] {
            assert!(HeaderValue::from_str(value).is_ok(), "invalid: {value}");
        }
    }
}
