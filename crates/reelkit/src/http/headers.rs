//! Browser-like header sets.
//!
//! The upstream site degrades or rejects requests that do not look like a
//! desktop browser, so every request starts from one of these sets.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN,
    REFERER, USER_AGENT,
};
use tracing::debug;

use super::cookies::{self, CookieMap};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const LANGUAGE: &str = "en-US,en;q=0.9";

pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";
pub const LIVEWIRE_HEADER: &str = "X-Livewire";

/// Insert `value` under `name`, skipping values that are not valid header text.
pub fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => {
            debug!(header = %name, error = %e, "Invalid header value; skipping");
        }
    }
}

fn browser_base() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(LANGUAGE));
    // No `Accept-Encoding`: reqwest adds it and decompresses when the feature is on.
    headers
}

/// Headers for a top-level navigation to a landing page.
pub fn landing_headers() -> HeaderMap {
    let mut headers = browser_base();
    headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-user"),
        HeaderValue::from_static("?1"),
    );
    headers
}

/// Headers for a protocol `POST` made on behalf of an established session.
pub fn protocol_headers(
    origin: &str,
    referer: &str,
    csrf_token: &str,
    session_cookies: &CookieMap,
) -> HeaderMap {
    let mut headers = browser_base();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html, application/xhtml+xml"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("x-livewire"),
        HeaderValue::from_static("true"),
    );
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    insert_str(&mut headers, ORIGIN, origin);
    insert_str(&mut headers, REFERER, referer);
    if !csrf_token.is_empty() {
        insert_str(
            &mut headers,
            HeaderName::from_static("x-csrf-token"),
            csrf_token,
        );
    }
    if let Some(cookie_header) = cookies::build_cookie_header(session_cookies) {
        insert_str(&mut headers, COOKIE, &cookie_header);
    }
    if let Some(xsrf) = cookies::decoded_xsrf(session_cookies) {
        insert_str(&mut headers, HeaderName::from_static("x-xsrf-token"), &xsrf);
    }
    headers
}

/// Headers for a watch page: a generic desktop browser.
pub fn watch_headers() -> HeaderMap {
    let mut headers = browser_base();
    headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers
}

/// Headers for an embed host that checks it is being framed by itself.
pub fn embed_headers(referer: &str) -> HeaderMap {
    let mut headers = watch_headers();
    insert_str(&mut headers, REFERER, referer);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::cookies::parse_set_cookies;

    #[test]
    fn test_protocol_headers_carry_session_state() {
        let cookies = parse_set_cookies(["XSRF-TOKEN=tok%3D", "site_session=s1"]);
        let headers = protocol_headers(
            "https://videos.test",
            "https://videos.test/bob",
            "csrf-1",
            &cookies,
        );

        assert_eq!(headers[CSRF_HEADER], "csrf-1");
        assert_eq!(headers[XSRF_HEADER], "tok=");
        assert_eq!(headers[LIVEWIRE_HEADER], "true");
        assert_eq!(headers[COOKIE], "XSRF-TOKEN=tok%3D; site_session=s1");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_protocol_headers_without_xsrf() {
        let headers = protocol_headers("https://videos.test", "", "", &CookieMap::default());
        assert!(headers.get(XSRF_HEADER).is_none());
        assert!(headers.get(CSRF_HEADER).is_none());
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn test_landing_headers_look_like_a_browser() {
        let headers = landing_headers();
        assert_eq!(headers[USER_AGENT], DEFAULT_UA);
        assert!(headers.contains_key("sec-fetch-mode"));
        assert!(headers.get("accept-encoding").is_none());
    }
}
