//! HTTP seam of the scraper.
//!
//! Components never talk to `reqwest` directly: they build an [`HttpRequest`]
//! and hand it to an [`HttpTransport`], which keeps the pipeline testable with
//! a scripted transport and lets callers plug in their own client.

mod client;
pub mod cookies;
pub mod headers;

pub use client::{ReqwestTransport, create_client_builder};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
    /// Per-call timeout; the transport default applies when unset.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body.into()),
            timeout: None,
        }
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Every `Set-Cookie` occurrence, in response order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues `request`, resolving to [`crate::ScrapeError::Cancelled`] as soon as
    /// `cancel` fires and to [`crate::ScrapeError::Timeout`] when the call outlives
    /// its timeout. Non-success statuses are returned as responses, not errors.
    async fn fetch(&self, request: HttpRequest, cancel: &CancellationToken)
    -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_set_cookies_keeps_every_occurrence() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; HttpOnly"));
        let response = HttpResponse {
            status: 200,
            url: "https://example.com".to_string(),
            headers,
            body: String::new(),
        };
        assert!(response.is_success());
        assert_eq!(
            response.set_cookies().collect::<Vec<_>>(),
            vec!["a=1; Path=/", "b=2; HttpOnly"]
        );
    }
}
