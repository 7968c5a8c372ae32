#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelkit::http::{HttpRequest, HttpResponse, HttpTransport};
use reelkit::{Result, ScrapeError, ScraperConfig};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const ORIGIN: &str = "https://videos.test";

pub fn test_config() -> ScraperConfig {
    ScraperConfig {
        init_jitter_ms: 0,
        retry_backoff_ms: 0,
        ..ScraperConfig::default().with_origin(ORIGIN)
    }
}

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

struct Route {
    method: Method,
    url: String,
    handler: Handler,
}

/// Scripted transport that records every request it sees.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Duration,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn route<F>(&self, method: Method, url: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            url: url.to_string(),
            handler: Box::new(handler),
        });
    }

    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }

    pub fn requests_to(&self, method: &Method, url: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    pub fn total(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn fetch(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let routes = self.routes.lock();
        let response = routes
            .iter()
            .find(|route| route.method == request.method && route.url == request.url)
            .map(|route| (route.handler)(&request))
            .unwrap_or_else(|| response(404, "not found"));
        Ok(response)
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        url: String::new(),
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

pub fn with_cookies(mut response: HttpResponse, cookies: &[&'static str]) -> HttpResponse {
    for cookie in cookies {
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static(cookie));
    }
    response
}

/// HTML attribute encoding of a JSON value.
pub fn attr_json(value: &Value) -> String {
    value
        .to_string()
        .replace('&', "&amp;")
        .replace('"', "&quot;")
}

pub fn card(id: &str, title: &str) -> String {
    format!(
        r#"<div class="video-card">
             <a href="/watch/{id}"><img src="/thumbs/{id}.jpg"></a>
             <h3 class="title">{title}</h3>
             <span class="duration">10:00</span>
             <div class="info">2 weeks ago 1,024 views</div>
           </div>"#
    )
}

pub fn descriptor(name: &str, page: u32) -> Value {
    serde_json::json!({
        "fingerprint": {"id": "c0ffee", "name": name, "locale": "en", "path": "alice", "method": "GET"},
        "serverMemo": {
            "children": [],
            "errors": [],
            "htmlHash": "d1c4",
            "data": {"page": page, "paginators": {"page": page}, "sort": "latest"},
            "checksum": "0a1b2c",
        },
        "effects": {"listeners": []},
    })
}

pub fn landing_page(cards: &[String], descriptor: Option<&Value>, extra: &str) -> String {
    let component = descriptor
        .map(|d| {
            format!(
                r#"<div wire:id="c0ffee" wire:initial-data="{}">"#,
                attr_json(d)
            )
        })
        .unwrap_or_else(|| "<div>".to_string());
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="csrf-token" content="csrf-abc">
  <title>profile</title>
</head>
<body>
  {component}
    <div class="grid">{cards}</div>
    {extra}
  </div>
</body>
</html>"#,
        cards = cards.join("\n")
    )
}

pub fn protocol_response(fragment: &str) -> String {
    serde_json::json!({
        "effects": {"html": fragment, "dirty": ["page"]},
        "serverMemo": {"data": {"page": 2}, "checksum": "ffff"},
    })
    .to_string()
}
