//! Listing pagination over an established session.

use std::sync::Arc;

use scraper::Html;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::{RecordExtractor, find_total_in_html, total_pages};
use crate::http::cookies;
use crate::http::headers::protocol_headers;
use crate::http::{HttpRequest, HttpTransport};
use crate::media::{MediaRecord, PageResult};
use crate::session::{InitOutcome, Session, SessionInitializer, SessionStore};

/// Fetches page N of a subject's listing.
///
/// Page 1 comes straight from the landing page when it renders records.
/// Later pages replay the listing component's `loadMore` call with a copy of
/// the captured protocol state.
pub struct PaginatedClient {
    config: Arc<ScraperConfig>,
    transport: Arc<dyn HttpTransport>,
    store: Arc<SessionStore>,
    initializer: SessionInitializer,
    extractor: RecordExtractor,
}

impl PaginatedClient {
    pub fn new(
        config: Arc<ScraperConfig>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<SessionStore>,
    ) -> Result<Self> {
        let initializer = SessionInitializer::new(config.clone(), transport.clone())?;
        let extractor = RecordExtractor::new(config.origin(), &config.card_path_marker);
        Ok(Self {
            config,
            transport,
            store,
            initializer,
            extractor,
        })
    }

    /// Page `page` of `subject`. Never fails; every error degrades to an empty
    /// page with `has_more == false`.
    pub async fn get_page(&self, subject: &str, page: u32) -> PageResult {
        self.get_page_cancellable(subject, page, &CancellationToken::new())
            .await
            .unwrap_or_else(|_| PageResult::empty(subject, page.max(1)))
    }

    /// Like [`Self::get_page`], but fails with [`ScrapeError::Cancelled`]
    /// when `cancel` fires. No other error is returned.
    pub async fn get_page_cancellable(
        &self,
        subject: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        match self.try_get_page(subject, page, cancel).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(subject, page, error = %e, "page fetch failed; returning empty page");
                Ok(PageResult::empty(subject, page.max(1)))
            }
        }
    }

    /// Fetch a page, surfacing the failure that caused an empty result.
    ///
    /// A session-expiry status invalidates the session and restarts the whole
    /// operation after the configured backoff, at most `max_retries` times.
    #[instrument(skip(self, subject, cancel), fields(subject = %subject))]
    pub async fn try_get_page(
        &self,
        subject: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        let page = page.max(1);
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            match self.attempt(subject, page, cancel).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = self.config.retry_backoff();
                    warn!(
                        attempt = attempt + 1,
                        max = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "session rejected; reinitializing"
                    );
                    self.store.invalidate(subject);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // The last iteration always returns.
        Err(ScrapeError::MissingSession(subject.to_string()))
    }

    async fn attempt(
        &self,
        subject: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        let mut page_one = None;

        if page == 1 {
            let outcome = self.initialize(subject, cancel).await?;
            if !outcome.initial_records.is_empty() {
                debug!(
                    records = outcome.initial_records.len(),
                    "serving page 1 from the landing page"
                );
                return Ok(self.page_result(
                    subject,
                    outcome.initial_records.clone(),
                    1,
                    outcome.total_records,
                ));
            }
            if outcome.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            page_one = Some(outcome);
        }

        // A failed page-1 refresh falls back to the stored session.
        let fresh = page_one.as_ref().and_then(|outcome| outcome.session.clone());
        let session = match fresh.or_else(|| self.store.get(subject)) {
            Some(session) => session,
            None => {
                let outcome = match page_one {
                    Some(outcome) => outcome,
                    None => self.initialize(subject, cancel).await?,
                };
                session_of(subject, &outcome)?
            }
        };

        self.load_page(&session, page, cancel).await
    }

    async fn initialize(&self, subject: &str, cancel: &CancellationToken) -> Result<Arc<InitOutcome>> {
        let initializer = &self.initializer;
        self.store
            .initialize(subject, cancel, move || initializer.initialize(subject, cancel))
            .await
    }

    /// One protocol request for `page` against `session`.
    async fn load_page(
        &self,
        session: &Session,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        let subject = session.subject.as_str();
        let body = self.request_body(session, page);
        let url = self.config.message_url(&session.component_name);
        let referer = self.config.landing_url(subject);
        let headers = protocol_headers(
            self.config.origin(),
            &referer,
            &session.csrf_token,
            &session.cookies,
        );

        let request = HttpRequest::post(&url, serde_json::to_string(&body)?)
            .headers(headers)
            .timeout(self.config.request_timeout());
        let response = self.transport.fetch(request, cancel).await?;

        if self.config.is_session_expired_status(response.status) {
            return Err(ScrapeError::SessionExpired {
                status: response.status,
            });
        }
        if !response.is_success() {
            return Err(ScrapeError::Status {
                status: response.status,
                url,
            });
        }

        let updates = cookies::parse_set_cookies(response.set_cookies());
        self.store.merge_cookies(subject, &updates);

        let payload: Value = serde_json::from_str(&response.body)?;
        let html = payload
            .pointer("/effects/html")
            .and_then(Value::as_str)
            .ok_or_else(|| ScrapeError::extraction("response carries no effects.html"))?;

        let (records, total) = self.parse_fragment(html);
        debug!(page, records = records.len(), total = ?total, "page loaded");
        Ok(self.page_result(subject, records, page, total))
    }

    fn parse_fragment(&self, html: &str) -> (Vec<MediaRecord>, Option<u64>) {
        let fragment = Html::parse_fragment(html);
        let records = self.extractor.extract(&fragment);
        let total = find_total_in_html(&fragment, html);
        (records, total)
    }

    /// Request body built from clones of the stored protocol state. Page
    /// fields are only touched for pages after the first.
    fn request_body(&self, session: &Session, page: u32) -> Value {
        let mut server_memo = session.server_memo.clone();
        if page > 1 {
            set_page_fields(&mut server_memo, page);
        }
        json!({
            "fingerprint": session.fingerprint.clone(),
            "serverMemo": server_memo,
            "updates": [{
                "type": "callMethod",
                "payload": {
                    "id": Uuid::new_v4().simple().to_string(),
                    "method": self.config.load_method,
                    "params": [],
                },
            }],
        })
    }

    fn page_result(
        &self,
        subject: &str,
        records: Vec<MediaRecord>,
        page: u32,
        total_records: Option<u64>,
    ) -> PageResult {
        let total = total_pages(total_records, page, records.len(), self.config.page_size);
        PageResult::new(subject, records, page, total)
    }
}

fn session_of(subject: &str, outcome: &InitOutcome) -> Result<Session> {
    match (&outcome.session, &outcome.error) {
        (Some(session), _) => Ok(session.clone()),
        (None, Some(e)) if e.is_cancelled() => Err(ScrapeError::Cancelled),
        (None, Some(e)) => {
            debug!(subject, error = %e, "initialization produced no session");
            Err(ScrapeError::MissingSession(subject.to_string()))
        }
        (None, None) => Err(ScrapeError::MissingSession(subject.to_string())),
    }
}

/// Overwrite every page-number field the listing component keeps.
fn set_page_fields(server_memo: &mut Value, page: u32) {
    let Some(memo) = server_memo.as_object_mut() else {
        debug!("server memo is not an object; page fields left alone");
        return;
    };
    let data = memo
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(data) = data.as_object_mut() else {
        return;
    };

    data.insert("page".to_string(), json!(page));
    match data.get_mut("paginators").and_then(Value::as_object_mut) {
        Some(paginators) => {
            paginators.insert("page".to_string(), json!(page));
        }
        None => {
            data.insert("paginators".to_string(), json!({ "page": page }));
        }
    }
    if data.contains_key("currentPage") {
        data.insert("currentPage".to_string(), json!(page));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_page_fields() {
        let mut memo = json!({
            "checksum": "abc",
            "data": {"page": 1, "paginators": {"page": 1}, "currentPage": 1, "sort": "new"},
        });
        set_page_fields(&mut memo, 3);
        assert_eq!(
            memo,
            json!({
                "checksum": "abc",
                "data": {"page": 3, "paginators": {"page": 3}, "currentPage": 3, "sort": "new"},
            })
        );

        let mut memo = json!({"data": {"page": 1}});
        set_page_fields(&mut memo, 2);
        assert_eq!(memo, json!({"data": {"page": 2, "paginators": {"page": 2}}}));
        assert!(memo["data"].get("currentPage").is_none());
    }

    #[test]
    fn test_set_page_fields_ignores_non_objects() {
        let mut memo = json!("opaque");
        set_page_fields(&mut memo, 2);
        assert_eq!(memo, json!("opaque"));
    }
}
