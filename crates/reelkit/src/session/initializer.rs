use std::sync::Arc;
use std::time::Duration;

use rand::RngExt;
use regex::Regex;
use scraper::Html;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::types::{InitOutcome, Session};
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::{
    RecordExtractor, find_component_descriptor, find_csrf_token, find_total_in_html,
};
use crate::http::cookies::{self, CookieMap};
use crate::http::headers::landing_headers;
use crate::http::{HttpRequest, HttpTransport};

/// Builds a [`Session`] and the first page of records from a subject's landing page.
pub struct SessionInitializer {
    config: Arc<ScraperConfig>,
    transport: Arc<dyn HttpTransport>,
    extractor: RecordExtractor,
    component_regex: Regex,
}

impl SessionInitializer {
    pub fn new(config: Arc<ScraperConfig>, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let component_regex = config.component_regex()?;
        let extractor = RecordExtractor::new(config.origin(), &config.card_path_marker);
        Ok(Self {
            config,
            transport,
            extractor,
            component_regex,
        })
    }

    /// Initialize `subject`. Failures are reported in the outcome, never returned.
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn initialize(&self, subject: &str, cancel: &CancellationToken) -> InitOutcome {
        match self.try_initialize(subject, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(error = %e, "session initialization failed");
                }
                InitOutcome::failed(e)
            }
        }
    }

    async fn try_initialize(&self, subject: &str, cancel: &CancellationToken) -> Result<InitOutcome> {
        self.jitter(cancel).await?;

        let url = self.config.landing_url(subject);
        let request = HttpRequest::get(&url)
            .headers(landing_headers())
            .timeout(self.config.request_timeout());
        let response = self.transport.fetch(request, cancel).await?;
        if !response.is_success() {
            return Err(ScrapeError::Status {
                status: response.status,
                url,
            });
        }

        let mut session_cookies = cookies::parse_set_cookies(response.set_cookies());
        cookies::apply_fallback(&mut session_cookies, &self.config.global_cookies);

        let outcome = self.parse_landing(subject, &response.body, session_cookies);
        if !outcome.success() {
            return Err(ScrapeError::extraction(
                "landing page has neither a listing component nor records",
            ));
        }
        Ok(outcome)
    }

    /// Everything after the fetch. Kept synchronous: the parsed document is not `Send`.
    fn parse_landing(&self, subject: &str, body: &str, session_cookies: CookieMap) -> InitOutcome {
        let document = Html::parse_document(body);

        let csrf_token = find_csrf_token(&document).unwrap_or_default();
        let initial_records = self.extractor.extract(&document);
        let total_records = find_total_in_html(&document, body);
        let session = find_component_descriptor(&document, &self.component_regex).map(|descriptor| {
            Session::new(
                subject,
                csrf_token,
                session_cookies,
                descriptor.fingerprint,
                descriptor.server_memo,
                descriptor.name,
            )
        });

        debug!(
            records = initial_records.len(),
            total = ?total_records,
            protocol = session.is_some(),
            "landing page parsed"
        );

        InitOutcome {
            session,
            initial_records,
            total_records,
            error: None,
        }
    }

    async fn jitter(&self, cancel: &CancellationToken) -> Result<()> {
        let max = self.config.init_jitter();
        if max.is_zero() {
            return Ok(());
        }
        let delay = Duration::from_millis(rand::rng().random_range(0..max.as_millis() as u64));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
