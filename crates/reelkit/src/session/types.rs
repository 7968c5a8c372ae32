use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::cookies::CookieMap;
use crate::media::MediaRecord;
use crate::error::ScrapeError;

/// Protocol state captured for one subject.
///
/// `fingerprint` and `server_memo` are kept exactly as the server issued them;
/// requests are built from clones so the stored copies never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject: String,
    pub csrf_token: String,
    pub cookies: CookieMap,
    pub fingerprint: Value,
    pub server_memo: Value,
    pub component_name: String,
}

impl Session {
    pub fn new(
        subject: impl Into<String>,
        csrf_token: impl Into<String>,
        cookies: CookieMap,
        fingerprint: Value,
        server_memo: Value,
        component_name: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            csrf_token: csrf_token.into(),
            cookies,
            fingerprint,
            server_memo,
            component_name: component_name.into(),
        }
    }
}

/// Result of one landing-page initialization, shared by every caller that
/// coalesced onto it.
#[derive(Debug, Default)]
pub struct InitOutcome {
    /// Present only when the listing protocol state was captured.
    pub session: Option<Session>,
    /// Records rendered on the landing page itself (page 1).
    pub initial_records: Vec<MediaRecord>,
    pub total_records: Option<u64>,
    pub error: Option<ScrapeError>,
}

impl InitOutcome {
    pub fn failed(error: ScrapeError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Protocol captured or at least one record extracted.
    pub fn success(&self) -> bool {
        self.error.is_none() && (self.session.is_some() || !self.initial_records.is_empty())
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(ScrapeError::is_cancelled)
    }
}
