//! Watch-page embed resolution.

mod locate;

pub use locate::{EmbedSource, find_embed_url, find_media_url, find_thumbnail, is_obfuscated_host};

use std::sync::Arc;

use scraper::Html;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::http::headers::{embed_headers, watch_headers};
use crate::http::{HttpRequest, HttpTransport};
use crate::media::EmbedResolution;
use crate::unpacker;

/// Resolves a record's watch page into a playable reference.
///
/// Embeds served by a packed-player host are fetched a second time and
/// unpacked to recover the direct media URL; when that fails the raw embed
/// URL is returned instead.
pub struct EmbedResolver {
    config: Arc<ScraperConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl EmbedResolver {
    pub fn new(config: Arc<ScraperConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Never fails; an unreachable page yields an empty resolution.
    pub async fn resolve(&self, page_url: &str) -> EmbedResolution {
        self.resolve_cancellable(page_url, &CancellationToken::new())
            .await
            .unwrap_or_default()
    }

    /// Fails only with [`ScrapeError::Cancelled`].
    pub async fn resolve_cancellable(
        &self,
        page_url: &str,
        cancel: &CancellationToken,
    ) -> Result<EmbedResolution> {
        match self.try_resolve(page_url, cancel).await {
            Ok(resolution) => Ok(resolution),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(page_url, error = %e, "embed resolution failed");
                Ok(EmbedResolution::default())
            }
        }
    }

    #[instrument(skip(self, cancel))]
    pub async fn try_resolve(
        &self,
        page_url: &str,
        cancel: &CancellationToken,
    ) -> Result<EmbedResolution> {
        let parsed = Url::parse(page_url)
            .map_err(|e| ScrapeError::InvalidUrl(format!("{page_url}: {e}")))?;

        let request = HttpRequest::get(page_url)
            .headers(watch_headers())
            .timeout(self.config.request_timeout());
        let response = self.transport.fetch(request, cancel).await?;
        if !response.is_success() {
            return Err(ScrapeError::Status {
                status: response.status,
                url: page_url.to_string(),
            });
        }

        let (found, thumbnail_url) = self.inspect_watch_page(&parsed, &response.body);
        let Some((embed_url, source)) = found else {
            debug!("no embed reference on watch page");
            return Ok(EmbedResolution {
                embed_url: String::new(),
                thumbnail_url,
            });
        };
        debug!(%embed_url, ?source, "embed reference found");

        let embed_url = if is_obfuscated_host(&embed_url, &self.config.obfuscated_hosts) {
            match self.deobfuscate(&embed_url, cancel).await {
                Ok(media_url) => media_url,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(%embed_url, error = %e, "deobfuscation failed; keeping embed url");
                    embed_url
                }
            }
        } else {
            embed_url
        };

        Ok(EmbedResolution {
            embed_url,
            thumbnail_url,
        })
    }

    fn inspect_watch_page(
        &self,
        page_url: &Url,
        body: &str,
    ) -> (Option<(String, EmbedSource)>, String) {
        let document = Html::parse_document(body);
        let found = find_embed_url(&document, page_url, &self.config.embed_keywords);
        let thumbnail =
            find_thumbnail(&document, &self.config.poster_input_name).unwrap_or_default();
        (found, thumbnail)
    }

    /// Fetch a packed-player page, claiming to be framed by its own origin, and
    /// pull the media URL out of the unpacked configuration.
    async fn deobfuscate(&self, embed_url: &str, cancel: &CancellationToken) -> Result<String> {
        let parsed = Url::parse(embed_url)
            .map_err(|e| ScrapeError::InvalidUrl(format!("{embed_url}: {e}")))?;
        let referer = format!("{}/", parsed.origin().ascii_serialization());

        let request = HttpRequest::get(embed_url)
            .headers(embed_headers(&referer))
            .timeout(self.config.request_timeout());
        let response = self.transport.fetch(request, cancel).await?;
        if !response.is_success() {
            return Err(ScrapeError::Status {
                status: response.status,
                url: embed_url.to_string(),
            });
        }

        if !unpacker::detect(&response.body) {
            return Err(ScrapeError::deobfuscation("no packed script on embed page"));
        }
        unpacker::unpack_all(&response.body)
            .iter()
            .find_map(|text| find_media_url(text))
            .ok_or_else(|| ScrapeError::deobfuscation("no media url in unpacked player config"))
    }
}
