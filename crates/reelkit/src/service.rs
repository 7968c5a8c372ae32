use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{self, Cache};
use crate::client::PaginatedClient;
use crate::config::ScraperConfig;
use crate::embed::EmbedResolver;
use crate::error::Result;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::media::{EmbedResolution, MediaRecord, PageResult};
use crate::session::SessionStore;

/// Entry point: pages of a subject's listing and embed resolution for its records.
pub struct Scraper {
    config: Arc<ScraperConfig>,
    store: Arc<SessionStore>,
    client: PaginatedClient,
    resolver: EmbedResolver,
    cache: Option<Arc<dyn Cache>>,
}

impl Scraper {
    /// Scraper over the default `reqwest` transport.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ScraperConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let store = Arc::new(SessionStore::new());
        let client = PaginatedClient::new(config.clone(), transport.clone(), store.clone())?;
        let resolver = EmbedResolver::new(config.clone(), transport);
        Ok(Self {
            config,
            store,
            client,
            resolver,
            cache: None,
        })
    }

    /// Serve recently fetched non-empty pages from `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn get_page(&self, subject: &str, page: u32) -> PageResult {
        self.get_page_cancellable(subject, page, &CancellationToken::new())
            .await
            .unwrap_or_else(|_| PageResult::empty(subject, page.max(1)))
    }

    /// Fails only with [`crate::ScrapeError::Cancelled`].
    pub async fn get_page_cancellable(
        &self,
        subject: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        let page = page.max(1);
        let key = page_cache_key(subject, page);

        if let Some(cache) = &self.cache {
            match cache::get_json::<PageResult>(cache.as_ref(), &key).await {
                Ok(Some(result)) => {
                    debug!(subject, page, "page served from cache");
                    return Ok(result);
                }
                Ok(None) => {}
                Err(e) => warn!(subject, page, error = %e, "cache read failed"),
            }
        }

        let result = self.client.get_page_cancellable(subject, page, cancel).await?;

        if let Some(cache) = &self.cache
            && !result.is_empty()
            && let Err(e) =
                cache::set_json(cache.as_ref(), &key, &result, self.config.page_cache_ttl()).await
        {
            warn!(subject, page, error = %e, "cache write failed");
        }
        Ok(result)
    }

    /// Like [`Self::get_page_cancellable`], but reports why a page came back empty.
    pub async fn try_get_page(
        &self,
        subject: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        self.client.try_get_page(subject, page, cancel).await
    }

    pub async fn resolve_embed(&self, page_url: &str) -> EmbedResolution {
        self.resolver.resolve(page_url).await
    }

    /// Fails only with [`crate::ScrapeError::Cancelled`].
    pub async fn resolve_embed_cancellable(
        &self,
        page_url: &str,
        cancel: &CancellationToken,
    ) -> Result<EmbedResolution> {
        self.resolver.resolve_cancellable(page_url, cancel).await
    }

    /// Resolve embeds for `records`, at most `concurrency` at a time, and
    /// attach the results. Output order matches input order.
    pub async fn resolve_records(
        &self,
        records: Vec<MediaRecord>,
        concurrency: usize,
    ) -> Vec<MediaRecord> {
        let resolved: Vec<(usize, EmbedResolution)> = stream::iter(records.iter().enumerate())
            .map(|(index, record)| async move {
                (index, self.resolver.resolve(&record.page_url).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut records = records;
        for (index, resolution) in resolved {
            records[index].attach_embed(&resolution);
        }
        records
    }
}

fn page_cache_key(subject: &str, page: u32) -> String {
    format!("page:{subject}:{page}")
}
