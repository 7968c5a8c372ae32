use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reelkit::embed::find_media_url;
use reelkit::{Cache, FileCache, Scraper, unpacker};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::output::{OutputManager, UnpackReport};

/// Overrides given on the command line, applied on top of the file configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub origin: Option<String>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub no_cache: bool,
}

pub struct CommandExecutor {
    config: AppConfig,
    output: OutputManager,
    cancel: CancellationToken,
}

impl CommandExecutor {
    pub fn new(mut config: AppConfig, overrides: Overrides) -> Self {
        if let Some(origin) = overrides.origin {
            config.scraper.origin = origin;
        }
        if let Some(timeout) = overrides.timeout {
            config.scraper.request_timeout_ms = timeout.as_millis() as u64;
        }
        if let Some(retries) = overrides.retries {
            config.scraper.max_retries = retries;
        }
        if overrides.no_cache {
            config.cache.enabled = false;
        }

        let output = OutputManager::new(config.output.colored);
        Self {
            config,
            output,
            cancel: cancel_on_ctrl_c(),
        }
    }

    async fn scraper(&self) -> Result<Scraper> {
        let scraper =
            Scraper::new(self.config.scraper.clone()).context("failed to build scraper")?;
        if !self.config.cache.enabled {
            return Ok(scraper);
        }
        let Some(path) = self.config.cache.resolved_path() else {
            debug!("no cache directory available; page cache disabled");
            return Ok(scraper);
        };

        let cache = Arc::new(FileCache::new(path));
        match cache.delete_expired().await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "expired cache entries dropped"),
            Err(e) => warn!(error = %e, "failed to prune page cache"),
        }
        Ok(scraper.with_cache(cache))
    }

    pub async fn page(
        &self,
        subject: &str,
        page: u32,
        resolve: bool,
        concurrency: usize,
        format: OutputFormat,
    ) -> Result<()> {
        let scraper = self.scraper().await?;
        let mut result = scraper
            .get_page_cancellable(subject, page, &self.cancel)
            .await?;
        info!(
            subject,
            page = result.current_page,
            records = result.records.len(),
            has_more = result.has_more,
            "page fetched"
        );

        if resolve && !result.records.is_empty() {
            let records = std::mem::take(&mut result.records);
            result.records = tokio::select! {
                _ = self.cancel.cancelled() => bail!("interrupted"),
                records = scraper.resolve_records(records, concurrency) => records,
            };
        }

        println!("{}", self.output.format_page(&result, format)?);
        Ok(())
    }

    pub async fn resolve(&self, url: &str, format: OutputFormat) -> Result<()> {
        let scraper = self.scraper().await?;
        let resolution = scraper.resolve_embed_cancellable(url, &self.cancel).await?;
        println!("{}", self.output.format_resolution(url, &resolution, format)?);
        Ok(())
    }

    pub async fn unpack(&self, file: Option<&Path>, format: OutputFormat) -> Result<()> {
        let source = match file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                tokio::io::stdin().read_to_string(&mut buffer).await?;
                buffer
            }
        };

        if !unpacker::detect(&source) {
            bail!("no packed script found in input");
        }
        let blocks = unpacker::unpack_all(&source);
        if blocks.is_empty() {
            bail!("packed script found but none could be unpacked");
        }
        let media_url = blocks.iter().find_map(|block| find_media_url(block));

        let report = UnpackReport {
            blocks: &blocks,
            media_url: media_url.as_deref(),
        };
        println!("{}", self.output.format_unpacked(&report, format)?);
        Ok(())
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            child.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overrides_apply() {
        let overrides = Overrides {
            origin: Some("https://videos.test".into()),
            timeout: Some(Duration::from_secs(5)),
            retries: Some(0),
            no_cache: true,
        };
        let executor = CommandExecutor::new(AppConfig::default(), overrides);
        assert_eq!(executor.config.scraper.origin, "https://videos.test");
        assert_eq!(executor.config.scraper.request_timeout_ms, 5_000);
        assert_eq!(executor.config.scraper.max_retries, 0);
        assert!(!executor.config.cache.enabled);
    }

    #[tokio::test]
    async fn test_unpack_rejects_plain_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.js");
        std::fs::write(&path, "var a = 1;").unwrap();

        let executor = CommandExecutor::new(AppConfig::default(), Overrides::default());
        let err = executor
            .unpack(Some(&path), OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no packed script"));
    }
}
