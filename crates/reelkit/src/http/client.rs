use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use rustls::ClientConfig;
use rustls_platform_verifier::BuilderVerifierExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};

/// Client builder with rustls and the platform verifier preconfigured.
pub fn create_client_builder(timeout: Option<Duration>) -> Result<ClientBuilder> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ScrapeError::Config(format!("failed to configure TLS versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| ScrapeError::Config(format!("failed to configure TLS verifier: {e}")))?
        .with_no_client_auth();

    let mut builder = Client::builder().use_preconfigured_tls(tls_config);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder)
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let client = create_client_builder(None)?.build()?;
        Ok(Self::new(client, config.request_timeout()))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;
        trace!(status, %url, len = body.len(), "response received");

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        debug!(method = %request.method, url = %request.url, "sending request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            result = tokio::time::timeout(timeout, self.send(request)) => match result {
                Ok(response) => response,
                Err(_) => Err(ScrapeError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            },
        }
    }
}
