use crate::config::ScraperConfig;
use crate::utils::Progress;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::{Page, PageKind, PageSource};

/// Why a single page could not be fetched. Callers skip the unit of work.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: Url, status: u16 },

    #[error("request to {url} failed: {source}")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not read body of {url}: {source}")]
    Body {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
}

/// One GET per call, no retries.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch(
        &self,
        url: &Url,
        kind: PageKind,
        progress: Option<Progress>,
    ) -> Result<Page, FetchError> {
        match progress {
            Some(p) => info!("Fetching {} page {}: {}", kind, p, url),
            None => info!("Fetching {} page: {}", kind, url),
        }

        let resp = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|source| {
                warn!("Request to {} failed: {}", url, source);
                FetchError::Network {
                    url: url.clone(),
                    source,
                }
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!("Could not fetch {}: HTTP {}", url, status.as_u16());
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| FetchError::Body {
            url: url.clone(),
            source,
        })?;

        Ok(Page::new(url.clone(), body))
    }
}
