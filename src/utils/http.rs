use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parsers::Document;

pub fn create_client(config: &Config) -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .cookie_store(true)
        .pool_max_idle_per_host(6)
        .build()?;

    Ok(client)
}

/// Retrieves storefront pages. One attempt per call; callers decide what a
/// failure aborts.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    origin: Url,
}

impl PageFetcher {
    pub fn new(client: Client, origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| Error::Config(format!("invalid store origin '{}': {}", origin, e)))?;
        Ok(Self { client, origin })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(create_client(config)?, &config.store_origin)
    }

    /// Absolute URL for a storefront-relative path; absolute URLs pass through.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .map_err(|e| Error::Config(format!("invalid URL '{}': {}", url, e)))
    }

    pub async fn fetch(&self, url: &str) -> Result<Document> {
        let target = self.resolve(url)?;
        debug!("GET {}", target);

        let response = self.client.get(target.clone()).send().await.map_err(|e| {
            warn!("Request failed for {}: {}", target, e);
            Error::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error {}: {}", status, target);
            return Err(Error::HttpStatus {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(Document::new(target.to_string(), body))
    }
}
