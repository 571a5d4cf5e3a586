//! Download of resolved audio resources.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::errors::FetchFailure;
use crate::models::ResourceLocator;

/// Downloads the raw bytes behind a resource locator.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, locator: &ResourceLocator) -> Result<Vec<u8>, FetchFailure>;
}

/// Fetcher backed by the shared HTTP client; timeouts and client identity
/// come from the client configuration.
pub struct HttpAudioFetcher {
    client: Client,
}

impl HttpAudioFetcher {
    pub fn new(client: Client) -> Self {
        HttpAudioFetcher { client }
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, locator: &ResourceLocator) -> Result<Vec<u8>, FetchFailure> {
        debug!("downloading audio from {}", locator.url);

        let response = self
            .client
            .get(&locator.url)
            .send()
            .await
            .map_err(|e| FetchFailure::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::from_status(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::from_transport(&e))?;

        debug!("downloaded {} bytes from {}", bytes.len(), locator.url);
        Ok(bytes.to_vec())
    }
}
