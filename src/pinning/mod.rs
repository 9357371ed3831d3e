//! Content-addressed storage client for NFT images and metadata.

use crate::config::PinningConfig;
use crate::error::{EngineError, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Clone, Deserialize)]
pub struct PinResponse {
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pub pin_size: u64,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
}

/// Metadata document referenced by an NFT's token URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
}

pub struct PinningClient {
    client: Client,
    config: PinningConfig,
}

impl PinningClient {
    pub fn new(config: PinningConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn gateway_url(&self, hash: &str) -> String {
        format!("{}/ipfs/{}", self.config.gateway_url.trim_end_matches('/'), hash)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/pinning/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn check_size(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidInput("file is empty".into()));
        }
        if bytes.len() > self.config.max_file_bytes {
            return Err(EngineError::InvalidInput(format!(
                "file is {} bytes, limit is {}",
                bytes.len(),
                self.config.max_file_bytes
            )));
        }
        Ok(())
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<PinResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Pinning service returned {}: {}", status, body);
            return Err(EngineError::Pinning(format!("{status}: {body}")));
        }
        Ok(response.json().await?)
    }

    /// Pin raw file bytes; returns the content hash.
    pub async fn pin_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        self.check_size(&bytes)?;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .client
            .post(self.endpoint("pinFileToIPFS"))
            .bearer_auth(&self.config.jwt)
            .multipart(form)
            .send()
            .await?;
        let pinned = self.read_response(response).await?;
        info!("Pinned file {} as {}", file_name, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    /// Pin a JSON document under a display `name`; returns the content hash.
    pub async fn pin_json<T: Serialize>(&self, name: &str, content: &T) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("pinJSONToIPFS"))
            .bearer_auth(&self.config.jwt)
            .json(&json!({
                "pinataContent": content,
                "pinataMetadata": { "name": name },
            }))
            .send()
            .await?;
        let pinned = self.read_response(response).await?;
        info!("Pinned JSON {} as {}", name, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    /// Pin the image, then its metadata document. Returns the metadata URL.
    pub async fn pin_nft(
        &self,
        name: &str,
        description: &str,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("NFT name is required".into()));
        }
        let image_hash = self.pin_file(file_name, image).await?;
        let metadata = NftMetadata {
            name: name.to_string(),
            description: description.to_string(),
            image: self.gateway_url(&image_hash),
        };
        let metadata_hash = self.pin_json(name, &metadata).await?;
        Ok(self.gateway_url(&metadata_hash))
    }
}
