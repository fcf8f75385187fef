use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::PinataConfig;

/// Result of asking the blob service to drop a content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpinned {
    Removed,
    /// The service no longer knew the identifier, e.g. a retried delete.
    AlreadyAbsent,
}

/// Content-addressed blob service: bytes in, content identifier out.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, filename: &str, body: Bytes) -> anyhow::Result<String>;
    async fn unpin(&self, content_id: &str) -> anyhow::Result<Unpinned>;
    fn public_url(&self, content_id: &str) -> String;
}

#[derive(Clone)]
pub struct PinataStorage {
    client: Client,
    api_url: String,
    gateway_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "isDuplicate", default)]
    is_duplicate: bool,
}

impl PinataStorage {
    pub fn new(cfg: &PinataConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("arkive/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build pinata http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            gateway_url: cfg.gateway_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.api_secret)
    }
}

#[async_trait]
impl BlobStore for PinataStorage {
    async fn put(&self, filename: &str, body: Bytes) -> anyhow::Result<String> {
        let part = multipart::Part::stream(body).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);

        let res = self
            .authed(self.client.post(format!("{}/pinning/pinFileToIPFS", self.api_url)))
            .multipart(form)
            .send()
            .await
            .context("pinata pinFileToIPFS")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("pinata upload failed: status={status} body={text}");
        }

        let pinned: PinFileResponse = res.json().await.context("decode pinata response")?;
        debug!(cid = %pinned.ipfs_hash, duplicate = pinned.is_duplicate, "blob pinned");
        Ok(pinned.ipfs_hash)
    }

    async fn unpin(&self, content_id: &str) -> anyhow::Result<Unpinned> {
        let res = self
            .authed(self.client.delete(format!("{}/pinning/unpin/{}", self.api_url, content_id)))
            .send()
            .await
            .with_context(|| format!("pinata unpin {content_id}"))?;

        match res.status() {
            s if s.is_success() => Ok(Unpinned::Removed),
            StatusCode::NOT_FOUND => {
                debug!(cid = %content_id, "blob already unpinned");
                Ok(Unpinned::AlreadyAbsent)
            }
            s => {
                let text = res.text().await.unwrap_or_default();
                anyhow::bail!("pinata unpin failed: status={s} body={text}")
            }
        }
    }

    fn public_url(&self, content_id: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, content_id)
    }
}
