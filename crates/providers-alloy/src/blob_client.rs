//! Blob lookups over simple HTTP stores: BlobScan, BlockNative and
//! S3-compatible archives. All three serve a blob by its versioned hash.

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use mako_primitives::{
    blob::{Blob, BYTES_PER_BLOB},
    event::L1BlockRef,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default per-call timeout for one blob backend.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// An error from one blob backend.
#[derive(Debug, thiserror::Error)]
pub enum BlobClientError {
    /// The HTTP request failed.
    #[error("request failed: {0}")]
    Request(String),
    /// The response could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),
    /// The backend does not have the blob.
    #[error("blob {0} not found")]
    NotFound(B256),
}

/// One blob backend. Implementations do not verify blob integrity; the
/// decoder checks the versioned hash of whatever comes back.
#[async_trait]
pub trait BlobClient {
    /// The blob referenced by `versioned_hash`, confirmed in `block_ref`.
    async fn blob(
        &mut self,
        block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, BlobClientError>;
}

/// Builds the shared HTTP client with the per-call timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().expect("reqwest client")
}

fn check_blob_len(bytes: &[u8]) -> Result<Box<Blob>, BlobClientError> {
    if bytes.len() != BYTES_PER_BLOB {
        return Err(BlobClientError::Decode(format!("blob is {} bytes", bytes.len())));
    }
    Ok(Box::new(Blob::from_slice(bytes)))
}

/// The JSON body BlobScan and BlockNative style APIs return.
#[derive(Debug, Deserialize)]
struct BlobResponse {
    data: Bytes,
}

async fn fetch_json_blob(
    client: &Client,
    url: String,
    versioned_hash: B256,
) -> Result<Box<Blob>, BlobClientError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BlobClientError::Request(e.to_string()))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(BlobClientError::NotFound(versioned_hash));
    }
    let body: BlobResponse =
        response.json().await.map_err(|e| BlobClientError::Decode(e.to_string()))?;
    check_blob_len(&body.data)
}

/// A BlobScan backend: `GET {endpoint}/{versioned_hash}` returning JSON.
#[derive(Debug, Clone)]
pub struct BlobScanClient {
    endpoint: String,
    client: Client,
}

impl BlobScanClient {
    /// Creates a client for `endpoint`.
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: http_client(DEFAULT_CLIENT_TIMEOUT),
        }
    }
}

#[async_trait]
impl BlobClient for BlobScanClient {
    async fn blob(
        &mut self,
        _block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, BlobClientError> {
        fetch_json_blob(
            &self.client,
            format!("{}/{versioned_hash}", self.endpoint),
            versioned_hash,
        )
        .await
    }
}

/// A BlockNative backend: same surface as BlobScan.
#[derive(Debug, Clone)]
pub struct BlockNativeClient {
    endpoint: String,
    client: Client,
}

impl BlockNativeClient {
    /// Creates a client for `endpoint`.
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: http_client(DEFAULT_CLIENT_TIMEOUT),
        }
    }
}

#[async_trait]
impl BlobClient for BlockNativeClient {
    async fn blob(
        &mut self,
        _block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, BlobClientError> {
        fetch_json_blob(
            &self.client,
            format!("{}/{versioned_hash}", self.endpoint),
            versioned_hash,
        )
        .await
    }
}

/// An S3-compatible archive serving raw blob bytes under the versioned hash
/// key.
#[derive(Debug, Clone)]
pub struct S3Client {
    endpoint: String,
    client: Client,
}

impl S3Client {
    /// Creates a client for `endpoint`.
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: http_client(DEFAULT_CLIENT_TIMEOUT),
        }
    }
}

#[async_trait]
impl BlobClient for S3Client {
    async fn blob(
        &mut self,
        _block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, BlobClientError> {
        let response = self
            .client
            .get(format!("{}/{versioned_hash}", self.endpoint))
            .send()
            .await
            .map_err(|e| BlobClientError::Request(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobClientError::NotFound(versioned_hash));
        }
        let bytes = response.bytes().await.map_err(|e| BlobClientError::Decode(e.to_string()))?;
        check_blob_len(&bytes)
    }
}
