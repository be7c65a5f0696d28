//! A thin Beacon API client and the blob lookup built on top of it.

use crate::blob_client::{BlobClient, BlobClientError};
use alloy_primitives::{Bytes, FixedBytes, B256};
use async_trait::async_trait;
use core::str::FromStr;
use mako_primitives::{
    blob::{commitment_to_versioned_hash, Blob, BYTES_PER_BLOB},
    event::L1BlockRef,
};
use reqwest::Client;
use serde::{de::Deserialize, Serialize};
use tracing::debug;

/// The config spec API method.
pub(crate) const SPEC_METHOD: &str = "eth/v1/config/spec";

/// The beacon genesis API method.
pub(crate) const GENESIS_METHOD: &str = "eth/v1/beacon/genesis";

/// The blob sidecars API method prefix.
pub(crate) const SIDECARS_METHOD_PREFIX: &str = "eth/v1/beacon/blob_sidecars";

fn parse_u64_string<'de, T, D>(de: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    <T as FromStr>::Err: core::fmt::Display,
{
    String::deserialize(de)?.parse().map_err(serde::de::Error::custom)
}

/// The beacon genesis response.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct APIGenesisResponse {
    /// The response payload.
    pub data: GenesisData,
}

/// The beacon genesis payload.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct GenesisData {
    /// The chain's genesis timestamp.
    #[serde(deserialize_with = "parse_u64_string")]
    pub genesis_time: u64,
}

/// The config spec response, reduced to the field slot math needs.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct APIConfigResponse {
    /// The response payload.
    pub data: SpecData,
}

/// The config spec payload.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct SpecData {
    /// Seconds per slot.
    #[serde(rename = "SECONDS_PER_SLOT", deserialize_with = "parse_u64_string")]
    pub seconds_per_slot: u64,
}

/// One blob sidecar as served by the Beacon API.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct APIBlobSidecar {
    /// The sidecar's index within its block.
    #[serde(deserialize_with = "parse_u64_string")]
    pub index: u64,
    /// The blob bytes.
    pub blob: Bytes,
    /// The KZG commitment.
    pub kzg_commitment: FixedBytes<48>,
    /// The KZG proof.
    pub kzg_proof: FixedBytes<48>,
}

impl APIBlobSidecar {
    /// The versioned hash of the sidecar's commitment.
    pub fn versioned_hash(&self) -> B256 {
        commitment_to_versioned_hash(&self.kzg_commitment.0)
    }
}

/// The blob sidecars response.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct APIGetBlobSidecarsResponse {
    /// The sidecars of the requested slot.
    pub data: Vec<APIBlobSidecar>,
}

/// The [BeaconClient] is a thin wrapper around the Beacon API.
#[async_trait]
pub trait BeaconClient {
    /// Returns the config spec.
    async fn config_spec(&self) -> Result<APIConfigResponse, BlobClientError>;

    /// Returns the beacon genesis.
    async fn beacon_genesis(&self) -> Result<APIGenesisResponse, BlobClientError>;

    /// Fetches the blob sidecars confirmed in `slot`.
    async fn blob_sidecars(&self, slot: u64) -> Result<APIGetBlobSidecarsResponse, BlobClientError>;
}

/// An online implementation of the [BeaconClient] trait.
#[derive(Debug, Clone)]
pub struct OnlineBeaconClient {
    base: String,
    inner: Client,
}

impl OnlineBeaconClient {
    /// Creates a client for the API at `base`.
    pub fn new_http(base: String, inner: Client) -> Self {
        Self { base: base.trim_end_matches('/').to_string(), inner }
    }
}

#[async_trait]
impl BeaconClient for OnlineBeaconClient {
    async fn config_spec(&self) -> Result<APIConfigResponse, BlobClientError> {
        self.inner
            .get(format!("{}/{}", self.base, SPEC_METHOD))
            .send()
            .await
            .map_err(|e| BlobClientError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| BlobClientError::Decode(e.to_string()))
    }

    async fn beacon_genesis(&self) -> Result<APIGenesisResponse, BlobClientError> {
        self.inner
            .get(format!("{}/{}", self.base, GENESIS_METHOD))
            .send()
            .await
            .map_err(|e| BlobClientError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| BlobClientError::Decode(e.to_string()))
    }

    async fn blob_sidecars(&self, slot: u64) -> Result<APIGetBlobSidecarsResponse, BlobClientError> {
        self.inner
            .get(format!("{}/{}/{}", self.base, SIDECARS_METHOD_PREFIX, slot))
            .send()
            .await
            .map_err(|e| BlobClientError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| BlobClientError::Decode(e.to_string()))
    }
}

/// A blob lookup over a [BeaconClient]: derives the slot from the L1 block
/// timestamp and picks the sidecar whose commitment hashes to the requested
/// versioned hash.
#[derive(Debug, Clone)]
pub struct BeaconBlobClient<B> {
    beacon: B,
    /// Beacon genesis time, loaded lazily and cached.
    genesis_time: Option<u64>,
    /// Slot interval, loaded lazily and cached.
    seconds_per_slot: Option<u64>,
}

impl<B: BeaconClient> BeaconBlobClient<B> {
    /// Creates a lookup over `beacon`. `genesis_time` and `seconds_per_slot`
    /// are optional and loaded from the API on first use when absent.
    pub const fn new(beacon: B, genesis_time: Option<u64>, seconds_per_slot: Option<u64>) -> Self {
        Self { beacon, genesis_time, seconds_per_slot }
    }

    /// Loads the genesis and spec configs if not previously cached.
    pub async fn load_configs(&mut self) -> Result<(u64, u64), BlobClientError> {
        if self.genesis_time.is_none() {
            debug!(target: "beacon-client", "loading beacon genesis");
            self.genesis_time = Some(self.beacon.beacon_genesis().await?.data.genesis_time);
        }
        if self.seconds_per_slot.is_none() {
            debug!(target: "beacon-client", "loading config spec");
            let seconds = self.beacon.config_spec().await?.data.seconds_per_slot;
            if seconds == 0 {
                return Err(BlobClientError::Decode("seconds per slot is zero".into()));
            }
            self.seconds_per_slot = Some(seconds);
        }
        Ok((self.genesis_time.unwrap(), self.seconds_per_slot.unwrap()))
    }

    /// Converts an L1 block timestamp to its slot.
    pub const fn slot(genesis: u64, seconds_per_slot: u64, timestamp: u64) -> Option<u64> {
        if timestamp < genesis {
            return None;
        }
        Some((timestamp - genesis) / seconds_per_slot)
    }
}

#[async_trait]
impl<B: BeaconClient + Send + Sync> BlobClient for BeaconBlobClient<B> {
    async fn blob(
        &mut self,
        block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, BlobClientError> {
        let (genesis, interval) = self.load_configs().await?;
        let slot = Self::slot(genesis, interval, block_ref.timestamp).ok_or_else(|| {
            BlobClientError::Decode(format!(
                "block timestamp {} precedes beacon genesis {genesis}",
                block_ref.timestamp
            ))
        })?;

        let sidecars = self.beacon.blob_sidecars(slot).await?;
        let sidecar = sidecars
            .data
            .iter()
            .find(|sidecar| sidecar.versioned_hash() == versioned_hash)
            .ok_or(BlobClientError::NotFound(versioned_hash))?;
        if sidecar.blob.len() != BYTES_PER_BLOB {
            return Err(BlobClientError::Decode(format!(
                "sidecar blob is {} bytes",
                sidecar.blob.len()
            )));
        }
        Ok(Box::new(Blob::from_slice(&sidecar.blob)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_timestamp() {
        assert_eq!(BeaconBlobClient::<OnlineBeaconClient>::slot(100, 12, 100), Some(0));
        assert_eq!(BeaconBlobClient::<OnlineBeaconClient>::slot(100, 12, 124), Some(2));
        assert_eq!(BeaconBlobClient::<OnlineBeaconClient>::slot(100, 12, 99), None);
    }

    #[test]
    fn test_sidecar_deserializes_string_index() {
        let raw = format!(
            r#"{{"index":"3","blob":"0x{}","kzg_commitment":"0x{}","kzg_proof":"0x{}"}}"#,
            "00".repeat(8),
            "11".repeat(48),
            "22".repeat(48),
        );
        let sidecar: APIBlobSidecar = serde_json::from_str(&raw).unwrap();
        assert_eq!(sidecar.index, 3);
        assert_eq!(sidecar.kzg_commitment, FixedBytes::<48>::from([0x11u8; 48]));
    }

    #[test]
    fn test_spec_deserializes_upper_case_field() {
        let spec: APIConfigResponse =
            serde_json::from_str(r#"{"data":{"SECONDS_PER_SLOT":"12"}}"#).unwrap();
        assert_eq!(spec.data.seconds_per_slot, 12);
    }
}
