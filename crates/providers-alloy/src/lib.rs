#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod reader;
pub use reader::{AlloyL1Reader, L1ReaderError, DEFAULT_LOG_SCAN_STRIDE};

mod beacon_client;
pub use beacon_client::{
    APIBlobSidecar, APIConfigResponse, APIGenesisResponse, APIGetBlobSidecarsResponse,
    BeaconBlobClient, BeaconClient, GenesisData, OnlineBeaconClient, SpecData,
};

mod blob_client;
pub use blob_client::{
    BlobClient, BlobClientError, BlobScanClient, BlockNativeClient, S3Client,
    DEFAULT_CLIENT_TIMEOUT,
};

mod fanout;
pub use fanout::{BlobClientRing, BlobFanoutError};
