#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), warn(unused_crate_dependencies))]

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        batch_queue::BatchQueue,
        block_queue::BlockQueue,
        da_queue::DaQueue,
        errors::{DeriveError, DeriveErrorKind, DeriveResult},
        pipeline::{DerivationPipeline, PipelineBuilder},
        source::DataSource,
        traits::{BlobProvider, CheckpointStore, HeaderFieldOracle, L1MessageProvider, L1Provider},
    };
}

pub mod batch_queue;
pub mod block_queue;
pub mod codec;
pub mod da_queue;
pub mod decoder;
pub mod entries;
pub mod errors;
pub mod pipeline;
pub mod source;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
