#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod batch;
pub mod blob;
pub mod block;
pub mod contract;
pub mod event;
pub mod message;
pub mod meta;

mod codec_version;
pub use codec_version::CodecVersion;
