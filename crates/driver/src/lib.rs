#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod config;
pub mod core;
pub mod db;
pub mod executor;
pub mod traits;
pub mod verifier;

pub use config::{Config, ConfigError, ResetSyncHeight};
pub use core::{DriverExit, SyncingDriver};
pub use executor::{Executor, ExecutorError};
