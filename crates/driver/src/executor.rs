//! The seam to the local execution engine.

use async_trait::async_trait;
use mako_primitives::block::PartialBlock;

/// Outcomes of handing a derived block to the executor, classified the way
/// the driver reacts to them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The block is already part of the local chain; skip it.
    #[error("block {block} at or below local head {head}")]
    BlockTooLow {
        /// The derived block number.
        block: u64,
        /// The local head number.
        head: u64,
    },
    /// The block leaves a gap above the local head; the L1 cursor must be
    /// rewound.
    #[error("block {block} leaves a gap above local head {head}")]
    BlockTooHigh {
        /// The derived block number.
        block: u64,
        /// The local head number.
        head: u64,
    },
    /// A transient failure; retry after a delay.
    #[error("temporary executor failure: {0}")]
    Temporary(String),
    /// Execution failed for good.
    #[error("executor failure: {0}")]
    Fatal(String),
}

/// Builds a derived block into a full block and writes it into the local
/// chain.
#[async_trait]
pub trait Executor {
    /// Executes and inserts `block`. `override_mode` replaces an existing
    /// block at the same height; `sign` attaches the node's signature.
    async fn build_and_write_block(
        &mut self,
        block: &PartialBlock,
        override_mode: bool,
        sign: bool,
    ) -> Result<(), ExecutorError>;
}
