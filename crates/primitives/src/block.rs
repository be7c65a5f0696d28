//! Block-level types recovered from DA: block contexts, partial blocks and
//! the transaction sum type.

use crate::message::L1MessageTx;
use alloy_consensus::TxEnvelope;
use alloy_primitives::{Address, Bytes, B256, U256};

/// Size of the pre-v7 block context wire format.
pub const BLOCK_CONTEXT_SIZE: usize = 60;

/// Size of the v7 block context carried inside the blob envelope. The block
/// number is implicit (consecutive from the envelope's initial number).
pub const BLOCK_CONTEXT_V7_SIZE: usize = 52;

/// Errors produced while decoding block contexts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockContextError {
    /// The input is not exactly one context in size.
    #[error("invalid block context length: expected {expected}, got {got}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },
    /// A block declares fewer transactions than L1 messages.
    #[error("block {number} declares {num_transactions} txs but {num_l1_messages} L1 messages")]
    TransactionCountUnderflow {
        /// The block number.
        number: u64,
        /// Declared total transaction count.
        num_transactions: u16,
        /// Declared L1 message count.
        num_l1_messages: u16,
    },
}

/// The per-block context posted to DA.
///
/// Wire format (60 bytes, big-endian): `number(8) | timestamp(8) |
/// base_fee(32) | gas_limit(8) | num_transactions(2) | num_l1_messages(2)`.
/// `num_transactions` counts L1 messages and L2 transactions together.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    /// The L2 block number.
    pub number: u64,
    /// The L2 block timestamp.
    pub timestamp: u64,
    /// The base fee. Reserved-zero on the wire for codec v0.
    pub base_fee: U256,
    /// The block gas limit.
    pub gas_limit: u64,
    /// Total transaction count, L1 messages included.
    pub num_transactions: u16,
    /// Leading L1 message count.
    pub num_l1_messages: u16,
}

impl BlockContext {
    /// Encodes the context into its 60-byte wire form.
    pub fn encode(&self) -> [u8; BLOCK_CONTEXT_SIZE] {
        let mut out = [0u8; BLOCK_CONTEXT_SIZE];
        out[0..8].copy_from_slice(&self.number.to_be_bytes());
        out[8..16].copy_from_slice(&self.timestamp.to_be_bytes());
        out[16..48].copy_from_slice(&self.base_fee.to_be_bytes::<32>());
        out[48..56].copy_from_slice(&self.gas_limit.to_be_bytes());
        out[56..58].copy_from_slice(&self.num_transactions.to_be_bytes());
        out[58..60].copy_from_slice(&self.num_l1_messages.to_be_bytes());
        out
    }

    /// Decodes a context from its 60-byte wire form.
    pub fn decode(buf: &[u8]) -> Result<Self, BlockContextError> {
        if buf.len() != BLOCK_CONTEXT_SIZE {
            return Err(BlockContextError::InvalidLength {
                expected: BLOCK_CONTEXT_SIZE,
                got: buf.len(),
            });
        }
        let ctx = Self {
            number: u64::from_be_bytes(buf[0..8].try_into().unwrap()),
            timestamp: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
            base_fee: U256::from_be_slice(&buf[16..48]),
            gas_limit: u64::from_be_bytes(buf[48..56].try_into().unwrap()),
            num_transactions: u16::from_be_bytes(buf[56..58].try_into().unwrap()),
            num_l1_messages: u16::from_be_bytes(buf[58..60].try_into().unwrap()),
        };
        ctx.check_counts()?;
        Ok(ctx)
    }

    /// Decodes a v7 context (52 bytes, number supplied by the caller).
    pub fn decode_v7(number: u64, buf: &[u8]) -> Result<Self, BlockContextError> {
        if buf.len() != BLOCK_CONTEXT_V7_SIZE {
            return Err(BlockContextError::InvalidLength {
                expected: BLOCK_CONTEXT_V7_SIZE,
                got: buf.len(),
            });
        }
        let ctx = Self {
            number,
            timestamp: u64::from_be_bytes(buf[0..8].try_into().unwrap()),
            base_fee: U256::from_be_slice(&buf[8..40]),
            gas_limit: u64::from_be_bytes(buf[40..48].try_into().unwrap()),
            num_transactions: u16::from_be_bytes(buf[48..50].try_into().unwrap()),
            num_l1_messages: u16::from_be_bytes(buf[50..52].try_into().unwrap()),
        };
        ctx.check_counts()?;
        Ok(ctx)
    }

    /// Encodes the context into its 52-byte v7 wire form.
    pub fn encode_v7(&self) -> [u8; BLOCK_CONTEXT_V7_SIZE] {
        let mut out = [0u8; BLOCK_CONTEXT_V7_SIZE];
        out[0..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..40].copy_from_slice(&self.base_fee.to_be_bytes::<32>());
        out[40..48].copy_from_slice(&self.gas_limit.to_be_bytes());
        out[48..50].copy_from_slice(&self.num_transactions.to_be_bytes());
        out[50..52].copy_from_slice(&self.num_l1_messages.to_be_bytes());
        out
    }

    /// Number of L2 (non-message) transactions in the block.
    pub const fn num_l2_transactions(&self) -> u16 {
        self.num_transactions - self.num_l1_messages
    }

    fn check_counts(&self) -> Result<(), BlockContextError> {
        if self.num_transactions < self.num_l1_messages {
            return Err(BlockContextError::TransactionCountUnderflow {
                number: self.number,
                num_transactions: self.num_transactions,
                num_l1_messages: self.num_l1_messages,
            });
        }
        Ok(())
    }
}

/// A transaction inside a derived L2 block: either a cross-layer message
/// popped from the L1 queue or a regular enveloped L2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2Transaction {
    /// An L1→L2 message, executed ahead of user transactions.
    L1Message(L1MessageTx),
    /// A user transaction recovered from DA.
    Enveloped(TxEnvelope),
}

impl L2Transaction {
    /// The transaction hash.
    pub fn tx_hash(&self) -> B256 {
        match self {
            Self::L1Message(msg) => msg.tx_hash(),
            Self::Enveloped(tx) => *tx.tx_hash(),
        }
    }

    /// Whether this is an L1 message.
    pub const fn is_l1_message(&self) -> bool {
        matches!(self, Self::L1Message(_))
    }
}

/// Header fields not carried by DA, supplied by an external oracle for
/// historical blocks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MissingHeaderFields {
    /// The block difficulty.
    pub difficulty: U256,
    /// The header extra data.
    pub extra_data: Bytes,
    /// Fields only relevant for blocks that predate DA entirely.
    pub historical: Option<HistoricalHeaderFields>,
}

/// Oracle-supplied fields for pre-DA historical blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalHeaderFields {
    /// The block coinbase.
    pub coinbase: Address,
    /// The header nonce.
    pub nonce: u64,
    /// The post-state root.
    pub state_root: B256,
}

/// The subset of header fields reconstructible from DA plus the oracle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartialHeader {
    /// The L2 block number.
    pub number: u64,
    /// The block timestamp.
    pub timestamp: u64,
    /// The base fee, absent where the wire format reserves it as zero.
    pub base_fee: Option<U256>,
    /// The block gas limit.
    pub gas_limit: u64,
    /// The block difficulty.
    pub difficulty: U256,
    /// The header extra data.
    pub extra_data: Bytes,
    /// The block coinbase.
    pub coinbase: Address,
    /// The header nonce.
    pub nonce: u64,
    /// The post-state root, when known ahead of execution.
    pub state_root: Option<B256>,
}

/// A block ready for execution: a partial header plus its ordered
/// transactions, L1 messages first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialBlock {
    /// The partial header.
    pub header: PartialHeader,
    /// The ordered transaction list.
    pub transactions: Vec<L2Transaction>,
    /// The index of the batch this block was derived from.
    pub batch_index: u64,
}

impl PartialBlock {
    /// The L2 block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }
}
