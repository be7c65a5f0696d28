//! First-success round-robin fan-out across heterogeneous blob backends.

use crate::blob_client::{BlobClient, BlobClientError};
use alloy_primitives::B256;
use async_trait::async_trait;
use mako_derive::traits::BlobProvider;
use mako_primitives::{blob::Blob, event::L1BlockRef};
use tracing::warn;

/// The fan-out's error: every configured backend was tried once.
#[derive(Debug, thiserror::Error)]
#[error("all {tried} blob clients exhausted for blob {versioned_hash}: {last}")]
pub struct BlobFanoutError {
    /// The number of backends tried.
    pub tried: usize,
    /// The blob that could not be fetched.
    pub versioned_hash: B256,
    /// The last backend's error.
    #[source]
    pub last: BlobClientError,
}

/// A ring of blob backends. Each lookup starts at the most recently
/// successful backend and cycles on failure; only a full unsuccessful cycle
/// surfaces an error, which the pipeline treats as temporary.
pub struct BlobClientRing {
    clients: Vec<Box<dyn BlobClient + Send + Sync>>,
    /// Index of the backend the next lookup starts at.
    next: usize,
}

impl core::fmt::Debug for BlobClientRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlobClientRing")
            .field("clients", &self.clients.len())
            .field("next", &self.next)
            .finish()
    }
}

impl BlobClientRing {
    /// Creates a ring over `clients`. At least one backend is required.
    pub fn new(clients: Vec<Box<dyn BlobClient + Send + Sync>>) -> Self {
        assert!(!clients.is_empty(), "blob client ring requires at least one backend");
        Self { clients, next: 0 }
    }

    /// The number of configured backends.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the ring has no backends. Construction forbids this; kept
    /// for the conventional pairing with [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl BlobProvider for BlobClientRing {
    type Error = BlobFanoutError;

    async fn blob(
        &mut self,
        block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, Self::Error> {
        let len = self.clients.len();
        let mut last = None;
        for attempt in 0..len {
            let at = (self.next + attempt) % len;
            match self.clients[at].blob(block_ref, versioned_hash).await {
                Ok(blob) => {
                    // Stay with the backend that worked.
                    self.next = at;
                    return Ok(blob);
                }
                Err(e) => {
                    warn!(
                        target: "blob-fanout",
                        client = at,
                        %versioned_hash,
                        error = %e,
                        "blob client failed, rotating"
                    );
                    last = Some(e);
                }
            }
        }
        self.next = (self.next + 1) % len;
        Err(BlobFanoutError {
            tried: len,
            versioned_hash,
            last: last.expect("at least one backend was tried"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct ScriptedClient {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BlobClient for ScriptedClient {
        async fn blob(
            &mut self,
            _block_ref: &L1BlockRef,
            versioned_hash: B256,
        ) -> Result<Box<Blob>, BlobClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BlobClientError::NotFound(versioned_hash))
            } else {
                Ok(Box::new(Blob::ZERO))
            }
        }
    }

    fn scripted(fail: bool) -> (Box<dyn BlobClient + Send + Sync>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(ScriptedClient { fail, calls: calls.clone() }), calls)
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (a, a_calls) = scripted(false);
        let (b, b_calls) = scripted(false);
        let mut ring = BlobClientRing::new(vec![a, b]);
        ring.blob(&L1BlockRef::default(), B256::ZERO).await.unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rotates_on_failure_and_sticks_to_winner() {
        let (a, a_calls) = scripted(true);
        let (b, b_calls) = scripted(false);
        let mut ring = BlobClientRing::new(vec![a, b]);

        ring.blob(&L1BlockRef::default(), B256::ZERO).await.unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        // The winning backend is tried first on the next lookup.
        ring.blob(&L1BlockRef::default(), B256::ZERO).await.unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_cycle_failure_surfaces_error() {
        let (a, a_calls) = scripted(true);
        let (b, b_calls) = scripted(true);
        let mut ring = BlobClientRing::new(vec![a, b]);
        let err = ring.blob(&L1BlockRef::default(), B256::ZERO).await.unwrap_err();
        assert_eq!(err.tried, 2);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }
}
