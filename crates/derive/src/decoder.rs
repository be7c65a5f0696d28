//! Decodes one commit transaction (calldata, blob sidecars and the commit
//! events it produced) into typed DA entries.

use crate::{
    codec::{decode_chunk, decode_full_payload, decode_tx_envelope, DecodedChunk},
    ensure,
    entries::{Chunk, CommitEntry, DaBlock, DaEntry},
    errors::{CodecError, DeriveError, DeriveResult},
    traits::{BlobProvider, CommitTransaction, L1MessageProvider},
};
use alloy_primitives::B256;
use alloy_sol_types::SolCall;
use mako_primitives::{
    batch::{full_blob_batch_hash, BatchHeader},
    blob::{blob_to_versioned_hash, decode_envelope, Blob},
    contract::IRollup,
    event::{L1BlockRef, LogContext, RollupEvent},
    message::{roll_queue_hash, L1MessageTx, SkippedBitmap},
    CodecVersion,
};
use tracing::debug;

/// A commit event reduced to the fields the decoder consumes.
#[derive(Debug, Clone, Copy)]
struct CommitEvent {
    index: u64,
    batch_hash: B256,
    ctx: LogContext,
}

/// Decodes the commit events of one L1 transaction into DA entries.
///
/// All `events` must be commit events originating from `tx`; the data source
/// guarantees they share one L1 block and carry strictly consecutive batch
/// indices. The whole group decodes in one call so the v7+ parent-child hash
/// chain can be walked against the transaction's shared parent argument.
pub async fn decode_commit_group<B, M>(
    events: &[RollupEvent],
    tx: &CommitTransaction,
    blobs: &mut B,
    messages: &M,
) -> DeriveResult<Vec<DaEntry>>
where
    B: BlobProvider + Send,
    M: L1MessageProvider + Sync,
{
    let events = commit_events(events)?;
    ensure!(
        !events.is_empty(),
        DeriveError::InconsistentCommitGroup("empty commit group".into()).crit()
    );
    let selector: [u8; 4] = tx
        .input
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| DeriveError::AbiDecode("calldata shorter than a selector".into()).crit())?;

    match selector {
        IRollup::commitBatchCall::SELECTOR => {
            let call = IRollup::commitBatchCall::abi_decode(&tx.input, true)
                .map_err(|e| DeriveError::AbiDecode(e.to_string()).crit())?;
            let entry = decode_chunked_commit(
                &events,
                CodecVersion::new(call.version),
                &call.parentBatchHeader,
                &call.chunks,
                &call.skippedL1MessageBitmap,
                None,
                messages,
            )
            .await?;
            Ok(vec![DaEntry::Commit(Box::new(entry))])
        }
        IRollup::commitBatchWithBlobProofCall::SELECTOR => {
            let call = IRollup::commitBatchWithBlobProofCall::abi_decode(&tx.input, true)
                .map_err(|e| DeriveError::AbiDecode(e.to_string()).crit())?;
            ensure!(
                tx.blob_versioned_hashes.len() == 1,
                DeriveError::InsufficientBlobHashes {
                    events: 1,
                    blobs: tx.blob_versioned_hashes.len(),
                }
                .crit()
            );
            let blob_hash = tx.blob_versioned_hashes[0];
            let block_ref = events[0].ctx.block_ref();
            let blob = fetch_verified_blob(blobs, &block_ref, blob_hash).await?;
            let entry = decode_chunked_commit(
                &events,
                CodecVersion::new(call.version),
                &call.parentBatchHeader,
                &call.chunks,
                &call.skippedL1MessageBitmap,
                Some((blob_hash, blob.as_ref())),
                messages,
            )
            .await?;
            Ok(vec![DaEntry::Commit(Box::new(entry))])
        }
        IRollup::commitBatchesCall::SELECTOR => {
            let call = IRollup::commitBatchesCall::abi_decode(&tx.input, true)
                .map_err(|e| DeriveError::AbiDecode(e.to_string()).crit())?;
            let entries = decode_full_payload_commits(
                &events,
                CodecVersion::new(call.version),
                call.parentBatchHash,
                tx,
                blobs,
                messages,
            )
            .await?;
            ensure!(
                entries.last().map(|e| e.batch_hash) == Some(call.lastBatchHash),
                DeriveError::InconsistentCommitGroup(
                    "last committed batch hash does not match calldata".into()
                )
                .crit()
            );
            Ok(entries.into_iter().map(|e| DaEntry::Commit(Box::new(e))).collect())
        }
        IRollup::commitAndFinalizeBatchCall::SELECTOR => {
            let call = IRollup::commitAndFinalizeBatchCall::abi_decode(&tx.input, true)
                .map_err(|e| DeriveError::AbiDecode(e.to_string()).crit())?;
            ensure!(
                events.len() == 1,
                DeriveError::InconsistentCommitGroup(
                    "commitAndFinalizeBatch with multiple commit events".into()
                )
                .crit()
            );
            let entries = decode_full_payload_commits(
                &events,
                CodecVersion::new(call.version),
                call.parentBatchHash,
                tx,
                blobs,
                messages,
            )
            .await?;
            let event = events[0];
            let mut out: Vec<DaEntry> =
                entries.into_iter().map(|e| DaEntry::Commit(Box::new(e))).collect();
            // The contract finalizes in the same transaction; surface the
            // matching finalize entry right behind the commit.
            out.push(DaEntry::Finalize {
                index: event.index,
                batch_hash: event.batch_hash,
                state_root: call.finalizeStruct.postStateRoot,
                withdraw_root: call.finalizeStruct.withdrawRoot,
                ctx: event.ctx,
            });
            Ok(out)
        }
        other => Err(DeriveError::UnknownCommitSelector(other).crit()),
    }
}

/// Decodes a chunked (v0–v6) commit into a single entry. `blob` carries the
/// verified batch blob for v1+.
async fn decode_chunked_commit<M>(
    events: &[CommitEvent],
    version: CodecVersion,
    parent_header_bytes: &[u8],
    chunks: &[impl AsRef<[u8]>],
    skipped_bitmap: &[u8],
    blob: Option<(B256, &Blob)>,
    messages: &M,
) -> DeriveResult<CommitEntry>
where
    M: L1MessageProvider + Sync,
{
    ensure!(
        !version.has_full_blob_payload(),
        DeriveError::InconsistentCommitGroup(format!(
            "chunked commit method carries codec {version}"
        ))
        .crit()
    );
    ensure!(
        version.uses_blob() == blob.is_some(),
        DeriveError::InconsistentCommitGroup(format!("codec {version} blob presence mismatch"))
            .crit()
    );
    ensure!(
        events.len() == 1,
        DeriveError::InconsistentCommitGroup(format!(
            "chunked commit method with {} commit events",
            events.len()
        ))
        .crit()
    );
    let event = events[0];

    let parent = BatchHeader::decode(parent_header_bytes)
        .map_err(|e| DeriveError::BadEncoding(e.into()).crit())?;
    ensure!(
        parent.index + 1 == event.index,
        DeriveError::InconsistentCommitGroup(format!(
            "parent header index {} does not precede batch {}",
            parent.index, event.index
        ))
        .crit()
    );
    let bitmap = SkippedBitmap::new(skipped_bitmap.to_vec().into())
        .map_err(|e| DeriveError::BadEncoding(e.into()).crit())?;

    let mut decoded: Vec<DecodedChunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        decoded.push(
            decode_chunk(version, chunk.as_ref())
                .map_err(|e| DeriveError::BadEncoding(e).crit())?,
        );
    }

    // v1+ transactions live in the blob, paired to the calldata contexts.
    if let Some((_, blob)) = blob {
        let envelope = decode_envelope(blob)
            .map_err(|e| DeriveError::BadEncoding(CodecError::Blob(e)).crit())?;
        let payloads = decode_tx_envelope(version, &envelope)
            .map_err(|e| DeriveError::BadEncoding(e).crit())?;
        ensure!(
            payloads.len() == decoded.len(),
            DeriveError::BadEncoding(CodecError::Truncated("per-chunk blob payloads")).crit()
        );
        for (chunk, payload) in decoded.iter_mut().zip(payloads) {
            let mut buf = payload.as_slice();
            for (i, ctx) in chunk.contexts.iter().enumerate() {
                chunk.txs_per_block[i] =
                    crate::codec::decode_txs(&mut buf, ctx.num_l2_transactions() as usize)
                        .map_err(|e| DeriveError::BadEncoding(e).crit())?;
            }
            ensure!(
                buf.is_empty(),
                DeriveError::BadEncoding(CodecError::TrailingBytes {
                    structure: "chunk blob payload",
                    remaining: buf.len(),
                })
                .crit()
            );
        }
    }

    // Pop L1 messages chunk by chunk, applying the skipped bitmap over the
    // batch's queue range.
    let parent_total = parent.total_l1_message_popped;
    let mut cursor = parent_total;
    let mut out_chunks = Vec::with_capacity(decoded.len());
    for chunk in decoded {
        let mut blocks = Vec::with_capacity(chunk.contexts.len());
        for (ctx, txs) in chunk.contexts.into_iter().zip(chunk.txs_per_block) {
            let l1_messages =
                pop_messages(messages, &mut cursor, parent_total, ctx.num_l1_messages, &bitmap)
                    .await?;
            blocks.push(DaBlock { context: ctx, l1_messages, transactions: txs });
        }
        out_chunks.push(Chunk { blocks });
    }

    debug!(
        target: "da-decoder",
        batch = event.index,
        codec = %version,
        popped = cursor - parent_total,
        "decoded chunked commit"
    );

    Ok(CommitEntry {
        version,
        index: event.index,
        batch_hash: event.batch_hash,
        parent_batch_hash: parent.hash(),
        parent_total_l1_popped: parent_total,
        l1_message_popped: cursor - parent_total,
        skipped_bitmap: bitmap,
        blob_versioned_hash: blob.map(|(hash, _)| hash),
        chunks: out_chunks,
        prev_l1_queue_hash: B256::ZERO,
        post_l1_queue_hash: B256::ZERO,
        ctx: event.ctx,
    })
}

/// Decodes an ordered sequence of v7+ commits sharing one parent argument,
/// walking the parent-child hash chain one blob per event.
async fn decode_full_payload_commits<B, M>(
    events: &[CommitEvent],
    version: CodecVersion,
    parent_batch_hash: B256,
    tx: &CommitTransaction,
    blobs: &mut B,
    messages: &M,
) -> DeriveResult<Vec<CommitEntry>>
where
    B: BlobProvider + Send,
    M: L1MessageProvider + Sync,
{
    ensure!(
        version.has_full_blob_payload(),
        DeriveError::InconsistentCommitGroup(format!(
            "multi-batch commit method carries codec {version}"
        ))
        .crit()
    );
    ensure!(
        tx.blob_versioned_hashes.len() >= events.len(),
        DeriveError::InsufficientBlobHashes {
            events: events.len(),
            blobs: tx.blob_versioned_hashes.len(),
        }
        .crit()
    );

    let mut parent = parent_batch_hash;
    let mut prev_queue_hash: Option<B256> = None;
    let mut prev_cursor: Option<u64> = None;
    let mut entries = Vec::with_capacity(events.len());

    for (event, &blob_hash) in events.iter().zip(&tx.blob_versioned_hashes) {
        // The local node recomputes the batch hash; the event is not trusted.
        let computed = full_blob_batch_hash(version.value(), event.index, blob_hash, parent);
        ensure!(
            computed == event.batch_hash,
            DeriveError::BatchHashMismatch {
                index: event.index,
                event: event.batch_hash,
                computed,
            }
            .crit()
        );

        let block_ref = event.ctx.block_ref();
        let blob = fetch_verified_blob(blobs, &block_ref, blob_hash).await?;
        let envelope = decode_envelope(&blob)
            .map_err(|e| DeriveError::BadEncoding(CodecError::Blob(e)).crit())?;
        let payload = decode_full_payload(&envelope)
            .map_err(|e| DeriveError::BadEncoding(e).crit())?;

        if let Some(prev) = prev_queue_hash {
            ensure!(
                payload.prev_l1_queue_hash == prev,
                DeriveError::InconsistentCommitGroup(format!(
                    "batch {} does not continue the message queue hash chain",
                    event.index
                ))
                .crit()
            );
        }
        if let Some(prev) = prev_cursor {
            ensure!(
                payload.initial_l1_queue_index == prev,
                DeriveError::InconsistentCommitGroup(format!(
                    "batch {} does not continue the message queue at index {prev}",
                    event.index
                ))
                .crit()
            );
        }

        let initial = payload.initial_l1_queue_index;
        let mut cursor = initial;
        let mut queue_hash = payload.prev_l1_queue_hash;
        let empty_bitmap = SkippedBitmap::empty();
        let mut blocks = Vec::with_capacity(payload.contexts.len());
        for (ctx, txs) in payload.contexts.into_iter().zip(payload.txs_per_block) {
            let l1_messages =
                pop_messages(messages, &mut cursor, initial, ctx.num_l1_messages, &empty_bitmap)
                    .await?;
            for msg in &l1_messages {
                queue_hash = roll_queue_hash(queue_hash, msg);
            }
            blocks.push(DaBlock { context: ctx, l1_messages, transactions: txs });
        }
        ensure!(
            queue_hash == payload.post_l1_queue_hash,
            DeriveError::BadEncoding(CodecError::QueueHashMismatch {
                declared: payload.post_l1_queue_hash,
                computed: queue_hash,
            })
            .crit()
        );

        debug!(
            target: "da-decoder",
            batch = event.index,
            codec = %version,
            popped = cursor - initial,
            "decoded blob-only commit"
        );

        entries.push(CommitEntry {
            version,
            index: event.index,
            batch_hash: event.batch_hash,
            parent_batch_hash: parent,
            parent_total_l1_popped: initial,
            l1_message_popped: cursor - initial,
            skipped_bitmap: SkippedBitmap::empty(),
            blob_versioned_hash: Some(blob_hash),
            chunks: vec![Chunk { blocks }],
            prev_l1_queue_hash: payload.prev_l1_queue_hash,
            post_l1_queue_hash: payload.post_l1_queue_hash,
            ctx: event.ctx,
        });

        parent = event.batch_hash;
        prev_queue_hash = Some(payload.post_l1_queue_hash);
        prev_cursor = Some(cursor);
    }

    Ok(entries)
}

/// Fetches a blob and rejects it unless its KZG-derived versioned hash
/// matches the one the commit transaction references.
async fn fetch_verified_blob<B: BlobProvider>(
    blobs: &mut B,
    block_ref: &L1BlockRef,
    versioned_hash: B256,
) -> DeriveResult<Box<Blob>> {
    let blob = blobs
        .blob(block_ref, versioned_hash)
        .await
        .map_err(|e| DeriveError::Provider(e.to_string()).temp())?;
    let computed = blob_to_versioned_hash(&blob)
        .map_err(|e| DeriveError::BadEncoding(CodecError::Blob(e)).crit())?;
    ensure!(
        computed == versioned_hash,
        DeriveError::BlobHashMismatch { expected: versioned_hash, computed }.crit()
    );
    Ok(blob)
}

/// Pops `count` included messages off the queue starting at `*cursor`,
/// consuming (but not returning) indices the bitmap marks skipped. A message
/// the store has not collected yet surfaces as EOF, never a hard error.
async fn pop_messages<M: L1MessageProvider>(
    messages: &M,
    cursor: &mut u64,
    range_base: u64,
    count: u16,
    bitmap: &SkippedBitmap,
) -> DeriveResult<Vec<L1MessageTx>> {
    let mut included = Vec::with_capacity(count as usize);
    while included.len() < count as usize {
        let skipped = bitmap
            .is_skipped(*cursor - range_base)
            .map_err(|e| DeriveError::BadEncoding(e.into()).crit())?;
        if skipped {
            *cursor += 1;
            continue;
        }
        let msg = messages
            .message_by_queue_index(*cursor)
            .await
            .map_err(|e| DeriveError::Provider(e.to_string()).temp())?;
        let Some(msg) = msg else {
            debug!(target: "da-decoder", queue_index = *cursor, "L1 message not yet collected");
            return Err(DeriveError::Eof.temp());
        };
        included.push(msg);
        *cursor += 1;
    }
    Ok(included)
}

fn commit_events(events: &[RollupEvent]) -> DeriveResult<Vec<CommitEvent>> {
    events
        .iter()
        .map(|event| match event {
            RollupEvent::Commit { index, batch_hash, ctx } => {
                Ok(CommitEvent { index: *index, batch_hash: *batch_hash, ctx: *ctx })
            }
            other => Err(DeriveError::InconsistentCommitGroup(format!(
                "non-commit event in commit group: {other:?}"
            ))
            .crit()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{encode_chunk, encode_full_payload, encode_tx_envelope, FullPayload},
        errors::DeriveErrorKind,
        test_utils::{
            block_context, commit_event, log_ctx, test_l1_message, test_l2_tx, v0_commit_fixture,
            v7_commit_fixture, TestBlobProvider, TestMessageProvider,
        },
    };
    use alloy_primitives::{Bytes, U256};
    use alloy_sol_types::SolCall;
    use mako_primitives::blob::encode_envelope;

    #[tokio::test]
    async fn test_decode_v0_commit() {
        let fixture = v0_commit_fixture(1, 100, &[&[1, 2], &[3]]);
        let mut blobs = TestBlobProvider::default();
        let messages = TestMessageProvider::default();

        let entries =
            decode_commit_group(&[fixture.event.clone()], &fixture.tx, &mut blobs, &messages)
                .await
                .unwrap();
        assert_eq!(entries.len(), 1);
        let DaEntry::Commit(entry) = &entries[0] else { panic!("expected commit entry") };
        assert_eq!(entry.index, 1);
        assert_eq!(entry.version, CodecVersion::new(0));
        assert_eq!(entry.chunks.len(), 2);
        assert_eq!(entry.l1_message_popped, 0);
        assert_eq!(entry.parent_batch_hash, fixture.parent.hash());
        assert_eq!(entry.chunks[0].blocks[0].transactions.len(), 1);
        assert!(entry.blob_versioned_hash.is_none());
    }

    #[tokio::test]
    async fn test_missing_l1_message_is_eof_then_decodes() {
        let parent = BatchHeader { version: 0, index: 4, total_l1_message_popped: 2, ..Default::default() };
        let ctx = block_context(10, 1, 1);
        let chunk = encode_chunk(CodecVersion::new(0), &[ctx], &[vec![]]).unwrap();
        let input = IRollup::commitBatchCall {
            version: 0,
            parentBatchHeader: parent.encode().into(),
            chunks: vec![chunk.into()],
            skippedL1MessageBitmap: Bytes::new(),
        }
        .abi_encode();
        let log = log_ctx(100, 5, 0);
        let tx = CommitTransaction {
            tx_hash: log.tx_hash,
            input: input.into(),
            blob_versioned_hashes: Vec::new(),
        };
        let event = commit_event(5, B256::with_last_byte(5), log);
        let mut blobs = TestBlobProvider::default();
        let messages = TestMessageProvider::default();

        // Queue index 2 has not been collected yet.
        let err = decode_commit_group(&[event.clone()], &tx, &mut blobs, &messages)
            .await
            .unwrap_err();
        assert!(err.is_eof());

        // Once available, the same group decodes.
        messages.extend([2]);
        let entries =
            decode_commit_group(&[event], &tx, &mut blobs, &messages).await.unwrap();
        let DaEntry::Commit(entry) = &entries[0] else { panic!("expected commit entry") };
        assert_eq!(entry.l1_message_popped, 1);
        assert_eq!(entry.chunks[0].blocks[0].l1_messages[0], test_l1_message(2));
    }

    #[tokio::test]
    async fn test_skipped_bitmap_consumes_queue_indices() {
        let parent = BatchHeader { version: 0, index: 0, ..Default::default() };
        let ctx = block_context(1, 1, 1);
        let chunk = encode_chunk(CodecVersion::new(0), &[ctx], &[vec![]]).unwrap();
        // Bit 0 set: queue index 0 is skipped, index 1 is included.
        let mut bitmap = vec![0u8; 32];
        bitmap[31] = 1;
        let input = IRollup::commitBatchCall {
            version: 0,
            parentBatchHeader: parent.encode().into(),
            chunks: vec![chunk.into()],
            skippedL1MessageBitmap: bitmap.into(),
        }
        .abi_encode();
        let log = log_ctx(100, 1, 0);
        let tx = CommitTransaction {
            tx_hash: log.tx_hash,
            input: input.into(),
            blob_versioned_hashes: Vec::new(),
        };
        let messages = TestMessageProvider::default();
        messages.extend([1]);

        let entries = decode_commit_group(
            &[commit_event(1, B256::with_last_byte(1), log)],
            &tx,
            &mut TestBlobProvider::default(),
            &messages,
        )
        .await
        .unwrap();
        let DaEntry::Commit(entry) = &entries[0] else { panic!("expected commit entry") };
        // Two indices popped, one message included.
        assert_eq!(entry.l1_message_popped, 2);
        assert_eq!(entry.chunks[0].blocks[0].l1_messages.len(), 1);
        assert_eq!(entry.chunks[0].blocks[0].l1_messages[0].queue_index, 1);
    }

    #[tokio::test]
    async fn test_decode_blob_backed_commit() {
        let parent = BatchHeader {
            version: 4,
            index: 9,
            blob_versioned_hash: Some(B256::ZERO),
            ..Default::default()
        };
        let ctx = block_context(20, 2, 0);
        let chunk = encode_chunk(CodecVersion::new(4), &[ctx], &[]).unwrap();
        let txs = vec![test_l2_tx(0), test_l2_tx(1)];
        let mut payload = Vec::new();
        for tx in &txs {
            alloy_rlp::Encodable::encode(tx, &mut payload);
        }
        let envelope = encode_tx_envelope(CodecVersion::new(4), &[payload]);
        let blob = encode_envelope(&envelope).unwrap();
        let blob_hash = mako_primitives::blob::blob_to_versioned_hash(&blob).unwrap();
        let mut blobs = TestBlobProvider::default();
        blobs.insert(blob_hash, blob);

        let input = IRollup::commitBatchWithBlobProofCall {
            version: 4,
            parentBatchHeader: parent.encode().into(),
            chunks: vec![chunk.into()],
            skippedL1MessageBitmap: Bytes::new(),
            blobDataProof: Bytes::new(),
        }
        .abi_encode();
        let log = log_ctx(200, 10, 0);
        let tx = CommitTransaction {
            tx_hash: log.tx_hash,
            input: input.into(),
            blob_versioned_hashes: vec![blob_hash],
        };

        let entries = decode_commit_group(
            &[commit_event(10, B256::with_last_byte(10), log)],
            &tx,
            &mut blobs,
            &TestMessageProvider::default(),
        )
        .await
        .unwrap();
        let DaEntry::Commit(entry) = &entries[0] else { panic!("expected commit entry") };
        assert_eq!(entry.blob_versioned_hash, Some(blob_hash));
        assert_eq!(entry.chunks[0].blocks[0].transactions, txs);
    }

    #[tokio::test]
    async fn test_blob_hash_mismatch_rejected() {
        let fixture = v7_commit_fixture(3, 1, 50, B256::ZERO, 30);
        // Serve a different blob under the referenced hash.
        let wrong = encode_envelope(b"not the committed payload").unwrap();
        let mut blobs = TestBlobProvider::default();
        blobs.insert(fixture.tx.blob_versioned_hashes[0], wrong);

        let err = decode_commit_group(
            &fixture.events,
            &fixture.tx,
            &mut blobs,
            &TestMessageProvider::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DeriveErrorKind::Critical(DeriveError::BlobHashMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_decode_v7_group() {
        let mut fixture = v7_commit_fixture(5, 3, 80, B256::with_last_byte(0xab), 40);
        let entries = decode_commit_group(
            &fixture.events,
            &fixture.tx,
            &mut fixture.blobs,
            &TestMessageProvider::default(),
        )
        .await
        .unwrap();
        assert_eq!(entries.len(), 3);
        let indices: Vec<u64> = entries
            .iter()
            .map(|e| match e {
                DaEntry::Commit(c) => c.index,
                other => panic!("unexpected entry {other:?}"),
            })
            .collect();
        assert_eq!(indices, vec![5, 6, 7]);
        // Parent hashes chain through the group.
        let hashes: Vec<(B256, B256)> = entries
            .iter()
            .map(|e| match e {
                DaEntry::Commit(c) => (c.parent_batch_hash, c.batch_hash),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(hashes[1].0, hashes[0].1);
        assert_eq!(hashes[2].0, hashes[1].1);
    }

    #[tokio::test]
    async fn test_v7_event_hash_mismatch_rejected() {
        let mut fixture = v7_commit_fixture(5, 1, 80, B256::ZERO, 40);
        // Corrupt the event's batch hash.
        let RollupEvent::Commit { batch_hash, .. } = &mut fixture.events[0] else { unreachable!() };
        *batch_hash = B256::with_last_byte(0xee);

        let err = decode_commit_group(
            &fixture.events,
            &fixture.tx,
            &mut fixture.blobs,
            &TestMessageProvider::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DeriveErrorKind::Critical(DeriveError::BatchHashMismatch { index: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_v7_requires_enough_blobs() {
        let mut fixture = v7_commit_fixture(5, 2, 80, B256::ZERO, 40);
        fixture.tx.blob_versioned_hashes.truncate(1);
        let err = decode_commit_group(
            &fixture.events,
            &fixture.tx,
            &mut fixture.blobs,
            &TestMessageProvider::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DeriveErrorKind::Critical(DeriveError::InsufficientBlobHashes { events: 2, blobs: 1 })
        ));
    }

    #[tokio::test]
    async fn test_v7_queue_hash_chain_verified() {
        // One batch popping one message; the declared post hash must match
        // the roll over the consumed message.
        let msg = test_l1_message(0);
        let prev = B256::ZERO;
        let post = mako_primitives::message::roll_queue_hash(prev, &msg);
        let payload = FullPayload {
            prev_l1_queue_hash: prev,
            post_l1_queue_hash: post,
            initial_l1_queue_index: 0,
            contexts: vec![mako_primitives::block::BlockContext {
                number: 7,
                timestamp: 70,
                base_fee: U256::from(1u64),
                gas_limit: 30_000_000,
                num_transactions: 1,
                num_l1_messages: 1,
            }],
            txs_per_block: vec![vec![]],
        };
        let blob = encode_envelope(&encode_full_payload(&payload)).unwrap();
        let blob_hash = mako_primitives::blob::blob_to_versioned_hash(&blob).unwrap();
        let mut blobs = TestBlobProvider::default();
        blobs.insert(blob_hash, blob);

        let batch_hash =
            mako_primitives::batch::full_blob_batch_hash(7, 1, blob_hash, B256::ZERO);
        let log = log_ctx(10, 1, 0);
        let input = IRollup::commitBatchesCall {
            version: 7,
            parentBatchHash: B256::ZERO,
            lastBatchHash: batch_hash,
        }
        .abi_encode();
        let tx = CommitTransaction {
            tx_hash: log.tx_hash,
            input: input.into(),
            blob_versioned_hashes: vec![blob_hash],
        };
        let messages = TestMessageProvider::default();
        messages.extend([0]);

        let entries =
            decode_commit_group(&[commit_event(1, batch_hash, log)], &tx, &mut blobs, &messages)
                .await
                .unwrap();
        let DaEntry::Commit(entry) = &entries[0] else { panic!("expected commit entry") };
        assert_eq!(entry.post_l1_queue_hash, post);
        assert_eq!(entry.l1_message_popped, 1);
    }

    #[tokio::test]
    async fn test_unknown_selector_rejected() {
        let log = log_ctx(1, 1, 0);
        let tx = CommitTransaction {
            tx_hash: log.tx_hash,
            input: vec![0xde, 0xad, 0xbe, 0xef].into(),
            blob_versioned_hashes: Vec::new(),
        };
        let err = decode_commit_group(
            &[commit_event(1, B256::ZERO, log)],
            &tx,
            &mut TestBlobProvider::default(),
            &TestMessageProvider::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DeriveErrorKind::Critical(DeriveError::UnknownCommitSelector([0xde, 0xad, 0xbe, 0xef]))
        ));
    }
}
