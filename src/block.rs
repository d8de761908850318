//! Slices a file into fixed-size blocks, digests them, and reassembles them
//! on the receiving side.
//!
//! Sender-side state (`SendCache`) and receiver-side state (`PendingBlocks`)
//! are kept here as plain, lock-guarded tables rather than folded into the
//! node runtime, so the transfer logic can be exercised without a socket.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::error::BlockError;
use crate::wire::Datagram;

/// Upper bound on the number of (filename, index) entries `SendCache` keeps
/// before evicting the oldest (spec §4.4: "implementations MAY bound cache
/// size by LRU").
const SEND_CACHE_CAPACITY: usize = 4096;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Total block count for a file of `file_size` bytes at `block_size` bytes
/// per block. Empty files are disallowed by the spec; callers must reject
/// `file_size == 0` before reaching here.
pub fn total_blocks(file_size: u64, block_size: usize) -> u64 {
    let block_size = block_size as u64;
    (file_size + block_size - 1) / block_size
}

type CacheKey = (String, u64);

/// Sender-side cache of (bytes, digest) keyed by (filename, index), used to
/// serve `CORRUPTED_BLOCK` retransmission requests without rereading the
/// file or recomputing the digest (spec §9(b): this is a caching contract,
/// not a recomputation).
pub struct SendCache {
    inner: Mutex<(HashMap<CacheKey, (Vec<u8>, String)>, VecDeque<CacheKey>)>,
}

impl SendCache {
    pub fn new() -> Self {
        SendCache {
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }

    pub fn insert(&self, filename: &str, index: u64, bytes: Vec<u8>, digest: String) {
        let key = (filename.to_string(), index);
        let mut guard = self.inner.lock().unwrap();
        let (table, order) = &mut *guard;
        if table.insert(key.clone(), (bytes, digest)).is_none() {
            order.push_back(key);
        }
        while table.len() > SEND_CACHE_CAPACITY {
            if let Some(oldest) = order.pop_front() {
                table.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn get(&self, filename: &str, index: u64) -> Option<(Vec<u8>, String)> {
        let guard = self.inner.lock().unwrap();
        guard.0.get(&(filename.to_string(), index)).cloned()
    }

    /// Drops every cached block for `filename`. Called once the sender
    /// learns (out of band) that the transfer is complete or abandoned.
    pub fn release(&self, filename: &str) {
        let mut guard = self.inner.lock().unwrap();
        let (table, order) = &mut *guard;
        table.retain(|(name, _), _| name != filename);
        order.retain(|(name, _)| name != filename);
    }
}

impl Default for SendCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads `bytes` as `total_blocks(bytes.len(), block_size)` blocks, caching
/// each and handing it to `send` as a [`Datagram::Block`]. Mirrors
/// `send_file_blocks` in the reference implementation.
pub fn send_blocks<F>(filename: &str, bytes: &[u8], block_size: usize, cache: &SendCache, mut send: F)
where
    F: FnMut(Datagram),
{
    let total = total_blocks(bytes.len() as u64, block_size);
    for index in 1..=total {
        let start = (index - 1) as usize * block_size;
        let end = (start + block_size).min(bytes.len());
        let chunk = bytes[start..end].to_vec();
        let digest = sha256_hex(&chunk);
        cache.insert(filename, index, chunk.clone(), digest.clone());
        send(Datagram::Block {
            filename: filename.to_string(),
            index,
            total,
            digest,
            payload: chunk,
        });
    }
}

/// Re-emits a previously sent block from `cache`. Fatal to this single
/// transfer if the block was already evicted (spec §4.4, §7).
pub fn resend_block<F>(filename: &str, index: u64, total: u64, cache: &SendCache, mut send: F) -> Result<(), BlockError>
where
    F: FnMut(Datagram),
{
    let (payload, digest) = cache.get(filename, index).ok_or_else(|| BlockError::MissingCacheEntry {
        filename: filename.to_string(),
        index,
    })?;
    send(Datagram::Block {
        filename: filename.to_string(),
        index,
        total,
        digest,
        payload,
    });
    Ok(())
}

/// Receiver-side table of verified block payloads awaiting reassembly.
pub struct PendingBlocks {
    inner: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl PendingBlocks {
    pub fn new() -> Self {
        PendingBlocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, filename: &str, index: u64, bytes: Vec<u8>) {
        self.inner.lock().unwrap().insert((filename.to_string(), index), bytes);
    }

    /// If every index 1..=total is present for `filename`, drains and
    /// concatenates them in order. Returns `None` otherwise, leaving the
    /// table untouched so a later call can retry.
    pub fn try_reassemble(&self, filename: &str, total: u64) -> Option<Vec<u8>> {
        let mut table = self.inner.lock().unwrap();
        for index in 1..=total {
            if !table.contains_key(&(filename.to_string(), index)) {
                return None;
            }
        }
        let mut out = Vec::new();
        for index in 1..=total {
            let chunk = table.remove(&(filename.to_string(), index)).unwrap();
            out.extend_from_slice(&chunk);
        }
        Some(out)
    }
}

impl Default for PendingBlocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of processing one inbound `BLOCK` datagram, per spec §4.5.
#[derive(Debug, PartialEq)]
pub enum BlockOutcome {
    /// Digest mismatch; caller must emit `CORRUPTED_BLOCK` and store nothing.
    Corrupted,
    /// Verified and stored; caller must emit `GOT_BLOCK`.
    Stored,
    /// Verified, stored, and this was the block carrying `index == total`;
    /// caller must now call [`await_reassembly`] to obtain the full file.
    LastBlockArrived,
}

pub fn receive_block(filename: &str, index: u64, total: u64, digest: &str, payload: &[u8], pending: &PendingBlocks) -> BlockOutcome {
    if sha256_hex(payload) != digest {
        return BlockOutcome::Corrupted;
    }
    pending.insert(filename, index, payload.to_vec());
    if index == total {
        BlockOutcome::LastBlockArrived
    } else {
        BlockOutcome::Stored
    }
}

/// Busy-waits (per the reference implementation's `time.sleep` polling loop)
/// until every block of `filename` has arrived, then returns the reassembled
/// bytes with their entries drained from `pending`.
pub fn await_reassembly(filename: &str, total: u64, pending: &PendingBlocks, poll_interval: Duration) -> Vec<u8> {
    loop {
        if let Some(bytes) = pending.try_reassemble(filename, total) {
            return bytes;
        }
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_blocks_rounds_up() {
        assert_eq!(total_blocks(70, 32), 3);
        assert_eq!(total_blocks(64, 32), 2);
        assert_eq!(total_blocks(1, 32), 1);
    }

    #[test]
    fn digest_correctness() {
        let hex = sha256_hex(b"Hello, world!");
        assert_eq!(hex.len(), 64);
        assert_eq!(sha256_hex(b"Hello, world!"), hex);
        assert_ne!(sha256_hex(b"Hello, World!"), hex);
    }

    #[test]
    fn send_blocks_caches_every_chunk() {
        let cache = SendCache::new();
        let mut sent = Vec::new();
        send_blocks("f", b"Hello, world!", 32, &cache, |dg| sent.push(dg));
        assert_eq!(sent.len(), 1);
        let (bytes, digest) = cache.get("f", 1).unwrap();
        assert_eq!(bytes, b"Hello, world!");
        assert_eq!(digest, sha256_hex(b"Hello, world!"));
    }

    #[test]
    fn resend_uses_cached_bytes_not_recomputation() {
        let cache = SendCache::new();
        let mut sent = Vec::new();
        send_blocks("f", &[0u8; 70], 32, &cache, |dg| sent.push(dg));
        let mut resent = Vec::new();
        resend_block("f", 2, 3, &cache, |dg| resent.push(dg)).unwrap();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0], sent[1]);
    }

    #[test]
    fn resend_missing_entry_is_fatal_to_that_transfer() {
        let cache = SendCache::new();
        let err = resend_block("f", 1, 1, &cache, |_| {}).unwrap_err();
        assert!(matches!(err, BlockError::MissingCacheEntry { .. }));
    }

    #[test]
    fn receive_rejects_corrupt_block() {
        let pending = PendingBlocks::new();
        let outcome = receive_block("f", 1, 1, "not-a-real-digest", b"payload", &pending);
        assert_eq!(outcome, BlockOutcome::Corrupted);
        assert!(pending.try_reassemble("f", 1).is_none());
    }

    #[test]
    fn receive_accepts_verified_block() {
        let pending = PendingBlocks::new();
        let payload = b"Hello, world!";
        let digest = sha256_hex(payload);
        let outcome = receive_block("f", 1, 1, &digest, payload, &pending);
        assert_eq!(outcome, BlockOutcome::LastBlockArrived);
        assert_eq!(await_reassembly("f", 1, &pending, Duration::from_millis(1)), payload);
    }

    #[test]
    fn reassembly_waits_for_out_of_order_arrival() {
        let pending = PendingBlocks::new();
        let chunks: Vec<&[u8]> = vec![b"0123456789012345678901234567890", b"1", b"x"];
        let total = 3u64;

        // index 2 arrives first, must not complete yet
        let digest2 = sha256_hex(chunks[1]);
        let outcome = receive_block("f", 2, total, &digest2, chunks[1], &pending);
        assert_eq!(outcome, BlockOutcome::Stored);
        assert!(pending.try_reassemble("f", total).is_none());

        // index 1 arrives
        let digest1 = sha256_hex(chunks[0]);
        receive_block("f", 1, total, &digest1, chunks[0], &pending);
        assert!(pending.try_reassemble("f", total).is_none());

        // index 3 == total arrives last
        let digest3 = sha256_hex(chunks[2]);
        let outcome = receive_block("f", 3, total, &digest3, chunks[2], &pending);
        assert_eq!(outcome, BlockOutcome::LastBlockArrived);

        let mut expected = Vec::new();
        expected.extend_from_slice(chunks[0]);
        expected.extend_from_slice(chunks[1]);
        expected.extend_from_slice(chunks[2]);
        assert_eq!(await_reassembly("f", total, &pending, Duration::from_millis(1)), expected);
    }

    #[test]
    fn send_cache_evicts_oldest_past_capacity() {
        let cache = SendCache::new();
        for i in 0..(SEND_CACHE_CAPACITY as u64 + 10) {
            cache.insert("f", i, vec![0], "d".into());
        }
        assert!(cache.get("f", 0).is_none());
        assert!(cache.get("f", SEND_CACHE_CAPACITY as u64 + 9).is_some());
    }
}
