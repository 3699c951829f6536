//! Key-value store handle: Open/Close/Put/Get/Scan over a `Log`.
//!
//! One handle per open. Multiple handles may be open over the same
//! directory concurrently; each appends independently and a handle only
//! observes records present at its own `open` plus records it has itself
//! appended.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::error::Result;
use crate::store::log::Log;

const TX_KEY_PREFIX: &[u8] = b"_tx/";

pub struct Kv {
    log: Log,
    next_tx_id: AtomicU64,
}

impl Kv {
    pub fn open(dir: &Path) -> Result<Self> {
        let log = Log::open(dir)?;

        // A marker key derived only from the batch length can collide across
        // batches of equal size. Seed a monotonic counter from the highest
        // `_tx/<n>` observed in the log instead, so recovered stores keep
        // allocating fresh ids rather than reusing one.
        let mut max_seen: Option<u64> = None;
        log.scan(|key, _| {
            if let Some(rest) = key.strip_prefix(TX_KEY_PREFIX) {
                if let Ok(n) = std::str::from_utf8(rest).unwrap_or("").parse::<u64>() {
                    max_seen = Some(max_seen.map_or(n, |m| m.max(n)));
                }
            }
            Ok(())
        })?;

        Ok(Kv {
            log,
            next_tx_id: AtomicU64::new(max_seen.map_or(0, |n| n + 1)),
        })
    }

    /// Allocate the next `_tx/<n>` marker id, unique within this handle's
    /// lifetime over this store.
    pub fn next_tx_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.log.put(key, value)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.log.get(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.log.contains(key)
    }

    /// Visit every record in log order. Not deduplicated by key; callers
    /// that want latest-value semantics apply last-writer-wins themselves.
    pub fn scan<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        self.log.scan(visitor)
    }

    /// Close = fsync only, never a rewrite. See `Log::flush`.
    pub fn close(mut self) -> Result<()> {
        self.log.flush()
    }
}
