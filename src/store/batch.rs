//! Write batch: groups puts that must be recoverable as a unit.
//!
//! Protocol: write a `_tx/<n>` start marker listing the keys, append every
//! write, then flip the marker to committed. Recovery normalises any
//! `start`/`failed` marker left behind by a crash to `recovered`, without
//! discarding the writes that did land.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::store::error::Result;
use crate::store::kv::Kv;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum TxMarker {
    #[serde(rename = "batch_start")]
    Start { writes: Vec<String> },
    #[serde(rename = "batch_committed")]
    Committed,
    #[serde(rename = "batch_failed")]
    Failed,
    #[serde(rename = "batch_recovered")]
    Recovered,
}

fn tx_key(id: u64) -> Vec<u8> {
    format!("_tx/{id}").into_bytes()
}

/// Accumulates a sequence of `(key, value)` writes and commits them as one
/// logically atomic unit.
pub struct WriteBatch<'a> {
    kv: &'a mut Kv,
    id: u64,
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl<'a> WriteBatch<'a> {
    pub fn new(kv: &'a mut Kv) -> Self {
        let id = kv.next_tx_id();
        WriteBatch {
            kv,
            id,
            writes: Vec::new(),
        }
    }

    /// Queue a put. Not written until `commit`.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.writes.push((key.into(), value.into()));
    }

    /// Commit protocol:
    /// 1. `Put(_tx/<n>, batch_start)` listing every key in the batch.
    /// 2. `Put` each queued `(key, value)` in declared order.
    /// 3. `Put(_tx/<n>, batch_committed)` as the last write: the
    ///    linearisation point.
    ///
    /// On failure at any step, best-effort mark the batch `batch_failed` and
    /// surface the original error. Partially-applied batches are not rolled
    /// back: their already-written keys remain visible. The VC ops layer
    /// chooses batch contents so that any partial prefix is a safe superset
    /// of the previous state, never a corrupt one.
    pub fn commit(self) -> Result<()> {
        let marker_key = tx_key(self.id);
        let keys: Vec<String> = self
            .writes
            .iter()
            .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
            .collect();

        let start = serde_json::to_vec(&TxMarker::Start { writes: keys }).unwrap();
        if let Err(e) = self.kv.put(&marker_key, &start) {
            warn!("batch {} failed to write start marker: {e}", self.id);
            return Err(e);
        }

        for (key, value) in &self.writes {
            if let Err(e) = self.kv.put(key, value) {
                warn!("batch {} failed mid-write, marking failed: {e}", self.id);
                let failed = serde_json::to_vec(&TxMarker::Failed).unwrap();
                let _ = self.kv.put(&marker_key, &failed);
                return Err(e);
            }
        }

        let committed = serde_json::to_vec(&TxMarker::Committed).unwrap();
        self.kv.put(&marker_key, &committed)?;
        info!("batch {} committed ({} writes)", self.id, self.writes.len());
        Ok(())
    }
}

/// Recovery run at `Kv::open` time: scan for every `_tx/*` key and, for any
/// whose latest value is `batch_start` or `batch_failed`, overwrite it with
/// `batch_recovered`. Idempotent.
pub fn recover(kv: &mut Kv) -> Result<()> {
    let mut latest: std::collections::HashMap<Vec<u8>, TxMarker> = std::collections::HashMap::new();

    kv.scan(|key, value| {
        if key.starts_with(b"_tx/") {
            if let Ok(marker) = serde_json::from_slice::<TxMarker>(value) {
                latest.insert(key.to_vec(), marker);
            }
        }
        Ok(())
    })?;

    for (key, marker) in latest {
        if matches!(marker, TxMarker::Start { .. } | TxMarker::Failed) {
            info!("recovering incomplete transaction marker {:?}", String::from_utf8_lossy(&key));
            let recovered = serde_json::to_vec(&TxMarker::Recovered).unwrap();
            kv.put(&key, &recovered)?;
        }
    }

    Ok(())
}
