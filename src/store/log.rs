//! Append-only log file plus the in-memory index rebuilt from it on open.
//!
//! One file per KV instance, fixed relative path `log` beneath the KV root.
//! Close is fsync-only. `flush` must never truncate or rewrite the log from
//! the in-memory snapshot, or it would silently drop records appended by
//! another handle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::store::error::{Result, StoreError};
use crate::store::record::Record;

const LOG_FILE_NAME: &str = "log";

/// Append-only byte log with a derived key -> offset index.
pub struct Log {
    path: PathBuf,
    file: File,
    write_offset: u64,
    index: HashMap<Vec<u8>, u64>,
}

impl Log {
    /// Open the log beneath `dir`, creating it if absent, and rebuild the
    /// index by scanning the whole file from offset 0.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut contents = Vec::new();
        File::open(&path)?.read_to_end(&mut contents)?;

        let mut index = HashMap::new();
        let mut offset = 0u64;
        while (offset as usize) < contents.len() {
            let (record, consumed) = Record::decode(&contents[offset as usize..]).map_err(|e| {
                StoreError::CorruptLog(format!("at offset {offset}: {e}"))
            })?;
            index.insert(record.key, offset);
            offset += consumed as u64;
        }

        Ok(Log {
            path,
            file,
            write_offset: offset,
            index,
        })
    }

    /// Append `(key, value)`, fsync, then update the in-memory index. The
    /// on-disk order is authoritative: the index is only updated after the
    /// write (and its fsync) succeed. Rejects an empty key before writing
    /// anything: `Record::decode` also rejects a zero-length key, so an
    /// empty-key record that made it to disk would turn `CorruptLog` on the
    /// very next `open`, taking every other key down with it.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::KeyIsEmpty);
        }

        let record = Record::new(key.to_vec(), value.to_vec());
        let encoded = record.encode();
        let offset = self.write_offset;

        self.file.write_all(&encoded)?;
        self.file.sync_all()?;

        self.write_offset += encoded.len() as u64;
        self.index.insert(key.to_vec(), offset);
        Ok(())
    }

    /// Read through the index, decoding from the recorded offset.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let offset = *self.index.get(key).ok_or(StoreError::NotFound)?;
        let (record, _) = self.read_at(offset)?;
        Ok(record.value)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Visit every record in log order (not deduplicated by key). The
    /// visitor may stop the walk early by returning `Err`; that error is
    /// propagated to the caller.
    pub fn scan<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let mut offset = 0u64;
        loop {
            match self.read_at(offset) {
                Ok((record, consumed)) => {
                    visitor(&record.key, &record.value)?;
                    offset += consumed as u64;
                }
                Err(StoreError::NotFound) => break,
                Err(e) => return Err(e),
            }
            if offset >= self.write_offset {
                break;
            }
        }
        Ok(())
    }

    /// fsync only. Must never rewrite or truncate the file from the
    /// in-memory index: a prior revision of this store did, and silently
    /// dropped records appended concurrently by another handle.
    pub fn flush(&mut self) -> Result<()> {
        if let Err(e) = self.file.sync_all() {
            warn!("failed to fsync log at {:?}: {e}", self.path);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_at(&self, offset: u64) -> Result<(Record, usize)> {
        if offset >= self.write_offset {
            return Err(StoreError::NotFound);
        }
        // Records are short-lived reads off a handle-private file object; a
        // plain positional read is sufficient since writers only append.
        let mut header = [0u8; 8];
        self.file.read_exact_at(&mut header, offset)?;
        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let value_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
        let total = 8 + key_len + value_len + 4;

        let mut buf = vec![0u8; total];
        self.file.read_exact_at(&mut buf, offset)?;
        Record::decode(&buf).map(|(record, consumed)| (record, consumed))
    }
}
