//! Staging area: per-path index entries, blob storage, tombstones.
//!
//! Staged files are content-addressed by a SHA-256 hash of their bytes
//! rather than by a byte offset into a log, so the same content staged
//! twice always resolves to the same blob id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::{Kv, StoreError, WriteBatch};
use crate::vcs::error::{Result, VcsError};

const INDEX_ENTRY_PREFIX: &str = "index/entries/";
const BLOB_PREFIX: &str = "objects/blob/";

pub const MODE_REGULAR: &str = "100644";
pub const MODE_EXECUTABLE: &str = "100755";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub blob_id: String,
    pub mode: String,
}

impl IndexEntry {
    fn tombstone() -> Self {
        IndexEntry {
            blob_id: String::new(),
            mode: String::new(),
        }
    }

    fn is_tombstone(&self) -> bool {
        self.blob_id.is_empty() && self.mode.is_empty()
    }
}

fn entry_key(path: &str) -> Vec<u8> {
    format!("{INDEX_ENTRY_PREFIX}{path}").into_bytes()
}

fn blob_key(blob_id: &str) -> Vec<u8> {
    format!("{BLOB_PREFIX}{blob_id}").into_bytes()
}

pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn mode_for(path: &Path) -> Result<String> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path).map_err(StoreError::Io)?;
        let executable = meta.permissions().mode() & 0o111 != 0;
        Ok(if executable {
            MODE_EXECUTABLE.to_string()
        } else {
            MODE_REGULAR.to_string()
        })
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(MODE_REGULAR.to_string())
    }
}

/// Stage a single file: read its content, write the content-addressed blob,
/// and record the index entry under `path` (forward-slash separators
/// regardless of platform).
fn stage_file(batch: &mut WriteBatch<'_>, repo_root: &Path, abs_path: &Path) -> Result<()> {
    let content = fs::read(abs_path).map_err(|_| {
        VcsError::FileNotFound(abs_path.display().to_string())
    })?;
    let blob_id = hash_content(&content);
    let mode = mode_for(abs_path)?;

    let rel_path = abs_path
        .strip_prefix(repo_root)
        .unwrap_or(abs_path)
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/");

    batch.put(blob_key(&blob_id), content);
    let entry = IndexEntry { blob_id, mode };
    batch.put(entry_key(&rel_path), serde_json::to_vec(&entry).unwrap());
    Ok(())
}

/// `add(path)` where path is `"."`, a file, or a directory. `"."` and
/// directories walk their subtree, skipping `.gitclone`, and skip per-entry
/// filesystem errors silently; a direct file argument that cannot be read
/// aborts the whole call with `FileNotFound`. That asymmetry is intentional:
/// a bulk walk tolerates transient entries disappearing underfoot, a named
/// argument the caller typed should fail loudly if it's wrong.
pub fn add(batch: &mut WriteBatch<'_>, repo_root: &Path, target: &str) -> Result<()> {
    let abs_target = if target == "." {
        repo_root.to_path_buf()
    } else {
        repo_root.join(target)
    };

    if abs_target.is_file() {
        return stage_file(batch, repo_root, &abs_target);
    }

    if !abs_target.is_dir() {
        return Err(VcsError::FileNotFound(target.to_string()));
    }

    for file in walk_files(&abs_target) {
        // Walk form: skip files that error out rather than aborting.
        let _ = stage_file(batch, repo_root, &file);
    }
    Ok(())
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_name().map(|n| n == crate::store::repo_store::GITCLONE_DIR).unwrap_or(false) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files
}

/// Scan `index/entries/*`, folding tombstones and live entries in append
/// order so the latest observed value per path wins.
pub fn get_index_entries(kv: &Kv) -> Result<HashMap<String, IndexEntry>> {
    let mut live: HashMap<String, IndexEntry> = HashMap::new();
    kv.scan(|key, value| {
        if let Some(rest) = key.strip_prefix(INDEX_ENTRY_PREFIX.as_bytes()) {
            let path = String::from_utf8_lossy(rest).into_owned();
            let entry: IndexEntry = serde_json::from_slice(value)
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;
            if entry.is_tombstone() {
                live.remove(&path);
            } else {
                live.insert(path, entry);
            }
        }
        Ok(())
    })?;
    Ok(live)
}

pub fn has_staged_entries(kv: &Kv) -> Result<bool> {
    Ok(!get_index_entries(kv)?.is_empty())
}

/// Tombstone every distinct staged path, including paths whose latest
/// observed state is already a tombstone (they may be re-staged later and
/// need a fresh tombstone boundary for this commit).
pub fn clear_index(batch: &mut WriteBatch<'_>, kv: &Kv) -> Result<()> {
    let mut all_paths: std::collections::HashSet<String> = std::collections::HashSet::new();
    kv.scan(|key, _| {
        if let Some(rest) = key.strip_prefix(INDEX_ENTRY_PREFIX.as_bytes()) {
            all_paths.insert(String::from_utf8_lossy(rest).into_owned());
        }
        Ok(())
    })?;
    for path in all_paths {
        batch.put(entry_key(&path), serde_json::to_vec(&IndexEntry::tombstone()).unwrap());
    }
    Ok(())
}
