//! Commit object layer: serialised commit records under `objects/<id>`.

use serde::{Deserialize, Serialize};

use crate::store::{Kv, StoreError, WriteBatch};
use crate::vcs::error::{Result, VcsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: u64,
    pub message: String,
    pub branch: String,
    pub timestamp: i64,
    pub parent: Option<u64>,
    pub parent2: Option<u64>,
}

fn object_key(id: u64) -> Vec<u8> {
    format!("objects/{id}").into_bytes()
}

/// Queue the commit object write. Immutable after the batch commits; never
/// written twice for the same id.
pub fn write_commit_object(batch: &mut WriteBatch<'_>, commit: &Commit) {
    batch.put(object_key(commit.id), serde_json::to_vec(commit).unwrap());
}

pub fn read_commit_object(kv: &Kv, id: u64) -> Result<Commit> {
    match kv.get(&object_key(id)) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()).into()),
        Err(StoreError::NotFound) => Err(VcsError::NotFound(format!("commit {id}"))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Kv;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips_all_fields() {
        let dir = tempdir().unwrap();
        let mut kv = Kv::open(dir.path()).unwrap();
        let commit = Commit {
            id: 0,
            message: "first".into(),
            branch: "master".into(),
            timestamp: 12345,
            parent: None,
            parent2: None,
        };

        let mut batch = WriteBatch::new(&mut kv);
        write_commit_object(&mut batch, &commit);
        batch.commit().unwrap();

        let read_back = read_commit_object(&kv, 0).unwrap();
        assert_eq!(read_back, commit);
    }

    #[test]
    fn missing_commit_is_not_found() {
        let dir = tempdir().unwrap();
        let kv = Kv::open(dir.path()).unwrap();
        assert!(matches!(read_commit_object(&kv, 42), Err(VcsError::NotFound(_))));
    }
}
