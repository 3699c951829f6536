//! Ref & HEAD layer: typed reads/writes over `meta/HEAD`,
//! `refs/heads/<b>`, `refs/remotes/origin/<b>` and `meta/NEXT_COMMIT_ID`.

use crate::store::{Kv, StoreError, WriteBatch};
use crate::vcs::error::{Result, VcsError};

const HEAD_KEY: &[u8] = b"meta/HEAD";
const NEXT_COMMIT_ID_KEY: &[u8] = b"meta/NEXT_COMMIT_ID";
const HEAD_PREFIX: &str = "ref: refs/heads/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const REMOTES_PREFIX: &str = "refs/remotes/origin/";

/// Branch names must be non-empty, contain no whitespace, and none of the
/// characters git itself forbids for the same reason: `.. ~ ^ :`.
pub fn validate_branch_name(name: &str) -> Result<()> {
    let forbidden = ["..", "~", "^", ":"];
    if name.is_empty()
        || name.chars().any(char::is_whitespace)
        || forbidden.iter().any(|f| name.contains(f))
    {
        return Err(VcsError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn heads_key(branch: &str) -> Vec<u8> {
    format!("{HEADS_PREFIX}{branch}").into_bytes()
}

fn remotes_key(branch: &str) -> Vec<u8> {
    format!("{REMOTES_PREFIX}{branch}").into_bytes()
}

/// Parse `meta/HEAD`, requiring the `ref: refs/heads/` prefix and a valid
/// branch name.
pub fn read_head_branch(kv: &Kv) -> Result<String> {
    let raw = kv.get(HEAD_KEY).map_err(|e| match e {
        StoreError::NotFound => VcsError::InvalidHead("meta/HEAD is missing".into()),
        other => other.into(),
    })?;
    let text = String::from_utf8(raw).map_err(|_| VcsError::InvalidHead("not utf-8".into()))?;
    let text = text.trim_end_matches('\n');
    let branch = text
        .strip_prefix(HEAD_PREFIX)
        .ok_or_else(|| VcsError::InvalidHead(format!("missing '{HEAD_PREFIX}' prefix")))?;
    validate_branch_name(branch).map_err(|_| VcsError::InvalidHead(format!("bad branch name {branch:?}")))?;
    Ok(branch.to_string())
}

pub fn write_head(batch: &mut WriteBatch<'_>, branch: &str) {
    batch.put(HEAD_KEY.to_vec(), format!("{HEAD_PREFIX}{branch}\n").into_bytes());
}

/// Returns `None` for a missing key or an empty value (a branch that exists
/// but has no commits yet); `Some(id)` otherwise.
pub fn read_head_ref_maybe(kv: &Kv, branch: &str) -> Result<Option<u64>> {
    match kv.get(&heads_key(branch)) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => {
            let text = String::from_utf8_lossy(&value);
            let id = text
                .trim()
                .parse::<u64>()
                .map_err(|_| VcsError::InvalidHead(format!("refs/heads/{branch} is not a commit id")))?;
            Ok(Some(id))
        }
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Ensure `refs/heads/<branch>` exists (creating it empty first if needed,
/// preserving "branch exists with no commits" for brand-new branches), then
/// write `<id>\n`.
pub fn write_head_ref(batch: &mut WriteBatch<'_>, branch: &str, id: u64) {
    batch.put(heads_key(branch), format!("{id}\n").into_bytes());
}

/// Create `refs/heads/<branch>` with an empty value (a branch that exists
/// but has no commits).
pub fn create_empty_head_ref(batch: &mut WriteBatch<'_>, branch: &str) {
    batch.put(heads_key(branch), Vec::new());
}

pub fn read_remote_ref(kv: &Kv, branch: &str) -> Result<Option<u64>> {
    match kv.get(&remotes_key(branch)) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => {
            let text = String::from_utf8_lossy(&value);
            let id = text
                .trim()
                .parse::<u64>()
                .map_err(|_| VcsError::InvalidHead(format!("refs/remotes/origin/{branch} is not a commit id")))?;
            Ok(Some(id))
        }
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn write_remote_ref(batch: &mut WriteBatch<'_>, branch: &str, id: u64) {
    batch.put(remotes_key(branch), format!("{id}\n").into_bytes());
}

/// Read `meta/NEXT_COMMIT_ID`, returning the pre-increment value, and write
/// the incremented value back immediately. Not crash-atomic with the
/// eventual commit-object write; commit atomicity is the batch's job.
pub fn next_commit_id(kv: &mut Kv) -> Result<u64> {
    let current = match kv.get(NEXT_COMMIT_ID_KEY) {
        Ok(value) => String::from_utf8_lossy(&value)
            .trim()
            .parse::<u64>()
            .map_err(|_| VcsError::InvalidHead("meta/NEXT_COMMIT_ID is not an integer".into()))?,
        Err(StoreError::NotFound) => 0,
        Err(e) => return Err(e.into()),
    };
    kv.put(NEXT_COMMIT_ID_KEY, format!("{}\n", current + 1).as_bytes())?;
    Ok(current)
}

pub fn init_next_commit_id(batch: &mut WriteBatch<'_>) {
    batch.put(NEXT_COMMIT_ID_KEY.to_vec(), b"0\n".to_vec());
}

/// List local branches: `Scan` filtered by the `refs/heads/` prefix,
/// deduplicated by key (a `Scan` surfaces every historical version).
pub fn list_branches(kv: &Kv) -> Result<Vec<String>> {
    let mut seen = std::collections::HashMap::new();
    kv.scan(|key, value| {
        if let Some(rest) = key.strip_prefix(HEADS_PREFIX.as_bytes()) {
            seen.insert(rest.to_vec(), value.to_vec());
        }
        Ok(())
    })?;
    let mut names: Vec<String> = seen
        .keys()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Kv;
    use tempfile::tempdir;

    #[test]
    fn validate_branch_name_rejects_git_special_characters() {
        assert!(validate_branch_name("feature").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("a..b").is_err());
        assert!(validate_branch_name("a~b").is_err());
        assert!(validate_branch_name("a^b").is_err());
        assert!(validate_branch_name("a:b").is_err());
    }

    #[test]
    fn head_ref_absent_vs_empty_vs_present() {
        let dir = tempdir().unwrap();
        let mut kv = Kv::open(dir.path()).unwrap();

        assert_eq!(read_head_ref_maybe(&kv, "master").unwrap(), None);

        {
            let mut batch = WriteBatch::new(&mut kv);
            create_empty_head_ref(&mut batch, "master");
            batch.commit().unwrap();
        }
        assert_eq!(read_head_ref_maybe(&kv, "master").unwrap(), None);

        {
            let mut batch = WriteBatch::new(&mut kv);
            write_head_ref(&mut batch, "master", 5);
            batch.commit().unwrap();
        }
        assert_eq!(read_head_ref_maybe(&kv, "master").unwrap(), Some(5));
    }

    #[test]
    fn next_commit_id_increments_each_call() {
        let dir = tempdir().unwrap();
        let mut kv = Kv::open(dir.path()).unwrap();
        let mut batch = WriteBatch::new(&mut kv);
        init_next_commit_id(&mut batch);
        batch.commit().unwrap();

        assert_eq!(next_commit_id(&mut kv).unwrap(), 0);
        assert_eq!(next_commit_id(&mut kv).unwrap(), 1);
    }
}
