//! Per-repository KV handle rooted under the repo directory.
//!
//! Binds `(repo_base, repo_id) -> Kv` rooted at
//! `<repo_base>/<repo_id>/.gitclone/db`. Rejects ids containing `..`, `/`, or
//! `\`. Requires `<repo_base>/<repo_id>/.gitclone` to already exist, except
//! for the one caller allowed to create it: `init` (see `vcs::ops::init`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::store::batch::{self, WriteBatch};
use crate::store::error::{Result, StoreError};
use crate::store::kv::Kv;

pub const GITCLONE_DIR: &str = ".gitclone";
const DB_DIR: &str = "db";
const OBJECTS_DIR: &str = "objects";
const CONFIG_FILE: &str = "config";

/// Bare repos omit the `.gitclone/` wrapper and place `config`/`objects`/`db`
/// directly at `<repo>/`.
fn wrapper_root(repo_path: &Path, bare: bool) -> PathBuf {
    if bare {
        repo_path.to_path_buf()
    } else {
        repo_path.join(GITCLONE_DIR)
    }
}

pub struct RepoStore {
    repo_path: PathBuf,
    kv: Kv,
}

impl RepoStore {
    pub fn validate_repo_id(repo_id: &str) -> Result<()> {
        if repo_id.is_empty()
            || repo_id.contains("..")
            || repo_id.contains('/')
            || repo_id.contains('\\')
        {
            return Err(StoreError::InvalidRepoId(repo_id.to_string()));
        }
        Ok(())
    }

    /// Open the KV rooted at `<repo_base>/<repo_id>/.gitclone/db` (or, for a
    /// bare repo, `<repo_base>/<repo_id>/db`). The wrapper directory must
    /// already exist (created by `init`).
    pub fn open(repo_base: &Path, repo_id: &str) -> Result<Self> {
        Self::validate_repo_id(repo_id)?;
        let repo_path = repo_base.join(repo_id);

        let wrapper = if repo_path.join(GITCLONE_DIR).is_dir() {
            repo_path.join(GITCLONE_DIR)
        } else if repo_path.join(CONFIG_FILE).is_file() {
            repo_path.clone()
        } else {
            return Err(StoreError::RepoNotInitialised(
                repo_path.display().to_string(),
            ));
        };

        let db_dir = wrapper.join(DB_DIR);
        fs::create_dir_all(&db_dir)?;

        let mut kv = Kv::open(&db_dir)?;
        batch::recover(&mut kv)?;

        Ok(RepoStore { repo_path, kv })
    }

    /// Create the repo's on-disk wrapper (`.gitclone/` for a working-tree
    /// repo, or the repo root itself for a bare one) and open its KV. Used
    /// only by `init`, which is the sole operation allowed to create it.
    pub fn create(repo_base: &Path, repo_id: &str, bare: bool) -> Result<Self> {
        Self::validate_repo_id(repo_id)?;
        let repo_path = repo_base.join(repo_id);
        let wrapper = wrapper_root(&repo_path, bare);

        fs::create_dir_all(wrapper.join(OBJECTS_DIR))?;
        fs::create_dir_all(wrapper.join(DB_DIR))?;
        fs::write(
            wrapper.join(CONFIG_FILE),
            format!("[core]\n\tbare = {bare}\n"),
        )?;

        let kv = Kv::open(&wrapper.join(DB_DIR))?;
        Ok(RepoStore { repo_path, kv })
    }

    /// `true` once `<repo_base>/<repo_id>` already has a `.gitclone/`
    /// wrapper or a bare `config` file.
    pub fn is_initialised(repo_base: &Path, repo_id: &str) -> bool {
        let repo_path = repo_base.join(repo_id);
        repo_path.join(GITCLONE_DIR).is_dir() || repo_path.join(CONFIG_FILE).is_file()
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn kv(&self) -> &Kv {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut Kv {
        &mut self.kv
    }

    pub fn new_write_batch(&mut self) -> WriteBatch<'_> {
        WriteBatch::new(&mut self.kv)
    }

    pub fn close(self) -> Result<()> {
        self.kv.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_traversal_repo_ids() {
        assert!(RepoStore::validate_repo_id("../evil").is_err());
        assert!(RepoStore::validate_repo_id("a/b").is_err());
        assert!(RepoStore::validate_repo_id("a\\b").is_err());
        assert!(RepoStore::validate_repo_id("").is_err());
        assert!(RepoStore::validate_repo_id("fine-name").is_ok());
    }

    #[test]
    fn open_requires_gitclone_dir_to_preexist() {
        let base = tempdir().unwrap();
        let result = RepoStore::open(base.path(), "repo");
        assert!(matches!(result, Err(StoreError::RepoNotInitialised(_))));
    }

    #[test]
    fn create_then_open_round_trips() {
        let base = tempdir().unwrap();
        {
            let mut store = RepoStore::create(base.path(), "repo", false).unwrap();
            store.kv_mut().put(b"k", b"v").unwrap();
        }
        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(store.kv().get(b"k").unwrap(), b"v");
    }

    #[test]
    fn bare_repo_places_contents_at_repo_root() {
        let base = tempdir().unwrap();
        RepoStore::create(base.path(), "repo", true).unwrap();
        assert!(base.path().join("repo").join("config").is_file());
        assert!(!base.path().join("repo").join(GITCLONE_DIR).exists());
        assert!(RepoStore::is_initialised(base.path(), "repo"));
    }
}
