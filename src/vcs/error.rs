use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, VcsError>;

/// Errors surfaced by the ref/HEAD layer, staging, commit objects and the
/// version-control operations built on top of the store.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("meta/HEAD is malformed: {0}")]
    InvalidHead(String),

    #[error("branch name {0:?} is invalid")]
    InvalidName(String),

    #[error("nothing staged")]
    NothingStaged,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("nothing to merge: branch {0:?} has no commits")]
    NothingToMerge(String),

    #[error("cannot merge a branch into itself")]
    SelfMerge,

    #[error("non-fast-forward merge rejected")]
    Conflict,

    #[error("nothing to push")]
    NothingToPush,

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("repository already initialised at {0}")]
    AlreadyInitialised(String),
}
