use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the record codec, log, KV handle, batch and repo-store
/// layers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key is empty")]
    KeyIsEmpty,

    #[error("key not found")]
    NotFound,

    #[error("record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("log is corrupt: {0}")]
    CorruptLog(String),

    #[error("repo id {0:?} is invalid")]
    InvalidRepoId(String),

    #[error("repo directory {0:?} is not initialised (missing .gitclone)")]
    RepoNotInitialised(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
