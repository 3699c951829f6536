//! The log-structured key-value store: record codec, append-only log plus
//! in-memory index, KV handle, write batch, and the per-repository store
//! binding.

pub mod batch;
pub mod error;
pub mod kv;
pub mod log;
pub mod record;
pub mod repo_store;

pub use batch::WriteBatch;
pub use error::{Result, StoreError};
pub use kv::Kv;
pub use record::Record;
pub use repo_store::RepoStore;
