//! Multi-tenant repository server core: a log-structured key-value store
//! (`store`) and the version-control state machine layered on top of it
//! (`vcs`). CLI argument parsing (`cli`) and the HTTP API (`server`) are
//! thin consumers of `vcs::ops`.

pub mod cli;
pub mod options;
pub mod server;
pub mod store;
pub mod vcs;

pub use options::Config;
