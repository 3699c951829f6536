//! HTTP API over the version-control core, backed by the in-memory repo
//! registry in `state`.

mod routes;
mod state;

use std::path::PathBuf;

pub use routes::build_router;
pub use state::{AppState, RepoListItem};

/// Bind and serve the HTTP API on `port`, rooting repositories at
/// `repo_base`. Runs until the process is killed or the listener fails.
pub async fn serve(repo_base: PathBuf, port: u16) -> std::io::Result<()> {
    let state = AppState::new(repo_base);
    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    log::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
