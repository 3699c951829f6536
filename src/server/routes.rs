//! HTTP surface: one handler per repository endpoint, each opening a fresh
//! `RepoStore` through `vcs::ops` and closing it before responding, per the
//! short-handle-lifetime rule that keeps cross-request visibility correct.

use axum::extract::{Path as AxPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::vcs::error::VcsError;
use crate::vcs::ops::{self, MergeOutcome, MergeStrategy};
use crate::vcs::Commit;

use super::state::{AppState, RepoListItem};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/repos", get(list_repos).post(create_repo))
        .route("/api/repos/:id", get(get_repo))
        .route("/api/repos/:id/branches", get(list_branches))
        .route("/api/repos/:id/commits", get(list_commits))
        .route("/api/repos/:id/checkout", post(checkout))
        .route("/api/repos/:id/add", post(add))
        .route("/api/repos/:id/commit", post(commit))
        .route("/api/repos/:id/push", post(push))
        .route("/api/repos/:id/merge", post(merge))
        .with_state(state)
}

struct ApiError(VcsError);

impl From<VcsError> for ApiError {
    fn from(err: VcsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        warn!("request failed: {}", self.0);
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

fn status_for(err: &VcsError) -> StatusCode {
    match err {
        VcsError::NotFound(_) | VcsError::FileNotFound(_) => StatusCode::NOT_FOUND,
        VcsError::InvalidName(_)
        | VcsError::InvalidHead(_)
        | VcsError::NothingStaged
        | VcsError::NothingToMerge(_)
        | VcsError::NothingToPush
        | VcsError::SelfMerge => StatusCode::BAD_REQUEST,
        VcsError::Conflict => StatusCode::CONFLICT,
        VcsError::AlreadyInitialised(_) => StatusCode::CONFLICT,
        VcsError::CommitFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VcsError::Store(store_err) => status_for_store(store_err),
    }
}

fn status_for_store(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound | StoreError::RepoNotInitialised(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidRepoId(_) | StoreError::KeyIsEmpty => StatusCode::BAD_REQUEST,
        StoreError::CorruptRecord(_) | StoreError::CorruptLog(_) | StoreError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Serialize)]
struct Repository {
    id: String,
    name: String,
    description: String,
    current_branch: String,
}

#[derive(Debug, Serialize)]
struct Branch {
    name: String,
    tip: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CreateRepoBody {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct BranchBody {
    branch: String,
}

#[derive(Debug, Deserialize)]
struct AddBody {
    #[serde(default = "default_add_path")]
    path: String,
}

fn default_add_path() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PushBody {
    branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitsQuery {
    branch: Option<String>,
    limit: Option<usize>,
}

const DEFAULT_COMMITS_LIMIT: usize = 50;

async fn list_repos(State(state): State<AppState>) -> Json<Vec<RepoListItem>> {
    Json(state.list())
}

async fn create_repo(
    State(state): State<AppState>,
    Json(body): Json<CreateRepoBody>,
) -> Result<(StatusCode, Json<RepoListItem>), ApiError> {
    info!("POST /api/repos name={}", body.name);
    ops::init(&state.repo_base, &body.name, false)?;

    let item = RepoListItem {
        id: body.name.clone(),
        name: body.name.clone(),
        description: body.description,
    };
    if !state.register(item.clone()) {
        return Err(ApiError(VcsError::AlreadyInitialised(body.name)));
    }

    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_repo(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
) -> Result<Json<Repository>, ApiError> {
    let entry = state
        .get(&id)
        .ok_or_else(|| VcsError::NotFound(id.clone()))?;
    let current_branch = ops::current_branch(&state.repo_base, &id)?;
    Ok(Json(Repository {
        id: entry.id,
        name: entry.name,
        description: entry.description,
        current_branch,
    }))
}

async fn list_branches(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
) -> Result<Json<Vec<Branch>>, ApiError> {
    let branches = ops::branches_with_tips(&state.repo_base, &id)?
        .into_iter()
        .map(|(name, tip)| Branch { name, tip })
        .collect();
    Ok(Json(branches))
}

async fn list_commits(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<Vec<Commit>>, ApiError> {
    let branch = match query.branch {
        Some(branch) => branch,
        None => ops::current_branch(&state.repo_base, &id)?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_COMMITS_LIMIT);
    let commits = ops::log(&state.repo_base, &id, &branch, limit)?;
    Ok(Json(commits))
}

async fn checkout(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Json(body): Json<BranchBody>,
) -> Result<StatusCode, ApiError> {
    ops::checkout(&state.repo_base, &id, &body.branch)?;
    Ok(StatusCode::OK)
}

async fn add(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Json(body): Json<AddBody>,
) -> Result<StatusCode, ApiError> {
    ops::add(&state.repo_base, &id, &body.path)?;
    Ok(StatusCode::OK)
}

async fn commit(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Json(body): Json<CommitBody>,
) -> Result<(StatusCode, Json<Commit>), ApiError> {
    let commit = ops::commit(&state.repo_base, &id, &body.message)?;
    Ok((StatusCode::CREATED, Json(commit)))
}

async fn push(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Json(body): Json<PushBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pushed = ops::push(&state.repo_base, &id, body.branch.as_deref())?;
    Ok(Json(serde_json::json!({ "pushed": pushed })))
}

async fn merge(
    State(state): State<AppState>,
    AxPath(id): AxPath<String>,
    Json(body): Json<BranchBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = ops::merge(
        &state.repo_base,
        &id,
        &body.branch,
        MergeStrategy::FastForwardOnly,
    )?;
    let body = match outcome {
        MergeOutcome::FastForward { new_tip } => {
            serde_json::json!({ "kind": "fast-forward", "new_tip": new_tip })
        }
        MergeOutcome::Merged(commit) => serde_json::json!({ "kind": "merged", "commit": commit }),
    };
    Ok(Json(body))
}
