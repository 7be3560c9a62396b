//! Workspace API handlers
//!
//! The workspace is the server-held view of one session: displayed images,
//! the current report and the report request state.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiResult,
    models::DisplayImage,
    services::{GeneratedReport, WorkspaceSnapshot},
    AppState,
};

/// Upper bound on a single uploaded image
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// POST /workspace/query request
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// GET /workspace
pub async fn get_workspace(State(state): State<AppState>) -> Json<WorkspaceSnapshot> {
    Json(state.workspace.snapshot().await)
}

/// POST /workspace/query
pub async fn submit_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<GeneratedReport>> {
    Ok(Json(state.workspace.submit_query(&request.query).await?))
}

/// PUT /workspace/images/:file_name
///
/// Returns 202 with the `pending` image; the durable upload continues in the
/// background and its outcome is published on `/events`.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DisplayImage>)> {
    let image = state
        .workspace
        .upload_image(&file_name, body.to_vec())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(image)))
}

/// POST /workspace/report
pub async fn generate_report(
    State(state): State<AppState>,
) -> ApiResult<Json<GeneratedReport>> {
    Ok(Json(state.workspace.generate_report().await?))
}

pub fn workspace_routes() -> Router<AppState> {
    Router::new()
        .route("/workspace", get(get_workspace))
        .route("/workspace/query", post(submit_query))
        .route(
            "/workspace/images/:file_name",
            put(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/workspace/report", post(generate_report))
}
