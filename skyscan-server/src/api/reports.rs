//! Report API handlers
//!
//! POST /generate-report, GET /reports/:id

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    services::{report_generator, GeneratedReport, ImageInput},
    AppState,
};

/// POST /generate-report request
///
/// Exactly one of the fields is expected. A non-blank `query` takes
/// precedence when both are sent.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ImageInput>>,
}

/// POST /generate-report
pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> ApiResult<Json<GeneratedReport>> {
    let query = request.query.filter(|q| !q.trim().is_empty());

    let generated = match (query, request.images) {
        (Some(query), _) => {
            debug!(query = %query, "Generating report from query");
            report_generator::generate_from_query(&state.db, &query).await?
        }
        (None, Some(images)) => {
            debug!(images = images.len(), "Generating report from images");
            report_generator::generate_from_images(&state.db, &images).await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Invalid request. Must provide either query or images.".to_string(),
            ))
        }
    };

    Ok(Json(generated))
}

/// GET /reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> ApiResult<Json<GeneratedReport>> {
    report_generator::load_report(&state.db, &report_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report_id)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/generate-report", post(generate_report))
        .route("/reports/:id", get(get_report))
}
