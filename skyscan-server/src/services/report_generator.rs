//! Report generation write chain
//!
//! store query → store report → store image(s) → link report to each image.
//!
//! The whole chain runs in one transaction. In the multi-image path each
//! image is stored and linked inside its own savepoint: an image that fails is
//! rolled back and skipped, and the request only fails when no image at all
//! could be stored, in which case nothing is committed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skyscan_common::db::{ImageRecord, ReportRecord};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::images::{insert_image, NewImage};
use crate::db::queries::insert_query;
use crate::db::reports::{insert_report, link_report_to_image, load_report_with_images};
use crate::models::report_data::{query_report_text, UPLOADED_IMAGES_REPORT_TEXT};
use crate::models::ReportData;

/// Representative image attached to query reports
pub const PLACEHOLDER_URL: &str = "/placeholder.svg?height=800&width=1200";
pub const PLACEHOLDER_FILE_NAME: &str = "query-result.png";

/// Report generation errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    InvalidInput(String),

    /// A step of the write chain failed; the chain was rolled back
    #[error("Failed to {step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: skyscan_common::Error,
    },

    #[error("Failed to store any image metadata")]
    NoImagesStored,

    /// Transaction begin/commit/rollback failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn step(step: &'static str) -> impl FnOnce(skyscan_common::Error) -> ReportError {
    move |source| ReportError::Step { step, source }
}

/// An image to include in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub url: String,
    pub file_name: String,
    #[serde(default)]
    pub file_format: Option<String>,
}

/// A stored report and the images it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub report: ReportRecord,
    pub images: Vec<ImageRecord>,
}

/// Generate and store a report for a free-text query
pub async fn generate_from_query(
    pool: &SqlitePool,
    query_text: &str,
) -> Result<GeneratedReport, ReportError> {
    let query_text = query_text.trim();
    if query_text.is_empty() {
        return Err(ReportError::InvalidInput("Query must not be empty".to_string()));
    }

    let mut tx = pool.begin().await?;

    let query = insert_query(&mut tx, query_text, None)
        .await
        .map_err(step("store query"))?;

    let report_data = ReportData::for_query(query_text).to_value();
    let report = insert_report(
        &mut tx,
        &query.id,
        &query_report_text(query_text),
        Some(&report_data),
    )
    .await
    .map_err(step("store report"))?;

    let image = insert_image(
        &mut tx,
        NewImage {
            file_url: PLACEHOLDER_URL,
            file_name: PLACEHOLDER_FILE_NAME,
            file_format: Some("png"),
            metadata: Some(json!({
                "location": "Sample Location",
                "date": "2025-03-20",
                "resolution": "1.5m",
            })),
        },
    )
    .await
    .map_err(step("store image metadata"))?;

    link_report_to_image(&mut tx, &report.id, &image.id)
        .await
        .map_err(step("link report to image"))?;

    tx.commit().await?;

    info!(report_id = %report.id, query = %query_text, "Generated report from query");
    Ok(GeneratedReport {
        report,
        images: vec![image],
    })
}

/// Generate and store a report covering a set of images
pub async fn generate_from_images(
    pool: &SqlitePool,
    images: &[ImageInput],
) -> Result<GeneratedReport, ReportError> {
    if images.is_empty() {
        return Err(ReportError::InvalidInput(
            "At least one image is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let query_text = format!(
        "Analysis of {} uploaded image{}",
        images.len(),
        if images.len() > 1 { "s" } else { "" }
    );
    let query = insert_query(&mut tx, &query_text, None)
        .await
        .map_err(step("store query"))?;

    let report_data =
        ReportData::for_uploaded_images(images.len(), Utc::now().date_naive()).to_value();
    let report = insert_report(
        &mut tx,
        &query.id,
        UPLOADED_IMAGES_REPORT_TEXT,
        Some(&report_data),
    )
    .await
    .map_err(step("store report"))?;

    let upload_date = Utc::now().to_rfc3339();
    let mut stored_images = Vec::with_capacity(images.len());

    for image in images {
        let mut savepoint = Connection::begin(&mut *tx).await?;

        match store_and_link(&mut savepoint, &report.id, image, &upload_date).await {
            Ok(stored) => {
                savepoint.commit().await?;
                stored_images.push(stored);
            }
            Err(e) => {
                warn!(file_name = %image.file_name, error = %e, "Skipping image in report");
                savepoint.rollback().await?;
            }
        }
    }

    if stored_images.is_empty() {
        tx.rollback().await?;
        return Err(ReportError::NoImagesStored);
    }

    tx.commit().await?;

    info!(
        report_id = %report.id,
        requested = images.len(),
        stored = stored_images.len(),
        "Generated report from images"
    );
    Ok(GeneratedReport {
        report,
        images: stored_images,
    })
}

async fn store_and_link(
    conn: &mut SqliteConnection,
    report_id: &str,
    image: &ImageInput,
    upload_date: &str,
) -> Result<ImageRecord, ReportError> {
    let stored = insert_image(
        conn,
        NewImage {
            file_url: &image.url,
            file_name: &image.file_name,
            file_format: image.file_format.as_deref(),
            metadata: Some(json!({
                "uploadDate": upload_date,
                "source": "user-upload",
            })),
        },
    )
    .await
    .map_err(step("store image metadata"))?;

    link_report_to_image(conn, report_id, &stored.id)
        .await
        .map_err(step("link report to image"))?;

    Ok(stored)
}

/// Load a stored report with its images
pub async fn load_report(
    pool: &SqlitePool,
    report_id: &str,
) -> Result<Option<GeneratedReport>, ReportError> {
    let mut conn = pool.acquire().await?;
    let loaded = load_report_with_images(&mut conn, report_id)
        .await
        .map_err(step("load report"))?;

    Ok(loaded.map(|(report, images)| GeneratedReport { report, images }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscan_common::db::init_memory_database;

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn input(url: &str, name: &str) -> ImageInput {
        ImageInput {
            url: url.to_string(),
            file_name: name.to_string(),
            file_format: Some("png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_generate_from_query_stores_full_chain() {
        let pool = init_memory_database().await.unwrap();

        let generated = generate_from_query(&pool, "cargo ships near Singapore")
            .await
            .unwrap();

        let data = generated.report.report_data.as_ref().unwrap();
        assert_eq!(data["title"], "Query Results: cargo ships near Singapore");
        assert_eq!(data["vesselTypes"].as_array().unwrap().len(), 3);
        assert_eq!(generated.images.len(), 1);
        assert_eq!(generated.images[0].file_url, PLACEHOLDER_URL);

        assert_eq!(count(&pool, "queries").await, 1);
        assert_eq!(count(&pool, "reports").await, 1);
        assert_eq!(count(&pool, "images").await, 1);
        assert_eq!(count(&pool, "report_images").await, 1);

        let loaded = load_report(&pool, &generated.report.id).await.unwrap().unwrap();
        assert_eq!(loaded, generated);
    }

    #[tokio::test]
    async fn test_generate_from_query_rejects_blank_query() {
        let pool = init_memory_database().await.unwrap();

        let err = generate_from_query(&pool, "   ").await.unwrap_err();

        assert!(matches!(err, ReportError::InvalidInput(_)));
        assert_eq!(count(&pool, "queries").await, 0);
    }

    #[tokio::test]
    async fn test_partial_image_failure_is_skipped() {
        let pool = init_memory_database().await.unwrap();
        let images = vec![
            input("https://bucket.example/a.png", "a.png"),
            // No URL: rejected by the images table
            input("", "broken.png"),
            input("https://bucket.example/c.png", "c.png"),
        ];

        let generated = generate_from_images(&pool, &images).await.unwrap();

        let names: Vec<_> = generated.images.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        let data = generated.report.report_data.as_ref().unwrap();
        assert_eq!(data["additionalInfo"]["Image Count"], 3);

        // The failed image left no orphan row behind
        assert_eq!(count(&pool, "images").await, 2);
        assert_eq!(count(&pool, "report_images").await, 2);

        let loaded = load_report(&pool, &generated.report.id).await.unwrap().unwrap();
        assert_eq!(loaded.images.len(), 2);
    }

    #[tokio::test]
    async fn test_all_images_failing_rolls_back_everything() {
        let pool = init_memory_database().await.unwrap();
        let images = vec![input("", "a.png"), input("", "b.png")];

        let err = generate_from_images(&pool, &images).await.unwrap_err();

        assert!(matches!(err, ReportError::NoImagesStored));
        assert_eq!(err.to_string(), "Failed to store any image metadata");
        for table in ["queries", "reports", "images", "report_images"] {
            assert_eq!(count(&pool, table).await, 0, "orphan rows in {}", table);
        }
    }

    #[tokio::test]
    async fn test_query_text_pluralization() {
        let pool = init_memory_database().await.unwrap();

        generate_from_images(&pool, &[input("https://bucket.example/a.png", "a.png")])
            .await
            .unwrap();
        generate_from_images(
            &pool,
            &[
                input("https://bucket.example/b.png", "b.png"),
                input("https://bucket.example/c.png", "c.png"),
            ],
        )
        .await
        .unwrap();

        let texts: Vec<String> =
            sqlx::query_scalar("SELECT query_text FROM queries ORDER BY rowid")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            texts,
            vec!["Analysis of 1 uploaded image", "Analysis of 2 uploaded images"]
        );
    }

    #[tokio::test]
    async fn test_empty_image_list_rejected() {
        let pool = init_memory_database().await.unwrap();
        assert!(matches!(
            generate_from_images(&pool, &[]).await,
            Err(ReportError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_load_unknown_report() {
        let pool = init_memory_database().await.unwrap();
        assert!(load_report(&pool, "missing").await.unwrap().is_none());
    }
}
