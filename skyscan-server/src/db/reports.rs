//! `reports` and `report_images` table operations

use serde_json::Value;
use skyscan_common::db::{ImageRecord, ReportImageRecord, ReportRecord};
use skyscan_common::Result;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::images::load_images_by_ids;
use super::{format_timestamp, json_to_text, now_timestamp, parse_timestamp, text_to_json};

/// Insert a report and return the stored record
pub async fn insert_report(
    conn: &mut SqliteConnection,
    query_id: &str,
    text_report: &str,
    report_data: Option<&Value>,
) -> Result<ReportRecord> {
    let record = ReportRecord {
        id: Uuid::new_v4().to_string(),
        query_id: query_id.to_string(),
        text_report: text_report.to_string(),
        report_data: report_data.cloned(),
        created_at: now_timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO reports (id, query_id, text_report, report_data, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.query_id)
    .bind(&record.text_report)
    .bind(json_to_text(report_data)?)
    .bind(format_timestamp(&record.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

/// Link a report to an image
pub async fn link_report_to_image(
    conn: &mut SqliteConnection,
    report_id: &str,
    image_id: &str,
) -> Result<ReportImageRecord> {
    let record = ReportImageRecord {
        id: Uuid::new_v4().to_string(),
        report_id: report_id.to_string(),
        image_id: image_id.to_string(),
        created_at: now_timestamp(),
    };

    sqlx::query(
        "INSERT INTO report_images (id, report_id, image_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.report_id)
    .bind(&record.image_id)
    .bind(format_timestamp(&record.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

/// Load one report
pub async fn load_report(
    conn: &mut SqliteConnection,
    report_id: &str,
) -> Result<Option<ReportRecord>> {
    let row = sqlx::query(
        "SELECT id, query_id, text_report, report_data, created_at FROM reports WHERE id = ?",
    )
    .bind(report_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let created_at: String = row.get("created_at");
            Ok(Some(ReportRecord {
                id: row.get("id"),
                query_id: row.get("query_id"),
                text_report: row.get("text_report"),
                report_data: text_to_json(row.get("report_data"))?,
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Load a report together with every image linked to it
pub async fn load_report_with_images(
    conn: &mut SqliteConnection,
    report_id: &str,
) -> Result<Option<(ReportRecord, Vec<ImageRecord>)>> {
    let Some(report) = load_report(conn, report_id).await? else {
        return Ok(None);
    };

    let image_ids: Vec<String> =
        sqlx::query_scalar("SELECT image_id FROM report_images WHERE report_id = ?")
            .bind(report_id)
            .fetch_all(&mut *conn)
            .await?;

    let images = load_images_by_ids(conn, &image_ids).await?;
    Ok(Some((report, images)))
}
