//! `queries` table operations

use serde_json::Value;
use skyscan_common::db::QueryRecord;
use skyscan_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{format_timestamp, json_to_text, now_timestamp};

/// Insert a query and return the stored record
pub async fn insert_query(
    conn: &mut SqliteConnection,
    query_text: &str,
    structured_query: Option<&Value>,
) -> Result<QueryRecord> {
    let record = QueryRecord {
        id: Uuid::new_v4().to_string(),
        query_text: query_text.to_string(),
        structured_query: structured_query.cloned(),
        created_at: now_timestamp(),
    };

    sqlx::query(
        "INSERT INTO queries (id, query_text, structured_query, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.query_text)
    .bind(json_to_text(structured_query)?)
    .bind(format_timestamp(&record.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(record)
}
