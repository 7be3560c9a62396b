//! `images` table operations

use serde_json::Value;
use skyscan_common::db::ImageRecord;
use skyscan_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{format_timestamp, json_to_text, now_timestamp, parse_timestamp, text_to_json};

/// Fields supplied when storing an image
#[derive(Debug, Clone)]
pub struct NewImage<'a> {
    pub file_url: &'a str,
    pub file_name: &'a str,
    pub file_format: Option<&'a str>,
    pub metadata: Option<Value>,
}

/// Insert an image and return the stored record
pub async fn insert_image(conn: &mut SqliteConnection, image: NewImage<'_>) -> Result<ImageRecord> {
    let record = ImageRecord {
        id: Uuid::new_v4().to_string(),
        file_name: image.file_name.to_string(),
        file_url: image.file_url.to_string(),
        file_format: image.file_format.map(str::to_string),
        metadata: image.metadata,
        created_at: now_timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO images (id, file_name, file_url, file_format, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.file_name)
    .bind(&record.file_url)
    .bind(&record.file_format)
    .bind(json_to_text(record.metadata.as_ref())?)
    .bind(format_timestamp(&record.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

/// Load images whose id is in `ids` (`images where id in (...)`)
///
/// Unknown ids are ignored; rows come back in insertion order.
pub async fn load_images_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<Vec<ImageRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, file_name, file_url, file_format, metadata, created_at FROM images WHERE id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY rowid");

    let rows = builder.build().fetch_all(&mut *conn).await?;
    rows.iter().map(image_from_row).collect()
}

fn image_from_row(row: &SqliteRow) -> Result<ImageRecord> {
    let created_at: String = row.get("created_at");
    Ok(ImageRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_url: row.get("file_url"),
        file_format: row.get("file_format"),
        metadata: text_to_json(row.get("metadata"))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscan_common::db::init_memory_database;

    #[tokio::test]
    async fn test_load_images_by_ids_filters() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut ids = Vec::new();
        for name in ["a.png", "b.png", "c.png"] {
            let url = format!("https://bucket.example/{}", name);
            let record = insert_image(
                &mut conn,
                NewImage {
                    file_url: &url,
                    file_name: name,
                    file_format: Some("png"),
                    metadata: Some(serde_json::json!({"source": "user-upload"})),
                },
            )
            .await
            .unwrap();
            ids.push(record.id);
        }

        let wanted = vec![ids[0].clone(), ids[2].clone(), "missing".to_string()];
        let loaded = load_images_by_ids(&mut conn, &wanted).await.unwrap();

        let names: Vec<_> = loaded.iter().map(|img| img.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!(loaded[0].metadata.as_ref().unwrap()["source"], "user-upload");
        assert!(load_images_by_ids(&mut conn, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_image_without_url_fails() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let result = insert_image(
            &mut conn,
            NewImage {
                file_url: "",
                file_name: "a.png",
                file_format: None,
                metadata: None,
            },
        )
        .await;

        assert!(result.is_err());
    }
}
