//! Database record types
//!
//! Field names match the table columns; they are also the JSON field names
//! returned over HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row of the `queries` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub query_text: String,
    pub structured_query: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Row of the `reports` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub query_id: String,
    pub text_report: String,
    pub report_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Row of the `images` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub file_name: String,
    pub file_url: String,
    pub file_format: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Row of the `report_images` link table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportImageRecord {
    pub id: String,
    pub report_id: String,
    pub image_id: String,
    pub created_at: DateTime<Utc>,
}
