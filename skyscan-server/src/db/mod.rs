//! Database operations for queries, reports and images
//!
//! Insert functions take a `&mut SqliteConnection` so the report write chain
//! can run them inside one transaction (and per-image savepoints).

pub mod images;
pub mod queries;
pub mod reports;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;
use skyscan_common::{Error, Result};

/// Serialize an optional JSON column
pub(crate) fn json_to_text(value: Option<&Value>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize JSON column: {}", e)))
}

/// Parse an optional JSON column
pub(crate) fn text_to_json(text: Option<String>) -> Result<Option<Value>> {
    text.map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize JSON column: {}", e)))
}

/// Current time at the precision `created_at` columns are stored with
pub(crate) fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a `created_at` column (fixed width, so text order is time order)
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a `created_at` column
pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp {:?}: {}", text, e)))
}
