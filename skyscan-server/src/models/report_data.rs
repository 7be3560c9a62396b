//! Templated report findings
//!
//! There is no detection pipeline behind these: every report describes the
//! same three vessels, only titles and summaries vary with the request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Vessel count reported by every template
pub const MOCK_VESSEL_COUNT: u32 = 3;

/// Narrative text stored with reports generated from uploaded images
pub const UPLOADED_IMAGES_REPORT_TEXT: &str = "Analysis of uploaded images\n\n\
This analysis identified 3 vessels in the uploaded images. \
The vessels include cargo ships, tankers, and fishing vessels.";

/// Number of vessels of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselTypeCount {
    #[serde(rename = "type")]
    pub vessel_type: String,
    pub count: u32,
}

/// Structured report findings (`reports.report_data`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub title: String,
    pub summary: String,
    pub vessel_count: u32,
    pub vessel_types: Vec<VesselTypeCount>,
    pub additional_info: Map<String, Value>,
}

impl ReportData {
    /// Report shown before any request has produced one
    pub fn mock() -> Self {
        Self {
            title: "Vessel Analysis Report".to_string(),
            summary: "This analysis identified 3 vessels in the provided satellite image. \
                      The vessels include cargo ships, tankers, and fishing vessels operating \
                      in the monitored area."
                .to_string(),
            vessel_count: MOCK_VESSEL_COUNT,
            vessel_types: mock_vessel_types(),
            additional_info: survey_info(),
        }
    }

    /// Findings for a free-text query
    pub fn for_query(query_text: &str) -> Self {
        Self {
            title: format!("Query Results: {}", query_text),
            summary: format!("Analysis based on your query: \"{}\"", query_text),
            ..Self::mock()
        }
    }

    /// Findings for a batch of uploaded images
    pub fn for_uploaded_images(image_count: usize, analysis_date: NaiveDate) -> Self {
        let mut additional_info = Map::new();
        additional_info.insert("Image Count".to_string(), json!(image_count));
        additional_info.insert(
            "Analysis Date".to_string(),
            json!(analysis_date.format("%Y-%m-%d").to_string()),
        );
        additional_info.insert("Analysis Confidence".to_string(), json!("90%"));

        Self {
            title: "Analysis of Uploaded Images".to_string(),
            summary: "This analysis identified vessels in the uploaded images.".to_string(),
            vessel_count: MOCK_VESSEL_COUNT,
            vessel_types: mock_vessel_types(),
            additional_info,
        }
    }

    /// Per-image findings shown while an upload is still local
    pub fn for_uploaded_file(file_name: &str) -> Self {
        Self {
            title: format!("Analysis of {}", file_name),
            summary: format!(
                "This analysis identified vessels in the uploaded image \"{}\".",
                file_name
            ),
            ..Self::mock()
        }
    }

    /// JSON form stored in `reports.report_data`
    pub fn to_value(&self) -> Value {
        // Plain strings, integers and maps cannot fail to serialize
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Narrative text stored with a query report
pub fn query_report_text(query_text: &str) -> String {
    format!(
        "Analysis based on query: \"{}\"\n\n\
         This analysis identified 3 vessels in the retrieved satellite images. \
         The vessels include cargo ships, tankers, and fishing vessels operating in the monitored area.",
        query_text
    )
}

fn mock_vessel_types() -> Vec<VesselTypeCount> {
    ["Cargo Ship", "Tanker", "Fishing Vessel"]
        .iter()
        .map(|t| VesselTypeCount {
            vessel_type: t.to_string(),
            count: 1,
        })
        .collect()
}

fn survey_info() -> Map<String, Value> {
    [
        ("Image Date", "2025-03-20"),
        ("Image Resolution", "1.5m"),
        ("Coverage Area", "25 sq km"),
        ("Weather Conditions", "Clear"),
        ("Analysis Confidence", "92%"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), json!(v)))
    .collect()
}
