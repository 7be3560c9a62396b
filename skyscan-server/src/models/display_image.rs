//! Images shown in a workspace and their upload lifecycle

use serde::{Deserialize, Serialize};
use skyscan_common::db::ImageRecord;
use uuid::Uuid;

use super::{mock_vessels, ReportData, Vessel};

/// Durable-upload lifecycle of a displayed image
///
/// Transitions are strictly `Pending → InFlight → {Succeeded | Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    /// Shown from its local reference, durable upload not started
    Pending,
    /// Durable upload claimed and running
    InFlight,
    /// Stored; `url` now holds the durable reference
    Succeeded { durable_url: String },
    /// Durable upload failed; the local reference is kept
    Failed { reason: String },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded { .. } | UploadState::Failed { .. })
    }

    /// Short label used in events and logs
    pub fn label(&self) -> &'static str {
        match self {
            UploadState::Pending => "pending",
            UploadState::InFlight => "in_flight",
            UploadState::Succeeded { .. } => "succeeded",
            UploadState::Failed { .. } => "failed",
        }
    }
}

/// An image in a workspace's displayed collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayImage {
    pub id: Uuid,
    pub file_name: String,
    /// Renderable reference: local until a durable upload succeeds
    pub url: String,
    #[serde(flatten)]
    pub upload_state: UploadState,
    pub vessels: Vec<Vessel>,
    pub report: ReportData,
    /// `images.id` once the image is part of a stored report
    pub db_id: Option<String>,
}

impl DisplayImage {
    /// Freshly uploaded image, shown from its local reference
    pub fn pending(id: Uuid, file_name: &str, local_url: String) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            url: local_url,
            upload_state: UploadState::Pending,
            vessels: mock_vessels(),
            report: ReportData::for_uploaded_file(file_name),
            db_id: None,
        }
    }

    /// Image already stored in the database
    pub fn from_record(record: &ImageRecord, report: ReportData) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: record.file_name.clone(),
            url: record.file_url.clone(),
            upload_state: UploadState::Succeeded {
                durable_url: record.file_url.clone(),
            },
            vessels: mock_vessels(),
            report,
            db_id: Some(record.id.clone()),
        }
    }

    /// Fallback shown when a query could not be answered from the database
    pub fn placeholder(report: ReportData) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: crate::services::report_generator::PLACEHOLDER_FILE_NAME.to_string(),
            url: crate::services::report_generator::PLACEHOLDER_URL.to_string(),
            upload_state: UploadState::Succeeded {
                durable_url: crate::services::report_generator::PLACEHOLDER_URL.to_string(),
            },
            vessels: mock_vessels(),
            report,
            db_id: None,
        }
    }

    /// Reference recorded in `images.file_url`
    ///
    /// A failed upload is only renderable from its inline `data:` URL, which
    /// can be tens of megabytes. The database records a short `local://`
    /// reference naming the image instead.
    pub fn stored_reference(&self) -> String {
        match &self.upload_state {
            UploadState::Failed { .. } => format!("local://{}/{}", self.id, self.file_name),
            _ => self.url.clone(),
        }
    }

    /// Whether the durable upload has settled (successfully or not)
    pub fn is_upload_settled(&self) -> bool {
        self.upload_state.is_terminal()
    }

    /// File extension used as `images.file_format`
    pub fn file_format(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_state_serialization_is_flattened() {
        let mut image = DisplayImage::pending(Uuid::new_v4(), "port.png", "data:x".to_string());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["url"], "data:x");

        image.upload_state = UploadState::Failed {
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "timeout");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UploadState::Pending.is_terminal());
        assert!(!UploadState::InFlight.is_terminal());
        assert!(UploadState::Failed { reason: "x".into() }.is_terminal());
        assert!(UploadState::Succeeded { durable_url: "u".into() }.is_terminal());
    }

    #[test]
    fn test_failed_upload_stored_by_name() {
        let mut image = DisplayImage::pending(Uuid::new_v4(), "port.png", "data:x".to_string());
        image.upload_state = UploadState::Failed {
            reason: "timeout".to_string(),
        };
        assert_eq!(image.stored_reference(), format!("local://{}/port.png", image.id));

        image.url = "https://bucket.example/a.png".to_string();
        image.upload_state = UploadState::Succeeded {
            durable_url: image.url.clone(),
        };
        assert_eq!(image.stored_reference(), "https://bucket.example/a.png");
    }

    #[test]
    fn test_file_format_from_extension() {
        let image = |name: &str| DisplayImage::pending(Uuid::new_v4(), name, String::new());
        assert_eq!(image("scene.TIFF").file_format(), "tiff");
        assert_eq!(image("scene").file_format(), "unknown");
        assert_eq!(image("scene.").file_format(), "unknown");
    }
}
