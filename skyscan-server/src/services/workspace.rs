//! Workspace: the displayed image collection, the current report, and the
//! report request state of one session
//!
//! Report request lifecycle:
//!
//! ```text
//! Idle ──submit──► Submitting ──► Succeeded(report) | Failed(reason)
//!   ▲                                      │
//!   └────────── new image uploaded ────────┘
//! ```
//!
//! A settled request stays visible until the next upload resets it. A new
//! submission is accepted from any state, including while another one is
//! still `Submitting`.

use serde::Serialize;
use skyscan_common::db::ReportRecord;
use skyscan_common::events::{EventBus, SkyScanEvent};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::blob_store::BlobStore;
use super::report_generator::{self, GeneratedReport, ImageInput, ReportError};
use super::upload_reconciler::{ImageCollection, IntakeError, UploadReconciler};
use crate::models::{DisplayImage, ReportData};

/// Report request state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Submitting,
    Succeeded {
        report_id: String,
        image_count: usize,
    },
    Failed {
        reason: String,
    },
}

/// Workspace-level failures
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("No images available to generate a report")]
    NoImages,

    #[error("Please wait for images to finish uploading")]
    UploadsOutstanding,

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Consistent copy of a workspace
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub images: Vec<DisplayImage>,
    pub current_report: Option<ReportRecord>,
    pub request: RequestState,
}

/// Per-session state shared by the HTTP handlers
#[derive(Clone)]
pub struct Workspace {
    db: SqlitePool,
    event_bus: EventBus,
    images: ImageCollection,
    current_report: Arc<RwLock<Option<ReportRecord>>>,
    request: Arc<RwLock<RequestState>>,
    reconciler: UploadReconciler,
}

impl Workspace {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        blob_store: Arc<dyn BlobStore>,
        upload_timeout: Duration,
    ) -> Self {
        let images: ImageCollection = Arc::new(RwLock::new(Vec::new()));
        let reconciler =
            UploadReconciler::new(images.clone(), blob_store, event_bus.clone(), upload_timeout);

        Self {
            db,
            event_bus,
            images,
            current_report: Arc::new(RwLock::new(None)),
            request: Arc::new(RwLock::new(RequestState::Idle)),
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &UploadReconciler {
        &self.reconciler
    }

    pub async fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            images: self.images.read().await.clone(),
            current_report: self.current_report.read().await.clone(),
            request: self.request.read().await.clone(),
        }
    }

    /// Show an uploaded image immediately and start its durable upload
    pub async fn upload_image(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<DisplayImage, WorkspaceError> {
        let (image, upload) = match self.reconciler.intake(file_name, payload).await {
            Ok(intaken) => intaken,
            Err(e) => {
                self.event_bus
                    .emit_lossy(SkyScanEvent::error(format!("Error preparing image: {}", e)));
                return Err(e.into());
            }
        };

        // A new image invalidates the current report
        *self.current_report.write().await = None;
        *self.request.write().await = RequestState::Idle;

        self.reconciler.spawn(upload);
        Ok(image)
    }

    /// Answer a free-text query and replace the displayed images with the result
    ///
    /// On failure the collection is replaced by a placeholder image carrying
    /// the query-titled mock report, and no current report is set.
    pub async fn submit_query(&self, query_text: &str) -> Result<GeneratedReport, WorkspaceError> {
        let result = self
            .track(report_generator::generate_from_query(&self.db, query_text))
            .await;

        match &result {
            Ok(generated) => {
                let report_data = report_data_of(&generated.report);
                let images = generated
                    .images
                    .iter()
                    .map(|record| DisplayImage::from_record(record, report_data.clone()))
                    .collect();
                *self.images.write().await = images;
                *self.current_report.write().await = Some(generated.report.clone());
            }
            Err(e) => {
                warn!(error = %e, "Query report failed; showing placeholder");
                *self.images.write().await =
                    vec![DisplayImage::placeholder(ReportData::for_query(query_text))];
            }
        }

        result.map_err(WorkspaceError::from)
    }

    /// Generate a report covering every image whose upload has settled
    ///
    /// Report data and database ids are folded back into the displayed images
    /// whose stored reference matches a stored image.
    pub async fn generate_report(&self) -> Result<GeneratedReport, WorkspaceError> {
        let inputs: Vec<ImageInput> = {
            let images = self.images.read().await;
            if images.is_empty() {
                return Err(self.reject(WorkspaceError::NoImages));
            }
            images
                .iter()
                .filter(|img| img.is_upload_settled())
                .map(|img| ImageInput {
                    url: img.stored_reference(),
                    file_name: img.file_name.clone(),
                    file_format: Some(img.file_format()),
                })
                .collect()
        };
        if inputs.is_empty() {
            return Err(self.reject(WorkspaceError::UploadsOutstanding));
        }

        let generated = self
            .track(report_generator::generate_from_images(&self.db, &inputs))
            .await?;

        let report_data = generated.report.report_data.as_ref().and_then(|value| {
            serde_json::from_value::<ReportData>(value.clone()).ok()
        });
        {
            let mut images = self.images.write().await;
            for image in images.iter_mut() {
                let reference = image.stored_reference();
                if let Some(stored) = generated.images.iter().find(|s| s.file_url == reference) {
                    image.db_id = Some(stored.id.clone());
                    if let Some(data) = &report_data {
                        image.report = data.clone();
                    }
                }
            }
        }
        *self.current_report.write().await = Some(generated.report.clone());

        Ok(generated)
    }

    /// Run one report request through the request state machine
    async fn track<F>(&self, request: F) -> Result<GeneratedReport, ReportError>
    where
        F: Future<Output = Result<GeneratedReport, ReportError>>,
    {
        *self.request.write().await = RequestState::Submitting;

        let result = request.await;

        let settled = match &result {
            Ok(generated) => {
                info!(report_id = %generated.report.id, images = generated.images.len(), "Report generated");
                self.event_bus.emit_lossy(SkyScanEvent::ReportGenerated {
                    report_id: generated.report.id.clone(),
                    image_count: generated.images.len(),
                    timestamp: chrono::Utc::now(),
                });
                self.event_bus
                    .emit_lossy(SkyScanEvent::success("Report generated successfully"));
                RequestState::Succeeded {
                    report_id: generated.report.id.clone(),
                    image_count: generated.images.len(),
                }
            }
            Err(e) => {
                self.event_bus
                    .emit_lossy(SkyScanEvent::error(format!("Error generating report: {}", e)));
                RequestState::Failed {
                    reason: e.to_string(),
                }
            }
        };
        *self.request.write().await = settled;

        result
    }

    fn reject(&self, error: WorkspaceError) -> WorkspaceError {
        self.event_bus.emit_lossy(SkyScanEvent::error(error.to_string()));
        error
    }
}

fn report_data_of(report: &ReportRecord) -> ReportData {
    report
        .report_data
        .as_ref()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_else(ReportData::mock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadState;
    use crate::services::blob_store::FsBlobStore;
    use skyscan_common::db::init_memory_database;
    use skyscan_common::events::NotificationKind;

    async fn workspace(dir: &std::path::Path) -> Workspace {
        let db = init_memory_database().await.unwrap();
        let store =
            FsBlobStore::new(dir.join("bucket"), "uploaded-images", "http://localhost:5740");
        Workspace::new(db, EventBus::new(64), Arc::new(store), Duration::from_secs(5))
    }

    async fn wait_until_settled(workspace: &Workspace) {
        for _ in 0..500 {
            if workspace
                .snapshot()
                .await
                .images
                .iter()
                .all(|img| img.is_upload_settled())
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("uploads never settled");
    }

    #[tokio::test]
    async fn test_upload_then_generate_report_folds_back() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;

        let image = workspace
            .upload_image("bay.png", b"PNG".to_vec())
            .await
            .unwrap();
        assert_eq!(image.upload_state, UploadState::Pending);
        wait_until_settled(&workspace).await;

        let generated = workspace.generate_report().await.unwrap();
        assert_eq!(generated.images.len(), 1);

        let snapshot = workspace.snapshot().await;
        let displayed = &snapshot.images[0];
        assert!(matches!(displayed.upload_state, UploadState::Succeeded { .. }));
        assert_eq!(displayed.db_id.as_deref(), Some(generated.images[0].id.as_str()));
        assert_eq!(displayed.report.title, "Analysis of Uploaded Images");
        assert_eq!(snapshot.current_report, Some(generated.report.clone()));
        assert_eq!(
            snapshot.request,
            RequestState::Succeeded {
                report_id: generated.report.id.clone(),
                image_count: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_upload_recorded_without_inline_payload() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the bucket directory should be: every put fails
        let blocked = dir.path().join("bucket");
        std::fs::write(&blocked, b"not a directory").unwrap();
        let db = init_memory_database().await.unwrap();
        let store = FsBlobStore::new(blocked, "uploaded-images", "http://localhost:5740");
        let workspace =
            Workspace::new(db, EventBus::new(64), Arc::new(store), Duration::from_secs(5));

        let image = workspace
            .upload_image("reef.png", vec![1u8; 4096])
            .await
            .unwrap();
        wait_until_settled(&workspace).await;
        let displayed = workspace.snapshot().await.images[0].clone();
        assert!(matches!(displayed.upload_state, UploadState::Failed { .. }));
        assert!(displayed.url.starts_with("data:image/png;base64,"));

        let generated = workspace.generate_report().await.unwrap();

        let stored = &generated.images[0];
        assert_eq!(stored.file_url, format!("local://{}/reef.png", image.id));
        let displayed = workspace.snapshot().await.images[0].clone();
        assert_eq!(displayed.db_id.as_deref(), Some(stored.id.as_str()));
        assert!(displayed.url.starts_with("data:"), "display keeps the local reference");
    }

    #[tokio::test]
    async fn test_generate_report_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;
        let mut rx = workspace.event_bus.subscribe();

        let err = workspace.generate_report().await.unwrap_err();

        assert!(matches!(err, WorkspaceError::NoImages));
        match rx.try_recv().unwrap() {
            SkyScanEvent::Notification { kind, message, .. } => {
                assert_eq!(kind, NotificationKind::Error);
                assert_eq!(message, "No images available to generate a report");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(workspace.snapshot().await.request, RequestState::Idle);
    }

    #[tokio::test]
    async fn test_generate_report_waits_for_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;

        // Intake without spawning keeps the image pending
        workspace
            .reconciler()
            .intake("bay.png", b"PNG".to_vec())
            .await
            .unwrap();

        let err = workspace.generate_report().await.unwrap_err();
        assert!(matches!(err, WorkspaceError::UploadsOutstanding));
    }

    #[tokio::test]
    async fn test_submit_query_replaces_images() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;

        let generated = workspace
            .submit_query("fishing vessels in the Mediterranean")
            .await
            .unwrap();

        let snapshot = workspace.snapshot().await;
        assert_eq!(snapshot.images.len(), 1);
        assert_eq!(
            snapshot.images[0].report.title,
            "Query Results: fishing vessels in the Mediterranean"
        );
        assert_eq!(snapshot.images[0].db_id.as_deref(), Some(generated.images[0].id.as_str()));
        assert_eq!(snapshot.current_report, Some(generated.report));
    }

    #[tokio::test]
    async fn test_failed_query_shows_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;

        let err = workspace.submit_query("  ").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Report(ReportError::InvalidInput(_))));

        let snapshot = workspace.snapshot().await;
        assert_eq!(snapshot.images.len(), 1);
        assert!(snapshot.images[0].db_id.is_none());
        assert!(snapshot.current_report.is_none());
        assert!(matches!(snapshot.request, RequestState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_upload_resets_current_report() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;

        workspace.submit_query("tankers").await.unwrap();
        assert!(workspace.snapshot().await.current_report.is_some());

        workspace
            .upload_image("bay.jpeg", b"JPEG".to_vec())
            .await
            .unwrap();

        let snapshot = workspace.snapshot().await;
        assert!(snapshot.current_report.is_none());
        assert_eq!(snapshot.request, RequestState::Idle);
        assert_eq!(snapshot.images.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_upload_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path()).await;
        let mut rx = workspace.event_bus.subscribe();

        let err = workspace
            .upload_image("notes.txt", b"text".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkspaceError::Intake(IntakeError::UnsupportedFormat(_))));
        assert!(workspace.snapshot().await.images.is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            SkyScanEvent::Notification { kind: NotificationKind::Error, .. }
        ));
    }
}
