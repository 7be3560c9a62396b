//! Background upload reconciliation
//!
//! An uploaded image is shown immediately from a local reference while its
//! durable upload runs in a one-shot background task. The outcome is folded
//! back into the displayed collection:
//!
//! ```text
//! intake ──► Pending ──claim──► InFlight ──put ok──────► Succeeded(url)
//!                                        └─put err/timeout─► Failed(reason)
//! ```
//!
//! Intake hands the payload to the task as an owned [`PendingUpload`]; there
//! is no shared payload registry. The `Pending → InFlight` claim happens under
//! the collection write lock before the store call, so at most one durable
//! store call is ever issued per image id.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use skyscan_common::events::{EventBus, SkyScanEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::blob_store::{generated_object_name, BlobStore};
use crate::models::{DisplayImage, UploadState};

/// Displayed image collection shared by a workspace and its upload tasks
///
/// Mutated only by whole read-modify-write passes under the write lock;
/// readers clone a snapshot.
pub type ImageCollection = Arc<RwLock<Vec<DisplayImage>>>;

/// Reason recorded when a durable upload exceeds its time bound
pub const TIMEOUT_REASON: &str = "timeout";

/// Accepted satellite image formats (extension, MIME type)
const ACCEPTED_FORMATS: &[(&str, &str)] = &[
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("hdf", "application/x-hdf"),
];

/// Failure to create a locally renderable reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("file name is empty")]
    MissingFileName,

    #[error("{0} is empty")]
    EmptyPayload(String),

    #[error("{0} is not a supported image format (expected tif, tiff, jpg, jpeg, png or hdf)")]
    UnsupportedFormat(String),
}

/// Payload of a freshly intaken image, owned by its upload task
#[derive(Debug)]
pub struct PendingUpload {
    id: Uuid,
    file_name: String,
    payload: Vec<u8>,
}

impl PendingUpload {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Build a `data:` URL for the payload
///
/// The reference is self-contained, so it stays renderable whatever happens
/// to the durable upload.
pub fn local_reference(file_name: &str, payload: &[u8]) -> Result<String, IntakeError> {
    if file_name.trim().is_empty() {
        return Err(IntakeError::MissingFileName);
    }
    if payload.is_empty() {
        return Err(IntakeError::EmptyPayload(file_name.to_string()));
    }

    let mime = file_name
        .rsplit_once('.')
        .and_then(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ACCEPTED_FORMATS
                .iter()
                .find(|(accepted, _)| *accepted == ext)
                .map(|(_, mime)| *mime)
        })
        .ok_or_else(|| IntakeError::UnsupportedFormat(file_name.to_string()))?;

    Ok(format!("data:{};base64,{}", mime, BASE64.encode(payload)))
}

/// Runs durable uploads and folds their outcomes into the image collection
#[derive(Clone)]
pub struct UploadReconciler {
    images: ImageCollection,
    blob_store: Arc<dyn BlobStore>,
    event_bus: EventBus,
    timeout: Duration,
}

impl UploadReconciler {
    pub fn new(
        images: ImageCollection,
        blob_store: Arc<dyn BlobStore>,
        event_bus: EventBus,
        timeout: Duration,
    ) -> Self {
        Self {
            images,
            blob_store,
            event_bus,
            timeout,
        }
    }

    /// Register a new image in `Pending` state
    ///
    /// Returns the displayed image and the token that must be handed to
    /// [`spawn`](Self::spawn) or [`reconcile`](Self::reconcile). Performs no
    /// I/O; on error nothing is added to the collection.
    pub async fn intake(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<(DisplayImage, PendingUpload), IntakeError> {
        let local_url = local_reference(file_name, &payload)?;
        let id = Uuid::new_v4();
        let image = DisplayImage::pending(id, file_name, local_url);

        self.images.write().await.push(image.clone());

        debug!(image_id = %id, file_name = %file_name, "Image registered for background upload");
        self.publish_state(id, file_name, &UploadState::Pending);

        Ok((
            image,
            PendingUpload {
                id,
                file_name: file_name.to_string(),
                payload,
            },
        ))
    }

    /// Start the one-shot upload task for a freshly intaken image
    pub fn spawn(&self, upload: PendingUpload) -> JoinHandle<Option<UploadState>> {
        let reconciler = self.clone();
        tokio::spawn(async move { reconciler.reconcile(upload).await })
    }

    /// Run the durable upload for one image and record the outcome
    ///
    /// Returns `None` when the image could not be claimed (it is no longer
    /// `Pending`, or it left the collection), in which case the store is not
    /// called.
    pub async fn reconcile(&self, upload: PendingUpload) -> Option<UploadState> {
        let PendingUpload {
            id,
            file_name,
            payload,
        } = upload;

        if !self.claim(id).await {
            debug!(image_id = %id, "Upload not claimed; image is not pending");
            return None;
        }
        self.publish_state(id, &file_name, &UploadState::InFlight);

        let object_name = generated_object_name(&file_name);
        // On expiry the store call is dropped, which abandons its write
        let outcome =
            tokio::time::timeout(self.timeout, self.blob_store.put(&object_name, payload)).await;

        let state = match outcome {
            Ok(Ok(durable_url)) => {
                info!(image_id = %id, file_name = %file_name, url = %durable_url, "Background upload succeeded");
                UploadState::Succeeded { durable_url }
            }
            Ok(Err(e)) => {
                warn!(image_id = %id, file_name = %file_name, error = %e, "Background upload failed");
                UploadState::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    image_id = %id,
                    file_name = %file_name,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Background upload timed out"
                );
                UploadState::Failed {
                    reason: TIMEOUT_REASON.to_string(),
                }
            }
        };

        self.settle(id, &state).await;
        self.publish_state(id, &file_name, &state);

        let notification = match &state {
            UploadState::Succeeded { .. } => {
                SkyScanEvent::success(format!("Successfully uploaded {}", file_name))
            }
            _ => SkyScanEvent::error(format!(
                "Failed to upload {}. Using local version instead.",
                file_name
            )),
        };
        self.event_bus.emit_lossy(notification);

        Some(state)
    }

    /// Atomically move an image from `Pending` to `InFlight`
    ///
    /// Returns `true` for exactly one caller per image; every later call (and
    /// any call for an unknown id) returns `false`.
    pub async fn claim(&self, id: Uuid) -> bool {
        let mut images = self.images.write().await;
        match images.iter_mut().find(|img| img.id == id) {
            Some(image) if image.upload_state == UploadState::Pending => {
                image.upload_state = UploadState::InFlight;
                true
            }
            _ => false,
        }
    }

    /// Record a terminal state
    ///
    /// On success the durable URL replaces the local reference; on failure the
    /// local reference is kept. An image that left the collection meanwhile
    /// is ignored.
    async fn settle(&self, id: Uuid, state: &UploadState) {
        let mut images = self.images.write().await;
        let Some(image) = images.iter_mut().find(|img| img.id == id) else {
            debug!(image_id = %id, "Upload settled for an image no longer displayed");
            return;
        };

        if let UploadState::Succeeded { durable_url } = state {
            image.url = durable_url.clone();
        }
        image.upload_state = state.clone();
    }

    fn publish_state(&self, id: Uuid, file_name: &str, state: &UploadState) {
        self.event_bus.emit_lossy(SkyScanEvent::UploadStateChanged {
            image_id: id,
            file_name: file_name.to_string(),
            state: state.label().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
