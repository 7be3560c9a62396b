//! Business services
//!
//! - `blob_store`: durable object storage for uploaded images
//! - `upload_reconciler`: background durable uploads folded back into the display
//! - `report_generator`: query/report/image write chain
//! - `workspace`: per-session image collection, current report, request state

pub mod blob_store;
pub mod report_generator;
pub mod upload_reconciler;
pub mod workspace;

pub use blob_store::{BlobStore, BlobStoreError, FsBlobStore};
pub use report_generator::{GeneratedReport, ImageInput, ReportError};
pub use upload_reconciler::{IntakeError, PendingUpload, UploadReconciler};
pub use workspace::{RequestState, Workspace, WorkspaceError, WorkspaceSnapshot};
