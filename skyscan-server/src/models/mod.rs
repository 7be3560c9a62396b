//! Domain models: mock report templates, vessel annotations, displayed images

pub mod display_image;
pub mod report_data;
pub mod vessel;

pub use display_image::{DisplayImage, UploadState};
pub use report_data::{ReportData, VesselTypeCount};
pub use vessel::{mock_vessels, Vessel};
