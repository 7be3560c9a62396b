//! HTTP API handlers
//!
//! REST endpoints for report generation and the workspace, plus the SSE
//! event stream.

pub mod health;
pub mod reports;
pub mod sse;
pub mod workspace;

pub use health::health_routes;
pub use reports::report_routes;
pub use sse::event_stream;
pub use workspace::workspace_routes;
