//! # SkyScan Common Library
//!
//! Shared code for the SkyScan service:
//! - Database initialization and record types
//! - Event types (SkyScanEvent enum) and the EventBus
//! - Configuration resolution
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
