//! Database initialization and record types

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
