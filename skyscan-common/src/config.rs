//! Configuration loading and root folder resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument or environment variable (collected by the binary)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default HTTP bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Default object-storage bucket for uploaded images
pub const DEFAULT_BUCKET: &str = "uploaded-images";

/// Default bound on a single durable upload
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "skyscan.db";

/// Directory (inside the root folder) holding storage buckets
pub const STORAGE_DIR_NAME: &str = "storage";

/// Settings read from a TOML config file
///
/// All fields are optional; missing fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub bucket: Option<String>,
    pub public_base_url: Option<String>,
    pub upload_timeout_secs: Option<u64>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub bucket: Option<String>,
    pub public_base_url: Option<String>,
    pub upload_timeout_secs: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub public_base_url: String,
    pub upload_timeout: Duration,
}

impl ServiceConfig {
    /// Resolve configuration from overrides, the TOML file and compiled defaults
    ///
    /// An explicitly named config file must exist and parse. The default
    /// config locations are optional: a missing file is silently skipped and
    /// an unreadable one is logged and skipped.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match &overrides.config_file {
            Some(path) => load_toml_config(path)?,
            None => match default_config_file() {
                Some(path) => load_toml_config(&path).unwrap_or_else(|e| {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    TomlConfig::default()
                }),
                None => TomlConfig::default(),
            },
        };

        Self::merge(overrides, toml_config)
    }

    /// Merge overrides over a parsed TOML config, filling gaps with defaults
    pub fn merge(overrides: ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let root_folder = overrides
            .root_folder
            .or(toml_config.root_folder)
            .unwrap_or_else(default_root_folder);
        let host = overrides
            .host
            .or(toml_config.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
        let bucket = overrides
            .bucket
            .or(toml_config.bucket)
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let public_base_url = overrides
            .public_base_url
            .or(toml_config.public_base_url)
            .unwrap_or_else(|| format!("http://{}:{}", host, port));
        let upload_timeout_secs = overrides
            .upload_timeout_secs
            .or(toml_config.upload_timeout_secs)
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS);

        if !is_valid_bucket_name(&bucket) {
            return Err(Error::Config(format!("Invalid bucket name: {:?}", bucket)));
        }
        if upload_timeout_secs == 0 {
            return Err(Error::Config(
                "upload_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            root_folder,
            host,
            port,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
        })
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    /// Directory holding the configured bucket's objects
    pub fn bucket_path(&self) -> PathBuf {
        self.root_folder.join(STORAGE_DIR_NAME).join(&self.bucket)
    }

    /// Create the root folder and bucket directory if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.bucket_path())?;
        Ok(())
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Bucket names become a directory and a URL path segment
fn is_valid_bucket_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// First existing default config file for the platform
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("skyscan").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/skyscan/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skyscan"))
        .unwrap_or_else(|| PathBuf::from("./skyscan_data"))
}
