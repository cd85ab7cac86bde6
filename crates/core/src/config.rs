//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into services. Request handlers never read environment variables; they receive a
//! shared [`CoreConfig`].
//!
//! The `*_from_env_value` helpers take the raw `Option<String>` of an environment variable so
//! the parsing rules can be tested without touching the process environment. Unset, empty or
//! whitespace-only values fall back to the defaults in [`crate::constants`].

use crate::constants::{DEFAULT_HOST, DEFAULT_MAX_FILE_SIZE, DEFAULT_PORT, DEFAULT_UPLOAD_DIR};
use crate::limits::UploadLimits;
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    staging_dir: PathBuf,
    host: String,
    port: u16,
    max_file_size: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        upload_dir: PathBuf,
        staging_dir: PathBuf,
        host: String,
        port: u16,
        max_file_size: u64,
    ) -> CoreResult<Self> {
        if host.trim().is_empty() {
            return Err(CoreError::InvalidInput("host cannot be empty".into()));
        }

        if max_file_size == 0 {
            return Err(CoreError::InvalidInput(
                "max_file_size must be greater than zero".into(),
            ));
        }

        if upload_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidInput("upload_dir cannot be empty".into()));
        }

        Ok(Self {
            upload_dir,
            staging_dir,
            host,
            port,
            max_file_size,
        })
    }

    /// Storage root for uploaded files.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Directory where multipart parts are spooled before being stored.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits::with_max_file_size(self.max_file_size)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the listen port (`PORT`).
pub fn port_from_env_value(value: Option<String>) -> CoreResult<u16> {
    match non_blank(value) {
        None => Ok(DEFAULT_PORT),
        Some(v) => v.parse::<u16>().map_err(|_| CoreError::InvalidEnvValue {
            name: "PORT",
            value: v,
        }),
    }
}

/// Parse the listen host (`DEPOT_HOST`).
pub fn host_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// Parse the per-file size limit in bytes (`MAX_FILE_SIZE`).
pub fn max_file_size_from_env_value(value: Option<String>) -> CoreResult<u64> {
    match non_blank(value) {
        None => Ok(DEFAULT_MAX_FILE_SIZE),
        Some(v) => match v.parse::<u64>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(CoreError::InvalidEnvValue {
                name: "MAX_FILE_SIZE",
                value: v,
            }),
        },
    }
}

/// Resolve the storage root (`UPLOAD_DIR`).
pub fn upload_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR))
}

/// Resolve the staging directory (`DEPOT_STAGING_DIR`), defaulting to the system temp dir.
pub fn staging_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}
