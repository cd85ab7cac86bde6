//! Depot File Storage
//!
//! This crate provides the storage core of Depot: a single directory of uploaded files plus an
//! in-memory index of their metadata.
//!
//! ## Design Principles
//!
//! - The filesystem is authoritative for existence and bytes
//! - The metadata index is authoritative for display name and upload time
//! - Every name-based operation passes through the [`PathGuard`] before touching disk
//! - Storage names are generated, never chosen by clients
//! - Metadata is process-lifetime only; files placed on disk without an index entry are
//!   described from filesystem stat data
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! ├── 1768142122045-550e8400e29b41d4a716446655440000-report.pdf
//! └── 1768142122046-7d444840b5a14fb8a6a7a4b5d7d4f2c1-notes.txt
//! ```
//!
//! No subdirectories and no sidecar metadata files.
//!
//! ## Example Usage
//!
//! ```no_run
//! use depot_files::{FilesService, StoreItem};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), depot_files::FilesError> {
//! let service = FilesService::new(Path::new("uploads"), 100 * 1024 * 1024)?;
//!
//! let records = service
//!     .store(vec![StoreItem::new("a.txt", 5, &b"hello"[..])])
//!     .await?;
//! let listed = service.list().await?;
//! assert_eq!(listed[0].storage_name, records[0].storage_name);
//! # Ok(())
//! # }
//! ```

mod files;
mod guard;
mod index;

pub use files::{FileRecord, FilesService, Retrieved, StoreItem};
pub use guard::{check_storage_name, GuardError, PathGuard};
pub use index::MetadataIndex;

/// Errors that can occur during file operations
///
/// The four request-level kinds (`Validation`, `AccessDenied`, `NotFound`, `Io`) form a closed
/// set that callers branch on; `InvalidRootDirectory` only occurs at startup.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Storage root cannot be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Caller supplied a malformed storage name or an oversized upload
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage name resolves outside the storage root
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No file exists for the storage name
    #[error("File not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
