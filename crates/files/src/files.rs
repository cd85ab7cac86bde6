//! Storage manager implementation
//!
//! This module provides [`FilesService`], which reconciles the two sources of truth Depot
//! keeps about stored files:
//!
//! - **The filesystem** is authoritative for existence and bytes
//! - **The metadata index** is authoritative for the original filename and upload time
//!
//! # Operations
//!
//! - [`FilesService::store`] writes a batch of uploads under generated names
//! - [`FilesService::list`] merges a directory listing with the index, newest first
//! - [`FilesService::retrieve`] resolves a storage name to a path and download filename
//! - [`FilesService::delete`] removes the file, then its index entry
//!
//! # Consistency Rules
//!
//! - An index entry is only inserted after its file has been fully written
//! - An index entry is only removed after its file has been removed
//! - A failed write removes the partial file it produced
//! - Files without an index entry are described from `stat` data, using the storage name as
//!   the original name
//!
//! # Batch Failures
//!
//! A batch is not transactional. When one item fails, items written earlier in the same
//! call stay on disk and in the index; the caller only learns about the failure.

use crate::guard::{GuardError, PathGuard};
use crate::index::MetadataIndex;
use crate::FilesError;
use chrono::{DateTime, Utc};
use depot_uuid::StorageNameGenerator;
use std::collections::HashSet;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Number of leading bytes inspected when detecting a media type.
const MEDIA_SNIFF_LEN: u64 = 8192;

/// Metadata for a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Generated name, used as the on-disk filename and index key
    pub storage_name: String,

    /// Filename as supplied by the client, used for display and downloads
    pub original_name: String,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// UTC timestamp when the file was stored
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// Describes a file that exists on disk but has no index entry.
    fn from_disk(storage_name: String, metadata: &Metadata) -> Self {
        let uploaded_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Self {
            original_name: storage_name.clone(),
            storage_name,
            size_bytes: metadata.len(),
            uploaded_at: DateTime::<Utc>::from(uploaded_at),
        }
    }
}

/// One upload handed to [`FilesService::store`].
#[derive(Debug)]
pub struct StoreItem<R> {
    pub original_name: String,
    pub declared_size: u64,
    pub reader: R,
}

impl<R> StoreItem<R> {
    pub fn new(original_name: impl Into<String>, declared_size: u64, reader: R) -> Self {
        Self {
            original_name: original_name.into(),
            declared_size,
            reader,
        }
    }
}

/// Everything the HTTP layer needs to stream a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    /// Validated absolute path of the stored file
    pub path: PathBuf,

    /// Filename to suggest to the client
    pub download_name: String,

    /// Size of the file when it was resolved
    pub size_bytes: u64,

    /// Best-effort media type detected from the file's leading bytes
    pub media_type: Option<String>,
}

/// Service for storing, listing, retrieving and deleting files in one directory
///
/// Constructed once at startup and shared (behind an `Arc`) by every request handler. The
/// service owns the metadata index; there is no ambient or static state.
#[derive(Debug)]
pub struct FilesService {
    guard: PathGuard,
    index: MetadataIndex,
    names: StorageNameGenerator,
    max_file_size: u64,
}

impl FilesService {
    /// Creates a new `FilesService` rooted at `root_directory`
    ///
    /// The directory is created if it does not exist and then canonicalised once; every
    /// containment check compares against that canonical form.
    ///
    /// # Arguments
    ///
    /// * `root_directory` - Storage root
    /// * `max_file_size` - Largest number of bytes accepted for a single file
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if:
    /// - The directory cannot be created
    /// - The path exists but is not a directory
    /// - Path canonicalisation fails
    pub fn new(root_directory: &Path, max_file_size: u64) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            std::fs::create_dir_all(root_directory).map_err(|e| {
                FilesError::InvalidRootDirectory(format!(
                    "Cannot create directory {}: {}",
                    root_directory.display(),
                    e
                ))
            })?;
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            guard: PathGuard::new(root_directory),
            index: MetadataIndex::new(),
            names: StorageNameGenerator::new(),
            max_file_size,
        })
    }

    /// Returns the canonical storage root
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        self.guard.root()
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    #[must_use]
    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    /// Stores a batch of uploads under freshly generated names
    ///
    /// Items are written in order. Count, name-length and declared-size limits are the
    /// caller's responsibility; the byte limit is enforced again while copying because the
    /// declared size cannot be trusted.
    ///
    /// # Returns
    ///
    /// One `FileRecord` per item, in input order.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - An item delivers more than `max_file_size` bytes (`Validation`)
    /// - Creating or writing a file fails (`Io`)
    ///
    /// The failing item's partial file is removed. Items stored before it are kept.
    pub async fn store<R>(&self, items: Vec<StoreItem<R>>) -> Result<Vec<FileRecord>, FilesError>
    where
        R: AsyncRead + Unpin,
    {
        let mut records = Vec::with_capacity(items.len());

        for item in items {
            let storage_name = self.names.generate(&item.original_name).into_string();
            let path = self.resolve(&storage_name).await?;

            let size_bytes = match self.write_new_file(&path, item.reader).await {
                Ok(written) => written,
                Err(e) => {
                    discard_partial(&path).await;
                    // A listing during the write may have indexed the partial file.
                    self.index.remove(&storage_name);
                    return Err(e);
                }
            };

            let record = FileRecord {
                storage_name: storage_name.clone(),
                original_name: item.original_name,
                size_bytes,
                uploaded_at: Utc::now(),
            };
            self.index.put(storage_name, record.clone());

            if size_bytes != item.declared_size {
                tracing::debug!(
                    "Declared size {} differs from stored size {} for {}",
                    item.declared_size,
                    size_bytes,
                    record.storage_name
                );
            }
            tracing::info!(
                "Stored {} as {} ({} bytes)",
                record.original_name,
                record.storage_name,
                record.size_bytes
            );

            records.push(record);
        }

        Ok(records)
    }

    /// Lists every file in the storage root, newest first
    ///
    /// Entries that vanish or cannot be inspected mid-enumeration are skipped. Ties on the
    /// upload timestamp are ordered by storage name.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the storage root itself cannot be read.
    pub async fn list(&self) -> Result<Vec<FileRecord>, FilesError> {
        let mut entries = fs::read_dir(self.guard.root()).await?;
        let mut on_disk = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let storage_name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!("Skipping non UTF-8 entry {:?}", raw);
                    continue;
                }
            };

            match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => {
                    on_disk.push(FileRecord::from_disk(storage_name, &metadata));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Skipping {} during listing: {}", storage_name, e);
                }
            }
        }

        let records = self.merge_with_index(on_disk);
        self.prune_stale_entries(&records).await;

        Ok(records)
    }

    /// Resolves a storage name for download
    ///
    /// Does not read the file body; the caller streams it from `Retrieved::path`.
    ///
    /// # Errors
    ///
    /// - `Validation` / `AccessDenied` if the path guard rejects the name
    /// - `NotFound` if nothing (or something other than a regular file) exists at the path
    /// - `Io` for any other stat failure
    pub async fn retrieve(&self, storage_name: &str) -> Result<Retrieved, FilesError> {
        let path = self.resolve(storage_name).await?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(storage_name.to_owned()));
            }
            Err(e) => return Err(FilesError::Io(e)),
        };

        if !metadata.is_file() {
            return Err(FilesError::NotFound(storage_name.to_owned()));
        }

        let download_name = self
            .index
            .get(storage_name)
            .map(|record| record.original_name)
            .unwrap_or_else(|| storage_name.to_owned());

        Ok(Retrieved {
            media_type: detect_media_type(&path).await,
            path,
            download_name,
            size_bytes: metadata.len(),
        })
    }

    /// Deletes a stored file and then its index entry
    ///
    /// # Errors
    ///
    /// - `Validation` / `AccessDenied` if the path guard rejects the name
    /// - `NotFound` if the file does not exist or the name is a directory
    /// - `Io` if removal fails for another reason; the index entry is left untouched
    pub async fn delete(&self, storage_name: &str) -> Result<(), FilesError> {
        let path = self.resolve(storage_name).await?;

        match fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(FilesError::NotFound(storage_name.to_owned()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(storage_name.to_owned()));
            }
            Err(e) => return Err(FilesError::Io(e)),
        }

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(storage_name.to_owned()));
            }
            Err(e) => return Err(FilesError::Io(e)),
        }

        self.index.remove(storage_name);
        tracing::info!("Deleted {}", storage_name);

        Ok(())
    }

    /// Runs a storage name through the path guard and maps the outcome onto `FilesError`
    async fn resolve(&self, storage_name: &str) -> Result<PathBuf, FilesError> {
        self.guard
            .resolve(storage_name)
            .await
            .map_err(|e| match e {
                GuardError::InvalidName(name) => {
                    FilesError::Validation(format!("invalid storage name {:?}", name))
                }
                GuardError::OutsideRoot(name) => {
                    tracing::warn!("Rejected storage name escaping the storage root: {:?}", name);
                    FilesError::AccessDenied(name)
                }
                GuardError::Io { path, source } => FilesError::Io(io::Error::new(
                    source.kind(),
                    format!("Failed to resolve {}: {}", path.display(), source),
                )),
            })
    }

    /// Streams `reader` into a file that must not exist yet, returning the bytes written
    async fn write_new_file<R>(&self, path: &Path, reader: R) -> Result<u64, FilesError>
    where
        R: AsyncRead + Unpin,
    {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| {
                FilesError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to create {}: {}", path.display(), e),
                ))
            })?;

        let mut limited = reader.take(self.max_file_size.saturating_add(1));
        let written = tokio::io::copy(&mut limited, &mut file).await.map_err(|e| {
            FilesError::Io(io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", path.display(), e),
            ))
        })?;
        file.flush().await?;

        if written > self.max_file_size {
            return Err(FilesError::Validation(format!(
                "file exceeds the maximum size of {} bytes",
                self.max_file_size
            )));
        }

        Ok(written)
    }

    /// Merges a directory listing with the index; an index record wins when present
    ///
    /// Files the index does not know yet are recorded so later listings report a stable
    /// upload time.
    fn merge_with_index(&self, on_disk: Vec<FileRecord>) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = on_disk
            .into_iter()
            .map(|disk| {
                let storage_name = disk.storage_name.clone();
                self.index.get_or_insert_with(&storage_name, || disk)
            })
            .collect();

        sort_newest_first(&mut records);
        records
    }

    /// Drops index entries whose file is gone
    ///
    /// Only entries missing from `listed` are checked, and only removed once the file is
    /// confirmed absent, so an upload finishing during the listing keeps its entry.
    ///
    /// A delete that completes between `read_dir` and the merge leaves its name re-inserted
    /// by [`Self::merge_with_index`]; the next listing removes it here. Storage names are never
    /// reused, so the stale entry cannot shadow a later upload.
    async fn prune_stale_entries(&self, listed: &[FileRecord]) {
        let listed: HashSet<&str> = listed.iter().map(|r| r.storage_name.as_str()).collect();

        for (storage_name, _) in self.index.entries() {
            if listed.contains(storage_name.as_str()) {
                continue;
            }

            let path = self.guard.root().join(&storage_name);
            if let Ok(false) = fs::try_exists(&path).await {
                tracing::debug!("Pruning index entry for missing file {}", storage_name);
                self.index.remove(&storage_name);
            }
        }
    }
}

/// Sorts by upload time descending, then storage name ascending
fn sort_newest_first(records: &mut [FileRecord]) {
    records.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.storage_name.cmp(&b.storage_name))
    });
}

async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial file {}: {}", path.display(), e),
    }
}

async fn detect_media_type(path: &Path) -> Option<String> {
    let file = fs::File::open(path).await.ok()?;
    let mut head = Vec::with_capacity(MEDIA_SNIFF_LEN as usize);
    file.take(MEDIA_SNIFF_LEN).read_to_end(&mut head).await.ok()?;

    infer::get(&head).map(|kind| kind.mime_type().to_string())
}
