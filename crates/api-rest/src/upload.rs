//! Multipart spooling for uploads.
//!
//! Each file part is copied into an anonymous temporary file in the staging directory while
//! the upload limits are checked. Nothing reaches the storage root until every part of the
//! request has been read and accepted, so a rejected or aborted request leaves no partial file
//! behind. Anonymous temporary files are unlinked on creation and vanish when dropped.

use crate::error::{ApiError, ApiResult};
use axum::extract::Multipart;
use depot_core::{UploadLimits, UPLOAD_FIELD_NAME};
use depot_files::StoreItem;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// A file part that passed every limit and is ready to be stored.
#[derive(Debug)]
pub struct SpooledPart {
    pub original_name: String,
    pub size_bytes: u64,
    pub file: File,
}

impl SpooledPart {
    pub fn into_store_item(self) -> StoreItem<File> {
        StoreItem::new(self.original_name, self.size_bytes, self.file)
    }
}

/// Reads every file part of `multipart` into the staging directory.
///
/// Text fields (parts without a filename) are ignored. The count is checked before a part is
/// read, the name as soon as the part header is known, and the size after every chunk.
///
/// # Errors
///
/// - `BadRequest` for any limit violation or a file part under an unexpected field name
/// - `Multipart` if the body cannot be decoded
/// - `Internal` if the staging directory cannot be written
pub async fn spool_parts(
    multipart: &mut Multipart,
    limits: &UploadLimits,
    staging_dir: &Path,
) -> ApiResult<Vec<SpooledPart>> {
    let mut parts = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        if field.name() != Some(UPLOAD_FIELD_NAME) {
            return Err(ApiError::BadRequest("Unexpected field".into()));
        }

        limits.check_count(parts.len() + 1)?;
        limits.check_name(&original_name)?;

        let mut file = staging_file(staging_dir)?;
        let mut size_bytes = 0u64;

        while let Some(chunk) = field.chunk().await? {
            size_bytes += chunk.len() as u64;
            limits.check_size(size_bytes)?;
            file.write_all(&chunk).await.map_err(staging_error)?;
        }

        file.flush().await.map_err(staging_error)?;
        file.rewind().await.map_err(staging_error)?;

        tracing::debug!("Spooled {} ({} bytes)", original_name, size_bytes);
        parts.push(SpooledPart {
            original_name,
            size_bytes,
            file,
        });
    }

    limits.check_count(parts.len())?;

    Ok(parts)
}

fn staging_file(staging_dir: &Path) -> ApiResult<File> {
    let file = tempfile::tempfile_in(staging_dir).map_err(staging_error)?;
    Ok(File::from_std(file))
}

fn staging_error(err: std::io::Error) -> ApiError {
    tracing::error!("Failed to spool upload: {}", err);
    ApiError::Internal("Upload processing failed")
}
