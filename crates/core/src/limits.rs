//! Upload limits enforced at the request boundary.
//!
//! The storage manager assumes every batch it receives is already within these limits. The
//! REST layer checks them while it reads a multipart body, so an over-count or oversized
//! upload is rejected before anything reaches the storage root.

use crate::constants::{DEFAULT_MAX_FILE_SIZE, MAX_FILES_PER_REQUEST, MAX_ORIGINAL_NAME_LEN};

/// Allowance per file for multipart framing (boundaries and part headers).
const MULTIPART_OVERHEAD_PER_FILE: u64 = 64 * 1024;

/// Why an upload was refused. The display text is suitable for returning to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("Too many files. Maximum: {max} files")]
    TooManyFiles { max: usize },
    #[error("File too large. Maximum size: {}MB", mebibytes(.max_bytes))]
    FileTooLarge { max_bytes: u64 },
    #[error("Filename too long")]
    NameTooLong { max_chars: usize },
    #[error("Missing filename")]
    MissingName,
}

fn mebibytes(bytes: &u64) -> u64 {
    (*bytes as f64 / (1024.0 * 1024.0)).round() as u64
}

/// Per-request upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    max_file_size: u64,
    max_files: usize,
    max_name_len: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::with_max_file_size(DEFAULT_MAX_FILE_SIZE)
    }
}

impl UploadLimits {
    pub fn new(max_file_size: u64, max_files: usize, max_name_len: usize) -> Self {
        Self {
            max_file_size,
            max_files,
            max_name_len,
        }
    }

    /// Limits with a custom file size and the fixed count and name-length limits.
    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self::new(max_file_size, MAX_FILES_PER_REQUEST, MAX_ORIGINAL_NAME_LEN)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Checks a file count. Zero files is an error, as is anything above the maximum.
    ///
    /// Call with `received + 1` before reading another file to reject the batch before the
    /// extra file is consumed.
    pub fn check_count(&self, count: usize) -> Result<(), LimitError> {
        if count == 0 {
            return Err(LimitError::NoFiles);
        }
        if count > self.max_files {
            return Err(LimitError::TooManyFiles {
                max: self.max_files,
            });
        }
        Ok(())
    }

    /// Checks a client-supplied filename. Length is counted in characters.
    pub fn check_name(&self, name: &str) -> Result<(), LimitError> {
        if name.is_empty() {
            return Err(LimitError::MissingName);
        }
        if name.chars().count() > self.max_name_len {
            return Err(LimitError::NameTooLong {
                max_chars: self.max_name_len,
            });
        }
        Ok(())
    }

    /// Checks a (running) byte count for one file.
    pub fn check_size(&self, size: u64) -> Result<(), LimitError> {
        if size > self.max_file_size {
            return Err(LimitError::FileTooLarge {
                max_bytes: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Upper bound for a whole upload request body.
    pub fn max_request_bytes(&self) -> usize {
        let per_file = self.max_file_size.saturating_add(MULTIPART_OVERHEAD_PER_FILE);
        let total = per_file.saturating_mul(self.max_files as u64);
        usize::try_from(total).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = UploadLimits::default();

        assert_eq!(limits.max_file_size(), 100 * 1024 * 1024);
        assert_eq!(limits.max_files(), 10);
        assert_eq!(limits.max_name_len(), 255);
    }

    #[test]
    fn test_check_count() {
        let limits = UploadLimits::default();

        assert_eq!(limits.check_count(0), Err(LimitError::NoFiles));
        assert!(limits.check_count(1).is_ok());
        assert!(limits.check_count(10).is_ok());
        assert_eq!(
            limits.check_count(11),
            Err(LimitError::TooManyFiles { max: 10 })
        );
    }

    #[test]
    fn test_check_name_counts_characters() {
        let limits = UploadLimits::default();

        assert!(limits.check_name(&"é".repeat(255)).is_ok());
        assert!(limits.check_name(&"a".repeat(256)).is_err());
        assert_eq!(limits.check_name(""), Err(LimitError::MissingName));
    }

    #[test]
    fn test_check_size_boundary() {
        let limits = UploadLimits::with_max_file_size(100);

        assert!(limits.check_size(100).is_ok());
        assert_eq!(
            limits.check_size(101),
            Err(LimitError::FileTooLarge { max_bytes: 100 })
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(LimitError::NoFiles.to_string(), "No files uploaded");
        assert_eq!(
            LimitError::TooManyFiles { max: 10 }.to_string(),
            "Too many files. Maximum: 10 files"
        );
        assert_eq!(
            LimitError::FileTooLarge {
                max_bytes: 100 * 1024 * 1024
            }
            .to_string(),
            "File too large. Maximum size: 100MB"
        );
        assert_eq!(
            LimitError::NameTooLong { max_chars: 255 }.to_string(),
            "Filename too long"
        );
    }

    #[test]
    fn test_max_request_bytes_covers_all_files() {
        let limits = UploadLimits::with_max_file_size(1000);

        assert!(limits.max_request_bytes() >= 10 * 1000);
    }

    #[test]
    fn test_max_request_bytes_saturates() {
        let limits = UploadLimits::with_max_file_size(u64::MAX);

        assert_eq!(limits.max_request_bytes(), usize::MAX);
    }
}
