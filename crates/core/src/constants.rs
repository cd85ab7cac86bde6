//! Constants used throughout the Depot core crate.
//!
//! Defaults here apply when the corresponding environment variable is unset or blank.

/// Default storage root, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default per-file upload limit (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of files accepted by a single upload request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

/// Maximum length of a client-supplied filename, in characters.
pub const MAX_ORIGINAL_NAME_LEN: usize = 255;

/// Multipart field name carrying uploaded files.
pub const UPLOAD_FIELD_NAME: &str = "files";
