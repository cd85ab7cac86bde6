//! Storage-name validation and path containment.
//!
//! Every disk-touching operation resolves its storage name here first. The check runs in two
//! stages:
//!
//! 1. A syntactic pre-check ([`check_storage_name`]) that never touches the filesystem. Names
//!    that are empty, `.`, or contain `..`, `/`, `\` or NUL are rejected outright.
//! 2. A containment check: the joined path is canonicalised (resolving symlinks) and must stay
//!    below the canonical storage root.
//!
//! The guard never logs; callers decide how a rejection is reported.

use std::io;
use std::path::{Path, PathBuf};

/// Why a storage name was rejected.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The name fails the syntactic pre-check
    #[error("invalid storage name: {0:?}")]
    InvalidName(String),

    /// The name resolves to a location outside the storage root
    #[error("storage name {0:?} resolves outside the storage root")]
    OutsideRoot(String),

    /// Canonicalisation failed for a reason other than absence
    #[error("cannot canonicalise {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Syntactic check for a storage name. Performs no I/O.
pub fn check_storage_name(storage_name: &str) -> Result<(), GuardError> {
    let invalid = storage_name.is_empty()
        || storage_name == "."
        || storage_name.contains("..")
        || storage_name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(GuardError::InvalidName(storage_name.to_owned()));
    }

    Ok(())
}

/// Resolves storage names against a fixed, canonical storage root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for `root`.
    ///
    /// `root` must already be canonical; [`crate::FilesService::new`] takes care of that.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `storage_name` to an absolute path inside the storage root.
    ///
    /// The returned path is the joined path, not its canonical target, so operations act on
    /// the directory entry itself. A name that does not exist yet is accepted when its lexical
    /// parent is the root.
    ///
    /// # Errors
    ///
    /// - [`GuardError::InvalidName`] if the syntactic check fails (no filesystem call is made)
    /// - [`GuardError::OutsideRoot`] if the canonical target escapes the root
    /// - [`GuardError::Io`] if canonicalisation fails for another reason (e.g. a symlink loop)
    pub async fn resolve(&self, storage_name: &str) -> Result<PathBuf, GuardError> {
        check_storage_name(storage_name)?;

        let joined = self.root.join(storage_name);

        match tokio::fs::canonicalize(&joined).await {
            Ok(canonical) => {
                if canonical.starts_with(&self.root) {
                    Ok(joined)
                } else {
                    Err(GuardError::OutsideRoot(storage_name.to_owned()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if joined.parent() == Some(self.root.as_path()) {
                    Ok(joined)
                } else {
                    Err(GuardError::OutsideRoot(storage_name.to_owned()))
                }
            }
            Err(source) => Err(GuardError::Io {
                path: joined,
                source,
            }),
        }
    }
}
