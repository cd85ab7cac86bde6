//! Identifier and storage-name utilities.
//!
//! Depot stores every uploaded file directly under the storage root, named by a generated
//! *storage name*. Files are created exclusively, so a collision fails the upload instead of
//! overwriting another file; uniqueness of the generated name is what keeps uploads succeeding.
//!
//! This crate provides:
//! - A small wrapper type ([`UuidService`]) that guarantees the canonical UUID format once
//!   constructed.
//! - [`StorageNameGenerator`], which combines a monotonic millisecond token, a fresh UUID and a
//!   sanitised copy of the client-supplied filename.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! ## Storage name layout
//! `<unix_millis>-<canonical_uuid>-<sanitised_original>`
//!
//! Example:
//! `1768142122045-550e8400e29b41d4a716446655440000-report.pdf`
//!
//! Storage names:
//! - contain only `[A-Za-z0-9._-]`
//! - never contain `..`, `/` or `\`
//! - are at most [`MAX_STORAGE_NAME_LEN`] bytes long

mod service;

pub use service::{
    sanitise_filename, StorageName, StorageNameGenerator, Uuid, UuidService, MAX_STORAGE_NAME_LEN,
};
