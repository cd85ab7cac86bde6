//! # Depot Core
//!
//! Startup configuration and request-boundary policy for the Depot file service:
//! - [`CoreConfig`], resolved once from the environment and shared with every handler
//! - [`UploadLimits`], the count/size/name-length checks applied before anything is stored
//!
//! **No API concerns**: HTTP routing and multipart decoding belong in `api-rest`; file storage
//! belongs in `depot_files`.

pub mod config;
pub mod constants;
mod error;
pub mod limits;

pub use config::CoreConfig;
pub use constants::*;
pub use error::{CoreError, CoreResult};
pub use limits::{LimitError, UploadLimits};
