//! Keyhold Core Library
//!
//! Provider configuration model, validation rules, search-filter grammar and
//! the error taxonomy shared by every Keyhold crate.

pub mod config;
pub mod error;
pub mod filter;
pub mod types;

pub use config::KeyholdConfig;
pub use error::{Error, FieldError, Result, ValidationErrors};

/// Keyhold version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tenant provisioned when no tenant list is configured
pub const DEFAULT_TENANT: &str = "default";

/// Number of directory entries returned as a preview sample
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Server-side size limit applied to preview searches
pub const DEFAULT_MAX_ENTRIES: i32 = 1000;
