//! LDAP/Active Directory preview
//!
//! Tests a candidate directory configuration against a live server:
//! - structural validation before any I/O
//! - connect with plain LDAP, StartTLS or LDAPS
//! - bind with the configured service account
//! - bounded user and group searches
//!
//! Every failure is mapped onto the core error taxonomy. Raw transport
//! errors and bind credentials never leave this module.

mod classify;
mod engine;
mod session;

pub use engine::DirectoryPreviewEngine;

use async_trait::async_trait;
use keyhold_core::types::{DirectoryConfig, PreviewResult};
use keyhold_core::Result;

/// Anything that can preview a directory configuration
#[async_trait]
pub trait DirectoryPreviewer: Send + Sync {
    async fn preview(&self, candidate: &DirectoryConfig) -> Result<PreviewResult>;
}
