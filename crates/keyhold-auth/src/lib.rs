//! Directory connectivity for Keyhold

pub mod directory;

pub use directory::{DirectoryPreviewEngine, DirectoryPreviewer};
