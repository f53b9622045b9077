//! Core types for Keyhold

mod caller;
mod directory;
mod preview;
mod provider;

pub use caller::*;
pub use directory::*;
pub use preview::*;
pub use provider::*;
