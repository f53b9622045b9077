//! Admin API server for Keyhold

pub mod admin;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod service;

pub use metrics::MetricsRecorder;
pub use server::{AppState, KeyholdServer};
pub use service::AuthConfigService;
