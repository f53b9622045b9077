//! Admin API server implementation

use axum::{extract::FromRef, middleware, routing::get, Router};
use keyhold_auth::DirectoryPreviewEngine;
use keyhold_core::{config::KeyholdConfig, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use crate::admin;
use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::middleware::TokenRegistry;
use crate::service::AuthConfigService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KeyholdConfig>,
    pub service: Arc<AuthConfigService>,
    pub tokens: Arc<TokenRegistry>,
    pub start_time: Instant,
    pub metrics: Arc<MetricsRecorder>,
}

impl AppState {
    pub fn new(
        config: KeyholdConfig,
        service: AuthConfigService,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self> {
        let tokens = TokenRegistry::from_config(&config.auth)?;

        Ok(Self {
            config: Arc::new(config),
            service: Arc::new(service),
            tokens: Arc::new(tokens),
            start_time: Instant::now(),
            metrics,
        })
    }
}

impl FromRef<AppState> for Arc<MetricsRecorder> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Build the full router: admin API under `/api/v1` plus `/metrics`
pub fn create_router(state: AppState) -> Router {
    let timeout = state.config.server.request_timeout();

    Router::new()
        // Metrics endpoint (no auth required)
        .route("/metrics", get(metrics_handler))
        // Admin API routes
        .nest("/api/v1", admin::admin_routes(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware,
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}

/// Keyhold admin server
pub struct KeyholdServer {
    config: KeyholdConfig,
}

impl KeyholdServer {
    pub fn new(config: KeyholdConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let metrics = Arc::new(MetricsRecorder::install()?);
        info!("Prometheus metrics initialized");

        let store = keyhold_metadata::open_store(&self.config.database).await?;
        for tenant in self.config.tenant_ids()? {
            store.provision_tenant(&tenant).await?;
        }

        let engine = DirectoryPreviewEngine::new(self.config.directory.clone());
        let service = AuthConfigService::new(store, Arc::new(engine));

        let addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let state = AppState::new(self.config, service, metrics)?;
        if state.tokens.is_empty() {
            info!("No admin tokens configured; every admin request will be rejected");
        }

        let app = create_router(state);
        let listener = TcpListener::bind(&addr).await?;

        info!("Keyhold admin API listening on http://{}/api/v1", addr);
        info!("Prometheus metrics at http://{}/metrics", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Keyhold server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
