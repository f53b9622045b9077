//! Authentication provider handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use keyhold_core::types::{
    ActiveAuthConfig, AuthConfigDocument, Caller, DirectoryConfig, PreviewResult, ProviderKind,
    StoredAuthConfig,
};
use keyhold_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::info;

use super::ApiError;
use crate::server::AppState;

/// Stored configuration as returned to the console.
///
/// For directory providers `BindPassword` is always `""`; `HasBindPassword`
/// tells whether one is stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfigView {
    pub auth_provider: ProviderKind,
    pub auth_config: Option<Value>,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

impl AuthConfigView {
    pub fn from_stored(stored: &StoredAuthConfig) -> Result<Self> {
        let auth_config = match &stored.config {
            ActiveAuthConfig::Internal => None,
            ActiveAuthConfig::Directory(config) => Some(directory_view(config)?),
            ActiveAuthConfig::ExternalIdp(config) => Some(config.0.clone()),
        };

        Ok(Self {
            auth_provider: stored.config.kind(),
            auth_config,
            revision: stored.revision,
            updated_at: stored.updated_at,
        })
    }
}

fn directory_view(config: &DirectoryConfig) -> Result<Value> {
    let mut value = serde_json::to_value(config.redacted())
        .map_err(|e| Error::InternalError(format!("failed to encode directory view: {}", e)))?;

    if let Value::Object(fields) = &mut value {
        fields.insert(
            "HasBindPassword".to_string(),
            Value::Bool(!config.bind_password.is_empty()),
        );
    }
    Ok(value)
}

/// GET /api/v1/auth/config
pub async fn get_auth_config(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> std::result::Result<Json<AuthConfigView>, ApiError> {
    let stored = state
        .service
        .get_stored_config(&caller, &caller.tenant)
        .await?;

    Ok(Json(AuthConfigView::from_stored(&stored)?))
}

/// PUT /api/v1/auth/config
pub async fn put_auth_config(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: std::result::Result<Json<AuthConfigDocument>, JsonRejection>,
) -> std::result::Result<Json<AuthConfigView>, ApiError> {
    state.service.authorize(&caller, &caller.tenant)?;
    let Json(document) = payload
        .map_err(|r| ApiError::invalid_body(r, "authentication configuration document"))?;

    let config = ActiveAuthConfig::try_from(document)?;
    let saved = state
        .service
        .save_config(&caller, &caller.tenant, config)
        .await?;

    state.metrics.record_config_save(saved.config.kind().as_str());
    Ok(Json(AuthConfigView::from_stored(&saved)?))
}

/// POST /api/v1/auth/directory/preview
pub async fn preview_directory(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: std::result::Result<Json<DirectoryConfig>, JsonRejection>,
) -> std::result::Result<Json<PreviewResult>, ApiError> {
    state.service.authorize(&caller, &caller.tenant)?;
    let Json(candidate) =
        payload.map_err(|r| ApiError::invalid_body(r, "directory configuration"))?;

    let started = Instant::now();
    let outcome = state.service.preview_directory(&caller, &candidate).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &outcome {
        Ok(result) => {
            state.metrics.record_preview("success", elapsed);
            info!(
                subject = %caller.subject,
                tenant = %caller.tenant,
                users = result.user_count,
                groups = result.group_count,
                "Directory preview served"
            );
        }
        Err(e) => state.metrics.record_preview(e.code(), elapsed),
    }

    Ok(Json(outcome?))
}
