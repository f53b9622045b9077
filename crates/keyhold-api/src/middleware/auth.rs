//! Bearer token authentication for the admin API

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use keyhold_core::config::{token_digest, AuthConfig};
use keyhold_core::types::{Caller, TenantId};
use keyhold_core::Result;
use std::collections::HashMap;

use crate::admin::ApiError;
use crate::server::AppState;

/// Configured tokens, keyed by the SHA-256 digest of the raw token
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    callers: HashMap<String, Caller>,
}

impl TokenRegistry {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let mut callers = HashMap::new();
        for token in &config.tokens {
            let caller = Caller {
                subject: token.subject.clone(),
                tenant: TenantId::parse(token.tenant.as_str())?,
                global_admin: token.global_admin,
            };
            callers.insert(token.token_sha256.to_ascii_lowercase(), caller);
        }
        Ok(Self { callers })
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Caller identified by a raw bearer token
    pub fn resolve(&self, raw: &str) -> Option<&Caller> {
        self.callers.get(&token_digest(raw))
    }
}

/// Admin authentication middleware
///
/// Expects `Authorization: Bearer <token>` and stores the resolved
/// [`Caller`] in the request extensions.
pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Bearer token required"))?;

    let caller = state
        .tokens
        .resolve(token)
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Unknown token"))?;

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
