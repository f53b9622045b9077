//! Authentication provider selection and stored records

use super::DirectoryConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub const MAX_LEN: usize = 128;

    /// Checked constructor
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() || s.len() > Self::MAX_LEN {
            return Err(Error::InvalidArgument(format!(
                "tenant id must be 1 to {} characters",
                Self::MAX_LEN
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::InvalidArgument(format!(
                "tenant id '{}' may only contain letters, digits, '-', '_' and '.'",
                s
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which authentication provider is in effect for a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Internal,
    Directory,
    #[serde(rename = "ExternalIdP")]
    ExternalIdp,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Internal => "Internal",
            ProviderKind::Directory => "Directory",
            ProviderKind::ExternalIdp => "ExternalIdP",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Internal" => Ok(ProviderKind::Internal),
            "Directory" => Ok(ProviderKind::Directory),
            "ExternalIdP" => Ok(ProviderKind::ExternalIdp),
            other => Err(Error::InvalidArgument(format!(
                "unknown provider kind: {}",
                other
            ))),
        }
    }
}

/// Identity-provider document, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalIdpConfig(pub serde_json::Value);

impl ExternalIdpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.0.is_object() {
            Ok(())
        } else {
            Err(Error::validation("authConfig", "must be a JSON object"))
        }
    }
}

/// Provider configuration in effect for a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AuthConfigDocument", into = "AuthConfigDocument")]
pub enum ActiveAuthConfig {
    #[default]
    Internal,
    Directory(DirectoryConfig),
    ExternalIdp(ExternalIdpConfig),
}

impl ActiveAuthConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ActiveAuthConfig::Internal => ProviderKind::Internal,
            ActiveAuthConfig::Directory(_) => ProviderKind::Directory,
            ActiveAuthConfig::ExternalIdp(_) => ProviderKind::ExternalIdp,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ActiveAuthConfig::Internal => Ok(()),
            ActiveAuthConfig::Directory(config) => config.validate(),
            ActiveAuthConfig::ExternalIdp(config) => config.validate(),
        }
    }

    pub fn directory(&self) -> Option<&DirectoryConfig> {
        match self {
            ActiveAuthConfig::Directory(config) => Some(config),
            _ => None,
        }
    }

    /// Kind-specific payload as stored, `None` for `Internal`
    pub fn payload(&self) -> Result<Option<serde_json::Value>> {
        let value = match self {
            ActiveAuthConfig::Internal => return Ok(None),
            ActiveAuthConfig::Directory(config) => serde_json::to_value(config),
            ActiveAuthConfig::ExternalIdp(config) => serde_json::to_value(config),
        };
        value
            .map(Some)
            .map_err(|e| Error::InternalError(format!("failed to encode payload: {}", e)))
    }

    /// Rebuild from a provider kind and its payload
    pub fn from_parts(kind: ProviderKind, payload: Option<serde_json::Value>) -> Result<Self> {
        let payload = payload.filter(|v| !v.is_null());

        match (kind, payload) {
            (ProviderKind::Internal, _) => Ok(ActiveAuthConfig::Internal),
            // serde's message quotes the rejected value, which may be a secret
            (ProviderKind::Directory, Some(value)) => serde_json::from_value(value)
                .map(ActiveAuthConfig::Directory)
                .map_err(|_| {
                    Error::validation("authConfig", "is not a valid directory configuration")
                }),
            (ProviderKind::ExternalIdp, Some(value)) => {
                Ok(ActiveAuthConfig::ExternalIdp(ExternalIdpConfig(value)))
            }
            (kind, None) => Err(Error::validation(
                "authConfig",
                format!("is required for provider {}", kind),
            )),
        }
    }
}

/// `{ authProvider, authConfig }` wire document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfigDocument {
    pub auth_provider: ProviderKind,
    #[serde(default)]
    pub auth_config: Option<serde_json::Value>,
}

impl TryFrom<AuthConfigDocument> for ActiveAuthConfig {
    type Error = Error;

    fn try_from(doc: AuthConfigDocument) -> Result<Self> {
        ActiveAuthConfig::from_parts(doc.auth_provider, doc.auth_config)
    }
}

impl From<ActiveAuthConfig> for AuthConfigDocument {
    fn from(config: ActiveAuthConfig) -> Self {
        let auth_provider = config.kind();
        let auth_config = match config {
            ActiveAuthConfig::Internal => None,
            ActiveAuthConfig::Directory(c) => serde_json::to_value(c).ok(),
            ActiveAuthConfig::ExternalIdp(c) => Some(c.0),
        };
        Self {
            auth_provider,
            auth_config,
        }
    }
}

/// Persisted record for one tenant
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuthConfig {
    pub tenant_id: TenantId,
    pub config: ActiveAuthConfig,
    /// Incremented on every save, 0 at provisioning
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

impl StoredAuthConfig {
    /// Record written when a tenant is provisioned
    pub fn provisioned(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            config: ActiveAuthConfig::Internal,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Next revision carrying `config`
    pub fn replaced_with(&self, config: ActiveAuthConfig) -> Self {
        Self {
            tenant_id: self.tenant_id.clone(),
            config,
            revision: self.revision + 1,
            updated_at: Utc::now(),
        }
    }
}
