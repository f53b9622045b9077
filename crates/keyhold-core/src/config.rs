//! Configuration for Keyhold

use crate::types::TenantId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyholdConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub directory: DirectoryPreviewConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_tenants")]
    pub tenants: Vec<String>,
}

impl Default for KeyholdConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            directory: DirectoryPreviewConfig::default(),
            logging: LoggingConfig::default(),
            tenants: default_tenants(),
        }
    }
}

impl KeyholdConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InternalError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::InternalError(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("KEYHOLD_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("KEYHOLD_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("KEYHOLD_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(level) = std::env::var("KEYHOLD_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("KEYHOLD_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Ok(tenants) = std::env::var("KEYHOLD_TENANTS") {
            config.tenants = tenants
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }

        // Single bootstrap administrator for the first tenant
        if let Ok(digest) = std::env::var("KEYHOLD_ADMIN_TOKEN_SHA256") {
            let tenant = config
                .tenants
                .first()
                .cloned()
                .unwrap_or_else(|| crate::DEFAULT_TENANT.to_string());
            config.auth.tokens.push(ApiToken {
                token_sha256: digest.trim().to_ascii_lowercase(),
                subject: std::env::var("KEYHOLD_ADMIN_SUBJECT")
                    .unwrap_or_else(|_| "admin".to_string()),
                tenant,
                global_admin: true,
            });
        }

        if std::env::var("KEYHOLD_DIRECTORY_SKIP_TLS_VERIFY")
            .map(|v| v == "true")
            .unwrap_or(false)
        {
            config.directory.skip_tls_verify = true;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.tenants.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "At least one tenant must be configured".into(),
            ));
        }
        for tenant in &self.tenants {
            TenantId::parse(tenant.as_str())?;
        }

        self.auth.validate(&self.tenants)?;
        self.directory.validate()?;

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(crate::Error::InvalidArgument(format!(
                "Unknown log format: {} (expected pretty or json)",
                other
            ))),
        }
    }

    /// Configured tenant ids
    pub fn tenant_ids(&self) -> crate::Result<Vec<TenantId>> {
        self.tenants
            .iter()
            .map(|t| TenantId::parse(t.as_str()))
            .collect()
    }
}

fn default_tenants() -> Vec<String> {
    vec![crate::DEFAULT_TENANT.to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, or `memory` for a non-persistent store
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://keyhold.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

/// Bearer tokens accepted by the admin API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
}

impl AuthConfig {
    fn validate(&self, tenants: &[String]) -> crate::Result<()> {
        for token in &self.tokens {
            let digest = token.token_sha256.as_str();
            if digest.len() != 64 || hex::decode(digest).is_err() {
                return Err(crate::Error::InvalidArgument(format!(
                    "Token for '{}' must be a SHA-256 hex digest",
                    token.subject
                )));
            }
            if !tenants.iter().any(|t| t == &token.tenant) {
                return Err(crate::Error::InvalidArgument(format!(
                    "Token for '{}' refers to unknown tenant '{}'",
                    token.subject, token.tenant
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    /// Lower-case hex SHA-256 of the raw token
    pub token_sha256: String,
    pub subject: String,
    pub tenant: String,
    #[serde(default)]
    pub global_admin: bool,
}

/// Hex SHA-256 digest of a raw bearer token
pub fn token_digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Limits applied to directory previews
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryPreviewConfig {
    pub connect_timeout_secs: u64,
    pub bind_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// Entries returned per sample
    pub sample_size: usize,
    /// Server-side size limit per search
    pub max_entries: i32,
    /// Accept any server certificate
    pub skip_tls_verify: bool,
}

impl Default for DirectoryPreviewConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            bind_timeout_secs: 10,
            search_timeout_secs: 30,
            sample_size: crate::DEFAULT_SAMPLE_SIZE,
            max_entries: crate::DEFAULT_MAX_ENTRIES,
            skip_tls_verify: false,
        }
    }
}

impl DirectoryPreviewConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn bind_timeout(&self) -> Duration {
        Duration::from_secs(self.bind_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.connect_timeout_secs == 0
            || self.bind_timeout_secs == 0
            || self.search_timeout_secs == 0
        {
            return Err(crate::Error::InvalidArgument(
                "Directory timeouts must be at least one second".into(),
            ));
        }
        if self.max_entries < 1 {
            return Err(crate::Error::InvalidArgument(
                "directory.max_entries must be positive".into(),
            ));
        }
        if self.sample_size == 0 {
            return Err(crate::Error::InvalidArgument(
                "directory.sample_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
