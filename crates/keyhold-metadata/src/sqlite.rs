//! SQLite config store

use crate::traits::ConfigStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyhold_core::types::{ActiveAuthConfig, ProviderKind, StoredAuthConfig, TenantId};
use keyhold_core::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        store.init().await?;

        info!("SQLite config store ready");
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        // payload holds the kind-specific JSON document, NULL for Internal
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_configs (
                tenant_id TEXT PRIMARY KEY,
                provider_kind TEXT NOT NULL,
                payload TEXT,
                revision INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO auth_configs (tenant_id, provider_kind, payload, revision, updated_at)
            VALUES (?, ?, NULL, 0, ?)
            "#,
        )
        .bind(tenant.as_str())
        .bind(ProviderKind::Internal.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let created = result.rows_affected() == 1;
        if created {
            info!("Provisioned tenant {}", tenant);
        }
        Ok(created)
    }

    async fn get_stored_config(&self, tenant: &TenantId) -> Result<StoredAuthConfig> {
        let row: Option<(String, Option<String>, i64, String)> = sqlx::query_as(
            r#"
            SELECT provider_kind, payload, revision, updated_at
            FROM auth_configs WHERE tenant_id = ?
            "#,
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let (kind, payload, revision, updated_at) =
            row.ok_or_else(|| Error::NotFound(format!("tenant {}", tenant)))?;

        let kind: ProviderKind = kind
            .parse()
            .map_err(|e| Error::DatabaseError(format!("corrupt record for {}: {}", tenant, e)))?;

        let payload = payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(|e| Error::DatabaseError(format!("corrupt payload for {}: {}", tenant, e)))?;

        let config = ActiveAuthConfig::from_parts(kind, payload)
            .map_err(|e| Error::DatabaseError(format!("corrupt payload for {}: {}", tenant, e)))?;

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::DatabaseError(format!("corrupt timestamp for {}: {}", tenant, e)))?;

        Ok(StoredAuthConfig {
            tenant_id: tenant.clone(),
            config,
            revision,
            updated_at,
        })
    }

    async fn save_config(
        &self,
        tenant: &TenantId,
        config: ActiveAuthConfig,
    ) -> Result<StoredAuthConfig> {
        config.validate()?;

        let payload = config
            .payload()?
            .map(|p| p.to_string());
        let updated_at = Utc::now();

        // Single-statement replace; SQLite serializes writers
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE auth_configs
            SET provider_kind = ?, payload = ?, revision = revision + 1, updated_at = ?
            WHERE tenant_id = ?
            RETURNING revision
            "#,
        )
        .bind(config.kind().as_str())
        .bind(payload)
        .bind(updated_at.to_rfc3339())
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StoreWrite(e.to_string()))?;

        let (revision,) = row.ok_or_else(|| Error::NotFound(format!("tenant {}", tenant)))?;

        debug!(
            "Saved {} config for tenant {} (revision {})",
            config.kind(),
            tenant,
            revision
        );

        Ok(StoredAuthConfig {
            tenant_id: tenant.clone(),
            config,
            revision,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SqliteConfigStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("keyhold.db").display());
        SqliteConfigStore::new(&url, 5).await.unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let dir = TempDir::new().unwrap();
        testing::lifecycle(Arc::new(open(&dir).await)).await;
    }

    #[tokio::test]
    async fn test_rejects_invalid_and_unknown() {
        let dir = TempDir::new().unwrap();
        testing::rejects_invalid_and_unknown(Arc::new(open(&dir).await)).await;
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_atomic() {
        let dir = TempDir::new().unwrap();
        testing::concurrent_saves_are_atomic(Arc::new(open(&dir).await)).await;
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let tenant = TenantId::parse("acme").unwrap();

        {
            let store = open(&dir).await;
            store.provision_tenant(&tenant).await.unwrap();
            store
                .save_config(&tenant, ActiveAuthConfig::Directory(testing::directory("a")))
                .await
                .unwrap();
        }

        let store = open(&dir).await;
        assert!(!store.provision_tenant(&tenant).await.unwrap());

        let stored = store.get_stored_config(&tenant).await.unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(
            stored.config,
            ActiveAuthConfig::Directory(testing::directory("a"))
        );
    }
}
