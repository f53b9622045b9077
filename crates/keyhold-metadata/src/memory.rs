//! In-memory config store
//!
//! Records are shared as `Arc`s and swapped whole under the write lock, so a
//! reader holding an older record never sees it change.

use crate::traits::ConfigStore;
use async_trait::async_trait;
use keyhold_core::types::{ActiveAuthConfig, StoredAuthConfig, TenantId};
use keyhold_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
pub struct MemoryConfigStore {
    records: RwLock<HashMap<TenantId, Arc<StoredAuthConfig>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(tenant) {
            return Ok(false);
        }

        records.insert(
            tenant.clone(),
            Arc::new(StoredAuthConfig::provisioned(tenant.clone())),
        );
        info!("Provisioned tenant {}", tenant);
        Ok(true)
    }

    async fn get_stored_config(&self, tenant: &TenantId) -> Result<StoredAuthConfig> {
        let record = self
            .records
            .read()
            .await
            .get(tenant)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tenant {}", tenant)))?;

        Ok(record.as_ref().clone())
    }

    async fn save_config(
        &self,
        tenant: &TenantId,
        config: ActiveAuthConfig,
    ) -> Result<StoredAuthConfig> {
        config.validate()?;

        let mut records = self.records.write().await;
        let current = records
            .get(tenant)
            .ok_or_else(|| Error::NotFound(format!("tenant {}", tenant)))?;

        let next = current.replaced_with(config);
        records.insert(tenant.clone(), Arc::new(next.clone()));

        debug!(
            "Saved {} config for tenant {} (revision {})",
            next.config.kind(),
            tenant,
            next.revision
        );
        Ok(next)
    }
}
