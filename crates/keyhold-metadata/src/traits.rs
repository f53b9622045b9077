//! Config store trait
//!
//! Defines the interface for per-tenant authentication configuration storage.
//! Implementations exist for SQLite and for process memory.

use async_trait::async_trait;
use keyhold_core::types::{ActiveAuthConfig, StoredAuthConfig, TenantId};
use keyhold_core::Result;

/// Persisted authentication configuration, one record per tenant.
///
/// A save replaces the whole record in one step: readers see either the
/// previous record or the new one. Concurrent saves to one tenant are
/// serialized and the last writer wins.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Create the tenant with the `Internal` default if it does not exist.
    /// Returns whether a record was created.
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<bool>;

    /// Current record with its revision, `NotFound` for unknown tenants
    async fn get_stored_config(&self, tenant: &TenantId) -> Result<StoredAuthConfig>;

    /// Validate and replace the tenant's record
    async fn save_config(
        &self,
        tenant: &TenantId,
        config: ActiveAuthConfig,
    ) -> Result<StoredAuthConfig>;

    async fn get_active_config(&self, tenant: &TenantId) -> Result<ActiveAuthConfig> {
        Ok(self.get_stored_config(tenant).await?.config)
    }
}
