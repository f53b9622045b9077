//! Authentication configuration service
//!
//! Every operation takes the caller explicitly and checks privilege before
//! touching the store or the directory.

use keyhold_auth::DirectoryPreviewer;
use keyhold_core::types::{
    ActiveAuthConfig, Caller, DirectoryConfig, PreviewResult, StoredAuthConfig, TenantId,
};
use keyhold_core::{Error, Result};
use keyhold_metadata::ConfigStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AuthConfigService {
    store: Arc<dyn ConfigStore>,
    previewer: Arc<dyn DirectoryPreviewer>,
}

impl AuthConfigService {
    pub fn new(store: Arc<dyn ConfigStore>, previewer: Arc<dyn DirectoryPreviewer>) -> Self {
        Self { store, previewer }
    }

    /// `PermissionDenied` unless `caller` is a global administrator of `tenant`
    pub fn authorize(&self, caller: &Caller, tenant: &TenantId) -> Result<()> {
        if caller.is_admin_of(tenant) {
            Ok(())
        } else {
            warn!(
                subject = %caller.subject,
                tenant = %tenant,
                "Rejected non-administrator"
            );
            Err(Error::PermissionDenied)
        }
    }

    pub async fn get_active_config(
        &self,
        caller: &Caller,
        tenant: &TenantId,
    ) -> Result<ActiveAuthConfig> {
        self.authorize(caller, tenant)?;
        self.store.get_active_config(tenant).await
    }

    /// Active configuration with its revision
    pub async fn get_stored_config(
        &self,
        caller: &Caller,
        tenant: &TenantId,
    ) -> Result<StoredAuthConfig> {
        self.authorize(caller, tenant)?;
        self.store.get_stored_config(tenant).await
    }

    /// Run `candidate` against its directory server. Nothing is stored.
    ///
    /// An empty `BindPassword` is filled from the tenant's active directory
    /// configuration when the bind target is unchanged, so the active
    /// settings can be previewed as read.
    pub async fn preview_directory(
        &self,
        caller: &Caller,
        candidate: &DirectoryConfig,
    ) -> Result<PreviewResult> {
        self.authorize(caller, &caller.tenant)?;

        let candidate = self
            .with_stored_password(&caller.tenant, candidate.clone())
            .await?;

        debug!(
            subject = %caller.subject,
            server = %candidate.url(),
            "Previewing directory settings"
        );
        self.previewer.preview(&candidate).await
    }

    /// Validate and persist `config` as the tenant's active provider.
    ///
    /// A directory payload with an empty `BindPassword` keeps the stored
    /// password, since reads never return it, as long as the bind target is
    /// unchanged. Otherwise the empty password fails validation.
    pub async fn save_config(
        &self,
        caller: &Caller,
        tenant: &TenantId,
        config: ActiveAuthConfig,
    ) -> Result<StoredAuthConfig> {
        self.authorize(caller, tenant)?;

        let config = match config {
            ActiveAuthConfig::Directory(incoming) => {
                ActiveAuthConfig::Directory(self.with_stored_password(tenant, incoming).await?)
            }
            other => other,
        };

        let saved = self.store.save_config(tenant, config).await?;
        info!(
            subject = %caller.subject,
            tenant = %tenant,
            provider = %saved.config.kind(),
            revision = saved.revision,
            "Authentication provider saved"
        );
        Ok(saved)
    }

    /// Fill an empty bind password from the active directory configuration.
    /// The stored secret is only ever sent to the server and account it was
    /// entered for.
    async fn with_stored_password(
        &self,
        tenant: &TenantId,
        mut candidate: DirectoryConfig,
    ) -> Result<DirectoryConfig> {
        if !candidate.bind_password.is_empty() {
            return Ok(candidate);
        }

        let current = self.store.get_active_config(tenant).await?;
        match current.directory() {
            Some(stored) if stored.same_bind_target(&candidate) => {
                debug!(tenant = %tenant, "Using stored bind password");
                candidate.bind_password = stored.bind_password.clone();
            }
            Some(_) => {
                debug!(
                    tenant = %tenant,
                    server = %candidate.url(),
                    "Bind target changed; stored password not reused"
                );
            }
            None => {}
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePreviewer;
    use keyhold_core::types::{EncryptionType, ExternalIdpConfig, Secret};
    use keyhold_metadata::MemoryConfigStore;

    fn tenant() -> TenantId {
        TenantId::parse("default").unwrap()
    }

    fn planetexpress(password: &str) -> DirectoryConfig {
        DirectoryConfig {
            server_host: "ldap.planetexpress.com".to_string(),
            server_port: 389,
            encryption_type: EncryptionType::StartTls,
            base_dn: "ou=people,dc=planetexpress,dc=com".to_string(),
            bind_dn: "cn=admin,dc=planetexpress,dc=com".to_string(),
            bind_password: Secret::new(password),
            user_filter: "(objectClass=inetOrgPerson)".to_string(),
            ..Default::default()
        }
    }

    async fn service_with(previewer: Arc<FakePreviewer>) -> AuthConfigService {
        let store = Arc::new(MemoryConfigStore::new());
        store.provision_tenant(&tenant()).await.unwrap();
        AuthConfigService::new(store, previewer)
    }

    #[tokio::test]
    async fn test_fresh_tenant_is_internal() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        let active = service.get_active_config(&admin, &tenant()).await.unwrap();
        assert_eq!(active, ActiveAuthConfig::Internal);
    }

    #[tokio::test]
    async fn test_non_admin_is_denied_everywhere() {
        let previewer = Arc::new(FakePreviewer::default());
        let service = service_with(previewer.clone()).await;
        let member = Caller::member("fry", tenant());

        let err = service.get_active_config(&member, &tenant()).await.unwrap_err();
        assert_eq!(err.code(), "PermissionDenied");

        let err = service
            .preview_directory(&member, &planetexpress("GoodNewsEveryone"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PermissionDenied");
        assert_eq!(previewer.calls(), 0);

        let err = service
            .save_config(&member, &tenant(), ActiveAuthConfig::Internal)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PermissionDenied");

        let stored = service
            .get_stored_config(&Caller::admin("hermes", tenant()), &tenant())
            .await
            .unwrap();
        assert_eq!(stored.revision, 0);
    }

    #[tokio::test]
    async fn test_admin_of_other_tenant_is_denied() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let outsider = Caller::admin("mom", TenantId::parse("momcorp").unwrap());

        let err = service
            .get_active_config(&outsider, &tenant())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PermissionDenied");
    }

    #[tokio::test]
    async fn test_preview_does_not_persist() {
        let previewer = Arc::new(FakePreviewer::default());
        let service = service_with(previewer.clone()).await;
        let admin = Caller::admin("hermes", tenant());

        let result = service
            .preview_directory(&admin, &planetexpress("GoodNewsEveryone"))
            .await
            .unwrap();
        assert_eq!(result.user_count, 1);
        assert_eq!(result.sample_users[0].email, "fry@planetexpress.com");

        let again = service
            .preview_directory(&admin, &planetexpress("GoodNewsEveryone"))
            .await
            .unwrap();
        assert_eq!(result.user_count, again.user_count);
        assert_eq!(previewer.calls(), 2);
        assert_eq!(previewer.last_password().as_deref(), Some("GoodNewsEveryone"));

        let active = service.get_active_config(&admin, &tenant()).await.unwrap();
        assert_eq!(active, ActiveAuthConfig::Internal);
    }

    #[tokio::test]
    async fn test_preview_errors_pass_through() {
        let service = service_with(Arc::new(FakePreviewer::rejecting())).await;
        let admin = Caller::admin("hermes", tenant());

        let err = service
            .preview_directory(&admin, &planetexpress("BadNewsEveryone"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AuthError");
        assert_eq!(err.http_status(), 502);
    }

    #[tokio::test]
    async fn test_save_then_read() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        let saved = service
            .save_config(
                &admin,
                &tenant(),
                ActiveAuthConfig::Directory(planetexpress("GoodNewsEveryone")),
            )
            .await
            .unwrap();
        assert_eq!(saved.revision, 1);

        let active = service.get_active_config(&admin, &tenant()).await.unwrap();
        assert_eq!(active.directory().unwrap().server_host, "ldap.planetexpress.com");
    }

    #[tokio::test]
    async fn test_invalid_save_keeps_previous() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        let mut broken = planetexpress("GoodNewsEveryone");
        broken.user_filter = "(&)".to_string();

        let err = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(broken))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");
        assert!(err.field_errors().unwrap().iter().any(|f| f.field == "UserFilter"));

        let active = service.get_active_config(&admin, &tenant()).await.unwrap();
        assert_eq!(active, ActiveAuthConfig::Internal);
    }

    #[tokio::test]
    async fn test_empty_password_keeps_stored_one() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        service
            .save_config(
                &admin,
                &tenant(),
                ActiveAuthConfig::Directory(planetexpress("GoodNewsEveryone")),
            )
            .await
            .unwrap();

        let mut edited = planetexpress("");
        edited.base_dn = "dc=planetexpress,dc=com".to_string();
        let saved = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(edited))
            .await
            .unwrap();

        let directory = saved.config.directory().unwrap();
        assert_eq!(directory.base_dn, "dc=planetexpress,dc=com");
        assert_eq!(directory.bind_password.expose(), "GoodNewsEveryone");
        assert_eq!(saved.revision, 2);
    }

    #[tokio::test]
    async fn test_empty_password_without_stored_directory_is_rejected() {
        let service = service_with(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        service
            .save_config(
                &admin,
                &tenant(),
                ActiveAuthConfig::ExternalIdp(ExternalIdpConfig(serde_json::json!({
                    "url": "https://sso.planetexpress.com"
                }))),
            )
            .await
            .unwrap();

        let err = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(planetexpress("")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");
        assert!(err.field_errors().unwrap().iter().any(|f| f.field == "BindPassword"));
    }

    async fn with_stored_directory(previewer: Arc<FakePreviewer>) -> AuthConfigService {
        let service = service_with(previewer).await;
        service
            .save_config(
                &Caller::admin("hermes", tenant()),
                &tenant(),
                ActiveAuthConfig::Directory(planetexpress("GoodNewsEveryone")),
            )
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_changed_bind_target_does_not_inherit_password() {
        let service = with_stored_directory(Arc::new(FakePreviewer::default())).await;
        let admin = Caller::admin("hermes", tenant());

        let mut moved = planetexpress("");
        moved.server_host = "ldap.momcorp.com".to_string();
        let err = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(moved))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");
        assert!(err.field_errors().unwrap().iter().any(|f| f.field == "BindPassword"));

        let mut other_port = planetexpress("");
        other_port.server_port = 1389;
        let err = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(other_port))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");

        let mut other_account = planetexpress("");
        other_account.bind_dn = "cn=zoidberg,dc=planetexpress,dc=com".to_string();
        let err = service
            .save_config(&admin, &tenant(), ActiveAuthConfig::Directory(other_account))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");

        let stored = service.get_stored_config(&admin, &tenant()).await.unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(
            stored.config.directory().unwrap().server_host,
            "ldap.planetexpress.com"
        );
    }

    #[tokio::test]
    async fn test_preview_of_active_config_uses_stored_password() {
        let previewer = Arc::new(FakePreviewer::default());
        let service = with_stored_directory(previewer.clone()).await;
        let admin = Caller::admin("hermes", tenant());

        let active = service.get_active_config(&admin, &tenant()).await.unwrap();
        let as_read = active.directory().unwrap().redacted();

        let result = service.preview_directory(&admin, &as_read).await.unwrap();
        assert_eq!(result.user_count, 1);
        assert_eq!(previewer.last_password().as_deref(), Some("GoodNewsEveryone"));

        let stored = service.get_stored_config(&admin, &tenant()).await.unwrap();
        assert_eq!(stored.revision, 1);
    }

    #[tokio::test]
    async fn test_preview_against_new_server_needs_password() {
        let previewer = Arc::new(FakePreviewer::default());
        let service = with_stored_directory(previewer.clone()).await;
        let admin = Caller::admin("hermes", tenant());

        let mut moved = planetexpress("");
        moved.server_host = "ldap.momcorp.com".to_string();
        let err = service.preview_directory(&admin, &moved).await.unwrap_err();

        assert_eq!(err.code(), "ValidationError");
        assert!(err.field_errors().unwrap().iter().any(|f| f.field == "BindPassword"));
        assert_eq!(previewer.calls(), 0);
    }
}
