//! Caller identity

use super::TenantId;
use serde::{Deserialize, Serialize};

/// Identity and privilege of whoever invokes a service operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub subject: String,
    pub tenant: TenantId,
    pub global_admin: bool,
}

impl Caller {
    pub fn admin(subject: impl Into<String>, tenant: TenantId) -> Self {
        Self {
            subject: subject.into(),
            tenant,
            global_admin: true,
        }
    }

    pub fn member(subject: impl Into<String>, tenant: TenantId) -> Self {
        Self {
            subject: subject.into(),
            tenant,
            global_admin: false,
        }
    }

    /// Holds global administrator privilege in `tenant`
    pub fn is_admin_of(&self, tenant: &TenantId) -> bool {
        self.global_admin && &self.tenant == tenant
    }
}
