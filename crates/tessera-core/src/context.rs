//! The per-request authorization context.
//!
//! Assembled once after authentication, then passed by value to whatever
//! handles the request. Handlers and tools receive the already-resolved
//! context as an argument; nothing reaches back into identity or session
//! state to re-derive authority mid-request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result, permission_set::PermissionSet, profile::ProfileKind,
  resolver, role::Grant, tenant::Tenant,
};

/// Everything a handler needs to make authorization decisions, resolved
/// up front. Immutable for the lifetime of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
  pub identity_id:    Uuid,
  pub tenant_id:      Uuid,
  pub profile_kind:   ProfileKind,
  pub permission_set: PermissionSet,
}

impl AuthContext {
  /// Resolve `profile`'s permissions in `tenant` and package the result.
  /// The identity is implied by the profile.
  pub fn assemble(
    tenant: &Tenant,
    profile: &crate::profile::Profile,
    grants: &[Grant],
  ) -> Result<Self> {
    let permission_set = resolver::resolve(tenant, profile, grants)?;
    Ok(Self {
      identity_id: profile.identity_id,
      tenant_id: tenant.tenant_id,
      profile_kind: profile.kind,
      permission_set,
    })
  }

  pub fn allows(&self, resource: &str, action: &str) -> bool {
    self.permission_set.allows(resource, action)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::profile::{Profile, ProfileStatus};

  #[test]
  fn assemble_carries_profile_and_tenant_through() {
    let owner = Uuid::new_v4();
    let identity = Uuid::new_v4();
    let tenant = Tenant {
      tenant_id:         Uuid::new_v4(),
      name:              "Acme".into(),
      slug:              "acme".into(),
      owner_identity_id: owner,
      created_at:        Utc::now(),
    };
    let profile = Profile {
      profile_id:   Uuid::new_v4(),
      identity_id:  identity,
      tenant_id:    tenant.tenant_id,
      kind:         ProfileKind::Employee,
      is_primary:   true,
      status:       ProfileStatus::Active,
      created_at:   Utc::now(),
      activated_at: Some(Utc::now()),
    };
    let ctx =
      AuthContext::assemble(&tenant, &profile, &[Grant::new("jobs", "read")])
        .unwrap();
    assert_eq!(ctx.identity_id, identity);
    assert_eq!(ctx.tenant_id, tenant.tenant_id);
    assert_eq!(ctx.profile_kind, ProfileKind::Employee);
    assert!(ctx.allows("jobs", "read"));
    assert!(!ctx.allows("jobs", "delete"));
  }
}
