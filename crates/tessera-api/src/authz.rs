//! Capability checks for mutating endpoints.
//!
//! Reads are open to any authenticated identity; anything that changes a
//! tenant's data passes through [`require_in_tenant`] first.

use tessera_core::{identity::Identity, resolver, store::DirectoryStore};
use uuid::Uuid;

use crate::error::ApiError;

/// Require `(resource, action)` for `identity` within `tenant_id`.
///
/// Any active profile the identity holds in the tenant may satisfy the
/// check; owners pass structurally through the resolver's bypass.
pub async fn require_in_tenant<S>(
  store: &S,
  identity: &Identity,
  tenant_id: Uuid,
  resource: &str,
  action: &str,
) -> Result<(), ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let tenant = store
    .get_tenant(tenant_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("tenant {tenant_id} not found")))?;

  let profiles = store
    .list_profiles(Some(identity.identity_id), Some(tenant_id))
    .await
    .map_err(ApiError::from_store)?;

  for profile in profiles.iter().filter(|p| p.status.is_active()) {
    let grants = store
      .grants_for_profile(profile.profile_id)
      .await
      .map_err(ApiError::from_store)?;
    let set = resolver::resolve(&tenant, profile, &grants)?;
    if set.allows(resource, action) {
      return Ok(());
    }
  }

  Err(ApiError::Forbidden(format!(
    "requires the `{resource}:{action}` permission in tenant {tenant_id}"
  )))
}

#[cfg(test)]
mod tests {
  use tessera_core::{
    identity::NewIdentity,
    profile::{NewProfile, ProfileKind, ProfileStatus},
    tenant::NewTenant,
  };
  use tessera_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn owner_passes_member_without_grant_does_not() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let owner = store
      .add_identity(NewIdentity {
        email:         "owner@example.com".into(),
        display_name:  "Owner".into(),
        password_hash: "x".into(),
      })
      .await
      .unwrap();
    let member = store
      .add_identity(NewIdentity {
        email:         "member@example.com".into(),
        display_name:  "Member".into(),
        password_hash: "x".into(),
      })
      .await
      .unwrap();
    let tenant = store
      .add_tenant(NewTenant {
        name:              "Acme".into(),
        slug:              "acme".into(),
        owner_identity_id: owner.identity_id,
      })
      .await
      .unwrap();
    store
      .add_profile(NewProfile {
        identity_id: member.identity_id,
        tenant_id:   tenant.tenant_id,
        kind:        ProfileKind::Employee,
        status:      ProfileStatus::Active,
      })
      .await
      .unwrap();

    assert!(
      require_in_tenant(&store, &owner, tenant.tenant_id, "roles", "manage")
        .await
        .is_ok()
    );
    assert!(matches!(
      require_in_tenant(&store, &member, tenant.tenant_id, "roles", "manage")
        .await,
      Err(ApiError::Forbidden(_))
    ));
    // No profile at all in the tenant is the same refusal.
    let outsider = store
      .add_identity(NewIdentity {
        email:         "out@example.com".into(),
        display_name:  "Out".into(),
        password_hash: "x".into(),
      })
      .await
      .unwrap();
    assert!(matches!(
      require_in_tenant(&store, &outsider, tenant.tenant_id, "roles", "manage")
        .await,
      Err(ApiError::Forbidden(_))
    ));
  }
}
