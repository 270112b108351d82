//! Permission resolution: pure RBAC over pre-fetched rows.
//!
//! The resolver never touches storage. Callers load the tenant, the profile,
//! and the deduped grants reachable through the profile's roles, then call
//! [`resolve`]. Keeping it pure makes every authorization decision trivially
//! testable and independent of the backend.

use crate::{
  Error, Result,
  permission_set::PermissionSet,
  profile::{Profile, ProfileKind},
  role::Grant,
  tenant::Tenant,
};

/// Resolve the permission set for `profile` acting within `tenant`.
///
/// Rules, in order:
/// 1. A profile presented against the wrong tenant is a contract violation,
///    not an empty result: it returns [`Error::TenantMismatch`] so the bug
///    surfaces loudly instead of silently denying.
/// 2. Owners bypass roles entirely: a profile of kind `Owner`, or one whose
///    identity is the tenant's recorded owner, gets [`PermissionSet::Universal`].
/// 3. Everyone else gets exactly the union of their role grants. No roles, or
///    roles with no permissions, resolve to the empty set, never an error.
pub fn resolve(
  tenant: &Tenant,
  profile: &Profile,
  grants: &[Grant],
) -> Result<PermissionSet> {
  if profile.tenant_id != tenant.tenant_id {
    return Err(Error::TenantMismatch {
      tenant_id:  tenant.tenant_id,
      profile_id: profile.profile_id,
    });
  }

  if profile.kind == ProfileKind::Owner
    || profile.identity_id == tenant.owner_identity_id
  {
    return Ok(PermissionSet::Universal);
  }

  Ok(PermissionSet::from_grants(grants.iter().cloned()))
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::profile::ProfileStatus;

  fn tenant(owner: Uuid) -> Tenant {
    Tenant {
      tenant_id:         Uuid::new_v4(),
      name:              "Acme Plumbing".into(),
      slug:              "acme-plumbing".into(),
      owner_identity_id: owner,
      created_at:        Utc::now(),
    }
  }

  fn profile(identity: Uuid, tenant: &Tenant, kind: ProfileKind) -> Profile {
    Profile {
      profile_id:   Uuid::new_v4(),
      identity_id:  identity,
      tenant_id:    tenant.tenant_id,
      kind,
      is_primary:   false,
      status:       ProfileStatus::Active,
      created_at:   Utc::now(),
      activated_at: Some(Utc::now()),
    }
  }

  #[test]
  fn owner_kind_resolves_universal() {
    let owner = Uuid::new_v4();
    let t = tenant(owner);
    let p = profile(owner, &t, ProfileKind::Owner);
    let set = resolve(&t, &p, &[]).unwrap();
    assert!(set.is_universal());
  }

  #[test]
  fn recorded_owner_bypasses_even_without_owner_kind() {
    let owner = Uuid::new_v4();
    let t = tenant(owner);
    let p = profile(owner, &t, ProfileKind::Employee);
    let set = resolve(&t, &p, &[]).unwrap();
    assert!(set.is_universal());
  }

  #[test]
  fn employee_gets_union_of_grants() {
    let t = tenant(Uuid::new_v4());
    let p = profile(Uuid::new_v4(), &t, ProfileKind::Employee);
    let grants = vec![
      Grant::new("jobs", "read"),
      Grant::new("jobs", "schedule"),
      Grant::new("invoices", "read"),
    ];
    let set = resolve(&t, &p, &grants).unwrap();
    assert!(set.allows("jobs", "schedule"));
    assert!(set.allows("invoices", "read"));
    assert!(!set.allows("invoices", "void"));
    assert!(!set.is_universal());
  }

  #[test]
  fn no_roles_fails_closed_to_empty() {
    let t = tenant(Uuid::new_v4());
    let p = profile(Uuid::new_v4(), &t, ProfileKind::Customer);
    let set = resolve(&t, &p, &[]).unwrap();
    assert!(set.is_empty());
    assert!(!set.allows("jobs", "read"));
  }

  #[test]
  fn wrong_tenant_is_a_loud_error() {
    let t = tenant(Uuid::new_v4());
    let other = tenant(Uuid::new_v4());
    let p = profile(Uuid::new_v4(), &other, ProfileKind::Employee);
    let err = resolve(&t, &p, &[]).unwrap_err();
    assert!(matches!(err, Error::TenantMismatch { .. }));
  }

  #[test]
  fn owner_bypass_never_crosses_tenants() {
    // Alice owns tenant A but is a plain customer in tenant B.
    let alice = Uuid::new_v4();
    let tenant_b = tenant(Uuid::new_v4());
    let p = profile(alice, &tenant_b, ProfileKind::Customer);
    let set = resolve(&tenant_b, &p, &[Grant::new("orders", "read")]).unwrap();
    assert!(!set.is_universal());
    assert!(set.allows("orders", "read"));
    assert!(!set.allows("orders", "delete"));
  }
}
