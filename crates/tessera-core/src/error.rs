//! Error types for `tessera-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("identity not found: {0}")]
  IdentityNotFound(Uuid),

  #[error("tenant not found: {0}")]
  TenantNotFound(Uuid),

  #[error("profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("role not found: {0}")]
  RoleNotFound(Uuid),

  #[error("permission not found: {0}")]
  PermissionNotFound(Uuid),

  #[error("identity has no profile in any tenant")]
  NoProfile,

  #[error("profile {0} does not belong to this identity or is not active")]
  InvalidProfile(Uuid),

  /// A profile was presented for resolution against the wrong tenant.
  /// This is a caller bug, never a deny; it must not be swallowed.
  #[error("profile {profile_id} does not belong to tenant {tenant_id}")]
  TenantMismatch {
    tenant_id:  Uuid,
    profile_id: Uuid,
  },

  #[error("identity already has a {kind} profile in tenant {tenant_id}")]
  DuplicateProfile { tenant_id: Uuid, kind: String },

  #[error("role slug {slug:?} already exists in tenant {tenant_id}")]
  DuplicateRole { tenant_id: Uuid, slug: String },

  #[error("permission ({resource}, {action}) already exists in this tenant")]
  DuplicatePermission { resource: String, action: String },

  #[error("role {0} is a system role and cannot be modified or deleted")]
  SystemRoleImmutable(Uuid),

  #[error("wildcard permissions cannot be stored; owner access is structural")]
  WildcardForbidden,

  #[error("role {role_id} belongs to a different tenant than profile {profile_id}")]
  CrossTenantRole { role_id: Uuid, profile_id: Uuid },

  #[error(
    "permission {permission_id} belongs to a different tenant than role {role_id}"
  )]
  CrossTenantPermission {
    role_id:       Uuid,
    permission_id: Uuid,
  },

  #[error("email already registered: {0}")]
  EmailTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
