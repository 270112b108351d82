//! Profile: an identity's membership in one tenant.
//!
//! Profiles, not identities, are what roles attach to. The same person can be
//! an owner in one tenant and a customer in another; the two contexts never
//! mix. At most one profile per identity carries the primary flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The relationship a profile represents within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
  /// Structural full access to the tenant; never reduced by roles.
  Owner,
  Employee,
  Customer,
}

impl ProfileKind {
  /// The discriminant string stored in the `kind` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Owner => "owner",
      Self::Employee => "employee",
      Self::Customer => "customer",
    }
  }
}

/// Membership lifecycle. Only active profiles resolve permissions or can be
/// switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
  Pending,
  Active,
  Suspended,
}

impl ProfileStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Active => "active",
      Self::Suspended => "suspended",
    }
  }
}

/// An identity's membership in one tenant, in one kind.
/// Unique per (identity, tenant, kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub profile_id:   Uuid,
  pub identity_id:  Uuid,
  pub tenant_id:    Uuid,
  pub kind:         ProfileKind,
  /// At most one profile per identity carries this flag (enforced by a
  /// partial unique index). It marks the default working context.
  pub is_primary:   bool,
  pub status:       ProfileStatus,
  pub created_at:   DateTime<Utc>,
  /// Set every time the profile transitions to `Active`; drives the
  /// most-recently-activated fallback in the selector.
  pub activated_at: Option<DateTime<Utc>>,
}

/// Input to [`crate::store::DirectoryStore::add_profile`].
/// The primary flag is never accepted from callers; the store decides it.
#[derive(Debug, Clone)]
pub struct NewProfile {
  pub identity_id: Uuid,
  pub tenant_id:   Uuid,
  pub kind:        ProfileKind,
  pub status:      ProfileStatus,
}
