//! Tenant: an isolated authorization domain.
//!
//! Every role, permission, and profile belongs to exactly one tenant. Nothing
//! resolved in one tenant is ever visible from another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated authorization domain (a business unit, a workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
  pub tenant_id:         Uuid,
  pub name:              String,
  /// URL-safe handle, unique across the directory.
  pub slug:              String,
  /// The identity that owns this tenant. Owners bypass role resolution
  /// entirely; this column is the source of truth for that bypass.
  pub owner_identity_id: Uuid,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::add_tenant`].
///
/// Creating a tenant also creates the owner's profile and seeds the tenant's
/// permission catalog, atomically.
#[derive(Debug, Clone)]
pub struct NewTenant {
  pub name:              String,
  pub slug:              String,
  pub owner_identity_id: Uuid,
}
