//! Roles and the permission catalog.
//!
//! A permission is a plain `(resource, action)` pair registered per tenant; a
//! role is a named bundle of catalog entries. Neither crosses tenant
//! boundaries, and neither carries wildcards: full access is the structural
//! owner bypass, not a catalog row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// A named bundle of permissions within one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
  pub role_id:    Uuid,
  pub tenant_id:  Uuid,
  pub name:       String,
  /// URL-safe handle, unique per tenant.
  pub slug:       String,
  /// Seeded at tenant creation; system roles cannot be deleted.
  pub is_system:  bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::add_role`].
#[derive(Debug, Clone)]
pub struct NewRole {
  pub tenant_id: Uuid,
  pub name:      String,
  pub slug:      String,
  pub is_system: bool,
}

/// Partial update for a role. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRole {
  pub name: Option<String>,
  pub slug: Option<String>,
}

// ─── Permission catalog ──────────────────────────────────────────────────────

/// One registered `(resource, action)` pair in a tenant's catalog.
/// Unique per (tenant, resource, action).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEntry {
  pub permission_id: Uuid,
  pub tenant_id:     Uuid,
  /// Noun, e.g. `customers`, `invoices`.
  pub resource:      String,
  /// Verb, e.g. `read`, `create`, `approve`.
  pub action:        String,
}

/// Input to [`crate::store::DirectoryStore::add_permission`].
#[derive(Debug, Clone)]
pub struct NewPermission {
  pub tenant_id: Uuid,
  pub resource:  String,
  pub action:    String,
}

/// A bare `(resource, action)` pair as it reaches the resolver: the deduped
/// union of everything the profile's roles grant, with catalog ids shed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
  pub resource: String,
  pub action:   String,
}

impl Grant {
  pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
    Self { resource: resource.into(), action: action.into() }
  }
}

/// The legacy wildcard token. Rejected on write; owner access is structural.
pub const WILDCARD: &str = "*";

/// Whether a resource or action string may enter the catalog.
pub fn is_storable_token(token: &str) -> bool {
  !token.is_empty() && token != WILDCARD
}

/// Derive a URL-safe slug from a display name: lowercase alphanumerics with
/// single dashes, e.g. "Support Agent" becomes "support-agent".
pub fn slugify(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  let mut last_dash = true;
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
      last_dash = false;
    } else if !last_dash {
      out.push('-');
      last_dash = true;
    }
  }
  while out.ends_with('-') {
    out.pop();
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slugify_basics() {
    assert_eq!(slugify("Support Agent"), "support-agent");
    assert_eq!(slugify("  Store  Manager  "), "store-manager");
    assert_eq!(slugify("Tier-2 / Billing"), "tier-2-billing");
    assert_eq!(slugify("ALREADY-GOOD"), "already-good");
  }

  #[test]
  fn wildcard_is_not_storable() {
    assert!(!is_storable_token("*"));
    assert!(!is_storable_token(""));
    assert!(is_storable_token("customers"));
  }
}
