//! Per-tenant seed data: the baseline permission catalog and system roles.
//!
//! Seeding runs inside the tenant-creation transaction and is idempotent. It
//! looks rows up by their natural keys before inserting, so running it again
//! against an already-seeded tenant changes nothing.

use rusqlite::Transaction;
use uuid::Uuid;

use crate::encode::encode_uuid;

/// The catalog every tenant starts with. Admin pairs first; the rest cover
/// the product's day-one resources.
pub const BASELINE_PERMISSIONS: &[(&str, &str)] = &[
  ("roles", "manage"),
  ("members", "manage"),
  ("customers", "read"),
  ("customers", "create"),
  ("customers", "update"),
  ("invoices", "read"),
  ("invoices", "create"),
  ("invoices", "void"),
  ("jobs", "read"),
  ("jobs", "schedule"),
  ("jobs", "complete"),
  ("reports", "read"),
];

pub struct SystemRole {
  pub name:   &'static str,
  pub slug:   &'static str,
  pub grants: &'static [(&'static str, &'static str)],
}

/// Roles created with every tenant. Immutable after creation.
pub const SYSTEM_ROLES: &[SystemRole] = &[
  SystemRole {
    name:   "Administrator",
    slug:   "administrator",
    grants: &[("roles", "manage"), ("members", "manage"), ("reports", "read")],
  },
  SystemRole {
    name:   "Manager",
    slug:   "manager",
    grants: &[
      ("customers", "read"),
      ("customers", "create"),
      ("customers", "update"),
      ("invoices", "read"),
      ("invoices", "create"),
      ("invoices", "void"),
      ("jobs", "read"),
      ("jobs", "schedule"),
      ("jobs", "complete"),
      ("reports", "read"),
    ],
  },
  SystemRole {
    name:   "Support Agent",
    slug:   "support-agent",
    grants: &[
      ("customers", "read"),
      ("customers", "update"),
      ("invoices", "read"),
      ("jobs", "read"),
    ],
  },
  SystemRole {
    name:   "Read Only",
    slug:   "read-only",
    grants: &[
      ("customers", "read"),
      ("invoices", "read"),
      ("jobs", "read"),
      ("reports", "read"),
    ],
  },
];

/// Insert the baseline catalog and system roles for `tenant_id`.
/// Must run inside the caller's transaction.
pub fn seed_tenant(
  tx: &Transaction<'_>,
  tenant_id: &str,
  now: &str,
) -> rusqlite::Result<()> {
  for (resource, action) in BASELINE_PERMISSIONS {
    if permission_id(tx, tenant_id, resource, action)?.is_none() {
      tx.execute(
        "INSERT INTO permissions (permission_id, tenant_id, resource, action)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
          encode_uuid(Uuid::new_v4()),
          tenant_id,
          resource,
          action
        ],
      )?;
    }
  }

  for role in SYSTEM_ROLES {
    let role_id = match role_id_by_slug(tx, tenant_id, role.slug)? {
      Some(existing) => existing,
      None => {
        let id = encode_uuid(Uuid::new_v4());
        tx.execute(
          "INSERT INTO roles (role_id, tenant_id, name, slug, is_system, created_at)
           VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![id, tenant_id, role.name, role.slug, now],
        )?;
        id
      }
    };

    for (resource, action) in role.grants {
      // The catalog rows above are inserted first, so this always finds one.
      if let Some(pid) = permission_id(tx, tenant_id, resource, action)? {
        tx.execute(
          "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
           VALUES (?1, ?2)",
          rusqlite::params![role_id, pid],
        )?;
      }
    }
  }

  Ok(())
}

fn permission_id(
  tx: &Transaction<'_>,
  tenant_id: &str,
  resource: &str,
  action: &str,
) -> rusqlite::Result<Option<String>> {
  use rusqlite::OptionalExtension as _;
  tx.query_row(
    "SELECT permission_id FROM permissions
     WHERE tenant_id = ?1 AND resource = ?2 AND action = ?3",
    rusqlite::params![tenant_id, resource, action],
    |row| row.get(0),
  )
  .optional()
}

fn role_id_by_slug(
  tx: &Transaction<'_>,
  tenant_id: &str,
  slug: &str,
) -> rusqlite::Result<Option<String>> {
  use rusqlite::OptionalExtension as _;
  tx.query_row(
    "SELECT role_id FROM roles WHERE tenant_id = ?1 AND slug = ?2",
    rusqlite::params![tenant_id, slug],
    |row| row.get(0),
  )
  .optional()
}
