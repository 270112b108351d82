//! [`SqliteStore`], the SQLite implementation of [`DirectoryStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tessera_core::{
  Error as CoreError,
  chat::ChatIdentity,
  identity::{Identity, NewIdentity, normalize_email},
  profile::{NewProfile, Profile, ProfileStatus},
  role::{
    Grant, NewPermission, NewRole, PermissionEntry, Role, UpdateRole,
    is_storable_token,
  },
  store::DirectoryStore,
  tenant::{NewTenant, Tenant},
};

use crate::{
  Error, Result,
  encode::{
    RawChatIdentity, RawIdentity, RawPermission, RawProfile, RawRole,
    RawTenant, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  seed, stamp,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tessera directory backed by a single SQLite file.
///
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Re-run the seed for an existing tenant (safe: seeding is idempotent).
  pub async fn reseed_tenant(&self, tenant_id: Uuid) -> Result<()> {
    let tenant_str = encode_uuid(tenant_id);
    let now_str = encode_dt(Utc::now());
    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(
          &tx,
          "SELECT 1 FROM tenants WHERE tenant_id = ?1",
          &[&tenant_str],
        )? {
          return Ok(Err(CoreError::TenantNotFound(tenant_id)));
        }
        seed::seed_tenant(&tx, &tenant_str, &now_str)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }
}

fn exists(
  conn: &rusqlite::Connection,
  sql: &str,
  params: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, params, |_| Ok(true))
      .optional()?
      .unwrap_or(false),
  )
}

const PROFILE_SELECT: &str = "SELECT profile_id, identity_id, tenant_id, \
   kind, is_primary, status, created_at, activated_at FROM profiles";

const CHAT_SELECT: &str = "SELECT external_chat_id, external_username, \
   identity_id, state, pending_email, one_time_code, code_expires_at, \
   failed_attempts, locked_until, is_authenticated, last_activity_at, \
   created_at FROM chat_identities";

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn add_identity(&self, input: NewIdentity) -> Result<Identity> {
    let identity = Identity {
      identity_id:   Uuid::new_v4(),
      email:         normalize_email(&input.email),
      display_name:  input.display_name,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(identity.identity_id);
    let email    = identity.email.clone();
    let name     = identity.display_name.clone();
    let hash     = identity.password_hash.clone();
    let at_str   = encode_dt(identity.created_at);

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        if exists(
          conn,
          "SELECT 1 FROM identities WHERE email = ?1",
          &[&email],
        )? {
          return Ok(Err(CoreError::EmailTaken(email)));
        }
        conn.execute(
          "INSERT INTO identities
             (identity_id, email, display_name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, email, name, hash, at_str],
        )?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(identity)
  }

  async fn add_first_identity(
    &self,
    input: NewIdentity,
  ) -> Result<Option<Identity>> {
    let identity = Identity {
      identity_id:   Uuid::new_v4(),
      email:         normalize_email(&input.email),
      display_name:  input.display_name,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };

    let id_str = encode_uuid(identity.identity_id);
    let email  = identity.email.clone();
    let name   = identity.display_name.clone();
    let hash   = identity.password_hash.clone();
    let at_str = encode_dt(identity.created_at);

    // Emptiness check and insert share one connection call; two racing
    // bootstraps cannot both see an empty table.
    let created: bool = self
      .conn
      .call(move |conn| {
        if exists(conn, "SELECT 1 FROM identities LIMIT 1", &[])? {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO identities
             (identity_id, email, display_name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, email, name, hash, at_str],
        )?;
        Ok(true)
      })
      .await?;

    Ok(created.then_some(identity))
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT identity_id, email, display_name, password_hash, created_at
               FROM identities WHERE identity_id = ?1",
              rusqlite::params![id_str],
              RawIdentity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn find_identity_by_email(
    &self,
    email: &str,
  ) -> Result<Option<Identity>> {
    let email = normalize_email(email);

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT identity_id, email, display_name, password_hash, created_at
               FROM identities WHERE email = ?1",
              rusqlite::params![email],
              RawIdentity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn list_identities(&self) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT identity_id, email, display_name, password_hash, created_at
           FROM identities ORDER BY email",
        )?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  // ── Tenants ───────────────────────────────────────────────────────────────

  async fn add_tenant(&self, input: NewTenant) -> Result<Tenant> {
    let now = Utc::now();
    let tenant = Tenant {
      tenant_id:         Uuid::new_v4(),
      name:              input.name,
      slug:              input.slug,
      owner_identity_id: input.owner_identity_id,
      created_at:        now,
    };

    let tenant_str  = encode_uuid(tenant.tenant_id);
    let name        = tenant.name.clone();
    let slug        = tenant.slug.clone();
    let owner_str   = encode_uuid(tenant.owner_identity_id);
    let owner_id    = tenant.owner_identity_id;
    let at_str      = encode_dt(now);
    let profile_str = encode_uuid(Uuid::new_v4());

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(
          &tx,
          "SELECT 1 FROM identities WHERE identity_id = ?1",
          &[&owner_str],
        )? {
          return Ok(Err(CoreError::IdentityNotFound(owner_id)));
        }

        tx.execute(
          "INSERT INTO tenants
             (tenant_id, name, slug, owner_identity_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![tenant_str, name, slug, owner_str, at_str],
        )?;

        // The owner's profile is active from the start, and becomes the
        // identity's primary if it has none yet.
        let has_primary = exists(
          &tx,
          "SELECT 1 FROM profiles WHERE identity_id = ?1 AND is_primary = 1",
          &[&owner_str],
        )?;
        tx.execute(
          "INSERT INTO profiles
             (profile_id, identity_id, tenant_id, kind, is_primary, status,
              created_at, activated_at)
           VALUES (?1, ?2, ?3, 'owner', ?4, 'active', ?5, ?5)",
          rusqlite::params![
            profile_str,
            owner_str,
            tenant_str,
            !has_primary,
            at_str
          ],
        )?;

        seed::seed_tenant(&tx, &tenant_str, &at_str)?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(tenant)
  }

  async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTenant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT tenant_id, name, slug, owner_identity_id, created_at
               FROM tenants WHERE tenant_id = ?1",
              rusqlite::params![id_str],
              RawTenant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTenant::into_tenant).transpose()
  }

  async fn list_tenants(&self) -> Result<Vec<Tenant>> {
    let raws: Vec<RawTenant> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT tenant_id, name, slug, owner_identity_id, created_at
           FROM tenants ORDER BY slug",
        )?;
        let rows = stmt
          .query_map([], RawTenant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTenant::into_tenant).collect()
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn add_profile(&self, input: NewProfile) -> Result<Profile> {
    let now = Utc::now();
    let profile = Profile {
      profile_id:   Uuid::new_v4(),
      identity_id:  input.identity_id,
      tenant_id:    input.tenant_id,
      kind:         input.kind,
      is_primary:   false,
      status:       input.status,
      created_at:   now,
      activated_at: input.status.is_active().then_some(now),
    };

    let profile_str  = encode_uuid(profile.profile_id);
    let identity_str = encode_uuid(profile.identity_id);
    let tenant_str   = encode_uuid(profile.tenant_id);
    let identity_id  = profile.identity_id;
    let tenant_id    = profile.tenant_id;
    let kind_str     = profile.kind.as_str();
    let status_str   = profile.status.as_str();
    let active       = profile.status.is_active();
    let at_str       = encode_dt(now);
    let activated    = profile.activated_at.map(encode_dt);

    let outcome: Result<bool, CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(
          &tx,
          "SELECT 1 FROM identities WHERE identity_id = ?1",
          &[&identity_str],
        )? {
          return Ok(Err(CoreError::IdentityNotFound(identity_id)));
        }
        if !exists(
          &tx,
          "SELECT 1 FROM tenants WHERE tenant_id = ?1",
          &[&tenant_str],
        )? {
          return Ok(Err(CoreError::TenantNotFound(tenant_id)));
        }
        if exists(
          &tx,
          "SELECT 1 FROM profiles
           WHERE identity_id = ?1 AND tenant_id = ?2 AND kind = ?3",
          &[&identity_str, &tenant_str, &kind_str],
        )? {
          return Ok(Err(CoreError::DuplicateProfile {
            tenant_id,
            kind: kind_str.to_owned(),
          }));
        }

        // First active profile for an identity becomes its primary.
        let promote = active
          && !exists(
            &tx,
            "SELECT 1 FROM profiles WHERE identity_id = ?1 AND is_primary = 1",
            &[&identity_str],
          )?;

        tx.execute(
          "INSERT INTO profiles
             (profile_id, identity_id, tenant_id, kind, is_primary, status,
              created_at, activated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            profile_str,
            identity_str,
            tenant_str,
            kind_str,
            promote,
            status_str,
            at_str,
            activated
          ],
        )?;

        tx.commit()?;
        Ok(Ok(promote))
      })
      .await?;
    let promoted = outcome?;

    Ok(Profile { is_primary: promoted, ..profile })
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{PROFILE_SELECT} WHERE profile_id = ?1"),
              rusqlite::params![id_str],
              RawProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn list_profiles(
    &self,
    identity_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
  ) -> Result<Vec<Profile>> {
    let identity_str = identity_id.map(encode_uuid);
    let tenant_str   = tenant_id.map(encode_uuid);

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{PROFILE_SELECT}
           WHERE (?1 IS NULL OR identity_id = ?1)
             AND (?2 IS NULL OR tenant_id = ?2)
           ORDER BY created_at, profile_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![identity_str, tenant_str],
            RawProfile::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn set_profile_status(
    &self,
    profile_id: Uuid,
    status: ProfileStatus,
  ) -> Result<Profile> {
    let id_str     = encode_uuid(profile_id);
    let status_str = status.as_str();
    let activating = status.is_active();
    let now_str    = encode_dt(Utc::now());

    let outcome: Result<RawProfile, CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<RawProfile> = tx
          .query_row(
            &format!("{PROFILE_SELECT} WHERE profile_id = ?1"),
            rusqlite::params![id_str],
            RawProfile::from_row,
          )
          .optional()?;
        let Some(raw) = existing else {
          return Ok(Err(CoreError::ProfileNotFound(profile_id)));
        };

        let was_active = raw.status == "active";
        let (new_primary, new_activated_at) = if activating {
          let other_primary = exists(
            &tx,
            "SELECT 1 FROM profiles
             WHERE identity_id = ?1 AND is_primary = 1 AND profile_id != ?2",
            &[&raw.identity_id, &raw.profile_id],
          )?;
          let stamped = if was_active {
            raw.activated_at.clone()
          } else {
            Some(now_str.clone())
          };
          (raw.is_primary || !other_primary, stamped)
        } else {
          // Leaving the active state always drops the primary flag, so a
          // primary profile is never pending or suspended.
          (false, raw.activated_at.clone())
        };

        tx.execute(
          "UPDATE profiles SET status = ?2, is_primary = ?3, activated_at = ?4
           WHERE profile_id = ?1",
          rusqlite::params![id_str, status_str, new_primary, new_activated_at],
        )?;

        let updated = tx.query_row(
          &format!("{PROFILE_SELECT} WHERE profile_id = ?1"),
          rusqlite::params![id_str],
          RawProfile::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(updated))
      })
      .await?;

    outcome?.into_profile()
  }

  async fn switch_primary(
    &self,
    identity_id: Uuid,
    profile_id: Uuid,
  ) -> Result<Profile> {
    let identity_str = encode_uuid(identity_id);
    let profile_str  = encode_uuid(profile_id);

    let outcome: Result<RawProfile, CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let target: Option<(String, String)> = tx
          .query_row(
            "SELECT identity_id, status FROM profiles WHERE profile_id = ?1",
            rusqlite::params![profile_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let valid = matches!(
          &target,
          Some((owner, status)) if *owner == identity_str && status == "active"
        );
        if !valid {
          return Ok(Err(CoreError::InvalidProfile(profile_id)));
        }

        // Clear then set, in this order; the partial unique index on
        // (identity_id) WHERE is_primary = 1 would reject the reverse.
        tx.execute(
          "UPDATE profiles SET is_primary = 0
           WHERE identity_id = ?1 AND is_primary = 1",
          rusqlite::params![identity_str],
        )?;
        tx.execute(
          "UPDATE profiles SET is_primary = 1 WHERE profile_id = ?1",
          rusqlite::params![profile_str],
        )?;

        let updated = tx.query_row(
          &format!("{PROFILE_SELECT} WHERE profile_id = ?1"),
          rusqlite::params![profile_str],
          RawProfile::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(updated))
      })
      .await?;

    outcome?.into_profile()
  }

  // ── Roles ─────────────────────────────────────────────────────────────────

  async fn add_role(&self, input: NewRole) -> Result<Role> {
    let role = Role {
      role_id:    Uuid::new_v4(),
      tenant_id:  input.tenant_id,
      name:       input.name,
      slug:       input.slug,
      is_system:  input.is_system,
      created_at: Utc::now(),
    };

    let id_str     = encode_uuid(role.role_id);
    let tenant_str = encode_uuid(role.tenant_id);
    let tenant_id  = role.tenant_id;
    let name       = role.name.clone();
    let slug       = role.slug.clone();
    let is_system  = role.is_system;
    let at_str     = encode_dt(role.created_at);

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(
          &tx,
          "SELECT 1 FROM tenants WHERE tenant_id = ?1",
          &[&tenant_str],
        )? {
          return Ok(Err(CoreError::TenantNotFound(tenant_id)));
        }
        if exists(
          &tx,
          "SELECT 1 FROM roles WHERE tenant_id = ?1 AND slug = ?2",
          &[&tenant_str, &slug],
        )? {
          return Ok(Err(CoreError::DuplicateRole { tenant_id, slug }));
        }

        tx.execute(
          "INSERT INTO roles
             (role_id, tenant_id, name, slug, is_system, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, tenant_str, name, slug, is_system, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(role)
  }

  async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRole> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT role_id, tenant_id, name, slug, is_system, created_at
               FROM roles WHERE role_id = ?1",
              rusqlite::params![id_str],
              RawRole::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRole::into_role).transpose()
  }

  async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>> {
    let tenant_str = encode_uuid(tenant_id);

    let raws: Vec<RawRole> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT role_id, tenant_id, name, slug, is_system, created_at
           FROM roles WHERE tenant_id = ?1 ORDER BY slug",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![tenant_str], RawRole::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRole::into_role).collect()
  }

  async fn update_role(
    &self,
    role_id: Uuid,
    changes: UpdateRole,
  ) -> Result<Role> {
    let Some(existing) = self.get_role(role_id).await? else {
      return Err(CoreError::RoleNotFound(role_id).into());
    };
    if existing.is_system {
      return Err(CoreError::SystemRoleImmutable(role_id).into());
    }

    let name = changes.name.unwrap_or(existing.name);
    let slug = changes.slug.unwrap_or(existing.slug);

    let id_str     = encode_uuid(role_id);
    let tenant_str = encode_uuid(existing.tenant_id);
    let tenant_id  = existing.tenant_id;
    let name_db    = name.clone();
    let slug_db    = slug.clone();

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let taken = exists(
          conn,
          "SELECT 1 FROM roles
           WHERE tenant_id = ?1 AND slug = ?2 AND role_id != ?3",
          &[&tenant_str, &slug_db, &id_str],
        )?;
        if taken {
          return Ok(Err(CoreError::DuplicateRole {
            tenant_id,
            slug: slug_db,
          }));
        }
        conn.execute(
          "UPDATE roles SET name = ?2, slug = ?3 WHERE role_id = ?1",
          rusqlite::params![id_str, name_db, slug_db],
        )?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(Role {
      role_id,
      tenant_id,
      name,
      slug,
      is_system: false,
      created_at: existing.created_at,
    })
  }

  async fn delete_role(&self, role_id: Uuid) -> Result<()> {
    let Some(existing) = self.get_role(role_id).await? else {
      return Err(CoreError::RoleNotFound(role_id).into());
    };
    if existing.is_system {
      return Err(CoreError::SystemRoleImmutable(role_id).into());
    }

    let id_str = encode_uuid(role_id);
    self
      .conn
      .call(move |conn| {
        // ON DELETE CASCADE clears role_permissions and role_assignments.
        conn.execute(
          "DELETE FROM roles WHERE role_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Permission catalog ────────────────────────────────────────────────────

  async fn add_permission(
    &self,
    input: NewPermission,
  ) -> Result<PermissionEntry> {
    if !is_storable_token(&input.resource) || !is_storable_token(&input.action)
    {
      return Err(CoreError::WildcardForbidden.into());
    }

    let entry = PermissionEntry {
      permission_id: Uuid::new_v4(),
      tenant_id:     input.tenant_id,
      resource:      input.resource,
      action:        input.action,
    };

    let id_str     = encode_uuid(entry.permission_id);
    let tenant_str = encode_uuid(entry.tenant_id);
    let tenant_id  = entry.tenant_id;
    let resource   = entry.resource.clone();
    let action     = entry.action.clone();

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(
          &tx,
          "SELECT 1 FROM tenants WHERE tenant_id = ?1",
          &[&tenant_str],
        )? {
          return Ok(Err(CoreError::TenantNotFound(tenant_id)));
        }
        if exists(
          &tx,
          "SELECT 1 FROM permissions
           WHERE tenant_id = ?1 AND resource = ?2 AND action = ?3",
          &[&tenant_str, &resource, &action],
        )? {
          return Ok(Err(CoreError::DuplicatePermission { resource, action }));
        }

        tx.execute(
          "INSERT INTO permissions (permission_id, tenant_id, resource, action)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, tenant_str, resource, action],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(entry)
  }

  async fn list_permissions(
    &self,
    tenant_id: Uuid,
  ) -> Result<Vec<PermissionEntry>> {
    let tenant_str = encode_uuid(tenant_id);

    let raws: Vec<RawPermission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT permission_id, tenant_id, resource, action
           FROM permissions WHERE tenant_id = ?1 ORDER BY resource, action",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![tenant_str], RawPermission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPermission::into_permission).collect()
  }

  // ── Role wiring ───────────────────────────────────────────────────────────

  async fn grant_permission(
    &self,
    role_id: Uuid,
    permission_id: Uuid,
  ) -> Result<()> {
    let role_str = encode_uuid(role_id);
    let perm_str = encode_uuid(permission_id);

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let role_tenant: Option<String> = tx
          .query_row(
            "SELECT tenant_id FROM roles WHERE role_id = ?1",
            rusqlite::params![role_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(role_tenant) = role_tenant else {
          return Ok(Err(CoreError::RoleNotFound(role_id)));
        };

        let perm_tenant: Option<String> = tx
          .query_row(
            "SELECT tenant_id FROM permissions WHERE permission_id = ?1",
            rusqlite::params![perm_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(perm_tenant) = perm_tenant else {
          return Ok(Err(CoreError::PermissionNotFound(permission_id)));
        };

        if role_tenant != perm_tenant {
          return Ok(Err(CoreError::CrossTenantPermission {
            role_id,
            permission_id,
          }));
        }

        tx.execute(
          "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
           VALUES (?1, ?2)",
          rusqlite::params![role_str, perm_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }

  async fn revoke_permission(
    &self,
    role_id: Uuid,
    permission_id: Uuid,
  ) -> Result<()> {
    let role_str = encode_uuid(role_id);
    let perm_str = encode_uuid(permission_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM role_permissions
           WHERE role_id = ?1 AND permission_id = ?2",
          rusqlite::params![role_str, perm_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn permissions_for_role(
    &self,
    role_id: Uuid,
  ) -> Result<Vec<PermissionEntry>> {
    let role_str = encode_uuid(role_id);

    let raws: Vec<RawPermission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.permission_id, p.tenant_id, p.resource, p.action
           FROM role_permissions rp
           JOIN permissions p ON p.permission_id = rp.permission_id
           WHERE rp.role_id = ?1
           ORDER BY p.resource, p.action",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![role_str], RawPermission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPermission::into_permission).collect()
  }

  async fn assign_role(&self, profile_id: Uuid, role_id: Uuid) -> Result<()> {
    let profile_str = encode_uuid(profile_id);
    let role_str    = encode_uuid(role_id);

    let outcome: Result<(), CoreError> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let profile_tenant: Option<String> = tx
          .query_row(
            "SELECT tenant_id FROM profiles WHERE profile_id = ?1",
            rusqlite::params![profile_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(profile_tenant) = profile_tenant else {
          return Ok(Err(CoreError::ProfileNotFound(profile_id)));
        };

        let role_tenant: Option<String> = tx
          .query_row(
            "SELECT tenant_id FROM roles WHERE role_id = ?1",
            rusqlite::params![role_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(role_tenant) = role_tenant else {
          return Ok(Err(CoreError::RoleNotFound(role_id)));
        };

        if profile_tenant != role_tenant {
          return Ok(Err(CoreError::CrossTenantRole { role_id, profile_id }));
        }

        tx.execute(
          "INSERT OR IGNORE INTO role_assignments (profile_id, role_id)
           VALUES (?1, ?2)",
          rusqlite::params![profile_str, role_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    Ok(outcome?)
  }

  async fn revoke_role(&self, profile_id: Uuid, role_id: Uuid) -> Result<()> {
    let profile_str = encode_uuid(profile_id);
    let role_str    = encode_uuid(role_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM role_assignments
           WHERE profile_id = ?1 AND role_id = ?2",
          rusqlite::params![profile_str, role_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn roles_for_profile(&self, profile_id: Uuid) -> Result<Vec<Role>> {
    let profile_str = encode_uuid(profile_id);

    let raws: Vec<RawRole> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.role_id, r.tenant_id, r.name, r.slug, r.is_system,
                  r.created_at
           FROM role_assignments ra
           JOIN roles r ON r.role_id = ra.role_id
           WHERE ra.profile_id = ?1
           ORDER BY r.slug",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![profile_str], RawRole::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRole::into_role).collect()
  }

  async fn grants_for_profile(&self, profile_id: Uuid) -> Result<Vec<Grant>> {
    let profile_str = encode_uuid(profile_id);

    let grants: Vec<Grant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT p.resource, p.action
           FROM role_assignments ra
           JOIN role_permissions rp ON rp.role_id = ra.role_id
           JOIN permissions p ON p.permission_id = rp.permission_id
           WHERE ra.profile_id = ?1
           ORDER BY p.resource, p.action",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![profile_str], |row| {
            Ok(Grant { resource: row.get(0)?, action: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(grants)
  }

  async fn role_graph_stamp(&self, tenant_id: Uuid) -> Result<String> {
    let tenant_str = encode_uuid(tenant_id);

    let rows: stamp::GraphRows = self
      .conn
      .call(move |conn| {
        let mut rows = stamp::GraphRows::default();

        let mut stmt = conn.prepare(
          "SELECT role_id, slug, name FROM roles WHERE tenant_id = ?1",
        )?;
        rows.roles = stmt
          .query_map(rusqlite::params![tenant_str], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT permission_id, resource, action FROM permissions
           WHERE tenant_id = ?1",
        )?;
        rows.catalog = stmt
          .query_map(rusqlite::params![tenant_str], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT rp.role_id, rp.permission_id
           FROM role_permissions rp
           JOIN roles r ON r.role_id = rp.role_id
           WHERE r.tenant_id = ?1",
        )?;
        rows.links = stmt
          .query_map(rusqlite::params![tenant_str], |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT ra.profile_id, ra.role_id
           FROM role_assignments ra
           JOIN roles r ON r.role_id = ra.role_id
           WHERE r.tenant_id = ?1",
        )?;
        rows.assignments = stmt
          .query_map(rusqlite::params![tenant_str], |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    Ok(stamp::compute(rows))
  }

  // ── Chat identities ───────────────────────────────────────────────────────

  async fn touch_chat_identity(
    &self,
    external_chat_id: i64,
    external_username: Option<String>,
  ) -> Result<ChatIdentity> {
    let now_str = encode_dt(Utc::now());

    let raw: RawChatIdentity = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let known = exists(
          &tx,
          "SELECT 1 FROM chat_identities WHERE external_chat_id = ?1",
          &[&external_chat_id],
        )?;
        if known {
          // Keep the last non-null username the platform reported.
          tx.execute(
            "UPDATE chat_identities
             SET external_username = COALESCE(?2, external_username),
                 last_activity_at = ?3
             WHERE external_chat_id = ?1",
            rusqlite::params![external_chat_id, external_username, now_str],
          )?;
        } else {
          tx.execute(
            "INSERT INTO chat_identities
               (external_chat_id, external_username, last_activity_at,
                created_at)
             VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![external_chat_id, external_username, now_str],
          )?;
        }

        let raw = tx.query_row(
          &format!("{CHAT_SELECT} WHERE external_chat_id = ?1"),
          rusqlite::params![external_chat_id],
          RawChatIdentity::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_chat_identity()
  }

  async fn get_chat_identity(
    &self,
    external_chat_id: i64,
  ) -> Result<Option<ChatIdentity>> {
    let raw: Option<RawChatIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{CHAT_SELECT} WHERE external_chat_id = ?1"),
              rusqlite::params![external_chat_id],
              RawChatIdentity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawChatIdentity::into_chat_identity).transpose()
  }

  async fn save_chat_identity(&self, chat: &ChatIdentity) -> Result<()> {
    let external_chat_id  = chat.external_chat_id;
    let external_username = chat.external_username.clone();
    let identity_str      = chat.identity_id.map(encode_uuid);
    let state_str         = chat.state.as_str();
    let pending_email     = chat.pending_email.clone();
    let one_time_code     = chat.one_time_code.clone();
    let code_expires_str  = chat.code_expires_at.map(encode_dt);
    let failed_attempts   = chat.failed_attempts;
    let locked_until_str  = chat.locked_until.map(encode_dt);
    let is_authenticated  = chat.is_authenticated;
    let last_activity_str = encode_dt(chat.last_activity_at);

    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE chat_identities SET
             external_username = ?2, identity_id = ?3, state = ?4,
             pending_email = ?5, one_time_code = ?6, code_expires_at = ?7,
             failed_attempts = ?8, locked_until = ?9, is_authenticated = ?10,
             last_activity_at = ?11
           WHERE external_chat_id = ?1",
          rusqlite::params![
            external_chat_id,
            external_username,
            identity_str,
            state_str,
            pending_email,
            one_time_code,
            code_expires_str,
            failed_attempts,
            locked_until_str,
            is_authenticated,
            last_activity_str,
          ],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::ChatIdentityMissing(external_chat_id));
    }
    Ok(())
  }

  async fn list_chat_identities(&self) -> Result<Vec<ChatIdentity>> {
    let raws: Vec<RawChatIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("{CHAT_SELECT} ORDER BY created_at"))?;
        let rows = stmt
          .query_map([], RawChatIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawChatIdentity::into_chat_identity)
      .collect()
  }

  async fn expire_stale_codes(&self, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = encode_dt(now);

    let reset = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE chat_identities
           SET state = 'unauthenticated', pending_email = NULL,
               one_time_code = NULL, code_expires_at = NULL,
               failed_attempts = 0
           WHERE state = 'waiting_for_password'
             AND code_expires_at IS NOT NULL
             AND code_expires_at < ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await?;

    Ok(reset)
  }
}
