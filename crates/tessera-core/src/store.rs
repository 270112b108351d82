//! The `DirectoryStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `tessera-store-sqlite`). Higher layers (`tessera-bridge`, `tessera-api`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  chat::ChatIdentity,
  identity::{Identity, NewIdentity},
  profile::{NewProfile, Profile, ProfileStatus},
  role::{Grant, NewPermission, NewRole, PermissionEntry, Role, UpdateRole},
  tenant::{NewTenant, Tenant},
};

/// Abstraction over a Tessera directory backend.
///
/// Multi-row writes (tenant creation, the primary switch) must be atomic in
/// the implementation; the trait documents which methods carry that burden.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DirectoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Create a login principal. The email is stored in its normalised
  /// (lowercase) form; a duplicate email is an error.
  fn add_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Create the directory's very first login principal. The emptiness
  /// check and the insert are one atomic write, so concurrent callers
  /// cannot both bootstrap; returns `None` once any identity exists.
  fn add_first_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Retrieve an identity by UUID. Returns `None` if not found.
  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Case-insensitive lookup by email address.
  fn find_identity_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  fn list_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  // ── Tenants ───────────────────────────────────────────────────────────

  /// Create a tenant, the owner's profile within it, and the tenant's
  /// seed catalog (baseline permissions plus system roles) in one
  /// atomic write.
  fn add_tenant(
    &self,
    input: NewTenant,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  fn get_tenant(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Tenant>, Self::Error>> + Send + '_;

  fn list_tenants(
    &self,
  ) -> impl Future<Output = Result<Vec<Tenant>, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Create a membership. If this is the identity's first active profile
  /// the store promotes it to primary; callers never set the flag
  /// directly.
  fn add_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// List profiles, optionally filtered by identity and/or tenant.
  fn list_profiles(
    &self,
    identity_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  /// Change a profile's lifecycle status. Activation stamps
  /// `activated_at` (and promotes to primary if the identity has none);
  /// suspension clears the primary flag so a primary is always active.
  fn set_profile_status(
    &self,
    profile_id: Uuid,
    status: ProfileStatus,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Atomically move the primary flag to `profile_id`.
  ///
  /// The target must belong to `identity_id` and be active, checked
  /// inside the same transaction that clears the old flag and sets the
  /// new one. Either both happen or neither does; no interleaving can
  /// observe zero or two primaries.
  fn switch_primary(
    &self,
    identity_id: Uuid,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  // ── Roles ─────────────────────────────────────────────────────────────

  fn add_role(
    &self,
    input: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn get_role(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  fn list_roles(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  fn update_role(
    &self,
    role_id: Uuid,
    changes: UpdateRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  /// Delete a role and its permission links and assignments. System
  /// roles are refused.
  fn delete_role(
    &self,
    role_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Permission catalog ────────────────────────────────────────────────

  /// Register a `(resource, action)` pair in a tenant's catalog.
  /// Wildcards and duplicates are errors.
  fn add_permission(
    &self,
    input: NewPermission,
  ) -> impl Future<Output = Result<PermissionEntry, Self::Error>> + Send + '_;

  fn list_permissions(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PermissionEntry>, Self::Error>> + Send + '_;

  // ── Role wiring ───────────────────────────────────────────────────────

  /// Attach a catalog entry to a role. Both must belong to the same
  /// tenant. Idempotent.
  fn grant_permission(
    &self,
    role_id: Uuid,
    permission_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn revoke_permission(
    &self,
    role_id: Uuid,
    permission_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn permissions_for_role(
    &self,
    role_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PermissionEntry>, Self::Error>> + Send + '_;

  /// Attach a role to a profile. Both must belong to the same tenant.
  /// Idempotent.
  fn assign_role(
    &self,
    profile_id: Uuid,
    role_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn revoke_role(
    &self,
    profile_id: Uuid,
    role_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn roles_for_profile(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  /// The deduped `(resource, action)` union reachable through the
  /// profile's roles; the resolver's input, computed with one join.
  fn grants_for_profile(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Grant>, Self::Error>> + Send + '_;

  /// A deterministic digest of a tenant's entire role graph (roles,
  /// catalog, links, assignments). Changes iff the graph changes; used
  /// by admin tooling to cheaply detect drift.
  fn role_graph_stamp(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  // ── Chat identities ───────────────────────────────────────────────────

  /// Fetch the row for a chat, creating it on first contact. Refreshes
  /// the stored username and `last_activity_at` as a side effect.
  fn touch_chat_identity(
    &self,
    external_chat_id: i64,
    external_username: Option<String>,
  ) -> impl Future<Output = Result<ChatIdentity, Self::Error>> + Send + '_;

  fn get_chat_identity(
    &self,
    external_chat_id: i64,
  ) -> impl Future<Output = Result<Option<ChatIdentity>, Self::Error>> + Send + '_;

  /// Persist the full login-state snapshot for a chat. The row must
  /// already exist (see [`DirectoryStore::touch_chat_identity`]).
  fn save_chat_identity<'a>(
    &'a self,
    chat: &'a ChatIdentity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_chat_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<ChatIdentity>, Self::Error>> + Send + '_;

  /// Clear login material from rows whose code window lapsed before
  /// `now`. Rows are reset, never deleted; the chat linkage itself is
  /// durable. Returns the number of rows touched.
  fn expire_stale_codes(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
