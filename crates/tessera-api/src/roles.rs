//! Handlers for the role graph: roles, the permission catalog, and the
//! links that wire both to profiles.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/tenants/{id}/roles` | Roles in a tenant, system roles included |
//! | `POST`   | `/tenants/{id}/roles` | Body: [`NewRoleBody`] |
//! | `PATCH`  | `/roles/{id}` | Body: [`UpdateRoleBody`]; system roles refuse |
//! | `DELETE` | `/roles/{id}` | System roles refuse |
//! | `GET`    | `/tenants/{id}/permissions` | The tenant's catalog |
//! | `POST`   | `/tenants/{id}/permissions` | Body: `{"resource","action"}`; no wildcards |
//! | `GET`    | `/roles/{id}/permissions` | Catalog entries attached to a role |
//! | `PUT`    | `/roles/{id}/permissions/{permission_id}` | Attach; idempotent |
//! | `DELETE` | `/roles/{id}/permissions/{permission_id}` | Detach |
//! | `GET`    | `/profiles/{id}/roles` | Roles assigned to a profile |
//! | `PUT`    | `/profiles/{id}/roles/{role_id}` | Assign; idempotent |
//! | `DELETE` | `/profiles/{id}/roles/{role_id}` | Revoke |
//! | `GET`    | `/profiles/{id}/grants` | Deduped `(resource, action)` union |
//!
//! Every mutation here requires `roles:manage` in the owning tenant.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tessera_core::{
  role::{
    Grant, NewPermission, NewRole, PermissionEntry, Role, UpdateRole, slugify,
  },
  store::DirectoryStore,
};
use uuid::Uuid;

use crate::{auth::Acting, authz::require_in_tenant, error::ApiError};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// `GET /tenants/{id}/roles`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let roles = store
    .list_roles(tenant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(roles))
}

/// JSON body accepted by `POST /tenants/{id}/roles`.
#[derive(Debug, Deserialize)]
pub struct NewRoleBody {
  pub name: String,
  /// Derived from `name` when omitted.
  pub slug: Option<String>,
}

/// `POST /tenants/{id}/roles`: returns 201 + the stored role.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(tenant_id): Path<Uuid>,
  Json(body): Json<NewRoleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  require_in_tenant(&*store, &acting, tenant_id, "roles", "manage").await?;

  if body.name.trim().is_empty() {
    return Err(ApiError::Invalid("role name must not be empty".into()));
  }
  let slug = match body.slug {
    Some(slug) => slug,
    None => slugify(&body.name),
  };

  let role = store
    .add_role(NewRole {
      tenant_id,
      name: body.name,
      slug,
      is_system: false,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(role)))
}

/// JSON body accepted by `PATCH /roles/{id}`.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateRoleBody {
  pub name: Option<String>,
  pub slug: Option<String>,
}

/// `PATCH /roles/{id}`: returns the updated role.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(role_id): Path<Uuid>,
  Json(body): Json<UpdateRoleBody>,
) -> Result<Json<Role>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let role = fetch_role(&*store, role_id).await?;
  require_in_tenant(&*store, &acting, role.tenant_id, "roles", "manage")
    .await?;

  let updated = store
    .update_role(role_id, UpdateRole { name: body.name, slug: body.slug })
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(updated))
}

/// `DELETE /roles/{id}`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(role_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let role = fetch_role(&*store, role_id).await?;
  require_in_tenant(&*store, &acting, role.tenant_id, "roles", "manage")
    .await?;

  store
    .delete_role(role_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Permission catalog ──────────────────────────────────────────────────────

/// `GET /tenants/{id}/permissions`
pub async fn list_permissions<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<PermissionEntry>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entries = store
    .list_permissions(tenant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

/// JSON body accepted by `POST /tenants/{id}/permissions`.
#[derive(Debug, Deserialize)]
pub struct NewPermissionBody {
  pub resource: String,
  pub action:   String,
}

/// `POST /tenants/{id}/permissions`: returns 201 + the catalog entry.
pub async fn create_permission<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(tenant_id): Path<Uuid>,
  Json(body): Json<NewPermissionBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  require_in_tenant(&*store, &acting, tenant_id, "roles", "manage").await?;

  if body.resource.trim().is_empty() || body.action.trim().is_empty() {
    return Err(ApiError::Invalid(
      "resource and action must be non-empty".into(),
    ));
  }

  let entry = store
    .add_permission(NewPermission {
      tenant_id,
      resource: body.resource,
      action: body.action,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /roles/{id}/permissions`
pub async fn permissions_for_role<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<PermissionEntry>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  fetch_role(&*store, role_id).await?;
  let entries = store
    .permissions_for_role(role_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

/// `PUT /roles/{id}/permissions/{permission_id}`
pub async fn grant_permission<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let role = fetch_role(&*store, role_id).await?;
  require_in_tenant(&*store, &acting, role.tenant_id, "roles", "manage")
    .await?;

  store
    .grant_permission(role_id, permission_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /roles/{id}/permissions/{permission_id}`
pub async fn revoke_permission<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let role = fetch_role(&*store, role_id).await?;
  require_in_tenant(&*store, &acting, role.tenant_id, "roles", "manage")
    .await?;

  store
    .revoke_permission(role_id, permission_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Profile wiring ──────────────────────────────────────────────────────────

/// `GET /profiles/{id}/roles`
pub async fn roles_for_profile<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  fetch_profile_tenant(&*store, profile_id).await?;
  let roles = store
    .roles_for_profile(profile_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(roles))
}

/// `PUT /profiles/{id}/roles/{role_id}`
pub async fn assign_role<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path((profile_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let tenant_id = fetch_profile_tenant(&*store, profile_id).await?;
  require_in_tenant(&*store, &acting, tenant_id, "roles", "manage").await?;

  store
    .assign_role(profile_id, role_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /profiles/{id}/roles/{role_id}`
pub async fn revoke_role<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path((profile_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let tenant_id = fetch_profile_tenant(&*store, profile_id).await?;
  require_in_tenant(&*store, &acting, tenant_id, "roles", "manage").await?;

  store
    .revoke_role(profile_id, role_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /profiles/{id}/grants`
pub async fn grants_for_profile<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<Grant>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  fetch_profile_tenant(&*store, profile_id).await?;
  let grants = store
    .grants_for_profile(profile_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(grants))
}

// ─── Lookup helpers ──────────────────────────────────────────────────────────

async fn fetch_role<S>(store: &S, role_id: Uuid) -> Result<Role, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .get_role(role_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("role {role_id} not found")))
}

async fn fetch_profile_tenant<S>(
  store: &S,
  profile_id: Uuid,
) -> Result<Uuid, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .get_profile(profile_id)
    .await
    .map_err(ApiError::from_store)?
    .map(|p| p.tenant_id)
    .ok_or_else(|| {
      ApiError::NotFound(format!("profile {profile_id} not found"))
    })
}
