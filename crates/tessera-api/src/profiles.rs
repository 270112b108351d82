//! Handlers for `/profiles` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/profiles` | Optional `?identity_id` and `?tenant_id` filters |
//! | `POST` | `/profiles` | Body: [`NewProfileBody`]; requires `members:manage` in the tenant |
//! | `GET`  | `/profiles/{id}` | Single profile |
//! | `POST` | `/profiles/{id}/status` | Body: `{"status": "active"}`; requires `members:manage` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tessera_core::{
  profile::{NewProfile, Profile, ProfileKind, ProfileStatus},
  store::DirectoryStore,
};
use uuid::Uuid;

use crate::{auth::Acting, authz::require_in_tenant, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub identity_id: Option<Uuid>,
  pub tenant_id:   Option<Uuid>,
}

/// `GET /profiles[?identity_id=...][&tenant_id=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Profile>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = store
    .list_profiles(params.identity_id, params.tenant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(profiles))
}

/// `GET /profiles/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profile = store
    .get_profile(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))?;
  Ok(Json(profile))
}

/// JSON body accepted by `POST /profiles`.
#[derive(Debug, Deserialize)]
pub struct NewProfileBody {
  pub identity_id: Uuid,
  pub tenant_id:   Uuid,
  pub kind:        ProfileKind,
  /// Defaults to `pending`; memberships activate explicitly.
  pub status:      Option<ProfileStatus>,
}

/// `POST /profiles`: returns 201 + the stored profile.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Json(body): Json<NewProfileBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  require_in_tenant(&*store, &acting, body.tenant_id, "members", "manage")
    .await?;

  if store
    .get_identity(body.identity_id)
    .await
    .map_err(ApiError::from_store)?
    .is_none()
  {
    return Err(ApiError::NotFound(format!(
      "identity {} not found",
      body.identity_id
    )));
  }

  let profile = store
    .add_profile(NewProfile {
      identity_id: body.identity_id,
      tenant_id:   body.tenant_id,
      kind:        body.kind,
      status:      body.status.unwrap_or(ProfileStatus::Pending),
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: ProfileStatus,
}

/// `POST /profiles/{id}/status`: returns the updated profile.
pub async fn set_status<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Profile>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profile = store
    .get_profile(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))?;

  require_in_tenant(&*store, &acting, profile.tenant_id, "members", "manage")
    .await?;

  let updated = store
    .set_profile_status(id, body.status)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(updated))
}
