//! Handlers for `/tenants` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tenants` | All tenants |
//! | `POST` | `/tenants` | Body: [`NewTenantBody`]; seeds catalog, system roles, owner profile |
//! | `GET`  | `/tenants/{id}` | Single tenant |
//! | `GET`  | `/tenants/{id}/role-graph-stamp` | Digest of the tenant's role graph |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tessera_core::{
  role::slugify,
  store::DirectoryStore,
  tenant::{NewTenant, Tenant},
};
use uuid::Uuid;

use crate::{auth::Acting, error::ApiError};

/// `GET /tenants`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
) -> Result<Json<Vec<Tenant>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let tenants = store.list_tenants().await.map_err(ApiError::from_store)?;
  Ok(Json(tenants))
}

/// `GET /tenants/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(id): Path<Uuid>,
) -> Result<Json<Tenant>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let tenant = store
    .get_tenant(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("tenant {id} not found")))?;
  Ok(Json(tenant))
}

/// JSON body accepted by `POST /tenants`.
#[derive(Debug, Deserialize)]
pub struct NewTenantBody {
  pub name:              String,
  /// Derived from `name` when omitted.
  pub slug:              Option<String>,
  /// Defaults to the acting identity.
  pub owner_identity_id: Option<Uuid>,
}

/// `POST /tenants`: returns 201 + the stored tenant.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Json(body): Json<NewTenantBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::Invalid("tenant name must not be empty".into()));
  }
  let slug = match body.slug {
    Some(slug) => slug,
    None => slugify(&body.name),
  };
  if slug.is_empty() {
    return Err(ApiError::Invalid(format!(
      "cannot derive a slug from {:?}",
      body.name
    )));
  }
  let taken = store
    .list_tenants()
    .await
    .map_err(ApiError::from_store)?
    .iter()
    .any(|t| t.slug == slug);
  if taken {
    return Err(ApiError::Conflict(format!("tenant slug {slug:?} is taken")));
  }

  let owner_identity_id =
    body.owner_identity_id.unwrap_or(acting.identity_id);
  if store
    .get_identity(owner_identity_id)
    .await
    .map_err(ApiError::from_store)?
    .is_none()
  {
    return Err(ApiError::NotFound(format!(
      "identity {owner_identity_id} not found"
    )));
  }

  let tenant = store
    .add_tenant(NewTenant { name: body.name, slug, owner_identity_id })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(tenant)))
}

/// `GET /tenants/{id}/role-graph-stamp`
///
/// The stamp changes iff the tenant's roles, catalog, links or
/// assignments change. Admin tooling polls it to detect drift without
/// downloading the graph.
pub async fn role_graph_stamp<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if store
    .get_tenant(id)
    .await
    .map_err(ApiError::from_store)?
    .is_none()
  {
    return Err(ApiError::NotFound(format!("tenant {id} not found")));
  }
  let stamp = store
    .role_graph_stamp(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "stamp": stamp })))
}
