//! Handlers for `/me` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me` | The acting identity, its profiles, and the resolved current context |
//! | `POST` | `/me/switch` | Body: `{"profile_id": "..."}`; atomically moves the primary flag |

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tessera_core::{
  Error as CoreError,
  context::AuthContext,
  format::summarize,
  identity::Identity,
  profile::Profile,
  selector,
  store::DirectoryStore,
  tenant::Tenant,
};
use uuid::Uuid;

use crate::{auth::Acting, error::ApiError};

/// The selected profile with its tenant and resolved permissions.
#[derive(Debug, Serialize)]
pub struct CurrentContext {
  pub profile: Profile,
  pub tenant:  Tenant,
  pub context: AuthContext,
  pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
  pub identity: Identity,
  pub profiles: Vec<Profile>,
  /// `None` when the identity has no profile anywhere.
  pub current:  Option<CurrentContext>,
}

/// `GET /me`
pub async fn me<S>(
  State(store): State<Arc<S>>,
  Acting(identity): Acting,
) -> Result<Json<MeResponse>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = store
    .list_profiles(Some(identity.identity_id), None)
    .await
    .map_err(ApiError::from_store)?;

  let current = match selector::select_current(&profiles) {
    Ok(profile) => {
      let tenant = store
        .get_tenant(profile.tenant_id)
        .await
        .map_err(ApiError::from_store)?
        .ok_or_else(|| {
          ApiError::NotFound(format!("tenant {} not found", profile.tenant_id))
        })?;
      let grants = store
        .grants_for_profile(profile.profile_id)
        .await
        .map_err(ApiError::from_store)?;
      let context = AuthContext::assemble(&tenant, profile, &grants)?;
      let summary = summarize(&context.permission_set);
      Some(CurrentContext { profile: profile.clone(), tenant, context, summary })
    }
    Err(CoreError::NoProfile) => None,
    Err(e) => return Err(e.into()),
  };

  Ok(Json(MeResponse { identity, profiles, current }))
}

#[derive(Debug, Deserialize)]
pub struct SwitchBody {
  pub profile_id: Uuid,
}

/// `POST /me/switch`: returns the new primary profile.
///
/// The target must belong to the caller and be active; the store enforces
/// both inside the same transaction that moves the flag.
pub async fn switch<S>(
  State(store): State<Arc<S>>,
  Acting(identity): Acting,
  Json(body): Json<SwitchBody>,
) -> Result<Json<Profile>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profile = store
    .switch_primary(identity.identity_id, body.profile_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(profile))
}
