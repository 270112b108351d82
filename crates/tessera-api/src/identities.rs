//! Handlers for `/identities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/identities` | All login principals |
//! | `POST` | `/identities` | Body: [`NewIdentityBody`]; hashes the password server-side |
//! | `GET`  | `/identities/{id}` | Single identity |
//!
//! Creation is open without credentials only while the directory is empty,
//! so a fresh deployment can bootstrap its first admin. After that it
//! requires authentication like everything else.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rand_core::OsRng;
use serde::Deserialize;
use tessera_core::{
  identity::{Identity, NewIdentity},
  store::DirectoryStore,
};
use uuid::Uuid;

use crate::{
  auth::{Acting, MaybeActing},
  error::ApiError,
};

/// `GET /identities`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
) -> Result<Json<Vec<Identity>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let identities = store
    .list_identities()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(identities))
}

/// `GET /identities/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
  Path(id): Path<Uuid>,
) -> Result<Json<Identity>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let identity = store
    .get_identity(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("identity {id} not found")))?;
  Ok(Json(identity))
}

/// JSON body accepted by `POST /identities`.
#[derive(Debug, Deserialize)]
pub struct NewIdentityBody {
  pub email:        String,
  pub display_name: String,
  /// Plaintext over the authenticated channel; stored only as an argon2
  /// PHC string.
  pub password:     String,
}

/// `POST /identities`: returns 201 + the stored identity.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  MaybeActing(acting): MaybeActing,
  Json(body): Json<NewIdentityBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.password.is_empty() {
    return Err(ApiError::Invalid("password must not be empty".into()));
  }

  let salt = SaltString::generate(&mut OsRng);
  let password_hash = Argon2::default()
    .hash_password(body.password.as_bytes(), &salt)
    .map_err(|e| ApiError::Invalid(format!("unhashable password: {e}")))?
    .to_string();
  let input = NewIdentity {
    email: body.email,
    display_name: body.display_name,
    password_hash,
  };

  let identity = match acting {
    Some(_) => store.add_identity(input).await.map_err(ApiError::from_store)?,
    None => store
      .add_first_identity(input)
      .await
      .map_err(ApiError::from_store)?
      .ok_or(ApiError::Unauthorized)?,
  };
  Ok((StatusCode::CREATED, Json(identity)))
}
