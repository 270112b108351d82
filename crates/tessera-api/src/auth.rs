//! HTTP Basic-auth extractor resolving the acting identity.
//!
//! Credentials are an identity's email and password; every request is
//! verified against the directory, so revoking an identity takes effect
//! immediately.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use tessera_core::{identity::Identity, store::DirectoryStore};

use crate::error::ApiError;

/// The authenticated identity behind a request.
pub struct Acting(pub Identity);

/// Like [`Acting`], but a missing Authorization header yields `None`.
/// Credentials that are present and wrong are still refused.
pub struct MaybeActing(pub Option<Identity>);

async fn verify_credentials<S>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Identity, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let identity = store
    .find_identity_by_email(email)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&identity.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(identity)
}

impl<S> FromRequestParts<Arc<S>> for Acting
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<S>,
  ) -> Result<Self, Self::Rejection> {
    let identity = verify_credentials(&parts.headers, state.as_ref()).await?;
    Ok(Acting(identity))
  }
}

impl<S> FromRequestParts<Arc<S>> for MaybeActing
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<S>,
  ) -> Result<Self, Self::Rejection> {
    if !parts
      .headers
      .contains_key(axum::http::header::AUTHORIZATION)
    {
      return Ok(MaybeActing(None));
    }
    let identity = verify_credentials(&parts.headers, state.as_ref()).await?;
    Ok(MaybeActing(Some(identity)))
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{Request, header};
  use rand_core::OsRng;
  use tessera_core::identity::NewIdentity;
  use tessera_store_sqlite::SqliteStore;

  use super::*;

  async fn store_with_alice(password: &str) -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    store
      .add_identity(NewIdentity {
        email:         "alice@example.com".into(),
        display_name:  "Alice".into(),
        password_hash: hash,
      })
      .await
      .unwrap();
    Arc::new(store)
  }

  async fn extract(
    req: Request<axum::body::Body>,
    state: &Arc<SqliteStore>,
  ) -> Result<Acting, ApiError> {
    let (mut parts, _) = req.into_parts();
    Acting::from_request_parts(&mut parts, state).await
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[tokio::test]
  async fn correct_credentials() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("alice@example.com", "secret"))
      .body(axum::body::Body::empty())
      .unwrap();
    let acting = extract(req, &state).await.unwrap();
    assert_eq!(acting.0.email, "alice@example.com");
  }

  #[tokio::test]
  async fn email_lookup_is_case_insensitive() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("ALICE@Example.COM", "secret"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(extract(req, &state).await.is_ok());
  }

  #[tokio::test]
  async fn wrong_password() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("alice@example.com", "wrong"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn unknown_email() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("ghost@example.com", "secret"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn missing_header() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn invalid_base64() {
    let state = store_with_alice("secret").await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Basic !!!not-base64!!!")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn maybe_acting_tolerates_absence_but_not_bad_credentials() {
    let state = store_with_alice("secret").await;

    let req = Request::builder()
      .body(axum::body::Body::empty())
      .unwrap();
    let (mut parts, _) = req.into_parts();
    let maybe = MaybeActing::from_request_parts(&mut parts, &state)
      .await
      .unwrap();
    assert!(maybe.0.is_none());

    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("alice@example.com", "wrong"))
      .body(axum::body::Body::empty())
      .unwrap();
    let (mut parts, _) = req.into_parts();
    assert!(matches!(
      MaybeActing::from_request_parts(&mut parts, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }
}
