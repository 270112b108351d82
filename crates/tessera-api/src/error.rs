//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use tessera_core::Error as CoreError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Invalid(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend error, surfacing domain conditions buried in its source
  /// chain as proper statuses instead of a blanket 500.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = source {
      if let Some(core) = err.downcast_ref::<CoreError>() {
        return Self::from_core(core);
      }
      source = err.source();
    }
    Self::Store(Box::new(e))
  }

  fn from_core(e: &CoreError) -> Self {
    match e {
      CoreError::IdentityNotFound(_)
      | CoreError::TenantNotFound(_)
      | CoreError::ProfileNotFound(_)
      | CoreError::RoleNotFound(_)
      | CoreError::PermissionNotFound(_) => Self::NotFound(e.to_string()),

      CoreError::NoProfile
      | CoreError::DuplicateProfile { .. }
      | CoreError::DuplicateRole { .. }
      | CoreError::DuplicatePermission { .. }
      | CoreError::EmailTaken(_) => Self::Conflict(e.to_string()),

      CoreError::InvalidProfile(_)
      | CoreError::WildcardForbidden
      | CoreError::SystemRoleImmutable(_)
      | CoreError::CrossTenantRole { .. }
      | CoreError::CrossTenantPermission { .. } => Self::Invalid(e.to_string()),

      // A mismatch reaching the API is a handler bug; keep it loud.
      CoreError::TenantMismatch { .. } => Self::Store(e.to_string().into()),
    }
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    Self::from_core(&e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Invalid(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let mut response =
      (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static("Basic realm=\"tessera\""),
      );
    }
    response
  }
}
