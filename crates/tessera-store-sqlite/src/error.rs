//! Error type for `tessera-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain conditions detected inside store operations (duplicate email,
  /// invalid switch target, cross-tenant wiring, ...).
  #[error("core error: {0}")]
  Core(#[from] tessera_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A discriminant column held a string no enum variant maps to.
  #[error("unknown discriminant: {0}")]
  UnknownDiscriminant(String),

  /// `save_chat_identity` was called for a chat that was never touched.
  #[error("chat identity not found: {0}")]
  ChatIdentityMissing(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
