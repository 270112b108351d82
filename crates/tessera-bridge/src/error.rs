//! Bridge-internal error type.
//!
//! Nothing here ever reaches a chat user. Every user-visible outcome is a
//! [`crate::machine::Reply`] variant with fixed text; these errors go to the
//! tracing log and the conversation stays where it was.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The directory did not answer within [`crate::auth::LOOKUP_TIMEOUT`].
  #[error("directory lookup timed out")]
  LookupTimeout,
  #[error(transparent)]
  Core(#[from] tessera_core::Error),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}
