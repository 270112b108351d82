//! Credential checks against the directory, bounded by a timeout.

use std::time::Duration;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use tessera_core::{identity::Identity, store::DirectoryStore};

use crate::error::Error;

/// How long a login step may block on the directory. On timeout the user
/// gets the transient-failure reply; the platform's own redelivery is the
/// retry mechanism.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of an email + password check.
///
/// `Rejected` covers both a wrong password and an identity that vanished
/// between the email and password steps, so the reply cannot be used to
/// probe which addresses exist.
pub enum CredentialCheck {
  Verified(Identity),
  Rejected,
  Unavailable,
}

/// Case-insensitive identity lookup with [`LOOKUP_TIMEOUT`] applied.
pub async fn lookup_identity<S>(
  store: &S,
  email: &str,
) -> Result<Option<Identity>, Error>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(LOOKUP_TIMEOUT, store.find_identity_by_email(email))
    .await
  {
    Err(_elapsed) => Err(Error::LookupTimeout),
    Ok(Err(e)) => Err(Error::Store(Box::new(e))),
    Ok(Ok(found)) => Ok(found),
  }
}

pub async fn check_credentials<S>(
  store: &S,
  email: &str,
  password: &str,
) -> CredentialCheck
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let identity = match lookup_identity(store, email).await {
    Ok(Some(identity)) => identity,
    Ok(None) => return CredentialCheck::Rejected,
    Err(e) => {
      tracing::warn!(error = %e, "credential lookup failed");
      return CredentialCheck::Unavailable;
    }
  };

  if verify_password(password, &identity.password_hash) {
    CredentialCheck::Verified(identity)
  } else {
    CredentialCheck::Rejected
  }
}

/// Verify a password against an argon2 PHC string. A malformed hash counts
/// as a mismatch.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;

  use super::*;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  #[test]
  fn correct_password_verifies() {
    let phc = hash("hunter2");
    assert!(verify_password("hunter2", &phc));
  }

  #[test]
  fn wrong_password_fails() {
    let phc = hash("hunter2");
    assert!(!verify_password("hunter3", &phc));
  }

  #[test]
  fn malformed_hash_fails_closed() {
    assert!(!verify_password("hunter2", "not-a-phc-string"));
    assert!(!verify_password("hunter2", ""));
  }
}
