//! Identity: the global login principal.
//!
//! An identity is who you are across the whole directory; it carries no
//! authority of its own. Authority comes from profiles, which bind an
//! identity into a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who can log in. Exactly one row per email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
  pub identity_id:   Uuid,
  /// Stored lowercase; compared case-insensitively via
  /// [`normalize_email`].
  pub email:         String,
  pub display_name:  String,
  /// Argon2id hash in PHC string format. Never serialised outward.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::add_identity`].
/// The caller supplies an already-hashed password, never plaintext.
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub email:         String,
  pub display_name:  String,
  pub password_hash: String,
}

/// Canonical form of an email address for storage and lookup.
pub fn normalize_email(raw: &str) -> String {
  raw.trim().to_ascii_lowercase()
}

/// Loose shape check used to decide whether chat input is an email attempt.
/// Deliverability is not the question here; `a@b.c` is close enough.
pub fn looks_like_email(raw: &str) -> bool {
  let s = raw.trim();
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.is_empty()
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
    && !s.contains(char::is_whitespace)
}
