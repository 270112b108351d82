//! Active-context selection: which profile a request acts through.
//!
//! Pure, like the resolver: callers pass the identity's profiles and get the
//! current one back. The primary flag wins; a missing primary (a data anomaly
//! the partial unique index cannot rule out) falls back to the
//! most-recently-activated active profile rather than failing the request.

use crate::{Error, Result, profile::Profile};

/// Pick the profile an identity is currently acting through.
///
/// Precedence: the `is_primary` profile if present, otherwise the active
/// profile with the latest `activated_at` (ties broken by `created_at`).
/// An identity with no usable profile at all is [`Error::NoProfile`].
pub fn select_current(profiles: &[Profile]) -> Result<&Profile> {
  if let Some(primary) = profiles.iter().find(|p| p.is_primary) {
    return Ok(primary);
  }

  profiles
    .iter()
    .filter(|p| p.status.is_active())
    .max_by_key(|p| (p.activated_at, p.created_at))
    .ok_or(Error::NoProfile)
}
