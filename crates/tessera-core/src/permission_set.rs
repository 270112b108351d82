//! The resolved output of authorization: what a profile may actually do.
//!
//! A permission set is data, not behaviour. It is computed once per request
//! (or per chat turn) by the resolver and then carried around in the request
//! context; nothing downstream re-reads the role tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::role::Grant;

/// The complete answer to "what can this profile do in this tenant".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "grants", rename_all = "snake_case")]
pub enum PermissionSet {
  /// Every action on every resource. Produced structurally for tenant
  /// owners; never represented as catalog rows.
  Universal,
  /// Explicit grants, keyed by resource. BTree containers keep iteration
  /// (and therefore summaries and serialised output) deterministic.
  Grants(BTreeMap<String, BTreeSet<String>>),
}

impl PermissionSet {
  /// The empty set, the fail-closed default for a profile with no roles.
  pub fn empty() -> Self { Self::Grants(BTreeMap::new()) }

  /// Collect grants into a set, deduplicating as it goes.
  pub fn from_grants<I>(grants: I) -> Self
  where I: IntoIterator<Item = Grant> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for grant in grants {
      map.entry(grant.resource).or_default().insert(grant.action);
    }
    Self::Grants(map)
  }

  /// Whether `action` on `resource` is allowed. Unknown pairs are denied.
  pub fn allows(&self, resource: &str, action: &str) -> bool {
    match self {
      Self::Universal => true,
      Self::Grants(map) => {
        map.get(resource).is_some_and(|actions| actions.contains(action))
      }
    }
  }

  pub fn is_universal(&self) -> bool { matches!(self, Self::Universal) }

  /// True only for an explicit empty grant map; `Universal` is never empty.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Universal => false,
      Self::Grants(map) => map.is_empty(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> PermissionSet {
    PermissionSet::from_grants([
      Grant::new("customers", "read"),
      Grant::new("customers", "create"),
      Grant::new("invoices", "read"),
      Grant::new("customers", "read"), // duplicate from a second role
    ])
  }

  #[test]
  fn grants_dedupe_and_allow() {
    let set = sample();
    assert!(set.allows("customers", "read"));
    assert!(set.allows("customers", "create"));
    assert!(set.allows("invoices", "read"));
    assert!(!set.allows("invoices", "delete"));
    assert!(!set.allows("orders", "read"));
  }

  #[test]
  fn universal_allows_everything() {
    let set = PermissionSet::Universal;
    assert!(set.allows("anything", "at-all"));
    assert!(set.is_universal());
    assert!(!set.is_empty());
  }

  #[test]
  fn empty_denies_everything() {
    let set = PermissionSet::empty();
    assert!(!set.allows("customers", "read"));
    assert!(set.is_empty());
  }

  #[test]
  fn serialised_form_is_tagged() {
    let universal = serde_json::to_value(PermissionSet::Universal).unwrap();
    assert_eq!(universal["scope"], "universal");

    let grants = serde_json::to_value(sample()).unwrap();
    assert_eq!(grants["scope"], "grants");
    assert_eq!(grants["grants"]["customers"][0], "create");
  }
}
