//! Human-readable permission summaries for the chat surface.

use crate::permission_set::PermissionSet;

/// Render a permission set as chat-friendly text.
///
/// Resources and actions come out in sorted order (the set's BTree
/// containers guarantee it), so the same set always renders the same text.
pub fn summarize(set: &PermissionSet) -> String {
  match set {
    PermissionSet::Universal => {
      "Full access: every action on every resource (owner).".into()
    }
    PermissionSet::Grants(map) if map.is_empty() => {
      "No permissions granted in this context.".into()
    }
    PermissionSet::Grants(map) => {
      let mut out = String::from("Your permissions:");
      for (resource, actions) in map {
        out.push_str("\n  ");
        out.push_str(resource);
        out.push_str(": ");
        let mut first = true;
        for action in actions {
          if !first {
            out.push_str(", ");
          }
          out.push_str(action);
          first = false;
        }
      }
      out
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::role::Grant;

  #[test]
  fn universal_summary() {
    assert_eq!(
      summarize(&PermissionSet::Universal),
      "Full access: every action on every resource (owner)."
    );
  }

  #[test]
  fn empty_summary() {
    assert_eq!(
      summarize(&PermissionSet::empty()),
      "No permissions granted in this context."
    );
  }

  #[test]
  fn grants_render_sorted_and_grouped() {
    let set = PermissionSet::from_grants([
      Grant::new("invoices", "read"),
      Grant::new("customers", "read"),
      Grant::new("customers", "create"),
    ]);
    assert_eq!(
      summarize(&set),
      "Your permissions:\n  customers: create, read\n  invoices: read"
    );
  }

  #[test]
  fn identical_sets_render_identically() {
    let a = PermissionSet::from_grants([
      Grant::new("jobs", "read"),
      Grant::new("jobs", "schedule"),
    ]);
    let b = PermissionSet::from_grants([
      Grant::new("jobs", "schedule"),
      Grant::new("jobs", "read"),
    ]);
    assert_eq!(summarize(&a), summarize(&b));
  }
}
