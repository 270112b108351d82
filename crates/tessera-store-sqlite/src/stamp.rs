//! Role-graph version stamps.
//!
//! A stamp is a SHA-256 hex digest over the sorted rows of one tenant's role
//! graph. The same graph produces the same stamp regardless of row order;
//! any role, catalog, link, or assignment change produces a new one. Callers
//! can use it as a cache key for resolved permission sets.

use sha2::{Digest, Sha256};

/// The row sets that make up one tenant's role graph, as raw column text.
#[derive(Default)]
pub struct GraphRows {
  /// (role_id, slug, name) per role.
  pub roles:       Vec<(String, String, String)>,
  /// (permission_id, resource, action) per catalog entry.
  pub catalog:     Vec<(String, String, String)>,
  /// (role_id, permission_id) per link.
  pub links:       Vec<(String, String)>,
  /// (profile_id, role_id) per assignment.
  pub assignments: Vec<(String, String)>,
}

/// Digest the graph. Sorts each section in place for determinism.
pub fn compute(mut rows: GraphRows) -> String {
  rows.roles.sort();
  rows.catalog.sort();
  rows.links.sort();
  rows.assignments.sort();

  let mut hasher = Sha256::new();

  // Section markers keep (a,b) in one section from colliding with (a,b) in
  // another.
  hasher.update(b"roles\0");
  for (id, slug, name) in &rows.roles {
    update_fields(&mut hasher, &[id, slug, name]);
  }
  hasher.update(b"catalog\0");
  for (id, resource, action) in &rows.catalog {
    update_fields(&mut hasher, &[id, resource, action]);
  }
  hasher.update(b"links\0");
  for (role_id, permission_id) in &rows.links {
    update_fields(&mut hasher, &[role_id, permission_id]);
  }
  hasher.update(b"assignments\0");
  for (profile_id, role_id) in &rows.assignments {
    update_fields(&mut hasher, &[profile_id, role_id]);
  }

  hex::encode(hasher.finalize())
}

fn update_fields(hasher: &mut Sha256, fields: &[&str]) {
  for field in fields {
    hasher.update(field.as_bytes());
    hasher.update([0u8]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> GraphRows {
    GraphRows {
      roles:       vec![
        ("r1".into(), "manager".into(), "Manager".into()),
        ("r2".into(), "read-only".into(), "Read Only".into()),
      ],
      catalog:     vec![("p1".into(), "jobs".into(), "read".into())],
      links:       vec![("r1".into(), "p1".into())],
      assignments: vec![("pr1".into(), "r1".into())],
    }
  }

  #[test]
  fn row_order_does_not_matter() {
    let mut shuffled = base();
    shuffled.roles.reverse();
    assert_eq!(compute(base()), compute(shuffled));
  }

  #[test]
  fn any_mutation_changes_the_stamp() {
    let with_link_removed = GraphRows { links: vec![], ..base() };
    assert_ne!(compute(base()), compute(with_link_removed));

    let mut renamed = base();
    renamed.roles[0].2 = "Shift Manager".into();
    assert_ne!(compute(base()), compute(renamed));

    let mut reassigned = base();
    reassigned.assignments[0].0 = "pr2".into();
    assert_ne!(compute(base()), compute(reassigned));
  }

  #[test]
  fn sections_do_not_collide() {
    // The same pair moved from links to assignments is a different graph.
    let a = GraphRows {
      links: vec![("x".into(), "y".into())],
      ..Default::default()
    };
    let b = GraphRows {
      assignments: vec![("x".into(), "y".into())],
      ..Default::default()
    };
    assert_ne!(compute(a), compute(b));
  }
}
