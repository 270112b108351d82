//! JSON REST API for Tessera.
//!
//! Exposes an axum [`Router`] backed by any
//! [`tessera_core::store::DirectoryStore`]. Every route authenticates with
//! HTTP Basic against the directory itself; TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tessera_api::api_router(store.clone()))
//! ```

pub mod auth;
pub mod authz;
pub mod chat_identities;
pub mod error;
pub mod identities;
pub mod me;
pub mod profiles;
pub mod roles;
pub mod tenants;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use tessera_core::store::DirectoryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Identities
    .route(
      "/identities",
      get(identities::list::<S>).post(identities::create::<S>),
    )
    .route("/identities/{id}", get(identities::get_one::<S>))
    // The acting identity
    .route("/me", get(me::me::<S>))
    .route("/me/switch", post(me::switch::<S>))
    // Tenants
    .route("/tenants", get(tenants::list::<S>).post(tenants::create::<S>))
    .route("/tenants/{id}", get(tenants::get_one::<S>))
    .route(
      "/tenants/{id}/role-graph-stamp",
      get(tenants::role_graph_stamp::<S>),
    )
    // Profiles
    .route(
      "/profiles",
      get(profiles::list::<S>).post(profiles::create::<S>),
    )
    .route("/profiles/{id}", get(profiles::get_one::<S>))
    .route("/profiles/{id}/status", post(profiles::set_status::<S>))
    .route("/profiles/{id}/grants", get(roles::grants_for_profile::<S>))
    .route("/profiles/{id}/roles", get(roles::roles_for_profile::<S>))
    .route(
      "/profiles/{id}/roles/{role_id}",
      put(roles::assign_role::<S>).delete(roles::revoke_role::<S>),
    )
    // Roles and the permission catalog
    .route(
      "/tenants/{id}/roles",
      get(roles::list::<S>).post(roles::create::<S>),
    )
    .route(
      "/tenants/{id}/permissions",
      get(roles::list_permissions::<S>).post(roles::create_permission::<S>),
    )
    .route(
      "/roles/{id}",
      patch(roles::update::<S>).delete(roles::delete::<S>),
    )
    .route("/roles/{id}/permissions", get(roles::permissions_for_role::<S>))
    .route(
      "/roles/{id}/permissions/{permission_id}",
      put(roles::grant_permission::<S>).delete(roles::revoke_permission::<S>),
    )
    // Chat links
    .route("/chat-identities", get(chat_identities::list::<S>))
    .route(
      "/chat-identities/{chat_id}/unlink",
      post(chat_identities::unlink::<S>),
    )
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use serde_json::{Value, json};
  use tessera_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  fn auth_header(email: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{email}:{pass}")))
  }

  async fn send(
    store:  &Arc<SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = api_router(store.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes =
      axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
  }

  /// Two tenants, two people:
  ///
  /// * alice owns Alpha (owner profile, her primary);
  /// * bob owns Beta;
  /// * alice also has an employee profile in Beta holding a custom role
  ///   with exactly `customers:read`.
  struct World {
    store:      Arc<SqliteStore>,
    alice_auth: String,
    bob_auth:   String,
    alice_id:   String,
    tenant_a:   String,
    tenant_b:   String,
    alice_in_b: String,
    viewer:     String,
  }

  async fn two_tenant_world() -> World {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let alice_auth = auth_header("alice@example.com", "alice-pw");
    let bob_auth   = auth_header("bob@example.com", "bob-pw");

    // Bootstrap: the very first identity needs no credentials.
    let (status, alice) = send(
      &store,
      "POST",
      "/identities",
      None,
      Some(json!({
        "email":        "alice@example.com",
        "display_name": "Alice",
        "password":     "alice-pw",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let alice_id = alice["identity_id"].as_str().unwrap().to_string();

    let (status, bob) = send(
      &store,
      "POST",
      "/identities",
      Some(&alice_auth),
      Some(json!({
        "email":        "bob@example.com",
        "display_name": "Bob",
        "password":     "bob-pw",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let bob_id = bob["identity_id"].as_str().unwrap().to_string();

    let (status, tenant_a) = send(
      &store,
      "POST",
      "/tenants",
      Some(&alice_auth),
      Some(json!({ "name": "Alpha Services" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tenant_a = tenant_a["tenant_id"].as_str().unwrap().to_string();

    let (status, tenant_b) = send(
      &store,
      "POST",
      "/tenants",
      Some(&bob_auth),
      Some(json!({ "name": "Beta Logistics" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tenant_b = tenant_b["tenant_id"].as_str().unwrap().to_string();
    assert_eq!(
      send(&store, "GET", &format!("/tenants/{tenant_b}"), Some(&bob_auth), None)
        .await
        .1["owner_identity_id"],
      bob_id
    );

    // Bob (owner of Beta) takes alice on as an employee.
    let (status, profile) = send(
      &store,
      "POST",
      "/profiles",
      Some(&bob_auth),
      Some(json!({
        "identity_id": alice_id,
        "tenant_id":   tenant_b,
        "kind":        "employee",
        "status":      "active",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let alice_in_b = profile["profile_id"].as_str().unwrap().to_string();

    // A custom role carrying exactly customers:read.
    let (status, role) = send(
      &store,
      "POST",
      &format!("/tenants/{tenant_b}/roles"),
      Some(&bob_auth),
      Some(json!({ "name": "Customer Viewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let viewer = role["role_id"].as_str().unwrap().to_string();

    let (_, catalog) = send(
      &store,
      "GET",
      &format!("/tenants/{tenant_b}/permissions"),
      Some(&bob_auth),
      None,
    )
    .await;
    let customers_read = catalog
      .as_array()
      .unwrap()
      .iter()
      .find(|p| p["resource"] == "customers" && p["action"] == "read")
      .unwrap()["permission_id"]
      .as_str()
      .unwrap()
      .to_string();

    let (status, _) = send(
      &store,
      "PUT",
      &format!("/roles/{viewer}/permissions/{customers_read}"),
      Some(&bob_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
      &store,
      "PUT",
      &format!("/profiles/{alice_in_b}/roles/{viewer}"),
      Some(&bob_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    World {
      store,
      alice_auth,
      bob_auth,
      alice_id,
      tenant_a,
      tenant_b,
      alice_in_b,
      viewer,
    }
  }

  // ── Bootstrap and authentication ─────────────────────────────────────────────

  #[tokio::test]
  async fn bootstrap_allows_only_the_first_unauthenticated_identity() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());

    let (status, first) = send(
      &store,
      "POST",
      "/identities",
      None,
      Some(json!({
        "email":        "root@example.com",
        "display_name": "Root",
        "password":     "root-pw",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(first.get("password_hash").is_none(), "hash leaked: {first}");

    // The directory is no longer empty, so anonymous creation is closed.
    let (status, _) = send(
      &store,
      "POST",
      "/identities",
      None,
      Some(json!({
        "email":        "mallory@example.com",
        "display_name": "Mallory",
        "password":     "m",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let auth = auth_header("root@example.com", "root-pw");
    let (status, _) = send(
      &store,
      "POST",
      "/identities",
      Some(&auth),
      Some(json!({
        "email":        "carol@example.com",
        "display_name": "Carol",
        "password":     "carol-pw",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn missing_or_wrong_credentials_are_401_with_a_challenge() {
    let world = two_tenant_world().await;

    let req = Request::builder()
      .method("GET")
      .uri("/identities")
      .body(Body::empty())
      .unwrap();
    let resp =
      api_router(world.store.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge =
      resp.headers().get(header::WWW_AUTHENTICATE).unwrap().to_str().unwrap();
    assert!(challenge.starts_with("Basic"), "challenge: {challenge}");

    let bad = auth_header("alice@example.com", "not-her-password");
    let (status, _) =
      send(&world.store, "GET", "/identities", Some(&bad), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── Resolution through /me ───────────────────────────────────────────────────

  #[tokio::test]
  async fn owner_sees_universal_permissions_in_their_own_tenant() {
    let world = two_tenant_world().await;

    let (status, body) =
      send(&world.store, "GET", "/me", Some(&world.alice_auth), None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["profiles"].as_array().unwrap().len(), 2);
    let current = &body["current"];
    assert_eq!(current["tenant"]["slug"], "alpha-services");
    assert_eq!(current["profile"]["kind"], "owner");
    assert_eq!(current["context"]["permission_set"]["scope"], "universal");
    assert_eq!(
      current["summary"],
      "Full access: every action on every resource (owner)."
    );
  }

  #[tokio::test]
  async fn switching_tenants_swaps_the_resolved_permission_set() {
    let world = two_tenant_world().await;

    let (status, switched) = send(
      &world.store,
      "POST",
      "/me/switch",
      Some(&world.alice_auth),
      Some(json!({ "profile_id": world.alice_in_b })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(switched["is_primary"], true);

    let (_, body) =
      send(&world.store, "GET", "/me", Some(&world.alice_auth), None).await;
    let current = &body["current"];
    assert_eq!(current["tenant"]["slug"], "beta-logistics");
    let set = &current["context"]["permission_set"];
    assert_eq!(set["scope"], "grants");
    assert_eq!(set["grants"], json!({ "customers": ["read"] }));
    assert_eq!(current["summary"], "Your permissions:\n  customers: read");

    // And back: ownership of Alpha resolves structurally again.
    let (_, profiles) = send(
      &world.store,
      "GET",
      &format!(
        "/profiles?identity_id={}&tenant_id={}",
        world.alice_id, world.tenant_a
      ),
      Some(&world.alice_auth),
      None,
    )
    .await;
    let home = profiles[0]["profile_id"].as_str().unwrap();
    let (status, _) = send(
      &world.store,
      "POST",
      "/me/switch",
      Some(&world.alice_auth),
      Some(json!({ "profile_id": home })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) =
      send(&world.store, "GET", "/me", Some(&world.alice_auth), None).await;
    assert_eq!(
      body["current"]["context"]["permission_set"]["scope"],
      "universal"
    );
  }

  #[tokio::test]
  async fn switching_to_a_foreign_or_suspended_profile_is_rejected() {
    let world = two_tenant_world().await;

    // Bob's owner profile in Beta is not alice's to claim.
    let (_, bobs) = send(
      &world.store,
      "GET",
      &format!("/profiles?tenant_id={}", world.tenant_b),
      Some(&world.alice_auth),
      None,
    )
    .await;
    let bobs_profile = bobs
      .as_array()
      .unwrap()
      .iter()
      .find(|p| p["kind"] == "owner")
      .unwrap()["profile_id"]
      .as_str()
      .unwrap();
    let (status, _) = send(
      &world.store,
      "POST",
      "/me/switch",
      Some(&world.alice_auth),
      Some(json!({ "profile_id": bobs_profile })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Suspend alice's Beta profile; it stops being a switch target.
    let (status, _) = send(
      &world.store,
      "POST",
      &format!("/profiles/{}/status", world.alice_in_b),
      Some(&world.bob_auth),
      Some(json!({ "status": "suspended" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
      &world.store,
      "POST",
      "/me/switch",
      Some(&world.alice_auth),
      Some(json!({ "profile_id": world.alice_in_b })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Neither rejection moved her primary.
    let (_, body) =
      send(&world.store, "GET", "/me", Some(&world.alice_auth), None).await;
    assert_eq!(body["current"]["tenant"]["slug"], "alpha-services");
  }

  // ── Authorization on mutations ───────────────────────────────────────────────

  #[tokio::test]
  async fn role_mutations_require_the_manage_grant() {
    let world = two_tenant_world().await;

    // Alice's only hold on Beta is customers:read.
    let (status, body) = send(
      &world.store,
      "POST",
      &format!("/tenants/{}/roles", world.tenant_b),
      Some(&world.alice_auth),
      Some(json!({ "name": "Backdoor" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(
      body["error"].as_str().unwrap().contains("roles:manage"),
      "error: {body}"
    );

    // Bob owns Beta; the same request is fine for him.
    let (status, _) = send(
      &world.store,
      "POST",
      &format!("/tenants/{}/roles", world.tenant_b),
      Some(&world.bob_auth),
      Some(json!({ "name": "Dispatcher" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Membership changes in Alpha are closed to bob the same way.
    let (status, _) = send(
      &world.store,
      "POST",
      "/profiles",
      Some(&world.bob_auth),
      Some(json!({
        "identity_id": world.alice_id,
        "tenant_id":   world.tenant_a,
        "kind":        "customer",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn wildcards_never_enter_the_catalog() {
    let world = two_tenant_world().await;

    for (resource, action) in
      [("*", "read"), ("customers", "*"), ("", "read")]
    {
      let (status, _) = send(
        &world.store,
        "POST",
        &format!("/tenants/{}/permissions", world.tenant_a),
        Some(&world.alice_auth),
        Some(json!({ "resource": resource, "action": action })),
      )
      .await;
      assert_eq!(
        status,
        StatusCode::UNPROCESSABLE_ENTITY,
        "accepted {resource:?}:{action:?}"
      );
    }
  }

  #[tokio::test]
  async fn system_roles_are_immutable_through_the_api() {
    let world = two_tenant_world().await;

    let (_, roles) = send(
      &world.store,
      "GET",
      &format!("/tenants/{}/roles", world.tenant_a),
      Some(&world.alice_auth),
      None,
    )
    .await;
    let admin = roles
      .as_array()
      .unwrap()
      .iter()
      .find(|r| r["slug"] == "administrator")
      .unwrap();
    assert_eq!(admin["is_system"], true);
    let admin_id = admin["role_id"].as_str().unwrap();

    let (status, _) = send(
      &world.store,
      "PATCH",
      &format!("/roles/{admin_id}"),
      Some(&world.alice_auth),
      Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
      &world.store,
      "DELETE",
      &format!("/roles/{admin_id}"),
      Some(&world.alice_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  // ── The role graph over HTTP ─────────────────────────────────────────────────

  #[tokio::test]
  async fn the_role_graph_stamp_tracks_mutations() {
    let world = two_tenant_world().await;
    let uri =
      format!("/tenants/{}/role-graph-stamp", world.tenant_a);

    let stamp = |body: Value| body["stamp"].as_str().unwrap().to_string();

    let (_, body) =
      send(&world.store, "GET", &uri, Some(&world.alice_auth), None).await;
    let s1 = stamp(body);

    let (_, role) = send(
      &world.store,
      "POST",
      &format!("/tenants/{}/roles", world.tenant_a),
      Some(&world.alice_auth),
      Some(json!({ "name": "Scheduler" })),
    )
    .await;
    let role_id = role["role_id"].as_str().unwrap().to_string();
    let (_, body) =
      send(&world.store, "GET", &uri, Some(&world.alice_auth), None).await;
    let s2 = stamp(body);
    assert_ne!(s1, s2, "creating a role must move the stamp");

    let (_, catalog) = send(
      &world.store,
      "GET",
      &format!("/tenants/{}/permissions", world.tenant_a),
      Some(&world.alice_auth),
      None,
    )
    .await;
    let perm = catalog
      .as_array()
      .unwrap()
      .iter()
      .find(|p| p["resource"] == "jobs" && p["action"] == "schedule")
      .unwrap()["permission_id"]
      .as_str()
      .unwrap()
      .to_string();
    let (status, _) = send(
      &world.store,
      "PUT",
      &format!("/roles/{role_id}/permissions/{perm}"),
      Some(&world.alice_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) =
      send(&world.store, "GET", &uri, Some(&world.alice_auth), None).await;
    let s3 = stamp(body);
    assert_ne!(s2, s3, "linking a permission must move the stamp");

    // Reads leave it alone.
    let (_, body) =
      send(&world.store, "GET", &uri, Some(&world.alice_auth), None).await;
    assert_eq!(s3, stamp(body));
  }

  #[tokio::test]
  async fn profile_grants_surface_the_deduped_union() {
    let world = two_tenant_world().await;

    // A second role overlapping on customers:read and adding invoices:read.
    let (_, role) = send(
      &world.store,
      "POST",
      &format!("/tenants/{}/roles", world.tenant_b),
      Some(&world.bob_auth),
      Some(json!({ "name": "Billing Viewer" })),
    )
    .await;
    let billing = role["role_id"].as_str().unwrap().to_string();

    let (_, catalog) = send(
      &world.store,
      "GET",
      &format!("/tenants/{}/permissions", world.tenant_b),
      Some(&world.bob_auth),
      None,
    )
    .await;
    for (resource, action) in [("customers", "read"), ("invoices", "read")] {
      let perm = catalog
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["resource"] == resource && p["action"] == action)
        .unwrap()["permission_id"]
        .as_str()
        .unwrap()
        .to_string();
      let (status, _) = send(
        &world.store,
        "PUT",
        &format!("/roles/{billing}/permissions/{perm}"),
        Some(&world.bob_auth),
        None,
      )
      .await;
      assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (status, _) = send(
      &world.store,
      "PUT",
      &format!("/profiles/{}/roles/{billing}", world.alice_in_b),
      Some(&world.bob_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, grants) = send(
      &world.store,
      "GET",
      &format!("/profiles/{}/grants", world.alice_in_b),
      Some(&world.alice_auth),
      None,
    )
    .await;
    let grants = grants.as_array().unwrap();
    assert_eq!(grants.len(), 2, "union should dedupe: {grants:?}");

    // Revoking the viewer role leaves what Billing Viewer still grants.
    let (status, _) = send(
      &world.store,
      "DELETE",
      &format!("/profiles/{}/roles/{}", world.alice_in_b, world.viewer),
      Some(&world.bob_auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, grants) = send(
      &world.store,
      "GET",
      &format!("/profiles/{}/grants", world.alice_in_b),
      Some(&world.alice_auth),
      None,
    )
    .await;
    assert_eq!(grants.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn unknown_ids_are_404() {
    let world = two_tenant_world().await;
    let ghost = uuid::Uuid::new_v4();

    for (method, uri) in [
      ("GET", format!("/tenants/{ghost}")),
      ("GET", format!("/identities/{ghost}")),
      ("GET", format!("/profiles/{ghost}")),
      ("GET", format!("/roles/{ghost}/permissions")),
      ("DELETE", format!("/roles/{ghost}")),
    ] {
      let (status, _) =
        send(&world.store, method, &uri, Some(&world.alice_auth), None).await;
      assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
    }
  }
}
