//! Async HTTP client wrapping the tessera JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tessera_core::{
  chat::ChatIdentity,
  identity::Identity,
  profile::Profile,
  role::{Grant, PermissionEntry, Role},
  tenant::Tenant,
};
use uuid::Uuid;

/// Connection settings for the tessera API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub email:    String,
  pub password: String,
}

/// The `/me` response: who you are, where you can act, and what the
/// selected profile resolves to.
#[derive(Debug, Deserialize)]
pub struct MeView {
  pub identity: Identity,
  pub profiles: Vec<Profile>,
  pub current:  Option<CurrentView>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentView {
  pub profile: Profile,
  pub tenant:  Tenant,
  pub summary: String,
}

/// Async HTTP client for the tessera JSON REST API.
///
/// Clones share the inner [`reqwest::Client`].
#[derive(Clone)]
pub struct ApiClient {
  client: reqwest::Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.email.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.email, Some(&self.config.password))
    }
  }

  /// Fail non-2xx responses, surfacing the server's `error` field when the
  /// body carries one.
  async fn checked(
    resp: reqwest::Response,
    method: &str,
    path: &str,
  ) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let detail = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned));
    match detail {
      Some(msg) => Err(anyhow!("{method} {path} → {status}: {msg}")),
      None => Err(anyhow!("{method} {path} → {status}")),
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    tracing::debug!(%path, "GET");
    let resp = self
      .auth(self.client.get(self.url(path)))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    Self::checked(resp, "GET", path)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising GET {path}"))
  }

  async fn post_json<T: DeserializeOwned>(
    &self,
    path: &str,
    body: Value,
  ) -> Result<T> {
    tracing::debug!(%path, "POST");
    let resp = self
      .auth(self.client.post(self.url(path)))
      .json(&body)
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;
    Self::checked(resp, "POST", path)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising POST {path}"))
  }

  async fn put_unit(&self, path: &str) -> Result<()> {
    tracing::debug!(%path, "PUT");
    let resp = self
      .auth(self.client.put(self.url(path)))
      .send()
      .await
      .with_context(|| format!("PUT {path} failed"))?;
    Self::checked(resp, "PUT", path).await?;
    Ok(())
  }

  async fn delete_unit(&self, path: &str) -> Result<()> {
    tracing::debug!(%path, "DELETE");
    let resp = self
      .auth(self.client.delete(self.url(path)))
      .send()
      .await
      .with_context(|| format!("DELETE {path} failed"))?;
    Self::checked(resp, "DELETE", path).await?;
    Ok(())
  }

  // ── The acting identity ───────────────────────────────────────────────────

  /// `GET /api/me`
  pub async fn me(&self) -> Result<MeView> { self.get_json("/me").await }

  /// `POST /api/me/switch`
  pub async fn switch_profile(&self, profile_id: Uuid) -> Result<Profile> {
    self
      .post_json("/me/switch", json!({ "profile_id": profile_id }))
      .await
  }

  // ── Identities ────────────────────────────────────────────────────────────

  /// `GET /api/identities`
  pub async fn list_identities(&self) -> Result<Vec<Identity>> {
    self.get_json("/identities").await
  }

  /// `POST /api/identities`
  pub async fn create_identity(
    &self,
    email: &str,
    display_name: &str,
    password: &str,
  ) -> Result<Identity> {
    self
      .post_json(
        "/identities",
        json!({
          "email":        email,
          "display_name": display_name,
          "password":     password,
        }),
      )
      .await
  }

  // ── Tenants ───────────────────────────────────────────────────────────────

  /// `GET /api/tenants`
  pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
    self.get_json("/tenants").await
  }

  /// `POST /api/tenants`
  pub async fn create_tenant(
    &self,
    name: &str,
    slug: Option<&str>,
    owner: Option<Uuid>,
  ) -> Result<Tenant> {
    self
      .post_json(
        "/tenants",
        json!({
          "name":              name,
          "slug":              slug,
          "owner_identity_id": owner,
        }),
      )
      .await
  }

  /// `GET /api/tenants/{id}/role-graph-stamp`
  pub async fn role_graph_stamp(&self, tenant_id: Uuid) -> Result<String> {
    let body: Value = self
      .get_json(&format!("/tenants/{tenant_id}/role-graph-stamp"))
      .await?;
    body
      .get("stamp")
      .and_then(Value::as_str)
      .map(str::to_owned)
      .ok_or_else(|| anyhow!("stamp missing from response: {body}"))
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  /// `GET /api/profiles[?identity_id=..][&tenant_id=..]`
  pub async fn list_profiles(
    &self,
    identity_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
  ) -> Result<Vec<Profile>> {
    let mut query = Vec::new();
    if let Some(id) = identity_id {
      query.push(format!("identity_id={id}"));
    }
    if let Some(id) = tenant_id {
      query.push(format!("tenant_id={id}"));
    }
    let path = if query.is_empty() {
      "/profiles".to_string()
    } else {
      format!("/profiles?{}", query.join("&"))
    };
    self.get_json(&path).await
  }

  /// `POST /api/profiles`
  pub async fn create_profile(
    &self,
    identity_id: Uuid,
    tenant_id: Uuid,
    kind: &str,
    status: Option<&str>,
  ) -> Result<Profile> {
    self
      .post_json(
        "/profiles",
        json!({
          "identity_id": identity_id,
          "tenant_id":   tenant_id,
          "kind":        kind,
          "status":      status,
        }),
      )
      .await
  }

  /// `POST /api/profiles/{id}/status`
  pub async fn set_profile_status(
    &self,
    profile_id: Uuid,
    status: &str,
  ) -> Result<Profile> {
    self
      .post_json(
        &format!("/profiles/{profile_id}/status"),
        json!({ "status": status }),
      )
      .await
  }

  /// `GET /api/profiles/{id}/grants`
  pub async fn grants_for_profile(
    &self,
    profile_id: Uuid,
  ) -> Result<Vec<Grant>> {
    self.get_json(&format!("/profiles/{profile_id}/grants")).await
  }

  // ── Roles and permissions ─────────────────────────────────────────────────

  /// `GET /api/tenants/{id}/roles`
  pub async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>> {
    self.get_json(&format!("/tenants/{tenant_id}/roles")).await
  }

  /// `POST /api/tenants/{id}/roles`
  pub async fn create_role(
    &self,
    tenant_id: Uuid,
    name: &str,
    slug: Option<&str>,
  ) -> Result<Role> {
    self
      .post_json(
        &format!("/tenants/{tenant_id}/roles"),
        json!({ "name": name, "slug": slug }),
      )
      .await
  }

  /// `GET /api/tenants/{id}/permissions`
  pub async fn list_permissions(
    &self,
    tenant_id: Uuid,
  ) -> Result<Vec<PermissionEntry>> {
    self.get_json(&format!("/tenants/{tenant_id}/permissions")).await
  }

  /// `POST /api/tenants/{id}/permissions`
  pub async fn create_permission(
    &self,
    tenant_id: Uuid,
    resource: &str,
    action: &str,
  ) -> Result<PermissionEntry> {
    self
      .post_json(
        &format!("/tenants/{tenant_id}/permissions"),
        json!({ "resource": resource, "action": action }),
      )
      .await
  }

  /// `PUT /api/roles/{id}/permissions/{permission_id}`
  pub async fn grant(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
    self
      .put_unit(&format!("/roles/{role_id}/permissions/{permission_id}"))
      .await
  }

  /// `DELETE /api/roles/{id}/permissions/{permission_id}`
  pub async fn revoke(
    &self,
    role_id: Uuid,
    permission_id: Uuid,
  ) -> Result<()> {
    self
      .delete_unit(&format!("/roles/{role_id}/permissions/{permission_id}"))
      .await
  }

  /// `PUT /api/profiles/{id}/roles/{role_id}`
  pub async fn assign(&self, profile_id: Uuid, role_id: Uuid) -> Result<()> {
    self.put_unit(&format!("/profiles/{profile_id}/roles/{role_id}")).await
  }

  /// `DELETE /api/profiles/{id}/roles/{role_id}`
  pub async fn unassign(&self, profile_id: Uuid, role_id: Uuid) -> Result<()> {
    self
      .delete_unit(&format!("/profiles/{profile_id}/roles/{role_id}"))
      .await
  }

  // ── Chat links ────────────────────────────────────────────────────────────

  /// `GET /api/chat-identities`
  pub async fn list_chats(&self) -> Result<Vec<ChatIdentity>> {
    self.get_json("/chat-identities").await
  }

  /// `POST /api/chat-identities/{chat_id}/unlink`
  pub async fn unlink_chat(&self, chat_id: i64) -> Result<ChatIdentity> {
    self
      .post_json(&format!("/chat-identities/{chat_id}/unlink"), json!({}))
      .await
  }
}
