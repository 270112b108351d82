//! Capability-checked command dispatch for authenticated chats.
//!
//! Once a chat is authenticated the state machine steps aside: each message
//! is parsed against a closed set of built-in operations, the sender's
//! [`AuthContext`] is assembled fresh (selector, then resolver), and any
//! operation that reads tenant data beyond the caller's own account is
//! checked against the resolved permission set before it runs. Input that
//! matches no built-in falls through to the [`ToolDispatch`] seam.

use std::future::Future;

use tessera_core::{
  Error as CoreError,
  context::AuthContext,
  format::summarize,
  profile::Profile,
  selector,
  store::DirectoryStore,
  tenant::Tenant,
};
use uuid::Uuid;

use crate::{error::Error, machine::Reply};

// ─── Tool seam ───────────────────────────────────────────────────────────────

/// Fallthrough for text that matches no built-in operation.
///
/// An AI tool layer would implement this and receive the resolved context
/// as its capability set; the bridge itself ships only [`NoTools`].
pub trait ToolDispatch: Send + Sync {
  fn dispatch<'a>(
    &'a self,
    ctx: &'a AuthContext,
    text: &'a str,
  ) -> impl Future<Output = String> + Send + 'a;
}

/// The default tool layer: declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

impl ToolDispatch for NoTools {
  async fn dispatch(&self, _ctx: &AuthContext, _text: &str) -> String {
    "I don't understand that. Send `help` for the available commands."
      .to_string()
  }
}

// ─── Built-in operations ─────────────────────────────────────────────────────

/// A built-in chat operation. Parsing is exact-match on whole words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  WhoAmI,
  Profiles,
  Switch(usize),
  Permissions,
  Team,
  Help,
}

impl Operation {
  pub fn parse(text: &str) -> Option<Self> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let [head, rest @ ..] = words.as_slice() else {
      return None;
    };
    match (head.to_ascii_lowercase().as_str(), rest) {
      ("whoami", []) => Some(Self::WhoAmI),
      ("profiles", []) => Some(Self::Profiles),
      ("switch", [n]) => n.parse().ok().map(Self::Switch),
      ("permissions", []) => Some(Self::Permissions),
      ("team", []) => Some(Self::Team),
      ("help", []) => Some(Self::Help),
      _ => None,
    }
  }

  /// The catalog pair the operation needs, if it touches tenant data
  /// beyond the caller's own account.
  pub fn required_grant(&self) -> Option<(&'static str, &'static str)> {
    match self {
      Self::Team => Some(("members", "manage")),
      Self::WhoAmI
      | Self::Profiles
      | Self::Switch(_)
      | Self::Permissions
      | Self::Help => None,
    }
  }
}

const HELP: &str = "Commands:\n  whoami - who you're logged in as\n  \
profiles - your profiles across all workspaces\n  \
switch <n> - make profile <n> your working context\n  \
permissions - what you can do in the current context\n  \
team - active members of the current workspace\n  \
help - this text\n  \
logout - end the session";

// ─── Context assembly ────────────────────────────────────────────────────────

/// The working context behind one authenticated message: the selected
/// profile, its tenant, and the resolved [`AuthContext`].
pub struct ActiveContext {
  pub profile: Profile,
  pub tenant:  Tenant,
  pub auth:    AuthContext,
}

/// Select the identity's current profile and resolve its permissions.
pub async fn assemble<S>(
  store: &S,
  identity_id: Uuid,
) -> Result<ActiveContext, Error>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = store
    .list_profiles(Some(identity_id), None)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  let profile = selector::select_current(&profiles)?.clone();
  let tenant = store
    .get_tenant(profile.tenant_id)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?
    .ok_or(CoreError::TenantNotFound(profile.tenant_id))?;
  let grants = store
    .grants_for_profile(profile.profile_id)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  let auth = AuthContext::assemble(&tenant, &profile, &grants)?;
  Ok(ActiveContext { profile, tenant, auth })
}

/// The context line shown right after a successful login or switch.
pub async fn login_summary<S>(store: &S, identity_id: Uuid) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match assemble(store, identity_id).await {
    Ok(active) => format!(
      "You're working in {} as {}.\n{}",
      active.tenant.name,
      active.auth.profile_kind.as_str(),
      summarize(&active.auth.permission_set),
    ),
    Err(Error::Core(CoreError::NoProfile)) => {
      "No workspace profile is linked to your account yet. Ask an \
       administrator to add you."
        .to_string()
    }
    Err(e) => {
      tracing::warn!(error = %e, "context assembly failed after login");
      "Your permission summary is unavailable right now.".to_string()
    }
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Handle one authenticated message and produce the reply text.
pub async fn run<S, T>(
  store: &S,
  tools: &T,
  chat: &tessera_core::chat::ChatIdentity,
  text: &str,
) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
  T: ToolDispatch,
{
  let Some(identity_id) = chat.identity_id else {
    return "You're not logged in. Send `login` to start.".to_string();
  };

  let active = match assemble(store, identity_id).await {
    Ok(active) => active,
    Err(Error::Core(CoreError::NoProfile)) => {
      return "No workspace profile is linked to your account yet. Ask an \
              administrator to add you."
        .to_string();
    }
    Err(e) => {
      tracing::warn!(error = %e, chat_id = chat.external_chat_id, "context assembly failed");
      return Reply::TransientFailure.text();
    }
  };

  match Operation::parse(text) {
    Some(op) => {
      if let Some((resource, action)) = op.required_grant() {
        if !active.auth.allows(resource, action) {
          return format!(
            "You don't have the `{resource}:{action}` permission in {}.",
            active.tenant.name
          );
        }
      }
      execute(store, &active, op).await
    }
    None => tools.dispatch(&active.auth, text).await,
  }
}

async fn execute<S>(store: &S, active: &ActiveContext, op: Operation) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match op {
    Operation::WhoAmI => whoami(store, active).await,
    Operation::Profiles => profile_listing(store, active).await,
    Operation::Switch(n) => switch(store, active, n).await,
    Operation::Permissions => format!(
      "{} ({})\n{}",
      active.tenant.name,
      active.auth.profile_kind.as_str(),
      summarize(&active.auth.permission_set),
    ),
    Operation::Team => team(store, active).await,
    Operation::Help => HELP.to_string(),
  }
}

async fn whoami<S>(store: &S, active: &ActiveContext) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match store.get_identity(active.auth.identity_id).await {
    Ok(Some(identity)) => format!(
      "{} <{}> - {} at {}",
      identity.display_name,
      identity.email,
      active.auth.profile_kind.as_str(),
      active.tenant.name,
    ),
    Ok(None) => Reply::TransientFailure.text(),
    Err(e) => {
      tracing::warn!(error = %e, "identity lookup failed");
      Reply::TransientFailure.text()
    }
  }
}

/// Numbered listing of all of the identity's profiles. The numbers are the
/// arguments `switch <n>` accepts, so both use the store's listing order.
async fn profile_listing<S>(store: &S, active: &ActiveContext) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = match store
    .list_profiles(Some(active.auth.identity_id), None)
    .await
  {
    Ok(profiles) => profiles,
    Err(e) => {
      tracing::warn!(error = %e, "profile listing failed");
      return Reply::TransientFailure.text();
    }
  };

  let mut out = String::from("Your profiles:");
  for (index, profile) in profiles.iter().enumerate() {
    let tenant_name = match store.get_tenant(profile.tenant_id).await {
      Ok(Some(tenant)) => tenant.name,
      _ => "unknown workspace".to_string(),
    };
    let marker = if profile.profile_id == active.profile.profile_id {
      "  (current)"
    } else {
      ""
    };
    out.push_str(&format!(
      "\n{}. {} - {} ({}){}",
      index + 1,
      tenant_name,
      profile.kind.as_str(),
      profile.status.as_str(),
      marker,
    ));
  }
  out
}

async fn switch<S>(store: &S, active: &ActiveContext, n: usize) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = match store
    .list_profiles(Some(active.auth.identity_id), None)
    .await
  {
    Ok(profiles) => profiles,
    Err(e) => {
      tracing::warn!(error = %e, "profile listing failed");
      return Reply::TransientFailure.text();
    }
  };

  let Some(target) = n.checked_sub(1).and_then(|i| profiles.get(i)) else {
    return format!(
      "There's no profile number {n}. Send `profiles` to see the list."
    );
  };
  if !target.status.is_active() {
    return format!(
      "Profile {n} is {}; only active profiles can become the working \
       context.",
      target.status.as_str()
    );
  }
  if target.profile_id == active.profile.profile_id {
    return "That's already your current profile.".to_string();
  }

  match store
    .switch_primary(active.auth.identity_id, target.profile_id)
    .await
  {
    Ok(_) => format!(
      "Switched.\n{}",
      login_summary(store, active.auth.identity_id).await
    ),
    Err(e) => {
      tracing::warn!(error = %e, "primary switch failed");
      Reply::TransientFailure.text()
    }
  }
}

async fn team<S>(store: &S, active: &ActiveContext) -> String
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profiles = match store
    .list_profiles(None, Some(active.auth.tenant_id))
    .await
  {
    Ok(profiles) => profiles,
    Err(e) => {
      tracing::warn!(error = %e, "member listing failed");
      return Reply::TransientFailure.text();
    }
  };

  let mut out = format!("Active members of {}:", active.tenant.name);
  for profile in profiles.iter().filter(|p| p.status.is_active()) {
    let name = match store.get_identity(profile.identity_id).await {
      Ok(Some(identity)) => identity.display_name,
      _ => "unknown".to_string(),
    };
    out.push_str(&format!("\n  {} - {}", name, profile.kind.as_str()));
  }
  out
}
