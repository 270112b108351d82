//! Chat-platform bridge for Tessera.
//!
//! Accepts webhook deliveries from the messaging platform and turns each
//! message into at most one reply. Unauthenticated chats run through the
//! login state machine in [`machine`]; authenticated chats go to the
//! command layer in [`dispatch`]. Replies leave through a
//! [`sender::ChatSender`].

pub mod auth;
pub mod code;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod machine;
pub mod sender;
pub mod session;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::{Path, State},
  http::StatusCode,
  routing::post,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tessera_core::store::DirectoryStore;

use dispatch::ToolDispatch;
use envelope::Update;
use machine::{Command, Reply};
use sender::ChatSender;
use session::SessionMap;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Path segment the platform must present on every webhook delivery.
  pub webhook_secret: String,
  pub chat_api_base:  String,
  pub chat_token:     String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: DirectoryStore, C: ChatSender, T: ToolDispatch> {
  pub store:    Arc<S>,
  pub sender:   Arc<C>,
  pub tools:    Arc<T>,
  pub sessions: Arc<SessionMap>,
  pub config:   Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the webhook [`Router`] for the bridge.
pub fn router<S, C, T>(state: AppState<S, C, T>) -> Router
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  C: ChatSender + Clone + 'static,
  T: ToolDispatch + Clone + 'static,
{
  Router::new()
    .route("/webhook/{secret}", post(webhook_handler::<S, C, T>))
    .with_state(state)
}

// ─── Webhook handler ─────────────────────────────────────────────────────────

/// Accept one webhook delivery.
///
/// The platform retries anything that is not a 2xx, so every handled
/// outcome acks with 200 even when the update is dropped; only a wrong
/// secret (404) and an undecodable body (400) refuse the delivery.
async fn webhook_handler<S, C, T>(
  State(state): State<AppState<S, C, T>>,
  Path(secret): Path<String>,
  body: Bytes,
) -> StatusCode
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  C: ChatSender + Clone + 'static,
  T: ToolDispatch + Clone + 'static,
{
  if secret != state.config.webhook_secret {
    // A wrong guess learns nothing about whether the endpoint exists.
    return StatusCode::NOT_FOUND;
  }
  let update: Update = match serde_json::from_slice(&body) {
    Ok(update) => update,
    Err(e) => {
      tracing::debug!(error = %e, "rejecting undecodable webhook body");
      return StatusCode::BAD_REQUEST;
    }
  };
  handle_update(&state, update).await;
  StatusCode::OK
}

async fn handle_update<S, C, T>(state: &AppState<S, C, T>, update: Update)
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  C: ChatSender + Clone + 'static,
  T: ToolDispatch + Clone + 'static,
{
  let Some(message) = update.message else {
    // Edits, reactions and other non-message updates are acked unprocessed.
    return;
  };
  let chat_id = message.chat.id;
  let Some(text) = message.text else {
    tracing::debug!(chat_id, "ignoring message without text");
    return;
  };

  // One in-flight delivery per chat. The same guard owns the dedup window,
  // so a replayed update_id is decided under the lock it would race.
  let gate = state.sessions.gate(chat_id);
  let mut window = gate.lock().await;
  if !window.first_delivery(update.update_id) {
    tracing::debug!(chat_id, update_id = update.update_id, "duplicate delivery ignored");
    return;
  }

  let mut chat = match state
    .store
    .touch_chat_identity(chat_id, message.from.username.clone())
    .await
  {
    Ok(chat) => chat,
    Err(e) => {
      tracing::warn!(error = %e, chat_id, "failed to load chat identity");
      state
        .sender
        .send(chat_id, &Reply::TransientFailure.text())
        .await;
      return;
    }
  };

  let reply = match (chat.is_authenticated, Command::parse(&text)) {
    (true, Command::Payload(payload)) => Reply::Dispatch(
      dispatch::run(state.store.as_ref(), state.tools.as_ref(), &chat, &payload)
        .await,
    ),
    (_, command) => {
      let mut reply =
        machine::step(state.store.as_ref(), &mut chat, command, Utc::now())
          .await;
      if let Err(e) = state.store.save_chat_identity(&chat).await {
        // An unsaved transition must not be reported as a successful one.
        tracing::warn!(error = %e, chat_id, "failed to persist chat state");
        reply = Reply::TransientFailure;
      }
      reply
    }
  };

  state.sender.send(chat_id, &reply.text()).await;
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::Duration;
  use rand_core::OsRng;
  use serde_json::json;
  use tessera_core::{
    chat::ConversationState,
    identity::{Identity, NewIdentity},
    profile::{NewProfile, ProfileKind, ProfileStatus},
    tenant::NewTenant,
  };
  use tessera_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use crate::{dispatch::NoTools, sender::RecordingSender};

  const SECRET: &str = "hook-secret";

  async fn make_state()
  -> (AppState<SqliteStore, RecordingSender, NoTools>, RecordingSender) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let sender = RecordingSender::default();
    let state = AppState {
      store:    Arc::new(store),
      sender:   Arc::new(sender.clone()),
      tools:    Arc::new(NoTools),
      sessions: Arc::new(SessionMap::new()),
      config:   Arc::new(ServerConfig {
        host:           "127.0.0.1".to_string(),
        port:           8080,
        store_path:     PathBuf::from(":memory:"),
        webhook_secret: SECRET.to_string(),
        chat_api_base:  "http://chat.invalid".to_string(),
        chat_token:     "token".to_string(),
      }),
    };
    (state, sender)
  }

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  /// Bob: employee of Acme with the Support Agent system role.
  async fn seed_bob(store: &SqliteStore) -> Identity {
    let owner = store
      .add_identity(NewIdentity {
        email:         "owner@acme.test".into(),
        display_name:  "Ava Owner".into(),
        password_hash: hash("owner-pass"),
      })
      .await
      .unwrap();
    let tenant = store
      .add_tenant(NewTenant {
        name:              "Acme".into(),
        slug:              "acme".into(),
        owner_identity_id: owner.identity_id,
      })
      .await
      .unwrap();
    let bob = store
      .add_identity(NewIdentity {
        email:         "bob@example.com".into(),
        display_name:  "Bob".into(),
        password_hash: hash("hunter2"),
      })
      .await
      .unwrap();
    let profile = store
      .add_profile(NewProfile {
        identity_id: bob.identity_id,
        tenant_id:   tenant.tenant_id,
        kind:        ProfileKind::Employee,
        status:      ProfileStatus::Active,
      })
      .await
      .unwrap();
    let roles = store.list_roles(tenant.tenant_id).await.unwrap();
    let support = roles.iter().find(|r| r.slug == "support-agent").unwrap();
    store
      .assign_role(profile.profile_id, support.role_id)
      .await
      .unwrap();
    bob
  }

  async fn deliver(
    state: &AppState<SqliteStore, RecordingSender, NoTools>,
    update_id: i64,
    chat_id: i64,
    text: &str,
  ) -> StatusCode {
    let body = json!({
      "update_id": update_id,
      "message": {
        "message_id": update_id,
        "from": { "id": chat_id, "first_name": "Bob", "username": "bob" },
        "chat": { "id": chat_id },
        "text": text,
        "date": 1_700_000_000,
      },
    });
    let req = Request::builder()
      .method("POST")
      .uri(format!("/webhook/{SECRET}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    router(state.clone()).oneshot(req).await.unwrap().status()
  }

  // ── Delivery envelope ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn wrong_webhook_secret_is_404() {
    let (state, sender) = make_state().await;
    let req = Request::builder()
      .method("POST")
      .uri("/webhook/not-the-secret")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{}"))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(sender.sent().is_empty());
  }

  #[tokio::test]
  async fn undecodable_body_is_400() {
    let (state, _) = make_state().await;
    let req = Request::builder()
      .method("POST")
      .uri(format!("/webhook/{SECRET}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"update_id": "not a number"}"#))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn non_message_updates_are_acknowledged() {
    let (state, sender) = make_state().await;
    let body = json!({ "update_id": 9, "edited_message": { "anything": true } });
    let req = Request::builder()
      .method("POST")
      .uri(format!("/webhook/{SECRET}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(sender.sent().is_empty());
  }

  #[tokio::test]
  async fn duplicate_update_ids_are_delivered_once() {
    let (state, sender) = make_state().await;
    assert_eq!(deliver(&state, 42, 99, "/start").await, StatusCode::OK);
    assert_eq!(deliver(&state, 42, 99, "/start").await, StatusCode::OK);
    assert_eq!(sender.sent().len(), 1);
  }

  // ── Login conversation ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn login_conversation_end_to_end() {
    let (state, sender) = make_state().await;
    let bob = seed_bob(&state.store).await;

    assert_eq!(deliver(&state, 1, 77, "/start").await, StatusCode::OK);
    assert_eq!(deliver(&state, 2, 77, "BOB@example.com").await, StatusCode::OK);

    let row = state.store.get_chat_identity(77).await.unwrap().unwrap();
    assert_eq!(row.state, ConversationState::WaitingForPassword);
    assert_eq!(row.pending_email.as_deref(), Some("bob@example.com"));
    let code = row.one_time_code.unwrap();
    assert_eq!(code.len(), 32);
    assert!(code.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(deliver(&state, 3, 77, "hunter2").await, StatusCode::OK);
    let row = state.store.get_chat_identity(77).await.unwrap().unwrap();
    assert!(row.is_authenticated);
    assert_eq!(row.identity_id, Some(bob.identity_id));
    assert_eq!(row.one_time_code, None);
    assert_eq!(row.pending_email, None);

    deliver(&state, 4, 77, "permissions").await;
    deliver(&state, 5, 77, "logout").await;
    let row = state.store.get_chat_identity(77).await.unwrap().unwrap();
    assert_eq!(row.identity_id, None);
    assert!(!row.is_authenticated);

    let replies = sender.sent();
    assert_eq!(replies.len(), 5);
    assert!(replies[0].1.contains("email address"), "got: {}", replies[0].1);
    assert!(replies[1].1.contains("password"), "got: {}", replies[1].1);
    assert!(
      replies[2].1.contains("You're logged in"),
      "got: {}",
      replies[2].1
    );
    assert!(replies[2].1.contains("Acme"), "got: {}", replies[2].1);
    assert!(
      replies[3].1.contains("customers: read, update"),
      "got: {}",
      replies[3].1
    );
    assert!(replies[4].1.contains("logged out"), "got: {}", replies[4].1);
  }

  #[tokio::test]
  async fn five_wrong_passwords_lock_the_chat() {
    let (state, sender) = make_state().await;
    seed_bob(&state.store).await;

    deliver(&state, 1, 88, "login").await;
    deliver(&state, 2, 88, "bob@example.com").await;
    for i in 0..5 {
      deliver(&state, 3 + i, 88, "wrong-password").await;
    }
    let row = state.store.get_chat_identity(88).await.unwrap().unwrap();
    assert_eq!(row.state, ConversationState::Unauthenticated);
    assert!(row.locked_until.is_some());

    // The correct password is still refused while the lockout holds.
    deliver(&state, 9, 88, "hunter2").await;
    let last = sender.sent().last().unwrap().1.clone();
    assert!(last.contains("Wait a few minutes"), "got: {last}");
    let row = state.store.get_chat_identity(88).await.unwrap().unwrap();
    assert!(!row.is_authenticated);
  }

  #[tokio::test]
  async fn late_password_is_rejected_after_the_window_closes() {
    let (state, sender) = make_state().await;
    seed_bob(&state.store).await;

    deliver(&state, 1, 55, "login").await;
    deliver(&state, 2, 55, "bob@example.com").await;

    // Back-date the window instead of waiting ten minutes.
    let mut row = state.store.get_chat_identity(55).await.unwrap().unwrap();
    row.code_expires_at = Some(Utc::now() - Duration::minutes(1));
    state.store.save_chat_identity(&row).await.unwrap();

    deliver(&state, 3, 55, "hunter2").await;
    let last = sender.sent().last().unwrap().1.clone();
    assert!(last.contains("expired"), "got: {last}");
    let row = state.store.get_chat_identity(55).await.unwrap().unwrap();
    assert!(!row.is_authenticated);
    assert_eq!(row.state, ConversationState::WaitingForPassword);
    assert_eq!(row.pending_email.as_deref(), Some("bob@example.com"));
  }

  // ── Authenticated dispatch ──────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_text_gets_the_fallthrough_reply() {
    let (state, sender) = make_state().await;
    seed_bob(&state.store).await;
    deliver(&state, 1, 66, "login").await;
    deliver(&state, 2, 66, "bob@example.com").await;
    deliver(&state, 3, 66, "hunter2").await;

    deliver(&state, 4, 66, "please void invoice 7").await;
    let last = sender.sent().last().unwrap().1.clone();
    assert!(last.contains("help"), "got: {last}");
  }
}
